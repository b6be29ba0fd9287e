//! Input validation for API requests.
//!
//! Small per-field validators returning `Result<(), String>`; handlers
//! collect violations with the `ValidationErrorBuilder` from the `error`
//! module so a 400 response itemizes every problem at once.

/// Validate that a required text field is present and non-blank.
pub fn validate_required(value: &str, label: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", label));
    }
    Ok(())
}

/// Validate an admin username (3-64 chars, non-blank)
pub fn validate_username(username: &str) -> Result<(), String> {
    let trimmed = username.trim();
    if trimmed.len() < 3 {
        return Err("Username must be at least 3 characters".to_string());
    }
    if trimmed.len() > 64 {
        return Err("Username is too long (max 64 characters)".to_string());
    }
    Ok(())
}

/// Validate an admin password at creation (6-128 chars)
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 6 {
        return Err("Password must be at least 6 characters".to_string());
    }
    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }
    Ok(())
}

/// Validate an http(s) URL
pub fn validate_url(url: &str) -> Result<(), String> {
    if url.is_empty() {
        return Err("URL is required".to_string());
    }
    if url.len() > 2048 {
        return Err("URL is too long (max 2048 characters)".to_string());
    }
    match reqwest::Url::parse(url) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => Ok(()),
        _ => Err("Invalid URL format. Must be an HTTP(S) URL".to_string()),
    }
}

/// Validate an optional crew member age
pub fn validate_age(age: Option<i64>) -> Result<(), String> {
    if let Some(a) = age {
        if a < 0 {
            return Err("Age must be a non-negative integer".to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_required() {
        assert!(validate_required("Park Run", "Title").is_ok());
        assert!(validate_required("", "Title").is_err());
        assert!(validate_required("   ", "Title").is_err());
        assert_eq!(
            validate_required("", "Title").unwrap_err(),
            "Title is required"
        );
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("ana").is_ok());
        assert!(validate_username("club-admin").is_ok());

        assert!(validate_username("ab").is_err());
        assert!(validate_username("").is_err());
        assert!(validate_username(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secret1").is_ok());
        assert!(validate_password("123456").is_ok());

        assert!(validate_password("12345").is_err());
        assert!(validate_password("").is_err());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/post").is_ok());
        assert!(validate_url("http://blog.example.com/a?b=c").is_ok());

        assert!(validate_url("").is_err());
        assert!(validate_url("not-a-url").is_err());
        assert!(validate_url("ftp://example.com/file").is_err());
        assert!(validate_url("javascript:alert(1)").is_err());
    }

    #[test]
    fn test_validate_age() {
        assert!(validate_age(None).is_ok());
        assert!(validate_age(Some(0)).is_ok());
        assert!(validate_age(Some(34)).is_ok());

        assert!(validate_age(Some(-1)).is_err());
    }
}
