//! Upload pipeline: multipart acceptance, collision-resistant storage under
//! the managed uploads directory, and the avatar normalization stage.

use axum::extract::multipart::Field;
use image::imageops::FilterType;
use image::DynamicImage;
use rand::Rng;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// URL prefix under which stored files are served.
pub const PUBLIC_PREFIX: &str = "/uploads";

const MAX_GENERIC_BYTES: usize = 10 * 1024 * 1024;
const MAX_ENTITY_BYTES: usize = 5 * 1024 * 1024;

/// Square side of normalized avatars.
const AVATAR_SIDE: u32 = 800;
const AVATAR_JPEG_QUALITY: u8 = 85;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file uploaded")]
    MissingFile,
    #[error("Unsupported upload type: {0}")]
    UnsupportedType(String),
    #[error("File is too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Image processing failed: {0}")]
    Processing(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AllowedTypes {
    /// Any `image/*` subtype.
    AnyImage,
    /// Exactly `image/png` or `image/jpeg`.
    PngJpeg,
}

/// What an endpoint accepts: MIME set, size cap and filename prefix.
#[derive(Debug, Clone)]
pub struct ImageConstraints {
    prefix: &'static str,
    max_bytes: usize,
    allowed: AllowedTypes,
}

impl ImageConstraints {
    /// Generic image upload: any `image/*`, up to 10 MB.
    pub fn any_image(prefix: &'static str) -> Self {
        Self {
            prefix,
            max_bytes: MAX_GENERIC_BYTES,
            allowed: AllowedTypes::AnyImage,
        }
    }

    /// Entity image upload: PNG or JPEG only, up to 5 MB.
    pub fn png_jpeg(prefix: &'static str) -> Self {
        Self {
            prefix,
            max_bytes: MAX_ENTITY_BYTES,
            allowed: AllowedTypes::PngJpeg,
        }
    }

    fn allows(&self, mime: &str) -> bool {
        match self.allowed {
            AllowedTypes::AnyImage => mime.starts_with("image/"),
            AllowedTypes::PngJpeg => mime == "image/png" || mime == "image/jpeg",
        }
    }
}

/// A file accepted and written by the pipeline.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub file_name: String,
    pub public_path: String,
    pub disk_path: PathBuf,
}

/// Accept a multipart image field: gate on MIME type and size, then write
/// it under a generated collision-resistant name. Nothing is written when
/// the field is rejected.
pub async fn accept_image(
    field: Field<'_>,
    constraints: &ImageConstraints,
    uploads_dir: &Path,
) -> Result<StoredImage, UploadError> {
    let mime = field
        .content_type()
        .map(|m| m.to_ascii_lowercase())
        .unwrap_or_default();
    if !constraints.allows(&mime) {
        return Err(UploadError::UnsupportedType(if mime.is_empty() {
            "unknown".to_string()
        } else {
            mime
        }));
    }

    let original_name = field.file_name().map(|n| n.to_string());
    let data = field
        .bytes()
        .await
        .map_err(|e| UploadError::Io(e.to_string()))?;

    store_bytes(&data, original_name.as_deref(), &mime, constraints, uploads_dir).await
}

async fn store_bytes(
    data: &[u8],
    original_name: Option<&str>,
    mime: &str,
    constraints: &ImageConstraints,
    uploads_dir: &Path,
) -> Result<StoredImage, UploadError> {
    if data.is_empty() {
        return Err(UploadError::MissingFile);
    }
    if data.len() > constraints.max_bytes {
        return Err(UploadError::TooLarge {
            size: data.len(),
            max: constraints.max_bytes,
        });
    }

    let file_name = generate_file_name(constraints.prefix, original_name, mime);
    let disk_path = uploads_dir.join(&file_name);

    tokio::fs::write(&disk_path, data)
        .await
        .map_err(|e| UploadError::Io(e.to_string()))?;

    Ok(StoredImage {
        public_path: format!("{}/{}", PUBLIC_PREFIX, file_name),
        file_name,
        disk_path,
    })
}

/// `{prefix}-{unix millis}-{random hex}{ext}`; concurrent uploads cannot
/// collide on the same path.
fn generate_file_name(prefix: &str, original_name: Option<&str>, mime: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let mut rng = rand::rng();
    let bytes: [u8; 8] = rng.random();
    let ext = extension_for(original_name, mime);
    format!("{}-{}-{}{}", prefix, millis, hex::encode(bytes), ext)
}

/// Extension from the client filename, falling back to the MIME type.
fn extension_for(original_name: Option<&str>, mime: &str) -> String {
    if let Some(ext) = original_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
    {
        return format!(".{}", ext.to_ascii_lowercase());
    }
    mime_guess::get_mime_extensions_str(mime)
        .and_then(|exts| exts.first())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}

/// True when a stored image path lives under the managed namespace.
pub fn is_managed_path(path: &str) -> bool {
    path.starts_with(&format!("{}/", PUBLIC_PREFIX))
}

/// Map a public `/uploads/...` path back to its on-disk location. Returns
/// None for external URLs and anything that escapes the uploads directory.
pub fn disk_path_for(public_path: &str, uploads_dir: &Path) -> Option<PathBuf> {
    let name = public_path.strip_prefix(&format!("{}/", PUBLIC_PREFIX))?;
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return None;
    }
    Some(uploads_dir.join(name))
}

/// Best-effort removal of a managed file; failures are logged, never
/// surfaced (the owning row is already gone).
pub async fn remove_managed_file(public_path: &str, uploads_dir: &Path) {
    let Some(path) = disk_path_for(public_path, uploads_dir) else {
        return;
    };
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove uploaded file");
    }
}

/// Normalize a crew avatar on a blocking thread: fix EXIF orientation,
/// cover-crop to a square (never enlarging), re-encode as JPEG, and delete
/// the pre-normalization file.
pub async fn normalize_avatar_file(input: PathBuf, output: PathBuf) -> Result<(), UploadError> {
    tokio::task::spawn_blocking(move || {
        normalize_avatar(&input, &output)?;
        if let Err(e) = std::fs::remove_file(&input) {
            tracing::warn!(path = %input.display(), error = %e, "Failed to remove pre-normalization file");
        }
        Ok(())
    })
    .await
    .map_err(|e| UploadError::Processing(e.to_string()))?
}

fn normalize_avatar(input: &Path, output: &Path) -> Result<(), UploadError> {
    let bytes = std::fs::read(input).map_err(|e| UploadError::Io(e.to_string()))?;

    let orientation = exif_orientation(&bytes);
    let img = image::load_from_memory(&bytes).map_err(|e| UploadError::Processing(e.to_string()))?;
    let img = apply_orientation(img, orientation);

    let (w, h) = (img.width(), img.height());
    let side = AVATAR_SIDE.min(w).min(h);
    let img = if w == side && h == side {
        img
    } else {
        img.resize_to_fill(side, side, FilterType::Lanczos3)
    };

    let file = std::fs::File::create(output).map_err(|e| UploadError::Io(e.to_string()))?;
    let mut writer = BufWriter::new(file);
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, AVATAR_JPEG_QUALITY);
    img.to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| UploadError::Processing(e.to_string()))?;

    Ok(())
}

/// EXIF orientation tag value, defaulting to 1 (upright) when absent.
fn exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = std::io::Cursor::new(bytes);
    match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(data) => data
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .unwrap_or(1),
        Err(_) => 1,
    }
}

fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_png_jpeg_constraints() {
        let c = ImageConstraints::png_jpeg("crew");
        assert!(c.allows("image/png"));
        assert!(c.allows("image/jpeg"));
        assert!(!c.allows("image/gif"));
        assert!(!c.allows("text/plain"));
        assert_eq!(c.max_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_any_image_constraints() {
        let c = ImageConstraints::any_image("upload");
        assert!(c.allows("image/webp"));
        assert!(c.allows("image/png"));
        assert!(!c.allows("text/plain"));
        assert!(!c.allows("application/pdf"));
        assert_eq!(c.max_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_generate_file_name() {
        let name = generate_file_name("event", Some("Race Photo.PNG"), "image/png");
        assert!(name.starts_with("event-"));
        assert!(name.ends_with(".png"));

        // Two names generated back to back must differ
        let other = generate_file_name("event", Some("Race Photo.PNG"), "image/png");
        assert_ne!(name, other);
    }

    #[test]
    fn test_extension_falls_back_to_mime() {
        assert_eq!(extension_for(Some("photo.jpeg"), "image/png"), ".jpeg");
        assert_eq!(extension_for(Some("noext"), "image/png"), ".png");
        assert_eq!(extension_for(None, "application/x-unknown"), "");
    }

    #[test]
    fn test_managed_path_mapping() {
        let dir = Path::new("/srv/uploads");
        assert!(is_managed_path("/uploads/crew-1-aa.png"));
        assert!(!is_managed_path("https://example.com/a.png"));

        assert_eq!(
            disk_path_for("/uploads/crew-1-aa.png", dir),
            Some(dir.join("crew-1-aa.png"))
        );
        assert_eq!(disk_path_for("https://example.com/a.png", dir), None);
        assert_eq!(disk_path_for("/uploads/../etc/passwd", dir), None);
        assert_eq!(disk_path_for("/uploads/a/b.png", dir), None);
        assert_eq!(disk_path_for("/uploads/", dir), None);
    }

    #[tokio::test]
    async fn test_store_bytes_rejects_oversize_without_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let c = ImageConstraints::png_jpeg("crew");
        let data = vec![0u8; 5 * 1024 * 1024 + 1];

        let err = store_bytes(&data, Some("big.png"), "image/png", &c, tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { .. }));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_store_bytes_writes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let c = ImageConstraints::png_jpeg("article");

        let stored = store_bytes(b"fake-png-data", Some("a.png"), "image/png", &c, tmp.path())
            .await
            .unwrap();
        assert!(stored.disk_path.is_file());
        assert!(stored.public_path.starts_with("/uploads/article-"));
        assert_eq!(
            std::fs::read(&stored.disk_path).unwrap(),
            b"fake-png-data".to_vec()
        );
    }

    #[test]
    fn test_apply_orientation_rotates() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(3, 1));
        let rotated = apply_orientation(img, 6);
        assert_eq!((rotated.width(), rotated.height()), (1, 3));

        let img = DynamicImage::ImageRgb8(RgbImage::new(3, 1));
        let same = apply_orientation(img, 1);
        assert_eq!((same.width(), same.height()), (3, 1));
    }

    #[test]
    fn test_exif_orientation_defaults_to_upright() {
        // PNG bytes carry no EXIF container
        assert_eq!(exif_orientation(b"\x89PNG\r\n\x1a\nnot-really"), 1);
    }

    #[test]
    fn test_normalize_avatar_cover_crops() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("crew-in.png");
        let output = tmp.path().join("processed-crew-in.jpg");

        DynamicImage::ImageRgb8(RgbImage::new(1000, 600))
            .save(&input)
            .unwrap();

        normalize_avatar(&input, &output).unwrap();

        let out = image::open(&output).unwrap();
        // Never enlarged: square side is min(800, w, h)
        assert_eq!((out.width(), out.height()), (600, 600));
    }

    #[test]
    fn test_normalize_avatar_small_image_not_enlarged() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("crew-small.png");
        let output = tmp.path().join("processed-crew-small.jpg");

        DynamicImage::ImageRgb8(RgbImage::new(300, 200))
            .save(&input)
            .unwrap();

        normalize_avatar(&input, &output).unwrap();

        let out = image::open(&output).unwrap();
        assert_eq!((out.width(), out.height()), (200, 200));
    }

    #[tokio::test]
    async fn test_normalize_avatar_file_removes_input() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("crew-tmp.png");
        let output = tmp.path().join("processed-crew-tmp.jpg");

        DynamicImage::ImageRgb8(RgbImage::new(64, 64))
            .save(&input)
            .unwrap();

        normalize_avatar_file(input.clone(), output.clone())
            .await
            .unwrap();
        assert!(!input.exists());
        assert!(output.is_file());
    }
}
