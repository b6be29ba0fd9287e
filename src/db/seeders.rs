//! Sample content for fresh installs.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

struct SeedEvent {
    title: &'static str,
    date: &'static str,
    time: &'static str,
    location: &'static str,
    distance: &'static str,
    difficulty: &'static str,
    coffee_stop: &'static str,
    description: &'static str,
    image: &'static str,
    runner_count: i64,
}

const SEED_EVENTS: [SeedEvent; 3] = [
    SeedEvent {
        title: "Herastrau Park Morning Run",
        date: "2025-12-15",
        time: "09:00",
        location: "Herastrau Park",
        distance: "5K - 8K",
        difficulty: "All Levels",
        coffee_stop: "Origo Coffee Shop",
        description: "Beautiful lakeside run",
        image: "https://images.pexels.com/photos/2526878/pexels-photo-2526878.jpeg?auto=compress&cs=tinysrgb&w=800",
        runner_count: 15,
    },
    SeedEvent {
        title: "Cismigiu Gardens Evening Run",
        date: "2025-12-20",
        time: "18:30",
        location: "Cismigiu Gardens",
        distance: "3K - 5K",
        difficulty: "Beginner Friendly",
        coffee_stop: "Cafe Central",
        description: "Relaxing evening run",
        image: "https://images.pexels.com/photos/2526878/pexels-photo-2526878.jpeg?auto=compress&cs=tinysrgb&w=800",
        runner_count: 8,
    },
    SeedEvent {
        title: "Carol Park Trail Run",
        date: "2025-12-25",
        time: "10:00",
        location: "Carol Park",
        distance: "8K - 12K",
        difficulty: "Intermediate",
        coffee_stop: "Starbucks",
        description: "Challenging trail run",
        image: "https://images.pexels.com/photos/2526878/pexels-photo-2526878.jpeg?auto=compress&cs=tinysrgb&w=800",
        runner_count: 12,
    },
];

/// Insert sample events when the table is empty. Safe to call on every
/// startup.
pub async fn seed_events(pool: &SqlitePool) -> Result<()> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(());
    }

    for event in &SEED_EVENTS {
        sqlx::query(
            r#"
            INSERT INTO events (title, date, time, location, distance, difficulty, coffee_stop, description, image, runner_count)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.title)
        .bind(event.date)
        .bind(event.time)
        .bind(event.location)
        .bind(event.distance)
        .bind(event.difficulty)
        .bind(event.coffee_stop)
        .bind(event.description)
        .bind(event.image)
        .bind(event.runner_count)
        .execute(pool)
        .await?;
    }

    info!("Seeded {} sample events", SEED_EVENTS.len());
    Ok(())
}
