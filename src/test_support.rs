//! Shared fixtures for in-crate tests.

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

use crate::profiles::{NewProfile, Profile, ProfileStore};

/// Single-connection in-memory database. More connections would each get
/// their own empty database, so the pool is capped at one.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("apply migrations");
    pool
}

pub fn profile_input(name: &str, gender: &str, lat: f64, lon: f64) -> NewProfile {
    NewProfile {
        name: name.to_owned(),
        gender: gender.to_owned(),
        age: Some(25),
        latitude: Some(lat),
        longitude: Some(lon),
        about: None,
        profile_picture: None,
        interests: Vec::new(),
    }
}

pub async fn seed_profile(
    store: &ProfileStore,
    name: &str,
    gender: &str,
    lat: f64,
    lon: f64,
) -> Profile {
    store
        .create(profile_input(name, gender, lat, lon))
        .await
        .expect("seed profile")
}
