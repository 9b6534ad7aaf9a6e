//! Profile records and their persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqlitePool, types::Json};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::geo::BoundingBox;

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub gender: String,
    pub age: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub about: Option<String>,
    pub profile_picture: Option<String>,
    pub interests: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Both coordinates, or None when the profile has no usable location.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// Row shape as stored; ids stay TEXT until this boundary.
#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: String,
    name: String,
    gender: String,
    age: Option<i64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    about: Option<String>,
    profile_picture: Option<String>,
    interests: Json<Vec<String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = AppError;

    fn try_from(row: ProfileRow) -> AppResult<Self> {
        Ok(Profile {
            id: Uuid::parse_str(&row.id)?,
            name: row.name,
            gender: row.gender,
            age: row.age,
            latitude: row.latitude,
            longitude: row.longitude,
            about: row.about,
            profile_picture: row.profile_picture,
            interests: row.interests.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const PROFILE_COLUMNS: &str = "id, name, gender, age, latitude, longitude, about, \
                               profile_picture, interests, created_at, updated_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewProfile {
    pub name: String,
    pub gender: String,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

impl NewProfile {
    fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::InvalidArgument("'name' must not be empty".into()));
        }
        if self.gender.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "'gender' must not be empty".into(),
            ));
        }
        validate_age(self.age)?;
        validate_coordinates(self.latitude, self.longitude)
    }
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub age: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub about: Option<String>,
    pub profile_picture: Option<String>,
    pub interests: Option<Vec<String>>,
}

impl ProfileChanges {
    fn validate(&self) -> AppResult<()> {
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err(AppError::InvalidArgument("'name' must not be empty".into()));
        }
        if let Some(gender) = &self.gender
            && gender.trim().is_empty()
        {
            return Err(AppError::InvalidArgument(
                "'gender' must not be empty".into(),
            ));
        }
        validate_age(self.age)?;
        // A location change must carry the whole pair.
        if self.latitude.is_some() || self.longitude.is_some() {
            validate_coordinates(self.latitude, self.longitude)?;
        }
        Ok(())
    }
}

fn validate_age(age: Option<i64>) -> AppResult<()> {
    if let Some(age) = age
        && !(18..=120).contains(&age)
    {
        return Err(AppError::InvalidArgument(
            "'age' must be between 18 and 120".into(),
        ));
    }
    Ok(())
}

fn validate_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> AppResult<()> {
    match (latitude, longitude) {
        (None, None) => Ok(()),
        (Some(lat), Some(lon)) => {
            if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                return Err(AppError::InvalidArgument(
                    "'latitude' must be between -90 and 90".into(),
                ));
            }
            if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
                return Err(AppError::InvalidArgument(
                    "'longitude' must be between -180 and 180".into(),
                ));
            }
            Ok(())
        }
        _ => Err(AppError::InvalidArgument(
            "'latitude' and 'longitude' must be provided together".into(),
        )),
    }
}

#[derive(Clone)]
pub struct ProfileStore {
    pool: SqlitePool,
}

impl ProfileStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewProfile) -> AppResult<Profile> {
        new.validate()?;
        let id = Uuid::now_v7();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO profiles \
             (id, name, gender, age, latitude, longitude, about, profile_picture, interests, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(new.name.trim())
        .bind(new.gender.trim())
        .bind(new.age)
        .bind(new.latitude)
        .bind(new.longitude)
        .bind(&new.about)
        .bind(&new.profile_picture)
        .bind(Json(&new.interests))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Profile> {
        self.try_get(id).await?.ok_or(AppError::NotFound("profile"))
    }

    pub async fn try_get(&self, id: Uuid) -> AppResult<Option<Profile>> {
        let row: Option<ProfileRow> =
            sqlx::query_as(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(Profile::try_from).transpose()
    }

    pub async fn update(&self, id: Uuid, changes: ProfileChanges) -> AppResult<Profile> {
        changes.validate()?;
        let updated = sqlx::query(
            "UPDATE profiles SET \
                name = COALESCE(?, name), \
                gender = COALESCE(?, gender), \
                age = COALESCE(?, age), \
                latitude = COALESCE(?, latitude), \
                longitude = COALESCE(?, longitude), \
                about = COALESCE(?, about), \
                profile_picture = COALESCE(?, profile_picture), \
                interests = COALESCE(?, interests), \
                updated_at = ? \
             WHERE id = ?",
        )
        .bind(changes.name.as_deref().map(str::trim))
        .bind(changes.gender.as_deref().map(str::trim))
        .bind(changes.age)
        .bind(changes.latitude)
        .bind(changes.longitude)
        .bind(changes.about.as_deref())
        .bind(changes.profile_picture.as_deref())
        .bind(changes.interests.as_ref().map(Json))
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(AppError::NotFound("profile"));
        }
        self.get(id).await
    }

    /// Profiles inside the box, excluding the viewer and anyone the viewer
    /// has already swiped on. This is the coarse cut; the exact distance and
    /// eligibility filters run in the match finder.
    pub async fn candidates_in_box(
        &self,
        viewer: Uuid,
        bbox: &BoundingBox,
    ) -> AppResult<Vec<Profile>> {
        let rows: Vec<ProfileRow> = sqlx::query_as(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles \
             WHERE id <> ? \
               AND latitude IS NOT NULL AND longitude IS NOT NULL \
               AND latitude BETWEEN ? AND ? \
               AND longitude BETWEEN ? AND ? \
               AND id NOT IN (SELECT target_id FROM swipes WHERE profile_id = ?)"
        ))
        .bind(viewer.to_string())
        .bind(bbox.lat_min)
        .bind(bbox.lat_max)
        .bind(bbox.lon_min)
        .bind(bbox.lon_max)
        .bind(viewer.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Profile::try_from).collect()
    }
}
