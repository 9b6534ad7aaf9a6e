//! Profile management endpoints.

pub mod store;

pub use store::{NewProfile, Profile, ProfileChanges, ProfileStore};

use axum::{
    Json, Router, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::matching::AffinityStore;
use crate::session::CurrentProfile;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_profile))
        .route("/me", get(my_account).patch(update_my_profile))
        .route("/{uuid}", get(show_profile))
}

#[debug_handler(state = AppState)]
async fn create_profile(
    State(profiles): State<ProfileStore>,
    Json(new): Json<NewProfile>,
) -> AppResult<(StatusCode, Json<Profile>)> {
    let profile = profiles.create(new).await?;
    tracing::info!(profile = %profile.id, "profile created");
    Ok((StatusCode::CREATED, Json(profile)))
}

/// The caller's own profile plus their swipe ledger.
#[derive(Serialize)]
struct AccountResponse {
    #[serde(flatten)]
    profile: Profile,
    liked: Vec<Uuid>,
    disliked: Vec<Uuid>,
}

#[debug_handler(state = AppState)]
async fn my_account(
    State(affinity): State<AffinityStore>,
    CurrentProfile(profile): CurrentProfile,
) -> AppResult<Json<AccountResponse>> {
    let liked = affinity.liked_ids(profile.id).await?;
    let disliked = affinity.disliked_ids(profile.id).await?;
    Ok(Json(AccountResponse {
        profile,
        liked,
        disliked,
    }))
}

#[debug_handler(state = AppState)]
async fn update_my_profile(
    State(profiles): State<ProfileStore>,
    CurrentProfile(profile): CurrentProfile,
    Json(changes): Json<ProfileChanges>,
) -> AppResult<Json<Profile>> {
    Ok(Json(profiles.update(profile.id, changes).await?))
}

#[debug_handler(state = AppState)]
async fn show_profile(
    Path(profile_id): Path<Uuid>,
    State(profiles): State<ProfileStore>,
    _viewer: CurrentProfile,
) -> AppResult<Json<Profile>> {
    Ok(Json(profiles.get(profile_id).await?))
}
