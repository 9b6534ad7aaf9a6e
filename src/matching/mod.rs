//! Proximity matching: the discovery feed plus like/dislike swipes.

mod affinity;
mod finder;
mod policy;

pub use affinity::{AffinityStore, SwipeAction, SwipeOutcome, swipe};
pub use finder::{DEFAULT_RADIUS_KM, MatchFinder, NearbyProfile};
pub use policy::{MatchPolicy, OppositeGender};

use axum::{
    Json, Router, debug_handler,
    extract::{Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::profiles::ProfileStore;
use crate::session::CurrentProfile;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/find", get(find))
        .route("/swipe", post(record_swipe))
}

#[derive(Deserialize)]
struct FindQuery {
    radius: Option<String>,
}

#[derive(Debug, Serialize)]
struct FindResponse {
    total_profiles: usize,
    nearby_profiles: Vec<NearbyProfile>,
}

#[debug_handler(state = AppState)]
async fn find(
    State(finder): State<MatchFinder>,
    CurrentProfile(viewer): CurrentProfile,
    Query(query): Query<FindQuery>,
) -> AppResult<Json<FindResponse>> {
    let radius_km = match query.radius.as_deref() {
        None => DEFAULT_RADIUS_KM,
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::InvalidArgument("'radius' must be a valid number".into()))?,
    };

    let nearby_profiles = finder.find(&viewer, radius_km).await?;
    Ok(Json(FindResponse {
        total_profiles: nearby_profiles.len(),
        nearby_profiles,
    }))
}

#[derive(Deserialize)]
struct SwipeRequest {
    other_id: String,
    action: String,
}

#[debug_handler(state = AppState)]
async fn record_swipe(
    State(profiles): State<ProfileStore>,
    State(affinity): State<AffinityStore>,
    CurrentProfile(viewer): CurrentProfile,
    Json(req): Json<SwipeRequest>,
) -> AppResult<Json<SwipeOutcome>> {
    let action: SwipeAction = req.action.parse()?;
    let other_id = Uuid::parse_str(&req.other_id)
        .map_err(|_| AppError::InvalidArgument("'other_id' must be a valid profile id".into()))?;

    let outcome = swipe(&profiles, &affinity, &viewer, other_id, action).await?;
    Ok(Json(outcome))
}
