//! Session-backed identity.
//!
//! Binding a session to a profile stands in for a real login flow; the rest
//! of the crate only ever sees [`CurrentProfile`].

use axum::{
    Json, Router, debug_handler,
    extract::{FromRequestParts, State},
    http::{StatusCode, request::Parts},
    routing::post,
};
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::profiles::{Profile, ProfileStore};

pub const PROFILE_ID: &str = "profile_id";

/// The authenticated caller, resolved from the session cookie. Extraction
/// rejects the request when the session is anonymous or points at a profile
/// that no longer exists.
#[derive(Debug)]
pub struct CurrentProfile(pub Profile);

impl FromRequestParts<AppState> for CurrentProfile {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await.map_err(
            |(_, reason)| AppError::Internal(anyhow::anyhow!("session layer missing: {reason}")),
        )?;

        let Some(profile_id) = session.get::<Uuid>(PROFILE_ID).await? else {
            return Err(AppError::Unauthorized);
        };

        match state.profiles.try_get(profile_id).await? {
            Some(profile) => Ok(CurrentProfile(profile)),
            // A session can outlive its profile; treat that as logged out.
            None => Err(AppError::Unauthorized),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/session", post(bind).delete(clear))
}

#[derive(Deserialize)]
struct BindRequest {
    profile_id: String,
}

/// Binds the session to an existing profile. This endpoint is the seam
/// where a real identity provider would plug in.
#[debug_handler(state = AppState)]
async fn bind(
    State(profiles): State<ProfileStore>,
    session: Session,
    Json(req): Json<BindRequest>,
) -> AppResult<StatusCode> {
    let profile_id = Uuid::parse_str(&req.profile_id)
        .map_err(|_| AppError::InvalidArgument("'profile_id' must be a valid profile id".into()))?;
    let profile = profiles.get(profile_id).await?;

    session.insert(PROFILE_ID, profile.id).await?;
    tracing::debug!(profile = %profile.id, "session bound");
    Ok(StatusCode::NO_CONTENT)
}

#[debug_handler(state = AppState)]
async fn clear(session: Session) -> AppResult<StatusCode> {
    session.clear().await;
    Ok(StatusCode::NO_CONTENT)
}
