//! Nearby-profile discovery: coarse box cut, then exact distance and
//! eligibility filters.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::geo::{self, BoundingBox};
use crate::matching::policy::MatchPolicy;
use crate::profiles::{Profile, ProfileStore};

/// Radius applied when the caller does not ask for one.
pub const DEFAULT_RADIUS_KM: f64 = 5.0;

/// A candidate as presented to the viewer, distance included.
#[derive(Debug, Clone, Serialize)]
pub struct NearbyProfile {
    pub id: Uuid,
    pub name: String,
    pub gender: String,
    pub age: Option<i64>,
    pub distance: f64,
    pub about: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Clone)]
pub struct MatchFinder {
    profiles: ProfileStore,
    policy: Arc<dyn MatchPolicy>,
}

impl MatchFinder {
    pub fn new(profiles: ProfileStore, policy: Arc<dyn MatchPolicy>) -> Self {
        Self { profiles, policy }
    }

    /// Profiles within `radius_km` of the viewer that the policy allows and
    /// the viewer has not swiped on yet, closest first.
    pub async fn find(&self, viewer: &Profile, radius_km: f64) -> AppResult<Vec<NearbyProfile>> {
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(AppError::InvalidArgument(
                "'radius' must be a positive number of kilometers".into(),
            ));
        }
        let (lat, lon) = viewer.coordinates().ok_or_else(|| {
            AppError::PreconditionFailed("your profile has no location set".into())
        })?;

        let bbox = BoundingBox::around(lat, lon, radius_km);
        let candidates = self.profiles.candidates_in_box(viewer.id, &bbox).await?;
        let scanned = candidates.len();

        let mut nearby: Vec<NearbyProfile> = candidates
            .into_iter()
            .filter(|candidate| self.policy.eligible(viewer, candidate))
            .filter_map(|candidate| {
                let (clat, clon) = candidate.coordinates()?;
                // Distance is rounded before the cut, so a hair past the
                // radius still counts when it rounds back onto it.
                let distance = geo::distance_km(lat, lon, clat, clon);
                (distance <= radius_km).then(|| NearbyProfile {
                    id: candidate.id,
                    name: candidate.name,
                    gender: candidate.gender,
                    age: candidate.age,
                    distance,
                    about: candidate.about,
                    profile_picture: candidate.profile_picture,
                })
            })
            .collect();

        // Ties on distance break on id so the order is stable across calls.
        nearby.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.id.cmp(&b.id))
        });

        tracing::debug!(
            viewer = %viewer.id,
            radius_km,
            scanned,
            kept = nearby.len(),
            "nearby search"
        );
        Ok(nearby)
    }
}
