pub mod config;
pub mod error;
pub mod geo;
pub mod matching;
pub mod profiles;
pub mod rooms;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

pub use error::{AppError, AppResult};

use matching::{AffinityStore, MatchFinder, MatchPolicy, OppositeGender};
use profiles::ProfileStore;
use rooms::{MessageStore, RoomBus, RoomStore};

/// Everything handlers need. Cheap to clone; substates peel off via
/// `FromRef`.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub profiles: ProfileStore,
    pub affinity: AffinityStore,
    pub rooms: RoomStore,
    pub messages: MessageStore,
    pub finder: MatchFinder,
    pub bus: RoomBus,
}

impl AppState {
    /// State wired with the default matching policy.
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_policy(pool, Arc::new(OppositeGender))
    }

    pub fn with_policy(pool: SqlitePool, policy: Arc<dyn MatchPolicy>) -> Self {
        let profiles = ProfileStore::new(pool.clone());
        Self {
            affinity: AffinityStore::new(pool.clone()),
            rooms: RoomStore::new(pool.clone()),
            messages: MessageStore::new(pool),
            finder: MatchFinder::new(profiles.clone(), policy),
            bus: RoomBus::new(),
            profiles,
        }
    }
}
