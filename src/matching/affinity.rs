//! Like/dislike verdicts and the swipe operation.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::profiles::{Profile, ProfileStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeAction {
    Like,
    Dislike,
}

impl fmt::Display for SwipeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwipeAction::Like => write!(f, "like"),
            SwipeAction::Dislike => write!(f, "dislike"),
        }
    }
}

impl FromStr for SwipeAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(SwipeAction::Like),
            "dislike" => Ok(SwipeAction::Dislike),
            other => Err(AppError::InvalidArgument(format!(
                "invalid action {other:?}, expected 'like' or 'dislike'"
            ))),
        }
    }
}

/// One verdict per (viewer, target) pair. A later swipe on the same target
/// replaces the earlier one, which keeps like and dislike mutually
/// exclusive without any cross-checking.
#[derive(Clone)]
pub struct AffinityStore {
    pool: SqlitePool,
}

impl AffinityStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Records the verdict and reports whether it completed a mutual like.
    /// The reverse-direction read and the write commit together, so two
    /// concurrent swipes cannot both miss the match.
    pub async fn apply(&self, viewer: Uuid, target: Uuid, action: SwipeAction) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let mutual = match action {
            SwipeAction::Like => {
                let reverse: Option<(String,)> =
                    sqlx::query_as("SELECT action FROM swipes WHERE profile_id = ? AND target_id = ?")
                        .bind(target.to_string())
                        .bind(viewer.to_string())
                        .fetch_optional(&mut *tx)
                        .await?;
                matches!(reverse, Some((ref a,)) if a == "like")
            }
            SwipeAction::Dislike => false,
        };

        sqlx::query(
            "INSERT INTO swipes (profile_id, target_id, action, created_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT (profile_id, target_id) \
             DO UPDATE SET action = excluded.action, created_at = excluded.created_at",
        )
        .bind(viewer.to_string())
        .bind(target.to_string())
        .bind(action.to_string())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(mutual)
    }

    pub async fn verdict_on(&self, viewer: Uuid, target: Uuid) -> AppResult<Option<SwipeAction>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT action FROM swipes WHERE profile_id = ? AND target_id = ?")
                .bind(viewer.to_string())
                .bind(target.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(action,)| action.parse()).transpose()
    }

    pub async fn liked_ids(&self, viewer: Uuid) -> AppResult<Vec<Uuid>> {
        self.ids_with_action(viewer, SwipeAction::Like).await
    }

    pub async fn disliked_ids(&self, viewer: Uuid) -> AppResult<Vec<Uuid>> {
        self.ids_with_action(viewer, SwipeAction::Dislike).await
    }

    async fn ids_with_action(&self, viewer: Uuid, action: SwipeAction) -> AppResult<Vec<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT target_id FROM swipes WHERE profile_id = ? AND action = ? ORDER BY created_at",
        )
        .bind(viewer.to_string())
        .bind(action.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(id,)| Uuid::parse_str(&id).map_err(AppError::from))
            .collect()
    }
}

/// What the swiping user gets back.
#[derive(Debug, Serialize)]
pub struct SwipeOutcome {
    pub name: String,
    pub status: &'static str,
    #[serde(rename = "match")]
    pub matched: bool,
    pub message: String,
}

/// The full swipe operation: resolves the target, rejects self-swipes, then
/// records the verdict atomically.
pub async fn swipe(
    profiles: &ProfileStore,
    affinity: &AffinityStore,
    viewer: &Profile,
    target_id: Uuid,
    action: SwipeAction,
) -> AppResult<SwipeOutcome> {
    let target = profiles.get(target_id).await?;
    if target.id == viewer.id {
        return Err(AppError::PreconditionFailed(
            "you cannot like or dislike your own profile".into(),
        ));
    }

    let matched = affinity.apply(viewer.id, target.id, action).await?;
    tracing::debug!(viewer = %viewer.id, target = %target.id, %action, matched, "swipe recorded");

    let message = match action {
        SwipeAction::Like => "Liked Profile successfully",
        SwipeAction::Dislike => "Disliked Profile successfully",
    };
    Ok(SwipeOutcome {
        name: target.name,
        status: "success",
        matched,
        message: message.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_pool, seed_profile};

    async fn two_profiles() -> (ProfileStore, AffinityStore, Profile, Profile) {
        let pool = memory_pool().await;
        let profiles = ProfileStore::new(pool.clone());
        let affinity = AffinityStore::new(pool);
        let a = seed_profile(&profiles, "Asha", "female", 12.97, 77.59).await;
        let b = seed_profile(&profiles, "Dev", "male", 12.98, 77.60).await;
        (profiles, affinity, a, b)
    }

    #[tokio::test]
    async fn reciprocal_like_reports_a_match() {
        let (profiles, affinity, a, b) = two_profiles().await;

        let first = swipe(&profiles, &affinity, &a, b.id, SwipeAction::Like)
            .await
            .unwrap();
        assert!(!first.matched);
        assert_eq!(first.name, "Dev");
        assert_eq!(first.status, "success");

        let second = swipe(&profiles, &affinity, &b, a.id, SwipeAction::Like)
            .await
            .unwrap();
        assert!(second.matched);

        // Once mutual, a repeat swipe keeps reporting the match.
        let again = swipe(&profiles, &affinity, &a, b.id, SwipeAction::Like)
            .await
            .unwrap();
        assert!(again.matched);
    }

    #[tokio::test]
    async fn dislike_never_matches() {
        let (profiles, affinity, a, b) = two_profiles().await;

        swipe(&profiles, &affinity, &a, b.id, SwipeAction::Like)
            .await
            .unwrap();
        let back = swipe(&profiles, &affinity, &b, a.id, SwipeAction::Dislike)
            .await
            .unwrap();
        assert!(!back.matched);
        assert_eq!(back.message, "Disliked Profile successfully");
    }

    #[tokio::test]
    async fn later_swipe_replaces_the_earlier_verdict() {
        let (_, affinity, a, b) = two_profiles().await;

        affinity.apply(a.id, b.id, SwipeAction::Dislike).await.unwrap();
        assert_eq!(affinity.disliked_ids(a.id).await.unwrap(), vec![b.id]);
        assert!(affinity.liked_ids(a.id).await.unwrap().is_empty());

        affinity.apply(a.id, b.id, SwipeAction::Like).await.unwrap();
        assert_eq!(affinity.liked_ids(a.id).await.unwrap(), vec![b.id]);
        assert!(affinity.disliked_ids(a.id).await.unwrap().is_empty());
        assert_eq!(
            affinity.verdict_on(a.id, b.id).await.unwrap(),
            Some(SwipeAction::Like)
        );
    }

    #[tokio::test]
    async fn repeating_an_action_is_idempotent() {
        let (_, affinity, a, b) = two_profiles().await;

        affinity.apply(a.id, b.id, SwipeAction::Like).await.unwrap();
        affinity.apply(a.id, b.id, SwipeAction::Like).await.unwrap();
        assert_eq!(affinity.liked_ids(a.id).await.unwrap(), vec![b.id]);
    }

    #[tokio::test]
    async fn swiping_yourself_is_rejected() {
        let (profiles, affinity, a, _) = two_profiles().await;

        let err = swipe(&profiles, &affinity, &a, a.id, SwipeAction::Like)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed(_)));
        assert!(affinity.liked_ids(a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn swiping_a_missing_profile_is_not_found() {
        let (profiles, affinity, a, _) = two_profiles().await;

        let err = swipe(&profiles, &affinity, &a, Uuid::now_v7(), SwipeAction::Dislike)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("profile")));
    }

    #[test]
    fn action_parses_and_prints() {
        assert_eq!("like".parse::<SwipeAction>().unwrap(), SwipeAction::Like);
        assert_eq!(
            "dislike".parse::<SwipeAction>().unwrap(),
            SwipeAction::Dislike
        );
        assert_eq!(SwipeAction::Like.to_string(), "like");
        assert!("superlike".parse::<SwipeAction>().is_err());
    }
}
