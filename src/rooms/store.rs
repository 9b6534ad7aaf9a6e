//! Room and message persistence.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// A private conversation between exactly two profiles.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRoom {
    pub id: Uuid,
    pub participant1: Uuid,
    pub participant2: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl ChatRoom {
    pub fn has_participant(&self, profile: Uuid) -> bool {
        self.participant1 == profile || self.participant2 == profile
    }

    /// The other side of the conversation, if the profile is in it at all.
    pub fn peer_of(&self, profile: Uuid) -> Option<Uuid> {
        if profile == self.participant1 {
            Some(self.participant2)
        } else if profile == self.participant2 {
            Some(self.participant1)
        } else {
            None
        }
    }
}

#[derive(sqlx::FromRow)]
struct ChatRoomRow {
    id: String,
    participant1: String,
    participant2: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

impl TryFrom<ChatRoomRow> for ChatRoom {
    type Error = AppError;

    fn try_from(row: ChatRoomRow) -> AppResult<Self> {
        Ok(ChatRoom {
            id: Uuid::parse_str(&row.id)?,
            participant1: Uuid::parse_str(&row.participant1)?,
            participant2: Uuid::parse_str(&row.participant2)?,
            is_active: row.is_active,
            created_at: row.created_at,
            last_activity_at: row.last_activity_at,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    System,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Text => write!(f, "text"),
            MessageKind::Image => write!(f, "image"),
            MessageKind::System => write!(f, "system"),
        }
    }
}

impl FromStr for MessageKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageKind::Text),
            "image" => Ok(MessageKind::Image),
            "system" => Ok(MessageKind::System),
            other => Err(AppError::InvalidArgument(format!(
                "unknown message kind {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    room_id: String,
    sender_id: String,
    content: String,
    kind: String,
    timestamp: DateTime<Utc>,
    is_read: bool,
    read_at: Option<DateTime<Utc>>,
}

impl TryFrom<MessageRow> for Message {
    type Error = AppError;

    fn try_from(row: MessageRow) -> AppResult<Self> {
        Ok(Message {
            id: Uuid::parse_str(&row.id)?,
            room_id: Uuid::parse_str(&row.room_id)?,
            sender_id: Uuid::parse_str(&row.sender_id)?,
            content: row.content,
            kind: row.kind.parse()?,
            timestamp: row.timestamp,
            is_read: row.is_read,
            read_at: row.read_at,
        })
    }
}

const ROOM_COLUMNS: &str = "id, participant1, participant2, is_active, created_at, last_activity_at";
const MESSAGE_COLUMNS: &str = "id, room_id, sender_id, content, kind, timestamp, is_read, read_at";

#[derive(Clone)]
pub struct RoomStore {
    pool: SqlitePool,
}

impl RoomStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The single room for a pair, created on first use. Participant order
    /// does not matter; the pair is stored lower id first, which is what the
    /// unique index sees.
    pub async fn get_or_create(&self, a: Uuid, b: Uuid) -> AppResult<(ChatRoom, bool)> {
        if a == b {
            return Err(AppError::PreconditionFailed(
                "a chat room needs two different profiles".into(),
            ));
        }
        let (p1, p2) = if a < b { (a, b) } else { (b, a) };

        if let Some(room) = self.find_by_pair(p1, p2).await? {
            return Ok((room, false));
        }

        let id = Uuid::now_v7();
        let now = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO rooms (id, participant1, participant2, is_active, created_at, last_activity_at) \
             VALUES (?, ?, ?, 1, ?, ?)",
        )
        .bind(id.to_string())
        .bind(p1.to_string())
        .bind(p2.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {
                tracing::debug!(room = %id, "room created");
                Ok((self.get(id).await?, true))
            }
            // Unique pair: somebody else created it between our read and
            // write, so theirs is the room.
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                let room = self.find_by_pair(p1, p2).await?.ok_or_else(|| {
                    AppError::Conflict("room creation raced and left no row".into())
                })?;
                Ok((room, false))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_pair(&self, p1: Uuid, p2: Uuid) -> AppResult<Option<ChatRoom>> {
        let row: Option<ChatRoomRow> = sqlx::query_as(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE participant1 = ? AND participant2 = ?"
        ))
        .bind(p1.to_string())
        .bind(p2.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(ChatRoom::try_from).transpose()
    }

    pub async fn get(&self, id: Uuid) -> AppResult<ChatRoom> {
        let row: Option<ChatRoomRow> =
            sqlx::query_as(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(ChatRoom::try_from)
            .transpose()?
            .ok_or(AppError::NotFound("room"))
    }

    /// Every room the profile is in, most recently active first.
    pub async fn rooms_for(&self, profile: Uuid) -> AppResult<Vec<ChatRoom>> {
        let rows: Vec<ChatRoomRow> = sqlx::query_as(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms \
             WHERE participant1 = ? OR participant2 = ? \
             ORDER BY last_activity_at DESC"
        ))
        .bind(profile.to_string())
        .bind(profile.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ChatRoom::try_from).collect()
    }

    /// NotFound when the room is missing, Unauthorized when the profile is
    /// not one of its two participants. Every reader of a room's contents
    /// goes through this check before touching anything.
    pub async fn ensure_participant(&self, room_id: Uuid, profile: Uuid) -> AppResult<()> {
        let room = self.get(room_id).await?;
        if !room.has_participant(profile) {
            return Err(AppError::Unauthorized);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct MessageStore {
    pool: SqlitePool,
}

impl MessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Appends to the room's history and bumps the room's activity clock in
    /// the same transaction.
    pub async fn append(
        &self,
        room_id: Uuid,
        sender_id: Uuid,
        content: &str,
        kind: MessageKind,
    ) -> AppResult<Message> {
        if content.is_empty() {
            return Err(AppError::InvalidArgument(
                "message content must not be empty".into(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let room_exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM rooms WHERE id = ?")
            .bind(room_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        if room_exists.is_none() {
            return Err(AppError::NotFound("room"));
        }

        let id = Uuid::now_v7();
        let timestamp = Utc::now();
        sqlx::query(
            "INSERT INTO messages (id, room_id, sender_id, content, kind, timestamp, is_read) \
             VALUES (?, ?, ?, ?, ?, ?, 0)",
        )
        .bind(id.to_string())
        .bind(room_id.to_string())
        .bind(sender_id.to_string())
        .bind(content)
        .bind(kind.to_string())
        .bind(timestamp)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE rooms SET last_activity_at = ? WHERE id = ?")
            .bind(timestamp)
            .bind(room_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Message {
            id,
            room_id,
            sender_id,
            content: content.to_owned(),
            kind,
            timestamp,
            is_read: false,
            read_at: None,
        })
    }

    /// Full history, oldest first; the id breaks timestamp ties so replay
    /// order matches insertion order.
    pub async fn history(&self, room_id: Uuid) -> AppResult<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE room_id = ? ORDER BY timestamp ASC, id ASC"
        ))
        .bind(room_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Message::try_from).collect()
    }

    /// Marks everything the peer sent as read; returns how many flipped.
    pub async fn mark_read(&self, room_id: Uuid, reader: Uuid) -> AppResult<u64> {
        let flipped = sqlx::query(
            "UPDATE messages SET is_read = 1, read_at = ? \
             WHERE room_id = ? AND sender_id <> ? AND is_read = 0",
        )
        .bind(Utc::now())
        .bind(room_id.to_string())
        .bind(reader.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(flipped)
    }
}
