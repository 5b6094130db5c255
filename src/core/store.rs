//! SQLite persistence for quotas, videos and transcript chunks.
//!
//! One connection behind a mutex. Callers compose the row-level helpers in
//! this module inside [`Store::transaction`], so every multi-row change
//! (delete + refund, debit + create) commits or rolls back as a unit.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use thiserror::Error;
use tracing::debug;

use crate::domain::video::UnknownStatus;
use crate::domain::{
    NewVideo, Quota, QuotaUpdate, TranscriptChunk, TranscriptSegment, Video, VideoStatus,
};

/// Errors raised by the store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    Poisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS quotas (
    user_email TEXT PRIMARY KEY,
    messages_left INTEGER NOT NULL CHECK (messages_left >= 0),
    video_hours_left INTEGER NOT NULL CHECK (video_hours_left >= 0),
    reset_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS videos (
    id TEXT PRIMARY KEY,
    youtube_id TEXT NOT NULL UNIQUE,
    user_email TEXT NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    channel_handle TEXT,
    playlist_id TEXT,
    playlist_title TEXT,
    thumbnail_url TEXT,
    duration_in_minutes INTEGER NOT NULL DEFAULT 0 CHECK (duration_in_minutes >= 0),
    status TEXT NOT NULL DEFAULT 'PENDING'
        CHECK (status IN ('PENDING', 'TRANSCRIBE_ERROR', 'EMBEDDING_ERROR', 'COMPLETED')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_videos_user ON videos(user_email, created_at DESC);

CREATE TABLE IF NOT EXISTS transcript_chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
    timestamp_in_seconds INTEGER NOT NULL,
    text TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_video ON transcript_chunks(video_id, timestamp_in_seconds);
"#;

const VIDEO_COLUMNS: &str = "id, youtube_id, user_email, title, content, channel_handle, \
     playlist_id, playlist_title, thumbnail_url, duration_in_minutes, status, created_at, updated_at";

/// Shared handle to the database
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) an on-disk database
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
        ",
        )?;

        debug!(path = %path.display(), "Opened database");
        Self::init(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Run `f` inside an immediate transaction; commits on `Ok`, rolls back
    /// on `Err`
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;

        let value = f(&tx)?;
        tx.commit().map_err(StoreError::from)?;

        Ok(value)
    }

    /// Run a read-only closure against the connection
    pub fn read<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.lock()?;
        f(&conn)
    }
}

// ============================================================================
// Quota rows
// ============================================================================

fn quota_from_row(row: &Row<'_>) -> rusqlite::Result<Quota> {
    Ok(Quota {
        user_email: row.get(0)?,
        messages_left: row.get(1)?,
        video_hours_left: row.get(2)?,
        reset_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

pub fn select_quota(conn: &Connection, user_email: &str) -> Result<Option<Quota>, StoreError> {
    let quota = conn
        .query_row(
            "SELECT user_email, messages_left, video_hours_left, reset_at, updated_at
             FROM quotas WHERE user_email = ?1",
            params![user_email],
            quota_from_row,
        )
        .optional()?;
    Ok(quota)
}

/// Insert a quota row unless one already exists for the user
pub fn insert_quota(conn: &Connection, quota: &Quota) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO quotas (user_email, messages_left, video_hours_left, reset_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            quota.user_email,
            quota.messages_left,
            quota.video_hours_left,
            quota.reset_at,
            quota.updated_at
        ],
    )?;
    Ok(())
}

/// Last-write-wins replacement of the given fields; returns rows touched
pub fn update_quota_fields(
    conn: &Connection,
    user_email: &str,
    update: &QuotaUpdate,
    now: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let changed = conn.execute(
        "UPDATE quotas SET
             messages_left = COALESCE(?2, messages_left),
             video_hours_left = COALESCE(?3, video_hours_left),
             reset_at = COALESCE(?4, reset_at),
             updated_at = ?5
         WHERE user_email = ?1",
        params![
            user_email,
            update.messages_left,
            update.video_hours_left,
            update.reset_at,
            now
        ],
    )?;
    Ok(changed)
}

/// Atomic `video_hours_left += hours`
pub fn add_video_hours(
    conn: &Connection,
    user_email: &str,
    hours: u32,
    now: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let changed = conn.execute(
        "UPDATE quotas SET video_hours_left = video_hours_left + ?2, updated_at = ?3
         WHERE user_email = ?1",
        params![user_email, hours, now],
    )?;
    Ok(changed)
}

/// Atomic `video_hours_left -= hours` only when enough is left; returns 0
/// rows when the balance is insufficient
pub fn subtract_video_hours(
    conn: &Connection,
    user_email: &str,
    hours: u32,
    now: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let changed = conn.execute(
        "UPDATE quotas SET video_hours_left = video_hours_left - ?2, updated_at = ?3
         WHERE user_email = ?1 AND video_hours_left >= ?2",
        params![user_email, hours, now],
    )?;
    Ok(changed)
}

/// Atomic `messages_left -= 1` when at least one is left
pub fn subtract_message(
    conn: &Connection,
    user_email: &str,
    now: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let changed = conn.execute(
        "UPDATE quotas SET messages_left = messages_left - 1, updated_at = ?2
         WHERE user_email = ?1 AND messages_left >= 1",
        params![user_email, now],
    )?;
    Ok(changed)
}

// ============================================================================
// Video rows
// ============================================================================

fn video_from_row(row: &Row<'_>) -> rusqlite::Result<Video> {
    let status: String = row.get(10)?;
    let status = status
        .parse::<VideoStatus>()
        .map_err(|e: UnknownStatus| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?;

    Ok(Video {
        id: row.get(0)?,
        youtube_id: row.get(1)?,
        user_email: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        channel_handle: row.get(5)?,
        playlist_id: row.get(6)?,
        playlist_title: row.get(7)?,
        thumbnail_url: row.get(8)?,
        duration_in_minutes: row.get(9)?,
        status,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// Insert a new `PENDING` video under the given id
pub fn insert_video(
    conn: &Connection,
    id: &str,
    video: &NewVideo,
    now: DateTime<Utc>,
) -> Result<Video, StoreError> {
    conn.execute(
        "INSERT INTO videos (id, youtube_id, user_email, title, content, channel_handle,
             playlist_id, playlist_title, thumbnail_url, duration_in_minutes, status,
             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, '', ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            id,
            video.youtube_id,
            video.user_email,
            video.title,
            video.origin.channel_handle,
            video.origin.playlist_id,
            video.origin.playlist_title,
            video.thumbnail_url,
            video.duration_in_minutes,
            VideoStatus::Pending.as_str(),
            now
        ],
    )?;

    Ok(Video {
        id: id.to_string(),
        youtube_id: video.youtube_id.clone(),
        user_email: video.user_email.clone(),
        title: video.title.clone(),
        content: String::new(),
        channel_handle: video.origin.channel_handle.clone(),
        playlist_id: video.origin.playlist_id.clone(),
        playlist_title: video.origin.playlist_title.clone(),
        thumbnail_url: video.thumbnail_url.clone(),
        duration_in_minutes: video.duration_in_minutes,
        status: VideoStatus::Pending,
        created_at: now,
        updated_at: now,
    })
}

pub fn select_video(conn: &Connection, id: &str) -> Result<Option<Video>, StoreError> {
    let sql = format!("SELECT {} FROM videos WHERE id = ?1", VIDEO_COLUMNS);
    let video = conn
        .query_row(&sql, params![id], video_from_row)
        .optional()?;
    Ok(video)
}

pub fn select_video_by_youtube_id(
    conn: &Connection,
    youtube_id: &str,
) -> Result<Option<Video>, StoreError> {
    let sql = format!("SELECT {} FROM videos WHERE youtube_id = ?1", VIDEO_COLUMNS);
    let video = conn
        .query_row(&sql, params![youtube_id], video_from_row)
        .optional()?;
    Ok(video)
}

/// All videos of a user, newest first
pub fn select_videos_for_user(conn: &Connection, user_email: &str) -> Result<Vec<Video>, StoreError> {
    let sql = format!(
        "SELECT {} FROM videos WHERE user_email = ?1 ORDER BY created_at DESC, title",
        VIDEO_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let videos = stmt
        .query_map(params![user_email], video_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(videos)
}

/// Compare-and-set on the status column; returns whether the row moved
pub fn update_status_if(
    conn: &Connection,
    id: &str,
    from: VideoStatus,
    to: VideoStatus,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE videos SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        params![id, from.as_str(), to.as_str(), now],
    )?;
    Ok(changed == 1)
}

/// Replace the transcript text and chunks of a video
pub fn store_transcript(
    conn: &Connection,
    video_id: &str,
    content: &str,
    segments: &[TranscriptSegment],
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE videos SET content = ?2, updated_at = ?3 WHERE id = ?1",
        params![video_id, content, now],
    )?;
    conn.execute(
        "DELETE FROM transcript_chunks WHERE video_id = ?1",
        params![video_id],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO transcript_chunks (video_id, timestamp_in_seconds, text, created_at)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for segment in segments {
        stmt.execute(params![video_id, segment.timestamp_in_seconds, segment.text, now])?;
    }

    Ok(())
}

/// Delete a video; chunks go with it through the foreign key cascade
pub fn delete_video(conn: &Connection, id: &str) -> Result<bool, StoreError> {
    let changed = conn.execute("DELETE FROM videos WHERE id = ?1", params![id])?;
    Ok(changed == 1)
}

pub fn select_chunks(conn: &Connection, video_id: &str) -> Result<Vec<TranscriptChunk>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, video_id, timestamp_in_seconds, text, created_at
         FROM transcript_chunks WHERE video_id = ?1
         ORDER BY timestamp_in_seconds, id",
    )?;
    let chunks = stmt
        .query_map(params![video_id], |row| {
            Ok(TranscriptChunk {
                id: row.get(0)?,
                video_id: row.get(1)?,
                timestamp_in_seconds: row.get(2)?,
                text: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(chunks)
}

pub fn count_chunks(conn: &Connection, video_id: &str) -> Result<usize, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transcript_chunks WHERE video_id = ?1",
        params![video_id],
        |row| row.get(0),
    )?;
    Ok(usize::try_from(count).unwrap_or(0))
}
