use std::str::FromStr;

use anyhow::Context;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use time::OffsetDateTime;

use super::{from_millis, preview, to_millis, Message, Room, RoomSummary, HISTORY_LIMIT};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS rooms (
        room_id TEXT PRIMARY KEY NOT NULL,
        last_activity INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL,
        room_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        content TEXT NOT NULL,
        timestamp INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS messages_by_room ON messages (room_id, seq)",
    "CREATE INDEX IF NOT EXISTS rooms_by_activity ON rooms (last_activity DESC)",
];

type MessageRow = (String, String, String, i64);

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> anyhow::Result<SqliteStore> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("bad DATABASE_URL {url:?}"))?
            .create_if_missing(true);

        // every connection to an in-memory database sees its own copy
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(16)
        }
        .connect_with(options)
        .await
        .context("connecting to database")?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> anyhow::Result<SqliteStore> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .context("creating schema")?;
        }
        Ok(SqliteStore { pool })
    }

    pub async fn list_rooms(&self, limit: usize) -> anyhow::Result<Vec<RoomSummary>> {
        let rows: Vec<(String, i64, i64, Option<String>)> = sqlx::query_as(
            "SELECT r.room_id, r.last_activity, COUNT(m.seq),
                (SELECT content FROM messages WHERE room_id = r.room_id ORDER BY seq DESC LIMIT 1)
             FROM rooms r JOIN messages m ON m.room_id = r.room_id
             GROUP BY r.room_id, r.last_activity
             ORDER BY r.last_activity DESC
             LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(room_id, last_activity, count, last_message)| {
                Ok::<_, anyhow::Error>(RoomSummary {
                    room_id,
                    message_count: count as usize,
                    last_activity: from_millis(last_activity)?,
                    last_message: last_message.as_deref().map(preview).unwrap_or_default(),
                })
            })
            .collect()
    }

    pub async fn join(&self, room_id: &str) -> anyhow::Result<Room> {
        sqlx::query("INSERT INTO rooms (room_id,last_activity) VALUES (?,?) ON CONFLICT(room_id) DO NOTHING")
            .bind(room_id)
            .bind(to_millis(OffsetDateTime::now_utc()))
            .execute(&self.pool)
            .await?;

        let (last_activity,): (i64,) = sqlx::query_as("SELECT last_activity FROM rooms WHERE room_id=?")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Room {
            room_id: room_id.to_owned(),
            messages: self.messages(room_id).await?,
            last_activity: from_millis(last_activity)?,
        })
    }

    pub async fn messages(&self, room_id: &str) -> anyhow::Result<Vec<Message>> {
        let rows: Vec<MessageRow> =
            sqlx::query_as("SELECT id,user_id,content,timestamp FROM messages WHERE room_id=? ORDER BY seq")
                .bind(room_id)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(id, user_id, content, timestamp)| {
                Ok::<_, anyhow::Error>(Message {
                    id,
                    user_id,
                    content,
                    timestamp: from_millis(timestamp)?,
                })
            })
            .collect()
    }

    pub async fn append(&self, room_id: &str, message: Message) -> anyhow::Result<()> {
        let now = to_millis(OffsetDateTime::now_utc());
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO rooms (room_id,last_activity) VALUES (?,?)
             ON CONFLICT(room_id) DO UPDATE SET last_activity=excluded.last_activity",
        )
        .bind(room_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO messages (id,room_id,user_id,content,timestamp) VALUES (?,?,?,?,?)")
            .bind(&message.id)
            .bind(room_id)
            .bind(&message.user_id)
            .bind(&message.content)
            .bind(to_millis(message.timestamp))
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "DELETE FROM messages WHERE room_id=? AND seq NOT IN
                (SELECT seq FROM messages WHERE room_id=? ORDER BY seq DESC LIMIT ?)",
        )
        .bind(room_id)
        .bind(room_id)
        .bind(HISTORY_LIMIT as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, room_id: &str) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM messages WHERE room_id=?")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM rooms WHERE room_id=?")
            .bind(room_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    pub async fn clear(&self, room_id: &str) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM messages WHERE room_id=?")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;
        let exists = sqlx::query("SELECT 1 FROM rooms WHERE room_id=?")
            .bind(room_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();

        tx.commit().await?;
        Ok(exists)
    }
}
