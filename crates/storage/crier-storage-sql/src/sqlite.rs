//! SQLite profile store
//!
//! Two key→value tables: `nicknames` and `voices`, both keyed by platform
//! username. Every call is a short pool checkout, so the store is safe to
//! share across all guild sessions.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crier_core::{ProfileStore, Result, UserProfile};

/// Profile persistence over a SQLite database.
pub struct SqliteProfileStore {
    pool: SqlitePool,
}

impl SqliteProfileStore {
    /// Open (or create) the database at `database_url` and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!(url = %database_url, "opening profile database");

        let opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(opts).await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Apply the schema. Idempotent; runs on every startup.
    async fn init_schema(&self) -> Result<()> {
        debug!("initializing profile schema");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS nicknames (
                username TEXT PRIMARY KEY,
                nickname TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS voices (
                username TEXT PRIMARY KEY,
                voice    TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn fetch(&self, username: &str) -> Result<Option<UserProfile>> {
        let nickname: Option<String> =
            sqlx::query("SELECT nickname FROM nicknames WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?
                .map(|row| row.get(0));

        let voice_sample: Option<String> = sqlx::query("SELECT voice FROM voices WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.get(0));

        if nickname.is_none() && voice_sample.is_none() {
            return Ok(None);
        }
        Ok(Some(UserProfile {
            username: username.to_string(),
            nickname,
            voice_sample,
        }))
    }

    async fn store_nickname(&self, username: &str, nickname: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO nicknames (username, nickname) VALUES (?, ?)
            ON CONFLICT(username) DO UPDATE SET nickname = excluded.nickname
        "#,
        )
        .bind(username)
        .bind(nickname)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn store_voice(&self, username: &str, voice: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO voices (username, voice) VALUES (?, ?)
            ON CONFLICT(username) DO UPDATE SET voice = excluded.voice
        "#,
        )
        .bind(username)
        .bind(voice)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
