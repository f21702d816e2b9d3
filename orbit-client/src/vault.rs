use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use orbit_core::models::{Settings, Task};

use crate::errors::ClientResult;

/// SQL for the key-value vault.
pub struct Queries;

impl Queries {
    /// Create the vault schema
    pub const SCHEMA: &'static str = r#"
        CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
    "#;

    pub const GET_ITEM: &'static str = "SELECT value FROM kv_store WHERE key = ?1";

    pub const SET_ITEM: &'static str = r#"
        INSERT INTO kv_store (key, value, updated_at)
        VALUES (?1, ?2, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
    "#;

    pub const REMOVE_ITEM: &'static str = "DELETE FROM kv_store WHERE key = ?1";
}

/// The local persistence fallback: a string key-value table playing the
/// role web local storage played, holding JSON payloads under per-account
/// keys. Reads are lenient — a missing or malformed payload is "no data",
/// logged and replaced with defaults, never an error.
pub struct LocalVault {
    pool: SqlitePool,
}

impl LocalVault {
    pub async fn open(database_url: &str) -> ClientResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::query(Queries::SCHEMA).execute(&pool).await?;
        Ok(LocalVault { pool })
    }

    pub fn tasks_key(email: &str) -> String {
        format!("orbit_tasks_{}", email)
    }

    pub fn archive_key(email: &str) -> String {
        format!("orbit_archive_{}", email)
    }

    pub fn settings_key(email: &str) -> String {
        format!("orbit_settings_{}", email)
    }

    // Raw string layer

    pub async fn get_item(&self, key: &str) -> ClientResult<Option<String>> {
        let row = sqlx::query(Queries::GET_ITEM)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    pub async fn set_item(&self, key: &str, value: &str) -> ClientResult<()> {
        sqlx::query(Queries::SET_ITEM)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn remove_item(&self, key: &str) -> ClientResult<()> {
        sqlx::query(Queries::REMOVE_ITEM)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Typed layer

    /// Active tasks stored for the account. Missing or malformed reads as
    /// empty.
    pub async fn load_tasks(&self, email: &str) -> Vec<Task> {
        self.load_list(&Self::tasks_key(email)).await
    }

    /// Archived tasks stored for the account.
    pub async fn load_archive(&self, email: &str) -> Vec<Task> {
        self.load_list(&Self::archive_key(email)).await
    }

    async fn load_list(&self, key: &str) -> Vec<Task> {
        let raw = match self.get_item(key).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Vault read failed for {}: {}", key, e);
                return Vec::new();
            }
        };
        match raw {
            Some(json) => match serde_json::from_str(&json) {
                Ok(tasks) => tasks,
                Err(e) => {
                    tracing::warn!("Discarding malformed payload under {}: {}", key, e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        }
    }

    /// Settings stored for the account, defaults when absent or malformed.
    pub async fn load_settings(&self, email: &str) -> Settings {
        let key = Self::settings_key(email);
        match self.get_item(&key).await {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("Discarding malformed payload under {}: {}", key, e);
                Settings::default()
            }),
            Ok(None) => Settings::default(),
            Err(e) => {
                tracing::warn!("Vault read failed for {}: {}", key, e);
                Settings::default()
            }
        }
    }

    pub async fn save_tasks(&self, email: &str, tasks: &[Task]) -> ClientResult<()> {
        let json = serde_json::to_string(tasks)?;
        self.set_item(&Self::tasks_key(email), &json).await
    }

    pub async fn save_archive(&self, email: &str, tasks: &[Task]) -> ClientResult<()> {
        let json = serde_json::to_string(tasks)?;
        self.set_item(&Self::archive_key(email), &json).await
    }

    pub async fn save_settings(&self, email: &str, settings: &Settings) -> ClientResult<()> {
        let json = serde_json::to_string(settings)?;
        self.set_item(&Self::settings_key(email), &json).await
    }

    /// All three payloads for the account, in one call.
    pub async fn load_state(&self, email: &str) -> (Vec<Task>, Vec<Task>, Settings) {
        let tasks = self.load_tasks(email).await;
        let archive = self.load_archive(email).await;
        let settings = self.load_settings(email).await;
        (tasks, archive, settings)
    }

    /// Persist the whole working set for the account.
    pub async fn save_state(
        &self,
        email: &str,
        active: &[Task],
        archived: &[Task],
        settings: &Settings,
    ) -> ClientResult<()> {
        self.save_tasks(email, active).await?;
        self.save_archive(email, archived).await?;
        self.save_settings(email, settings).await
    }
}
