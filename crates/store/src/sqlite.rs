//! SQLite backend.
//!
//! Uses a single SQLite database file with three tables:
//! - `projects`: one row per project
//! - `messages`: one row per conversation turn, payload is the turn's wire JSON
//! - `project_context_records`: one row per metadata record
//!
//! Turns and records reference their project with `ON DELETE CASCADE`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use codewright_core::error::StoreError;
use codewright_core::metadata::{MetadataRecord, RecordKind};
use codewright_core::store::{
    MetadataStore, Project, ProjectData, ProjectId, StoredRecord, StoredTurn,
};
use codewright_core::Role;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// A durable SQLite store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    ///
    /// All tables and indexes are created automatically. Pass
    /// `"sqlite::memory:"` for an ephemeral database; it is pinned to a single
    /// connection so every query sees the same data.
    pub async fn new(path: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let in_memory = path.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new();
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run schema migrations. Every statement is idempotent.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements = [
            (
                "projects table",
                r#"
                CREATE TABLE IF NOT EXISTS projects (
                    id         INTEGER PRIMARY KEY AUTOINCREMENT,
                    name       TEXT NOT NULL,
                    created_at TEXT NOT NULL
                )
                "#,
            ),
            (
                "messages table",
                r#"
                CREATE TABLE IF NOT EXISTS messages (
                    id         INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    role       TEXT NOT NULL,
                    content    TEXT NOT NULL
                )
                "#,
            ),
            (
                "project_context_records table",
                r#"
                CREATE TABLE IF NOT EXISTS project_context_records (
                    id           INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id   INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    record_type  TEXT NOT NULL,
                    service_name TEXT NOT NULL,
                    data         TEXT NOT NULL
                )
                "#,
            ),
            (
                "messages index",
                "CREATE INDEX IF NOT EXISTS idx_messages_project ON messages(project_id, id)",
            ),
            (
                "records index",
                "CREATE INDEX IF NOT EXISTS idx_records_project ON project_context_records(project_id, id)",
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{what}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Parse a `Project` from a SQLite row.
    fn row_to_project(row: &sqlx::sqlite::SqliteRow) -> Result<Project, StoreError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let name: String = row
            .try_get("name")
            .map_err(|e| StoreError::QueryFailed(format!("name column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::QueryFailed(format!("created_at value: {e}")))?;

        Ok(Project {
            id,
            name,
            created_at,
        })
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<StoredTurn, StoreError> {
        let role: String = row
            .try_get("role")
            .map_err(|e| StoreError::QueryFailed(format!("role column: {e}")))?;
        let payload: String = row
            .try_get("content")
            .map_err(|e| StoreError::QueryFailed(format!("content column: {e}")))?;
        let role = Role::from_str(&role).map_err(StoreError::QueryFailed)?;
        Ok(StoredTurn { role, payload })
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<StoredRecord, StoreError> {
        let record_type: String = row
            .try_get("record_type")
            .map_err(|e| StoreError::QueryFailed(format!("record_type column: {e}")))?;
        let service_name: String = row
            .try_get("service_name")
            .map_err(|e| StoreError::QueryFailed(format!("service_name column: {e}")))?;
        let data: String = row
            .try_get("data")
            .map_err(|e| StoreError::QueryFailed(format!("data column: {e}")))?;
        let kind = RecordKind::from_str(&record_type).map_err(StoreError::QueryFailed)?;
        Ok(StoredRecord {
            service_name,
            record: MetadataRecord::new(kind, data),
        })
    }

    /// Fail with `ProjectNotFound` unless the project row exists.
    async fn ensure_project<'e, E>(executor: E, id: ProjectId) -> Result<(), StoreError>
    where
        E: sqlx::SqliteExecutor<'e>,
    {
        let row = sqlx::query("SELECT 1 FROM projects WHERE id = ?1")
            .bind(id)
            .fetch_optional(executor)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("project lookup: {e}")))?;
        match row {
            Some(_) => Ok(()),
            None => Err(StoreError::ProjectNotFound(id)),
        }
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_project(&self, name: &str) -> Result<Project, StoreError> {
        let created_at = Utc::now();
        let result = sqlx::query("INSERT INTO projects (name, created_at) VALUES (?1, ?2)")
            .bind(name)
            .bind(created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("INSERT project failed: {e}")))?;

        let id = result.last_insert_rowid();
        debug!(project_id = id, name, "Created project");
        Ok(Project {
            id,
            name: name.to_string(),
            created_at,
        })
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let rows = sqlx::query("SELECT id, name, created_at FROM projects ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("List projects: {e}")))?;

        rows.iter().map(Self::row_to_project).collect()
    }

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        let row = sqlx::query("SELECT id, name, created_at FROM projects WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET project: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(Self::row_to_project(r)?)),
            None => Ok(None),
        }
    }

    async fn delete_project(&self, id: ProjectId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE project failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ProjectNotFound(id));
        }
        debug!(project_id = id, "Deleted project");
        Ok(())
    }

    async fn load_project(&self, id: ProjectId) -> Result<ProjectData, StoreError> {
        // One read transaction so turns and records come from the same snapshot
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN failed: {e}")))?;

        Self::ensure_project(&mut *tx, id).await?;

        let turn_rows =
            sqlx::query("SELECT role, content FROM messages WHERE project_id = ?1 ORDER BY id")
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| StoreError::QueryFailed(format!("Load messages: {e}")))?;

        let record_rows = sqlx::query(
            "SELECT record_type, service_name, data FROM project_context_records \
             WHERE project_id = ?1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Load records: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT failed: {e}")))?;

        Ok(ProjectData {
            turns: turn_rows
                .iter()
                .map(Self::row_to_turn)
                .collect::<Result<_, _>>()?,
            records: record_rows
                .iter()
                .map(Self::row_to_record)
                .collect::<Result<_, _>>()?,
        })
    }

    async fn append_turns(&self, id: ProjectId, turns: &[StoredTurn]) -> Result<(), StoreError> {
        self.commit_round(id, turns, &[]).await
    }

    async fn append_records(
        &self,
        id: ProjectId,
        records: &[StoredRecord],
    ) -> Result<(), StoreError> {
        self.commit_round(id, &[], records).await
    }

    async fn commit_round(
        &self,
        id: ProjectId,
        turns: &[StoredTurn],
        records: &[StoredRecord],
    ) -> Result<(), StoreError> {
        if turns.is_empty() && records.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN failed: {e}")))?;

        Self::ensure_project(&mut *tx, id).await?;

        for turn in turns {
            sqlx::query("INSERT INTO messages (project_id, role, content) VALUES (?1, ?2, ?3)")
                .bind(id)
                .bind(turn.role.as_str())
                .bind(&turn.payload)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Storage(format!("INSERT message failed: {e}")))?;
        }

        for stored in records {
            sqlx::query(
                "INSERT INTO project_context_records (project_id, record_type, service_name, data) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(id)
            .bind(stored.record.record_type.as_str())
            .bind(&stored.service_name)
            .bind(&stored.record.data)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("INSERT record failed: {e}")))?;
        }

        // Dropping the transaction on any error above rolls everything back
        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT failed: {e}")))?;

        debug!(
            project_id = id,
            turns = turns.len(),
            records = records.len(),
            "Committed round"
        );
        Ok(())
    }
}
