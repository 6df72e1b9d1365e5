//! MetadataStore trait: durable projects, transcripts and metadata records.
//!
//! The store is deliberately dumb: it keeps turns as opaque payloads and
//! records as rows. Decoding, grouping and caching happen above it.

use crate::error::StoreError;
use crate::message::Role;
use crate::metadata::MetadataRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Projects are identified by the store's integer primary key.
pub type ProjectId = i64;

/// A project owns a transcript and a set of metadata records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A transcript row: the role plus the turn's encoded wire JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTurn {
    pub role: Role,
    pub payload: String,
}

/// A metadata row: which service it belongs to, and the record itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub service_name: String,
    pub record: MetadataRecord,
}

/// Everything stored for one project, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectData {
    pub turns: Vec<StoredTurn>,
    pub records: Vec<StoredRecord>,
}

/// The persistence contract the rest of the system is written against.
///
/// Every write is an append: turns and records are never updated in place,
/// and only `delete_project` removes rows (cascading to the project's turns
/// and records).
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    async fn create_project(&self, name: &str) -> Result<Project, StoreError>;

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError>;

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError>;

    /// Remove a project with its turns and records.
    async fn delete_project(&self, id: ProjectId) -> Result<(), StoreError>;

    /// Read a project's turns and records. Fails with `ProjectNotFound`
    /// for unknown ids.
    async fn load_project(&self, id: ProjectId) -> Result<ProjectData, StoreError>;

    /// Append turns as one batch: either all are written or none.
    async fn append_turns(&self, id: ProjectId, turns: &[StoredTurn]) -> Result<(), StoreError>;

    /// Append records as one batch: either all are written or none.
    async fn append_records(
        &self,
        id: ProjectId,
        records: &[StoredRecord],
    ) -> Result<(), StoreError>;

    /// Append an exchange's turns and records in a single transaction.
    /// On failure neither is written.
    async fn commit_round(
        &self,
        id: ProjectId,
        turns: &[StoredTurn],
        records: &[StoredRecord],
    ) -> Result<(), StoreError>;
}
