//! In-memory store: fast, ephemeral, ideal for testing.

use async_trait::async_trait;
use chrono::Utc;
use codewright_core::error::StoreError;
use codewright_core::store::{
    MetadataStore, Project, ProjectData, ProjectId, StoredRecord, StoredTurn,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    next_id: ProjectId,
    projects: BTreeMap<ProjectId, (Project, ProjectData)>,
}

/// A simple in-memory store.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                next_id: 1,
                projects: BTreeMap::new(),
            })),
        }
    }

    /// Insert a project with a fixed id. Later `create_project` calls keep
    /// allocating above it.
    pub async fn with_project(self, id: ProjectId, name: &str) -> Self {
        {
            let mut inner = self.inner.write().await;
            let project = Project {
                id,
                name: name.to_string(),
                created_at: Utc::now(),
            };
            inner.projects.insert(id, (project, ProjectData::default()));
            inner.next_id = inner.next_id.max(id + 1);
        }
        self
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create_project(&self, name: &str) -> Result<Project, StoreError> {
        let mut inner = self.inner.write().await;
        let id = inner.next_id;
        inner.next_id += 1;
        let project = Project {
            id,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        inner
            .projects
            .insert(id, (project.clone(), ProjectData::default()));
        Ok(project)
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.projects.values().map(|(p, _)| p.clone()).collect())
    }

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.projects.get(&id).map(|(p, _)| p.clone()))
    }

    async fn delete_project(&self, id: ProjectId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .projects
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::ProjectNotFound(id))
    }

    async fn load_project(&self, id: ProjectId) -> Result<ProjectData, StoreError> {
        let inner = self.inner.read().await;
        inner
            .projects
            .get(&id)
            .map(|(_, data)| data.clone())
            .ok_or(StoreError::ProjectNotFound(id))
    }

    async fn append_turns(&self, id: ProjectId, turns: &[StoredTurn]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let (_, data) = inner
            .projects
            .get_mut(&id)
            .ok_or(StoreError::ProjectNotFound(id))?;
        data.turns.extend_from_slice(turns);
        Ok(())
    }

    async fn append_records(
        &self,
        id: ProjectId,
        records: &[StoredRecord],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let (_, data) = inner
            .projects
            .get_mut(&id)
            .ok_or(StoreError::ProjectNotFound(id))?;
        data.records.extend_from_slice(records);
        Ok(())
    }

    async fn commit_round(
        &self,
        id: ProjectId,
        turns: &[StoredTurn],
        records: &[StoredRecord],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let (_, data) = inner
            .projects
            .get_mut(&id)
            .ok_or(StoreError::ProjectNotFound(id))?;
        data.turns.extend_from_slice(turns);
        data.records.extend_from_slice(records);
        Ok(())
    }
}
