//! Per-project conversation state.
//!
//! The cache keeps one decoded [`Snapshot`] per project behind its own
//! `tokio::sync::Mutex`. A request takes the project's [`ProjectGuard`] and
//! holds it for the whole exchange, so two requests for the same project
//! queue up while requests for different projects run side by side.
//!
//! The snapshot mirrors the store: it is only extended after the store write
//! it mirrors has succeeded.

use codewright_core::error::{AgentError, DecodeError, Result, StoreError};
use codewright_core::message::Turn;
use codewright_core::metadata::ProjectMetadata;
use codewright_core::store::{MetadataStore, ProjectId, StoredRecord, StoredTurn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// A project's decoded transcript and grouped metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub turns: Vec<Turn>,
    pub metadata: ProjectMetadata,
}

type Slot = Arc<Mutex<Option<Snapshot>>>;
type Slots = Arc<Mutex<HashMap<ProjectId, Slot>>>;

/// Snapshots keyed by project id, loaded lazily from the store.
///
/// A slot only outlives its guard once its project has loaded.
pub struct ConversationCache {
    store: Arc<dyn MetadataStore>,
    slots: Slots,
}

impl ConversationCache {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            store,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    /// Wait for exclusive access to one project's state.
    pub async fn lock(&self, project_id: ProjectId) -> ProjectGuard {
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(project_id).or_default())
        };
        ProjectGuard {
            project_id,
            store: Arc::clone(&self.store),
            slots: Arc::clone(&self.slots),
            slot: slot.lock_owned().await,
        }
    }

    /// Number of projects with a live slot.
    pub async fn tracked_projects(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// The project's plain-text turns, oldest first.
    pub async fn history(&self, project_id: ProjectId) -> Result<Vec<Turn>> {
        let mut guard = self.lock(project_id).await;
        let snapshot = guard.load().await?;
        Ok(snapshot
            .turns
            .iter()
            .filter(|turn| turn.text().is_some())
            .cloned()
            .collect())
    }

    /// Delete a project from the store and drop its snapshot.
    ///
    /// Runs under the project's guard, so an exchange already in flight
    /// finishes first and any request queued behind it sees the project gone.
    pub async fn delete_project(&self, project_id: ProjectId) -> Result<()> {
        let mut guard = self.lock(project_id).await;
        let deleted = self.store.delete_project(project_id).await;
        if deleted.is_ok() {
            guard.slot.take();
        }
        if guard.slot.is_none() {
            guard.forget_slot().await;
        }
        deleted?;
        debug!(project_id, "Deleted project and its snapshot");
        Ok(())
    }

    /// Forget a project's snapshot. The next access reloads from the store.
    pub async fn evict(&self, project_id: ProjectId) {
        let slot = self.slots.lock().await.remove(&project_id);
        if let Some(slot) = slot {
            // Waits out any exchange still holding the old slot.
            slot.lock().await.take();
            debug!(project_id, "Evicted conversation snapshot");
        }
    }
}

/// Exclusive access to one project's snapshot.
pub struct ProjectGuard {
    project_id: ProjectId,
    store: Arc<dyn MetadataStore>,
    slots: Slots,
    slot: OwnedMutexGuard<Option<Snapshot>>,
}

impl ProjectGuard {
    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// The cached snapshot, read from the store on first use.
    ///
    /// Fails with `StoreError::ProjectNotFound` for unknown projects and with
    /// [`AgentError::Decode`] if any stored turn no longer parses; in both
    /// cases nothing is cached and the project's slot is released.
    pub async fn load(&mut self) -> Result<&Snapshot> {
        let snapshot = match self.slot.take() {
            Some(snapshot) => snapshot,
            None => match fetch_snapshot(self.store.as_ref(), self.project_id).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    self.forget_slot().await;
                    return Err(e);
                }
            },
        };
        Ok(self.slot.insert(snapshot))
    }

    /// Persist turns as one batch, then mirror them into the snapshot.
    pub async fn append_turns(&mut self, turns: &[Turn]) -> Result<()> {
        self.commit(turns, &ProjectMetadata::new()).await
    }

    /// Persist every record as a new row, then merge them into the snapshot.
    pub async fn persist_metadata(&mut self, metadata: &ProjectMetadata) -> Result<()> {
        self.commit(&[], metadata).await
    }

    /// Persist an exchange's turns and metadata in one store transaction,
    /// then mirror both into the snapshot.
    pub async fn commit(&mut self, turns: &[Turn], metadata: &ProjectMetadata) -> Result<()> {
        let stored_turns = turns
            .iter()
            .map(|turn| {
                Ok(StoredTurn {
                    role: turn.role,
                    payload: turn
                        .encode()
                        .map_err(|e| StoreError::Storage(format!("cannot encode turn: {e}")))?,
                })
            })
            .collect::<std::result::Result<Vec<_>, StoreError>>()?;
        let stored_records: Vec<StoredRecord> = metadata
            .records()
            .map(|(service, record)| StoredRecord {
                service_name: service.to_string(),
                record: record.clone(),
            })
            .collect();

        self.store
            .commit_round(self.project_id, &stored_turns, &stored_records)
            .await?;

        if let Some(snapshot) = &mut *self.slot {
            snapshot.turns.extend_from_slice(turns);
            snapshot.metadata.merge(metadata);
        }
        debug!(
            project_id = self.project_id,
            turns = stored_turns.len(),
            records = stored_records.len(),
            "Committed exchange"
        );
        Ok(())
    }

    /// Drop this project's slot from the cache unless another request is
    /// already waiting on it.
    async fn forget_slot(&self) {
        let mut slots = self.slots.lock().await;
        // One reference from the map, one from this guard.
        let unused = slots.get(&self.project_id).is_some_and(|slot| {
            Arc::ptr_eq(slot, OwnedMutexGuard::mutex(&self.slot)) && Arc::strong_count(slot) == 2
        });
        if unused {
            slots.remove(&self.project_id);
        }
    }
}

async fn fetch_snapshot(store: &dyn MetadataStore, project_id: ProjectId) -> Result<Snapshot> {
    let data = store.load_project(project_id).await?;

    let mut turns = Vec::with_capacity(data.turns.len());
    for (index, stored) in data.turns.iter().enumerate() {
        let turn = Turn::decode(&stored.payload).map_err(|e| DecodeError {
            project_id,
            index,
            reason: e.to_string(),
        })?;
        if turn.role != stored.role {
            return Err(AgentError::Decode(DecodeError {
                project_id,
                index,
                reason: format!(
                    "role column says '{}' but payload says '{}'",
                    stored.role, turn.role
                ),
            }));
        }
        turns.push(turn);
    }

    let metadata = data
        .records
        .into_iter()
        .map(|r| (r.service_name, r.record))
        .collect();

    debug!(project_id, turns = turns.len(), "Loaded conversation snapshot");
    Ok(Snapshot { turns, metadata })
}

/// Render metadata as the block embedded in the system prompt.
///
/// ```text
/// <metadata><project name="7"><service name="users"><record type="openapi_schema">…</record></service></project></metadata>
/// ```
///
/// Values are emitted verbatim.
pub fn render_metadata_xml(project_id: ProjectId, metadata: &ProjectMetadata) -> String {
    let mut xml = format!("<metadata><project name=\"{project_id}\">");
    for (service, records) in metadata.iter() {
        xml.push_str(&format!("<service name=\"{service}\">"));
        for record in records {
            xml.push_str(&format!(
                "<record type=\"{}\">{}</record>",
                record.record_type, record.data
            ));
        }
        xml.push_str("</service>");
    }
    xml.push_str("</project></metadata>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use codewright_core::metadata::{MetadataRecord, RecordKind};
    use codewright_core::message::Role;
    use codewright_store::InMemoryStore;
    use std::time::Duration;

    async fn cache_with_project(id: ProjectId) -> ConversationCache {
        let store = InMemoryStore::new().with_project(id, "demo").await;
        ConversationCache::new(Arc::new(store))
    }

    fn schema(data: &str) -> MetadataRecord {
        MetadataRecord::new(RecordKind::OpenapiSchema, data)
    }

    #[test]
    fn renders_empty_metadata_wrapper() {
        assert_eq!(
            render_metadata_xml(3, &ProjectMetadata::new()),
            "<metadata><project name=\"3\"></project></metadata>"
        );
    }

    #[test]
    fn renders_records_with_their_kind() {
        let mut metadata = ProjectMetadata::new();
        metadata.push("users", schema("ws/schemas/users/api/api.yaml"));
        metadata.push(
            "users",
            MetadataRecord::new(RecordKind::ApiHandler, "h.py:/users"),
        );
        metadata.push("orders", MetadataRecord::new(RecordKind::File, "o.py"));

        assert_eq!(
            render_metadata_xml(7, &metadata),
            "<metadata><project name=\"7\">\
             <service name=\"users\">\
             <record type=\"openapi_schema\">ws/schemas/users/api/api.yaml</record>\
             <record type=\"api_handler\">h.py:/users</record>\
             </service>\
             <service name=\"orders\"><record type=\"file\">o.py</record></service>\
             </project></metadata>"
        );
    }

    #[tokio::test]
    async fn unknown_project_is_not_found() {
        let cache = ConversationCache::new(Arc::new(InMemoryStore::new()));
        let mut guard = cache.lock(99).await;
        let err = guard.load().await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Store(StoreError::ProjectNotFound(99))
        ));
    }

    #[tokio::test]
    async fn appended_state_survives_a_fresh_cache() {
        let store: Arc<dyn MetadataStore> =
            Arc::new(InMemoryStore::new().with_project(1, "demo").await);

        let cache = ConversationCache::new(Arc::clone(&store));
        let mut guard = cache.lock(1).await;
        guard.load().await.unwrap();
        guard
            .append_turns(&[
                Turn::user("hi"),
                Turn::tool_use("t1", "read_file", serde_json::json!({"path": "a"})),
                Turn::tool_result("t1", "contents"),
                Turn::assistant("done"),
            ])
            .await
            .unwrap();
        let mut metadata = ProjectMetadata::new();
        metadata.push("svc", schema("s.yaml"));
        guard.persist_metadata(&metadata).await.unwrap();
        let cached = guard.load().await.unwrap().clone();
        drop(guard);

        let fresh = ConversationCache::new(store);
        let mut guard = fresh.lock(1).await;
        let reloaded = guard.load().await.unwrap();
        assert_eq!(*reloaded, cached);
        assert_eq!(reloaded.turns.len(), 4);
        assert_eq!(reloaded.metadata.record_count(), 1);
    }

    #[tokio::test]
    async fn history_keeps_text_turns_only() {
        let cache = cache_with_project(1).await;
        let mut guard = cache.lock(1).await;
        guard
            .append_turns(&[
                Turn::user("list"),
                Turn::tool_use("t1", "list_files", serde_json::json!({})),
                Turn::tool_result("t1", "a.txt"),
                Turn::assistant("a.txt"),
            ])
            .await
            .unwrap();
        drop(guard);

        let history = cache.history(1).await.unwrap();
        assert_eq!(history, vec![Turn::user("list"), Turn::assistant("a.txt")]);
    }

    #[tokio::test]
    async fn malformed_payload_fails_the_load() {
        let store = InMemoryStore::new().with_project(1, "demo").await;
        store
            .append_turns(
                1,
                &[
                    StoredTurn {
                        role: Role::User,
                        payload: Turn::user("ok").encode().unwrap(),
                    },
                    StoredTurn {
                        role: Role::Assistant,
                        payload: "{not json".into(),
                    },
                ],
            )
            .await
            .unwrap();

        let cache = ConversationCache::new(Arc::new(store));
        let mut guard = cache.lock(1).await;
        match guard.load().await.unwrap_err() {
            AgentError::Decode(e) => {
                assert_eq!(e.project_id, 1);
                assert_eq!(e.index, 1);
            }
            other => panic!("expected decode error, got {other:?}"),
        }
        // Nothing was cached, so the next load fails the same way.
        assert!(guard.load().await.is_err());
    }

    #[tokio::test]
    async fn role_mismatch_fails_the_load() {
        let store = InMemoryStore::new().with_project(1, "demo").await;
        store
            .append_turns(
                1,
                &[StoredTurn {
                    role: Role::Assistant,
                    payload: Turn::user("hi").encode().unwrap(),
                }],
            )
            .await
            .unwrap();

        let cache = ConversationCache::new(Arc::new(store));
        let mut guard = cache.lock(1).await;
        assert!(matches!(
            guard.load().await.unwrap_err(),
            AgentError::Decode(_)
        ));
    }

    #[tokio::test]
    async fn evict_forces_reload() {
        let store: Arc<dyn MetadataStore> =
            Arc::new(InMemoryStore::new().with_project(1, "demo").await);
        let cache = ConversationCache::new(Arc::clone(&store));
        assert!(cache.history(1).await.unwrap().is_empty());

        // Written behind the cache's back.
        store
            .append_turns(
                1,
                &[StoredTurn {
                    role: Role::User,
                    payload: Turn::user("hello").encode().unwrap(),
                }],
            )
            .await
            .unwrap();
        assert!(cache.history(1).await.unwrap().is_empty());

        cache.evict(1).await;
        assert_eq!(cache.history(1).await.unwrap(), vec![Turn::user("hello")]);
    }

    #[tokio::test]
    async fn unknown_projects_leave_no_slots() {
        let cache = cache_with_project(1).await;
        for id in 100..1100 {
            assert!(cache.history(id).await.is_err());
        }
        assert_eq!(cache.tracked_projects().await, 0);

        cache.history(1).await.unwrap();
        assert_eq!(cache.tracked_projects().await, 1);
    }

    #[tokio::test]
    async fn delete_waits_for_the_exchange_in_flight() {
        let cache = Arc::new(cache_with_project(1).await);
        let mut guard = cache.lock(1).await;
        guard.load().await.unwrap();

        let deleting = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.delete_project(1).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let reading = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.history(1).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!deleting.is_finished());

        // The in-flight exchange still commits against the live project.
        guard.append_turns(&[Turn::user("hi")]).await.unwrap();
        drop(guard);

        deleting.await.unwrap().unwrap();
        assert!(matches!(
            reading.await.unwrap(),
            Err(AgentError::Store(StoreError::ProjectNotFound(1)))
        ));
        assert_eq!(cache.tracked_projects().await, 0);
        assert!(matches!(
            cache.delete_project(1).await,
            Err(AgentError::Store(StoreError::ProjectNotFound(1)))
        ));
    }

    #[tokio::test]
    async fn commit_writes_turns_and_metadata_together() {
        let store: Arc<dyn MetadataStore> =
            Arc::new(InMemoryStore::new().with_project(1, "demo").await);
        let cache = ConversationCache::new(Arc::clone(&store));
        let mut guard = cache.lock(1).await;
        guard.load().await.unwrap();

        let mut metadata = ProjectMetadata::new();
        metadata.push("svc", schema("s.yaml"));
        guard
            .commit(&[Turn::user("hi"), Turn::assistant("ok")], &metadata)
            .await
            .unwrap();

        let snapshot = guard.load().await.unwrap();
        assert_eq!(snapshot.turns.len(), 2);
        assert_eq!(snapshot.metadata, metadata);
        let data = store.load_project(1).await.unwrap();
        assert_eq!((data.turns.len(), data.records.len()), (2, 1));
    }

    #[tokio::test]
    async fn same_project_requests_queue() {
        let cache = Arc::new(cache_with_project(1).await);
        let guard = cache.lock(1).await;

        let waiting = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let _guard = cache.lock(1).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        // A different project is not blocked.
        let _other = cache.lock(2).await;

        drop(guard);
        waiting.await.unwrap();
    }
}
