//! Persistence backends for Codewright.
//!
//! Backends:
//! - **SQLite**: durable store on a single database file (default)
//! - **InMemory**: ephemeral store for tests and one-off CLI runs

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

use codewright_core::{MetadataStore, StoreError};
use std::sync::Arc;

/// Open the backend named by a connection string.
///
/// `memory` (or `in_memory`) selects [`InMemoryStore`]; anything else is
/// handed to SQLite, where `sqlite::memory:` gives a throwaway database.
pub async fn open(
    database_url: &str,
    max_connections: u32,
) -> Result<Arc<dyn MetadataStore>, StoreError> {
    match database_url {
        "memory" | "in_memory" => Ok(Arc::new(InMemoryStore::new())),
        url => Ok(Arc::new(SqliteStore::new(url, max_connections).await?)),
    }
}
