//! Plumeflow storage layer.
//!
//! Every record lives in a redb table keyed by id with a serde_json
//! encoded value. Reads and deletes are owner-scoped: a record stored
//! under a different owner is reported absent, never leaked.

pub mod agent;
pub mod pipeline;
pub mod run;
pub mod simple_storage;

pub use agent::AgentStore;
pub use pipeline::PipelineStore;
pub use run::{RunFilter, RunStore};
pub use simple_storage::SimpleStorage;

use anyhow::Result;
use redb::Database;
use std::path::Path;
use std::sync::Arc;

/// All stores over one shared database.
pub struct Storage {
    pub agents: AgentStore,
    pub pipelines: PipelineStore,
    pub runs: RunStore,
}

impl Storage {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db = Arc::new(Database::create(path)?);
        Self::with_database(db)
    }

    pub fn with_database(db: Arc<Database>) -> Result<Self> {
        Ok(Self {
            agents: AgentStore::new(db.clone())?,
            pipelines: PipelineStore::new(db.clone())?,
            runs: RunStore::new(db)?,
        })
    }
}
