//! Agent persistence.

use anyhow::Result;
use plumeflow_models::Agent;
use redb::Database;
use std::sync::Arc;

use crate::define_simple_storage;

define_simple_storage! {
    /// Low-level agent storage with byte-level API
    struct RawAgentStorage { table: "agents" }
}

/// Owner-scoped typed store over the raw agent table.
#[derive(Debug, Clone)]
pub struct AgentStore {
    raw: RawAgentStorage,
}

impl AgentStore {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self {
            raw: RawAgentStorage::new(db)?,
        })
    }

    pub fn insert(&self, agent: &Agent) -> Result<()> {
        self.raw.put_raw(&agent.id, &serde_json::to_vec(agent)?)
    }

    pub fn update(&self, agent: &Agent) -> Result<()> {
        self.insert(agent)
    }

    pub fn get(&self, id: &str, owner: &str) -> Result<Option<Agent>> {
        let Some(bytes) = self.raw.get_raw(id)? else {
            return Ok(None);
        };
        let agent: Agent = serde_json::from_slice(&bytes)?;
        if agent.owner != owner {
            return Ok(None);
        }
        Ok(Some(agent))
    }

    pub fn list(&self, owner: &str) -> Result<Vec<Agent>> {
        let mut agents = Vec::new();
        for (_, bytes) in self.raw.list_raw()? {
            let agent: Agent = serde_json::from_slice(&bytes)?;
            if agent.owner == owner {
                agents.push(agent);
            }
        }
        agents.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(agents)
    }

    pub fn delete(&self, id: &str, owner: &str) -> Result<bool> {
        if self.get(id, owner)?.is_none() {
            return Ok(false);
        }
        self.raw.delete_raw(id)
    }

    pub fn count(&self) -> Result<usize> {
        self.raw.count()
    }
}
