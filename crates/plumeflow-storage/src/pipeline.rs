//! Pipeline persistence.

use anyhow::Result;
use plumeflow_models::Pipeline;
use redb::Database;
use std::sync::Arc;

use crate::define_simple_storage;

define_simple_storage! {
    /// Low-level pipeline storage with byte-level API
    struct RawPipelineStorage { table: "pipelines" }
}

/// Owner-scoped typed store over the raw pipeline table.
#[derive(Debug, Clone)]
pub struct PipelineStore {
    raw: RawPipelineStorage,
}

impl PipelineStore {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self {
            raw: RawPipelineStorage::new(db)?,
        })
    }

    pub fn insert(&self, pipeline: &Pipeline) -> Result<()> {
        self.raw
            .put_raw(&pipeline.id, &serde_json::to_vec(pipeline)?)
    }

    pub fn update(&self, pipeline: &Pipeline) -> Result<()> {
        self.insert(pipeline)
    }

    pub fn get(&self, id: &str, owner: &str) -> Result<Option<Pipeline>> {
        let Some(bytes) = self.raw.get_raw(id)? else {
            return Ok(None);
        };
        let pipeline: Pipeline = serde_json::from_slice(&bytes)?;
        if pipeline.owner != owner {
            return Ok(None);
        }
        Ok(Some(pipeline))
    }

    pub fn list(&self, owner: &str) -> Result<Vec<Pipeline>> {
        let mut pipelines = Vec::new();
        for (_, bytes) in self.raw.list_raw()? {
            let pipeline: Pipeline = serde_json::from_slice(&bytes)?;
            if pipeline.owner == owner {
                pipelines.push(pipeline);
            }
        }
        pipelines.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pipelines)
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
