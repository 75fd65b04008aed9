//! Run persistence.
//!
//! Runs are written incrementally: the record is created when execution
//! starts, each step's output is appended as it completes, and the final
//! status lands exactly once. Each mutation happens under a single write
//! transaction so a polling reader always sees a consistent record.

use anyhow::{Result, anyhow};
use plumeflow_models::{Run, RunOutput, RunOutputMeta};
use redb::{Database, ReadableTable};
use serde_json::Value;
use std::sync::Arc;

use crate::define_simple_storage;

define_simple_storage! {
    /// Low-level run storage with byte-level API
    struct RawRunStorage { table: "runs" }
}

/// Filter for run listing; empty matches every run of the owner.
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub agent_id: Option<String>,
    pub pipeline_id: Option<String>,
}

/// Owner-scoped typed store over the raw run table.
#[derive(Debug, Clone)]
pub struct RunStore {
    raw: RawRunStorage,
    db: Arc<Database>,
}

impl RunStore {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self {
            raw: RawRunStorage::new(db.clone())?,
            db,
        })
    }

    pub fn insert(&self, run: &Run) -> Result<()> {
        self.raw.put_raw(&run.id, &serde_json::to_vec(run)?)
    }

    pub fn get(&self, id: &str, owner: &str) -> Result<Option<Run>> {
        let Some(bytes) = self.raw.get_raw(id)? else {
            return Ok(None);
        };
        let run: Run = serde_json::from_slice(&bytes)?;
        if run.owner != owner {
            return Ok(None);
        }
        Ok(Some(run))
    }

    /// Newest-first listing, optionally narrowed to one agent or pipeline.
    pub fn list(&self, owner: &str, filter: &RunFilter) -> Result<Vec<Run>> {
        let mut runs = Vec::new();
        for (_, bytes) in self.raw.list_raw()? {
            let run: Run = serde_json::from_slice(&bytes)?;
            if run.owner != owner {
                continue;
            }
            if let Some(agent_id) = &filter.agent_id {
                if run.agent_id.as_deref() != Some(agent_id.as_str()) {
                    continue;
                }
            }
            if let Some(pipeline_id) = &filter.pipeline_id {
                if run.pipeline_id.as_deref() != Some(pipeline_id.as_str()) {
                    continue;
                }
            }
            runs.push(run);
        }
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
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

    /// Append one step's output; visible to readers immediately.
    pub fn append_output(&self, id: &str, output: RunOutput) -> Result<Run> {
        self.mutate(id, |run| run.outputs.push(output))
    }

    /// Transition the run to `completed` with the last step's output.
    pub fn complete(
        &self,
        id: &str,
        final_output: Value,
        meta: Option<RunOutputMeta>,
    ) -> Result<Run> {
        self.mutate(id, |run| run.complete(final_output, meta))
    }

    /// Transition the run to `failed` with the fatal error.
    pub fn fail(&self, id: &str, error: String) -> Result<Run> {
        self.mutate(id, |run| run.fail(error))
    }

    /// Read-modify-write under one write transaction.
    fn mutate(&self, id: &str, apply: impl FnOnce(&mut Run)) -> Result<Run> {
        let write_txn = self.db.begin_write()?;
        let run = {
            let mut table = write_txn.open_table(TABLE)?;
            let bytes = table
                .get(id)?
                .map(|v| v.value().to_vec())
                .ok_or_else(|| anyhow!("Run {} not found", id))?;
            let mut run: Run = serde_json::from_slice(&bytes)?;
            apply(&mut run);
            table.insert(id, serde_json::to_vec(&run)?.as_slice())?;
            run
        };
        write_txn.commit()?;
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use plumeflow_models::RunStatus;
    use tempfile::tempdir;

    fn store() -> (RunStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Arc::new(Database::create(dir.path().join("test.db")).unwrap());
        (RunStore::new(db).unwrap(), dir)
    }

    fn output_for(agent_id: &str) -> RunOutput {
        RunOutput {
            agent_id: agent_id.to_string(),
            output: Value::String("step output".into()),
            timestamp: Utc::now(),
            meta: None,
        }
    }

    #[test]
    fn append_is_visible_before_completion() {
        let (store, _dir) = store();
        let run = Run::for_pipeline("alice", "p1", "go");
        store.insert(&run).unwrap();

        store.append_output(&run.id, output_for("a1")).unwrap();

        let mid = store.get(&run.id, "alice").unwrap().unwrap();
        assert_eq!(mid.status, RunStatus::Running);
        assert_eq!(mid.outputs.len(), 1);
    }

    #[test]
    fn complete_sets_final_output_once() {
        let (store, _dir) = store();
        let run = Run::for_agent("alice", "a1", "go");
        store.insert(&run).unwrap();

        let done = store
            .complete(&run.id, Value::String("answer".into()), None)
            .unwrap();
        assert_eq!(done.status, RunStatus::Completed);
        assert_eq!(done.final_output, Some(Value::String("answer".into())));
        assert!(done.completed_at.is_some());
    }

    #[test]
    fn fail_records_error() {
        let (store, _dir) = store();
        let run = Run::for_pipeline("alice", "p1", "go");
        store.insert(&run).unwrap();

        let failed = store.fail(&run.id, "step 2 exploded".into()).unwrap();
        assert_eq!(failed.status, RunStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("step 2 exploded"));
    }

    #[test]
    fn list_filters_and_sorts_newest_first() {
        let (store, _dir) = store();
        let mut first = Run::for_pipeline("alice", "p1", "one");
        first.created_at = Utc::now() - chrono::Duration::seconds(10);
        let second = Run::for_pipeline("alice", "p2", "two");
        let other_owner = Run::for_pipeline("bob", "p1", "three");
        store.insert(&first).unwrap();
        store.insert(&second).unwrap();
        store.insert(&other_owner).unwrap();

        let all = store.list("alice", &RunFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);

        let filtered = store
            .list(
                "alice",
                &RunFilter {
                    pipeline_id: Some("p1".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, first.id);
    }

    #[test]
    fn mutating_a_missing_run_errors() {
        let (store, _dir) = store();
        assert!(store.fail("nope", "x".into()).is_err());
    }
}
