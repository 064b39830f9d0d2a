//! File-backed persistence: one JSON document per workflow instance.
//!
//! Lets paused instances survive across CLI invocations and process
//! restarts; the engine re-reads them on resume.

use alder_workflow_engine::PersistenceStore;
use alder_workflow_types::{WorkflowError, WorkflowInstance, WorkflowInstanceId, WorkflowResult};
use std::fs;
use std::path::PathBuf;

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> WorkflowResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            WorkflowError::Persistence(format!("cannot create '{}': {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: &WorkflowInstanceId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

impl PersistenceStore for FileStore {
    fn save(&self, instance: &WorkflowInstance) -> WorkflowResult<()> {
        let json = serde_json::to_vec_pretty(instance)
            .map_err(|e| WorkflowError::Persistence(e.to_string()))?;
        let path = self.path_for(&instance.id);
        fs::write(&path, json).map_err(|e| {
            WorkflowError::Persistence(format!("cannot write '{}': {e}", path.display()))
        })
    }

    fn load(&self, id: &WorkflowInstanceId) -> WorkflowResult<WorkflowInstance> {
        let path = self.path_for(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WorkflowError::InstanceNotFound(id.clone()))
            }
            Err(e) => {
                return Err(WorkflowError::Persistence(format!(
                    "cannot read '{}': {e}",
                    path.display()
                )))
            }
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            WorkflowError::Persistence(format!("malformed instance '{}': {e}", path.display()))
        })
    }

    fn list(&self) -> WorkflowResult<Vec<WorkflowInstance>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            WorkflowError::Persistence(format!("cannot list '{}': {e}", self.dir.display()))
        })?;
        let mut instances = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| WorkflowError::Persistence(format!("cannot list: {e}")))?;
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            match fs::read(&path)
                .map_err(|e| e.to_string())
                .and_then(|bytes| serde_json::from_slice(&bytes).map_err(|e| e.to_string()))
            {
                Ok(instance) => instances.push(instance),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping unreadable instance")
                }
            }
        }
        Ok(instances)
    }
}
