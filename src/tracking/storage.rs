//! Storage backends for tracked runs

use std::fs;
use std::path::{Path, PathBuf};

use super::tracker::Run;
use crate::error::Result;

/// Persistence for the run store
pub trait StorageBackend: Send + Sync {
    /// Replace the stored runs with `runs`
    fn save_runs(&self, runs: &[Run]) -> Result<()>;

    /// Load every stored run; an empty store yields no runs
    fn load_runs(&self) -> Result<Vec<Run>>;
}

/// Local file system storage: all runs in one pretty-printed `runs.json`
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn runs_file(&self) -> PathBuf {
        self.base_dir.join("runs.json")
    }
}

impl StorageBackend for LocalStorage {
    fn save_runs(&self, runs: &[Run]) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        let json = serde_json::to_string_pretty(runs)?;
        fs::write(self.runs_file(), json)?;
        Ok(())
    }

    fn load_runs(&self) -> Result<Vec<Run>> {
        let path = self.runs_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::tracker::RunStatus;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("nested"));
        assert!(storage.load_runs().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let mut run = Run::new("abc", "demo");
        run.status = RunStatus::Finished;
        run.params.insert("model".to_string(), "GaussianNB".to_string());
        storage.save_runs(&[run]).unwrap();

        let loaded = storage.load_runs().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].run_id, "abc");
        assert_eq!(loaded[0].status, RunStatus::Finished);
        assert_eq!(loaded[0].params["model"], "GaussianNB");
    }
}
