//! Persistence collaborators: per-learner code snapshots and completion
//! records.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::PathBuf,
    sync::Mutex,
};

use anyhow::{anyhow, Result};
use tracing::debug;

use crate::{config::Config, session::Identity};

/// Editor snapshots keyed by `(identity, exercise)`.
pub trait SnapshotStore: Send + Sync {
    fn load(&self, identity: &Identity, exercise_id: &str) -> Result<Option<String>>;
    fn save(&self, identity: &Identity, exercise_id: &str, code: &str) -> Result<()>;
}

/// Consumer of "completed" facts emitted by passing submits.
pub trait ProgressSink: Send + Sync {
    fn mark_completed(&self, identity: &Identity, exercise_id: &str) -> Result<()>;
}

/// One file per snapshot under `CODE_STORE_PATH`.
#[derive(Debug, Clone)]
pub struct CodeStore {
    storage_path: PathBuf,
}

impl CodeStore {
    pub fn new(storage_path: PathBuf) -> Self {
        Self { storage_path }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.code_store_path())
    }

    fn file_path(&self, identity: &Identity, exercise_id: &str) -> PathBuf {
        self.storage_path
            .join(format!("code-{}-{}.py", file_safe(identity.storage_key()), file_safe(exercise_id)))
    }
}

impl SnapshotStore for CodeStore {
    fn load(&self, identity: &Identity, exercise_id: &str) -> Result<Option<String>> {
        let p = self.file_path(identity, exercise_id);
        if !p.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(p)?))
    }

    fn save(&self, identity: &Identity, exercise_id: &str, code: &str) -> Result<()> {
        fs::create_dir_all(&self.storage_path)?;
        let p = self.file_path(identity, exercise_id);
        fs::write(&p, code)?;
        debug!(path = %p.display(), "saved code snapshot");
        Ok(())
    }
}

fn file_safe(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

/// Completed exercise ids per identity, stored as one JSON document.
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

type ProgressMap = BTreeMap<String, BTreeSet<String>>;

impl ProgressStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path, lock: Mutex::new(()) }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.progress_path())
    }

    fn read(&self) -> Result<ProgressMap> {
        if !self.path.exists() {
            return Ok(ProgressMap::new());
        }
        let text = fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(ProgressMap::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn write(&self, map: &ProgressMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(map)?)?;
        Ok(())
    }

    pub fn is_completed(&self, identity: &Identity, exercise_id: &str) -> Result<bool> {
        Ok(self
            .read()?
            .get(identity.storage_key())
            .is_some_and(|done| done.contains(exercise_id)))
    }

    pub fn completed(&self, identity: &Identity) -> Result<BTreeSet<String>> {
        Ok(self.read()?.remove(identity.storage_key()).unwrap_or_default())
    }
}

impl ProgressSink for ProgressStore {
    fn mark_completed(&self, identity: &Identity, exercise_id: &str) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| anyhow!("progress store lock poisoned"))?;
        let mut map = self.read()?;
        let inserted = map
            .entry(identity.storage_key().to_string())
            .or_default()
            .insert(exercise_id.to_string());
        if inserted {
            self.write(&map)?;
            debug!(identity = %identity, exercise_id, "recorded completion");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ada() -> Identity {
        Identity::User("ada".into())
    }

    #[test]
    fn snapshots_are_isolated_per_identity_and_exercise() {
        let dir = tempfile::tempdir().unwrap();
        let store = CodeStore::new(dir.path().join("code"));

        assert_eq!(store.load(&ada(), "1").unwrap(), None);
        store.save(&ada(), "1", "print('ada')").unwrap();
        store.save(&Identity::User("grace".into()), "1", "print('grace')").unwrap();
        store.save(&ada(), "2", "print('two')").unwrap();

        assert_eq!(store.load(&ada(), "1").unwrap().as_deref(), Some("print('ada')"));
        assert_eq!(store.load(&Identity::User("grace".into()), "1").unwrap().as_deref(), Some("print('grace')"));
        assert_eq!(store.load(&ada(), "2").unwrap().as_deref(), Some("print('two')"));
    }

    #[test]
    fn identities_cannot_escape_the_store_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = CodeStore::new(dir.path().to_path_buf());
        let sneaky = Identity::User("../../etc/passwd".into());
        store.save(&sneaky, "1", "x").unwrap();
        let p = store.file_path(&sneaky, "1");
        assert_eq!(p.parent().unwrap(), dir.path());
    }

    #[test]
    fn mark_completed_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path().join("nested").join("progress.json"));

        assert!(!store.is_completed(&ada(), "1").unwrap());
        store.mark_completed(&ada(), "1").unwrap();
        store.mark_completed(&ada(), "1").unwrap();
        store.mark_completed(&ada(), "3").unwrap();

        assert!(store.is_completed(&ada(), "1").unwrap());
        let done: Vec<_> = store.completed(&ada()).unwrap().into_iter().collect();
        assert_eq!(done, vec!["1".to_string(), "3".to_string()]);
        assert!(store.completed(&Identity::Anonymous).unwrap().is_empty());
    }
}
