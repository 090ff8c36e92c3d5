//! Request cache and chat session persistence for the tutor.

use std::{fs, path::PathBuf};

use anyhow::Result;

use crate::{config::Config, llm::ChatMessage};

/// Tutor conversations, one JSON file per chat id.
#[derive(Debug, Clone)]
pub struct ChatSession {
    length: usize,
    storage_path: PathBuf,
}

impl ChatSession {
    pub fn new(storage_path: PathBuf, length: usize) -> Self {
        let _ = fs::create_dir_all(&storage_path);
        Self { length, storage_path }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let len = cfg.get_usize("CHAT_CACHE_LENGTH").unwrap_or(100);
        Self::new(cfg.chat_cache_path(), len)
    }

    fn file_path(&self, chat_id: &str) -> PathBuf {
        self.storage_path.join(chat_id)
    }

    pub fn exists(&self, chat_id: &str) -> bool {
        self.file_path(chat_id).exists()
    }

    pub fn read(&self, chat_id: &str) -> Result<Vec<ChatMessage>> {
        let p = self.file_path(chat_id);
        if !p.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(p)?;
        let msgs: Vec<ChatMessage> = serde_json::from_str(&text)?;
        Ok(msgs)
    }

    /// Stores the most recent `length` messages.
    pub fn write(&self, chat_id: &str, mut messages: Vec<ChatMessage>) -> Result<()> {
        let over = messages.len().saturating_sub(self.length);
        messages.drain(..over);
        fs::create_dir_all(&self.storage_path)?;
        fs::write(self.file_path(chat_id), serde_json::to_string(&messages)?)?;
        Ok(())
    }
}

/// Chat id for a learner's conversation about one exercise.
pub fn chat_id(identity: &str, exercise_id: &str) -> String {
    let safe = |s: &str| -> String {
        s.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' }).collect()
    };
    format!("tutor-{}-{}", safe(identity), safe(exercise_id))
}

/// Tutor replies keyed by an md5 digest of the request.
#[derive(Debug, Clone)]
pub struct RequestCache {
    length: usize,
    cache_path: PathBuf,
}

impl RequestCache {
    pub fn new(cache_path: PathBuf, length: usize) -> Self {
        let _ = fs::create_dir_all(&cache_path);
        Self { length, cache_path }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let len = cfg.get_usize("CACHE_LENGTH").unwrap_or(100);
        Self::new(cfg.cache_path(), len)
    }

    pub fn key_for(
        &self,
        base_url: &str,
        model: &str,
        temperature: f32,
        top_p: f32,
        messages: &[ChatMessage],
    ) -> String {
        let payload = serde_json::json!({
            "base_url": base_url,
            "model": model,
            "temperature": temperature,
            "top_p": top_p,
            "messages": messages,
        });
        let data = serde_json::to_vec(&payload).unwrap_or_default();
        let digest = md5::compute(data);
        format!("{:x}", digest)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let p = self.cache_path.join(key);
        fs::read_to_string(p).ok()
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.cache_path)?;
        let p = self.cache_path.join(key);
        fs::write(p, value)?;
        self.prune()?;
        Ok(())
    }

    fn prune(&self) -> Result<()> {
        let mut entries: Vec<_> = fs::read_dir(&self.cache_path)?.filter_map(|e| e.ok()).collect();
        if entries.len() <= self.length {
            return Ok(());
        }
        entries.sort_by_key(|e| e.metadata().and_then(|m| m.modified()).ok());
        let to_delete = entries.len() - self.length;
        for entry in entries.iter().take(to_delete) {
            let _ = fs::remove_file(entry.path());
        }
        Ok(())
    }
}
