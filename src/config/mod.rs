use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::PathBuf,
    time::Duration,
};

use directories::BaseDirs;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        let config_path = env::var("TECHCOACH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_path());
        Self::load_from(config_path)
    }

    pub fn load_from(config_path: PathBuf) -> Self {
        let mut map = default_map();

        // Read .techcoachrc if exists
        if config_path.exists() {
            if let Ok(file) = fs::File::open(&config_path) {
                let reader = BufReader::new(file);
                for line in reader.lines().map_while(Result::ok) {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    if let Some((k, v)) = line.split_once('=') {
                        map.insert(k.trim().to_string(), v.trim().to_string());
                    }
                }
            }
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        // ENV first
        if let Ok(v) = env::var(key) {
            return Some(v);
        }
        self.inner.get(key).cloned()
    }

    /// Overrides a key for this process only.
    #[cfg(test)]
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.inner.insert(key.to_string(), value.into());
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.parse::<usize>().ok())
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).filter(|v| !v.trim().is_empty()).map(PathBuf::from)
    }

    pub fn python_bin(&self) -> String {
        self.get("PYTHON_BIN").unwrap_or_else(|| "python3".into())
    }

    pub fn host_start_timeout(&self) -> Duration {
        Duration::from_secs(self.get_usize("HOST_START_TIMEOUT").unwrap_or(30) as u64)
    }

    pub fn code_store_path(&self) -> PathBuf {
        self.path_or("CODE_STORE_PATH", || data_dir().join("code"))
    }

    pub fn progress_path(&self) -> PathBuf {
        self.path_or("PROGRESS_PATH", || data_dir().join("progress.json"))
    }

    pub fn chat_cache_path(&self) -> PathBuf {
        self.path_or("CHAT_CACHE_PATH", || temp_dir().join("chat_cache"))
    }

    pub fn cache_path(&self) -> PathBuf {
        self.path_or("CACHE_PATH", || temp_dir().join("cache"))
    }

    /// The signed-in learner from config, if any.
    pub fn default_user(&self) -> Option<String> {
        self.get("TECHCOACH_USER").filter(|u| !u.trim().is_empty())
    }

    fn path_or(&self, key: &str, fallback: impl FnOnce() -> PathBuf) -> PathBuf {
        self.get_path(key).unwrap_or_else(fallback)
    }
}

fn is_config_key(k: &str) -> bool {
    // Accept known keys or TECHCOACH_*/OPENAI_* for forward-compat
    const KEYS: &[&str] = &[
        "PYTHON_BIN",
        "HOST_START_TIMEOUT",
        "CODE_STORE_PATH",
        "PROGRESS_PATH",
        "CATALOG_PATH",
        "OPENAI_API_KEY",
        "API_BASE_URL",
        "CHAT_CACHE_PATH",
        "CACHE_PATH",
        "CHAT_CACHE_LENGTH",
        "CACHE_LENGTH",
        "REQUEST_TIMEOUT",
        "DEFAULT_MODEL",
        "PRETTIFY_MARKDOWN",
        "TUTOR_FEEDBACK",
    ];

    KEYS.contains(&k) || k.starts_with("TECHCOACH_") || k.starts_with("OPENAI_")
}

fn config_base() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"))
}

fn default_config_path() -> PathBuf {
    config_base().join("techcoach").join(".techcoachrc")
}

fn data_dir() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.data_dir().to_path_buf())
        .unwrap_or_else(config_base)
        .join("techcoach")
}

fn temp_dir() -> PathBuf {
    env::temp_dir().join("techcoach")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();

    // Numbers
    m.insert("HOST_START_TIMEOUT".into(), "30".into());
    m.insert("CHAT_CACHE_LENGTH".into(), "100".into());
    m.insert("CACHE_LENGTH".into(), "100".into());
    m.insert("REQUEST_TIMEOUT".into(), "60".into());

    // Strings
    m.insert("PYTHON_BIN".into(), "python3".into());
    m.insert("DEFAULT_MODEL".into(), "gpt-4o".into());
    m.insert("API_BASE_URL".into(), "default".into());

    // Bools as strings
    m.insert("PRETTIFY_MARKDOWN".into(), "true".into());
    m.insert("TUTOR_FEEDBACK".into(), "false".into());

    m
}
