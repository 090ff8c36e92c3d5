//! CLI mode handlers.

use std::{
    fs,
    io::{self, Read},
    path::Path,
};

use anyhow::{Context, Result};

use crate::session::Identity;

pub mod ask;
pub mod catalog;
pub mod grade;
pub mod repl;

/// Settings shared by every mode, resolved from flags and config.
#[derive(Debug, Clone)]
pub struct Options {
    pub identity: Identity,
    pub exercise: String,
    pub markdown: bool,
    pub feedback: bool,
    pub model: String,
}

/// Reads learner source from a file, or from stdin for `-`.
pub fn read_source(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).context("Failed to read source from stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
