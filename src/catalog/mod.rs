//! Read-only exercise catalog.

use std::{fmt, fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::EngineError};

const EMBEDDED: &str = include_str!("exercises.json");

const DEFAULT_STARTER: &str = "def solution():\n    # Write your code here\n    pass\n\n# Test your solution\nsolution()\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub input: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub explanation: String,
    pub code: String,
}

/// One exercise descriptor. Never mutated after loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub difficulty: Difficulty,
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub examples: Vec<Example>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub hints: Vec<String>,
    pub solution: Solution,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starter: Option<String>,
}

impl Exercise {
    /// Default editor text: a title banner, the first description line and
    /// the starter body.
    pub fn template(&self) -> String {
        let first_line = self.description.lines().next().unwrap_or_default();
        let starter = self.starter.as_deref().unwrap_or(DEFAULT_STARTER);
        format!("# {}\n# {}\n\n{}", self.title, first_line, starter)
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    exercises: Vec<Exercise>,
}

impl Catalog {
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED).context("embedded exercise catalog is invalid")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let exercises: Vec<Exercise> = serde_json::from_str(json)?;
        Ok(Self { exercises })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read exercise catalog {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Invalid exercise catalog {}", path.display()))
    }

    /// `CATALOG_PATH` if configured, the embedded catalog otherwise.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        match cfg.get_path("CATALOG_PATH") {
            Some(path) => Self::from_path(&path),
            None => Self::embedded(),
        }
    }

    /// Looks an exercise up by id or slug.
    pub fn get(&self, key: &str) -> Result<&Exercise, EngineError> {
        let key = key.trim();
        self.exercises
            .iter()
            .find(|e| e.id == key || e.slug == key)
            .ok_or_else(|| EngineError::UnknownExercise(key.to_string()))
    }

    pub fn list(&self) -> &[Exercise] {
        &self.exercises
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::Harness;

    #[test]
    fn embedded_catalog_loads() {
        let catalog = Catalog::embedded().unwrap();
        assert!(catalog.list().len() >= 20);
        assert_eq!(catalog.list()[0].id, "1");
    }

    #[test]
    fn lookup_by_id_or_slug() {
        let catalog = Catalog::embedded().unwrap();
        assert_eq!(catalog.get("2").unwrap().title, "Reverse a String");
        assert_eq!(catalog.get("reverse-a-string").unwrap().id, "2");
        assert_eq!(catalog.get("quick-sort").unwrap().id, "27");
        assert_eq!(catalog.get("26").unwrap().difficulty, Difficulty::Medium);
        assert!(matches!(catalog.get("999"), Err(EngineError::UnknownExercise(id)) if id == "999"));
    }

    #[test]
    fn template_uses_banner_and_starter() {
        let catalog = Catalog::embedded().unwrap();
        let hello = catalog.get("1").unwrap().template();
        assert!(hello.starts_with("# Hello World\n# Welcome to coding challenges!"));
        assert!(hello.contains("def hello_world():\n    # Your code here\n    pass\n"));

        let dedupe = catalog.get("24").unwrap().template();
        assert!(dedupe.starts_with("# Remove Duplicates\n# Write a function `remove_duplicates(items)`"));
        assert!(dedupe.ends_with(DEFAULT_STARTER));
    }

    #[test]
    fn every_verification_spec_names_a_catalog_exercise() {
        let catalog = Catalog::embedded().unwrap();
        let harness = Harness::builtin();
        for exercise in catalog.list() {
            if matches!(exercise.id.as_str(), "24" | "25" | "26" | "27") {
                assert!(!harness.has_tests(&exercise.id));
            } else {
                assert!(harness.has_tests(&exercise.id), "{} has no vectors", exercise.id);
            }
        }
    }

    #[test]
    fn custom_catalog_file_overrides_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(
            &path,
            r#"[{"id":"x","title":"T","slug":"t","difficulty":"Hard","category":"C",
                "description":"line one\nline two","solution":{"explanation":"e","code":"c"}}]"#,
        )
        .unwrap();
        let catalog = Catalog::from_path(&path).unwrap();
        let exercise = catalog.get("t").unwrap();
        assert_eq!(exercise.difficulty, Difficulty::Hard);
        assert_eq!(exercise.template(), format!("# T\n# line one\n\n{}", DEFAULT_STARTER));
    }
}
