//! Listing and describing exercises.

use anyhow::Result;
use owo_colors::OwoColorize;
use tracing::warn;

use crate::catalog::{Catalog, Difficulty, Exercise};
use crate::config::Config;
use crate::handlers::Options;
use crate::harness::Harness;
use crate::printer::{MarkdownPrinter, TextPrinter};
use crate::store::ProgressStore;

pub struct CatalogHandler;

impl CatalogHandler {
    /// One line per exercise, with a check mark for those already solved.
    pub fn list(cfg: &Config, catalog: &Catalog, opts: &Options) -> Result<()> {
        let completed = ProgressStore::from_config(cfg).completed(&opts.identity).unwrap_or_else(|err| {
            warn!(%err, "could not read progress");
            Default::default()
        });
        for exercise in catalog.list() {
            let mark = if completed.contains(&exercise.id) { "✓" } else { " " };
            let difficulty = match exercise.difficulty {
                Difficulty::Easy => format!("{:<6}", exercise.difficulty).green().to_string(),
                Difficulty::Medium => format!("{:<6}", exercise.difficulty).yellow().to_string(),
                Difficulty::Hard => format!("{:<6}", exercise.difficulty).red().to_string(),
            };
            println!(
                "{} {:>3}  {}  {} ({})",
                mark.green(),
                exercise.id,
                difficulty,
                exercise.title,
                exercise.category.dimmed()
            );
        }
        Ok(())
    }

    pub fn show(cfg: &Config, catalog: &Catalog, opts: &Options) -> Result<()> {
        let exercise = catalog.get(&opts.exercise)?;
        let mut text = describe(exercise);
        text.push_str(&grading_note(&Harness::builtin(), &exercise.id));
        match ProgressStore::from_config(cfg).is_completed(&opts.identity, &exercise.id) {
            Ok(true) => text.push_str("\n✓ Completed\n"),
            Ok(false) => {}
            Err(err) => warn!(%err, "could not read progress"),
        }
        if opts.markdown {
            MarkdownPrinter::default().print(&text);
        } else {
            TextPrinter { color: None }.print(&text);
        }
        Ok(())
    }
}

/// Markdown description of an exercise. The solution is never included.
pub fn describe(exercise: &Exercise) -> String {
    let mut out = format!(
        "# {}. {}\n\n*{} · {}*\n\n{}\n",
        exercise.id, exercise.title, exercise.difficulty, exercise.category, exercise.description
    );
    for (i, example) in exercise.examples.iter().enumerate() {
        out.push_str(&format!(
            "\n**Example {}**\n\n```\nInput: {}\nOutput: {}\n```\n",
            i + 1,
            example.input,
            example.output
        ));
        if let Some(explanation) = &example.explanation {
            out.push_str(&format!("Explanation: {}\n", explanation));
        }
    }
    if !exercise.constraints.is_empty() {
        out.push_str("\n**Constraints**\n\n");
        for c in &exercise.constraints {
            out.push_str(&format!("- {}\n", c));
        }
    }
    if !exercise.hints.is_empty() {
        out.push_str("\n**Hints**\n\n");
        for (i, h) in exercise.hints.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, h));
        }
    }
    out
}

/// What a submit checks for, or that nothing is checked.
pub fn grading_note(harness: &Harness, exercise_id: &str) -> String {
    match harness.spec(exercise_id) {
        Some(spec) if harness.has_tests(exercise_id) => {
            let names: Vec<String> = spec.required_names().iter().map(|n| format!("`{}`", n)).collect();
            format!("\n**Graded on** {}\n", names.join(", "))
        }
        _ => "\n*This exercise has no automated tests.*\n".to_string(),
    }
}
