//! Run, submit and reset handlers: one engine per invocation.

use anyhow::Result;
use tracing::warn;

use crate::catalog::{Catalog, Exercise};
use crate::config::Config;
use crate::engine::Engine;
use crate::handlers::Options;
use crate::printer::{print_reply, print_verdict, TextPrinter};
use crate::tutor::{LlmTutor, Tutor};
use crate::verdict::Verdict;

pub struct GradeHandler;

impl GradeHandler {
    /// Runs the source as-is and prints what the learner would see.
    pub async fn run(cfg: &Config, catalog: Catalog, opts: &Options, source: &str) -> Result<()> {
        let mut engine = Engine::start(cfg, catalog, opts.identity.clone(), &opts.exercise).await?;
        let result = engine.run(&opts.exercise, source).await;
        engine.shutdown().await?;

        let text = result?;
        if !text.is_empty() {
            println!("{}", text);
        }
        Ok(())
    }

    /// Grades the source and prints the verdict. Returns whether it passed.
    pub async fn submit(cfg: &Config, catalog: Catalog, opts: &Options, source: &str) -> Result<bool> {
        let mut engine = Engine::start(cfg, catalog, opts.identity.clone(), &opts.exercise).await?;
        let result = engine.submit(&opts.exercise, source).await;
        let exercise = engine.exercise().cloned();
        engine.shutdown().await?;

        let verdict = result?;
        print_verdict(&verdict);
        if opts.feedback {
            Self::feedback(cfg, opts, &exercise?, source, &verdict).await;
        }
        Ok(verdict.passed)
    }

    /// Prints the exercise's default template and clears any saved snapshot.
    pub async fn reset(cfg: &Config, catalog: Catalog, opts: &Options) -> Result<()> {
        let mut engine = Engine::offline(cfg, catalog, opts.identity.clone(), &opts.exercise).await?;
        let template = engine.reset(&opts.exercise)?;
        println!("{}", template);
        Ok(())
    }

    /// Tutor review of a graded submission. Failures here never change the
    /// verdict, they are only reported.
    pub(crate) async fn feedback(
        cfg: &Config,
        opts: &Options,
        exercise: &Exercise,
        source: &str,
        verdict: &Verdict,
    ) {
        let tutor = match LlmTutor::from_config(cfg, &opts.model) {
            Ok(tutor) => tutor,
            Err(err) => {
                warn!(%err, "tutor unavailable");
                return;
            }
        };
        match tutor.feedback(exercise, source, &verdict.raw_output, verdict.passed).await {
            Ok(text) => {
                TextPrinter { color: Some("cyan") }.print("Tutor feedback:");
                print_reply(&text, opts.markdown);
            }
            Err(err) => warn!(%err, "could not get tutor feedback"),
        }
    }
}
