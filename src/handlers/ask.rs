//! Tutor questions with per-learner, per-exercise chat history.

use anyhow::Result;

use crate::cache::{chat_id, ChatSession};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::handlers::Options;
use crate::llm::{ChatMessage, Role};
use crate::printer::print_reply;
use crate::session::Identity;
use crate::store::{CodeStore, SnapshotStore};
use crate::tutor::{LlmTutor, Tutor};

pub struct AskHandler;

impl AskHandler {
    /// Asks the tutor and prints the reply. `code` overrides the saved
    /// snapshot as context; without either the exercise template is used.
    pub async fn run(cfg: &Config, catalog: &Catalog, opts: &Options, question: &str, code: Option<String>) -> Result<()> {
        let code = match code {
            Some(code) => code,
            None => saved_code(cfg, catalog, &opts.identity, &opts.exercise)?,
        };
        let tutor = LlmTutor::from_config(cfg, &opts.model)?;
        let reply = Self::ask(cfg, &tutor, catalog, opts, question, &code).await?;
        print_reply(&reply, opts.markdown);
        Ok(())
    }

    /// One question/answer turn, appended to the conversation history.
    pub async fn ask(
        cfg: &Config,
        tutor: &dyn Tutor,
        catalog: &Catalog,
        opts: &Options,
        question: &str,
        code: &str,
    ) -> Result<String> {
        let exercise = catalog.get(&opts.exercise)?;
        let session = ChatSession::from_config(cfg);
        let id = chat_id(opts.identity.storage_key(), &exercise.id);
        let mut history = if session.exists(&id) { session.read(&id)? } else { Vec::new() };

        let reply = tutor.ask(exercise, code, question, &history).await?;

        history.push(ChatMessage::new(Role::User, question));
        history.push(ChatMessage::new(Role::Assistant, reply.clone()));
        session.write(&id, history)?;
        Ok(reply)
    }
}

/// The learner's saved code for an exercise, or its template.
fn saved_code(cfg: &Config, catalog: &Catalog, identity: &Identity, exercise_id: &str) -> Result<String> {
    let exercise = catalog.get(exercise_id)?;
    if identity.is_signed_in() {
        if let Some(code) = CodeStore::from_config(cfg).load(identity, &exercise.id)? {
            return Ok(code);
        }
    }
    Ok(exercise.template())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use futures::future::BoxFuture;

    use super::*;
    use crate::catalog::Exercise;

    /// Replies with the number of earlier turns it was given.
    struct CountingTutor;

    impl Tutor for CountingTutor {
        fn ask<'a>(
            &'a self,
            _exercise: &'a Exercise,
            _code: &'a str,
            _question: &'a str,
            history: &'a [ChatMessage],
        ) -> BoxFuture<'a, Result<String>> {
            Box::pin(async move { Ok(format!("seen {}", history.len())) })
        }

        fn feedback<'a>(
            &'a self,
            _exercise: &'a Exercise,
            _code: &'a str,
            _raw_output: &'a str,
            _passed: bool,
        ) -> BoxFuture<'a, Result<String>> {
            Box::pin(async move { Ok(String::new()) })
        }
    }

    fn options(identity: Identity) -> Options {
        Options { identity, exercise: "1".into(), markdown: false, feedback: false, model: "gpt-4o".into() }
    }

    #[tokio::test]
    async fn history_is_kept_per_learner() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::load_from(PathBuf::from("/nonexistent/.techcoachrc"));
        cfg.set("CHAT_CACHE_PATH", dir.path().to_string_lossy());
        let catalog = Catalog::embedded().unwrap();
        let ada = options(Identity::User("ada".into()));

        let first = AskHandler::ask(&cfg, &CountingTutor, &catalog, &ada, "hint?", "").await.unwrap();
        let second = AskHandler::ask(&cfg, &CountingTutor, &catalog, &ada, "more?", "").await.unwrap();
        assert_eq!(first, "seen 0");
        assert_eq!(second, "seen 2");

        let other = AskHandler::ask(&cfg, &CountingTutor, &catalog, &options(Identity::Anonymous), "hi", "")
            .await
            .unwrap();
        assert_eq!(other, "seen 0");
    }

    #[test]
    fn saved_code_falls_back_to_the_template() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::load_from(PathBuf::from("/nonexistent/.techcoachrc"));
        cfg.set("CODE_STORE_PATH", dir.path().to_string_lossy());
        let catalog = Catalog::embedded().unwrap();
        let ada = Identity::User("ada".into());

        let template = catalog.get("1").unwrap().template();
        assert_eq!(saved_code(&cfg, &catalog, &ada, "1").unwrap(), template);

        CodeStore::from_config(&cfg).save(&ada, "1", "print('mine')").unwrap();
        assert_eq!(saved_code(&cfg, &catalog, &ada, "1").unwrap(), "print('mine')");
        assert_eq!(saved_code(&cfg, &catalog, &Identity::Anonymous, "1").unwrap(), template);
    }
}
