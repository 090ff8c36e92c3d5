//! Execution and grading engine: the public `run`/`submit`/`reset`
//! operations over one interpreter and one editor session.

use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::{
    catalog::{Catalog, Exercise},
    config::Config,
    dispatch::{Correlator, HostState},
    error::EngineError,
    execution::{RunOutcome, RunRequest},
    harness::{Action, Harness},
    process::PythonHost,
    session::{Identity, SessionController},
    store::{CodeStore, ProgressSink, ProgressStore, SnapshotStore},
    verdict::Verdict,
};

/// Program sent to wipe interpreter state on an identity change.
const RESET_PROGRAM: &str = "# Reset environment";

pub struct Engine {
    correlator: Arc<Correlator>,
    session: SessionController,
    harness: Harness,
    catalog: Catalog,
    snapshots: Arc<dyn SnapshotStore>,
    progress: Arc<dyn ProgressSink>,
    host: Option<PythonHost>,
}

impl Engine {
    /// Engine over an already-wired correlator. Loads the snapshot for the
    /// starting identity and exercise.
    pub fn new(
        correlator: Arc<Correlator>,
        catalog: Catalog,
        snapshots: Arc<dyn SnapshotStore>,
        progress: Arc<dyn ProgressSink>,
        identity: Identity,
        exercise_id: &str,
    ) -> Result<Self, EngineError> {
        let exercise = catalog.get(exercise_id)?;
        let session = SessionController::new(identity, exercise.id.clone(), exercise.template());
        let mut engine = Self {
            correlator,
            session,
            harness: Harness::builtin(),
            catalog,
            snapshots,
            progress,
            host: None,
        };
        engine.load_snapshot();
        Ok(engine)
    }

    /// Spawns the interpreter from config and waits for its ready signal.
    ///
    /// A host that is still loading when the timeout elapses is not an error:
    /// operations report "still loading" until it is ready.
    pub async fn start(cfg: &Config, catalog: Catalog, identity: Identity, exercise_id: &str) -> Result<Self> {
        let (host, events) = PythonHost::spawn(&cfg.python_bin())?;
        let correlator = Arc::new(Correlator::new(host.channel()));
        tokio::spawn(correlator.clone().pump(events));

        match correlator.wait_ready(cfg.host_start_timeout()).await {
            Ok(()) => {}
            Err(EngineError::NotReady) => warn!("python environment still loading after startup timeout"),
            Err(err) => bail!(err),
        }

        let mut engine = Self::new(
            correlator,
            catalog,
            Arc::new(CodeStore::from_config(cfg)),
            Arc::new(ProgressStore::from_config(cfg)),
            identity,
            exercise_id,
        )?;
        engine.host = Some(host);
        Ok(engine)
    }

    /// Engine with no interpreter attached, for editor-only operations such
    /// as `reset`. Anything that needs the interpreter fails as host-failed.
    pub async fn offline(cfg: &Config, catalog: Catalog, identity: Identity, exercise_id: &str) -> Result<Self> {
        let (requests, _) = mpsc::unbounded_channel::<RunRequest>();
        let correlator = Arc::new(Correlator::new(Arc::new(requests)));
        correlator.teardown("no interpreter attached").await;
        Ok(Self::new(
            correlator,
            catalog,
            Arc::new(CodeStore::from_config(cfg)),
            Arc::new(ProgressStore::from_config(cfg)),
            identity,
            exercise_id,
        )?)
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn harness(&self) -> &Harness {
        &self.harness
    }

    pub fn host_state(&self) -> HostState {
        self.correlator.state()
    }

    /// Descriptor of the current exercise.
    pub fn exercise(&self) -> Result<&Exercise, EngineError> {
        self.catalog.get(self.session.exercise_id())
    }

    /// Runs the learner's source as-is and returns the text to show them.
    pub async fn run(&mut self, exercise_id: &str, source: &str) -> Result<String, EngineError> {
        self.switch_exercise(exercise_id)?;
        self.edit(source);

        let reset = self.session.take_run_reset();
        let program = self.harness.program(Action::Run, self.session.exercise_id(), source);
        let outcome = self.dispatch(program, reset, reset).await?;
        outcome.into_text()
    }

    /// Runs the learner's source under the exercise's verification routine on
    /// a freshly reset interpreter.
    pub async fn submit(&mut self, exercise_id: &str, source: &str) -> Result<Verdict, EngineError> {
        self.switch_exercise(exercise_id)?;
        self.edit(source);

        // A submit resets anyway, so it also satisfies any pending reset.
        let pending = self.session.take_run_reset();
        let program = self.harness.program(Action::Submit, self.session.exercise_id(), source);
        let outcome = self.dispatch(program, true, pending).await?;

        let verdict = match outcome {
            RunOutcome::Output(text) => Verdict::from_raw(&text),
            // The combined program never reached its epilogue.
            RunOutcome::Failure(error) => Verdict::from_raw(&format!("Error: {}", error)),
            RunOutcome::NotReady => return Err(EngineError::NotReady),
        };

        if verdict.is_internal_error() {
            warn!(exercise_id = self.session.exercise_id(), message = %verdict.message, "verification routine failed");
        }
        info!(
            identity = %self.session.identity(),
            exercise_id = self.session.exercise_id(),
            passed = verdict.passed,
            "submission graded"
        );
        if verdict.passed {
            if let Err(err) = self.progress.mark_completed(self.session.identity(), self.session.exercise_id()) {
                warn!(%err, "could not record completion");
            }
        }
        self.session.record_verdict(verdict.clone());
        Ok(verdict)
    }

    /// Restores the exercise's default template and returns it.
    pub fn reset(&mut self, exercise_id: &str) -> Result<String, EngineError> {
        self.switch_exercise(exercise_id)?;
        let template = self.session.reset_code().to_string();
        self.persist();
        Ok(template)
    }

    /// Replaces the editor text, saving a snapshot for signed-in learners.
    pub fn edit(&mut self, code: &str) {
        if self.session.code() == code {
            return;
        }
        if self.session.edit(code) {
            self.persist();
        }
    }

    /// Moves to another exercise. The next run carries the reset flag.
    pub fn switch_exercise(&mut self, exercise_id: &str) -> Result<bool, EngineError> {
        let exercise = self.catalog.get(exercise_id)?;
        if exercise.id == self.session.exercise_id() {
            return Ok(false);
        }
        let (id, template) = (exercise.id.clone(), exercise.template());
        self.session.switch_exercise(&id, template);
        info!(exercise_id = %id, "switched exercise, next run resets the interpreter");
        self.load_snapshot();
        Ok(true)
    }

    /// Sign-in, sign-out or account switch. Wipes the editor, resets the
    /// interpreter and loads the new identity's snapshot.
    pub async fn switch_identity(&mut self, identity: Identity) -> Result<bool, EngineError> {
        if !self.session.switch_identity(identity) {
            return Ok(false);
        }
        info!(identity = %self.session.identity(), "identity changed, resetting interpreter");
        self.load_snapshot();

        match self.correlator.send(RESET_PROGRAM.to_string(), true).await {
            Ok(RunOutcome::NotReady) => {
                warn!("interpreter not ready, reset deferred to the next run");
            }
            Ok(_) => self.session.host_was_reset(),
            Err(err) => {
                warn!(%err, "reset request failed, reset deferred to the next run");
                return Err(err);
            }
        }
        Ok(true)
    }

    /// Closes the interpreter, if this engine owns one.
    pub async fn shutdown(self) -> Result<()> {
        let pending = self.correlator.pending_count().await;
        if pending > 0 {
            warn!(pending, "shutting down with requests still in flight");
        }
        if let Some(host) = self.host {
            host.shutdown().await?;
        }
        Ok(())
    }

    /// Sends one program. When it never reaches the interpreter and `rearm`
    /// is set, the pending reset is kept for the next run.
    async fn dispatch(&mut self, program: String, reset: bool, rearm: bool) -> Result<RunOutcome, EngineError> {
        let result = match self.correlator.send(program, reset).await {
            Ok(RunOutcome::NotReady) => Err(EngineError::NotReady),
            other => other,
        };
        if result.is_err() && rearm {
            self.session.rearm_reset();
        }
        result
    }

    fn load_snapshot(&mut self) {
        if !self.session.is_first_load() {
            return;
        }
        let saved = if self.session.identity().is_signed_in() {
            match self.snapshots.load(self.session.identity(), self.session.exercise_id()) {
                Ok(saved) => saved,
                Err(err) => {
                    warn!(%err, "could not load code snapshot");
                    None
                }
            }
        } else {
            None
        };
        self.session.load_snapshot(saved);
    }

    fn persist(&self) {
        if !self.session.should_persist() {
            return;
        }
        if let Err(err) = self
            .snapshots
            .save(self.session.identity(), self.session.exercise_id(), self.session.code())
        {
            warn!(%err, "could not save code snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::Mutex as StdMutex,
    };

    use super::*;
    use crate::execution::HostMessage;

    const HELLO: &str = "def hello_world():\n    return \"Hello, World!\"";

    #[derive(Default)]
    struct MemorySnapshots(StdMutex<HashMap<(String, String), String>>);

    impl SnapshotStore for MemorySnapshots {
        fn load(&self, identity: &Identity, exercise_id: &str) -> Result<Option<String>> {
            let key = (identity.storage_key().to_string(), exercise_id.to_string());
            Ok(self.0.lock().unwrap().get(&key).cloned())
        }

        fn save(&self, identity: &Identity, exercise_id: &str, code: &str) -> Result<()> {
            let key = (identity.storage_key().to_string(), exercise_id.to_string());
            self.0.lock().unwrap().insert(key, code.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryProgress(StdMutex<Vec<(String, String)>>);

    impl ProgressSink for MemoryProgress {
        fn mark_completed(&self, identity: &Identity, exercise_id: &str) -> Result<()> {
            self.0.lock().unwrap().push((identity.storage_key().to_string(), exercise_id.to_string()));
            Ok(())
        }
    }

    /// Programs starting with `raise` fail outright; graded programs pass
    /// only for the reference hello world; everything else echoes its text.
    fn scripted_reply(request: &RunRequest) -> HostMessage {
        let id = request.id;
        if request.program.starts_with("raise") {
            return HostMessage::Error { id: Some(id), error: "ValueError: boom".into() };
        }
        if request.program.contains("__coach_verdict") {
            let line = if request.program.contains("return \"Hello, World!\"") {
                "PASS: Your hello_world function correctly returns 'Hello, World!'\n"
            } else {
                "FAIL: hello_world() expected 'Hello, World!', got None\n"
            };
            return HostMessage::Result { id, output: line.into() };
        }
        HostMessage::Result { id, output: request.program.clone() }
    }

    struct Rig {
        engine: Engine,
        correlator: Arc<Correlator>,
        requests: Arc<StdMutex<Vec<RunRequest>>>,
        snapshots: Arc<MemorySnapshots>,
        progress: Arc<MemoryProgress>,
    }

    impl Rig {
        fn sent(&self) -> Vec<RunRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    fn rig(identity: Identity) -> Rig {
        let (tx, mut rx) = mpsc::unbounded_channel::<RunRequest>();
        let correlator = Arc::new(Correlator::new(Arc::new(tx)));
        let requests = Arc::new(StdMutex::new(Vec::new()));
        tokio::spawn({
            let (correlator, requests) = (correlator.clone(), requests.clone());
            async move {
                while let Some(request) = rx.recv().await {
                    let reply = scripted_reply(&request);
                    requests.lock().unwrap().push(request);
                    correlator.deliver(reply).await;
                }
            }
        });
        let snapshots = Arc::new(MemorySnapshots::default());
        let progress = Arc::new(MemoryProgress::default());
        let engine = Engine::new(
            correlator.clone(),
            Catalog::embedded().unwrap(),
            snapshots.clone(),
            progress.clone(),
            identity,
            "1",
        )
        .unwrap();
        Rig { engine, correlator, requests, snapshots, progress }
    }

    async fn ready_rig(identity: Identity) -> Rig {
        let rig = rig(identity);
        rig.correlator.deliver(HostMessage::Ready).await;
        rig
    }

    #[tokio::test]
    async fn run_before_ready_reports_loading_and_keeps_the_reset() {
        let mut rig = rig(Identity::Anonymous);
        rig.engine.switch_exercise("2").unwrap();

        let err = rig.engine.run("2", "print('hi')").await.unwrap_err();
        assert!(matches!(err, EngineError::NotReady));
        assert_eq!(err.to_string(), "Python environment is still loading. Please wait...");
        assert!(rig.engine.session().reset_pending());

        rig.correlator.deliver(HostMessage::Ready).await;
        rig.engine.run("2", "print('hi')").await.unwrap();
        assert!(rig.sent()[0].reset);
    }

    #[tokio::test]
    async fn run_returns_output_or_prefixed_error_text() {
        let mut rig = ready_rig(Identity::Anonymous).await;
        assert_eq!(rig.engine.run("1", "print('hi')").await.unwrap(), "print('hi')");
        assert_eq!(
            rig.engine.run("1", "raise ValueError('boom')").await.unwrap(),
            "Error: ValueError: boom"
        );
        assert!(rig.sent().iter().all(|r| !r.reset));
    }

    #[tokio::test]
    async fn exercise_change_resets_only_the_next_run() {
        let mut rig = ready_rig(Identity::Anonymous).await;
        rig.engine.run("1", "x = 1").await.unwrap();
        rig.engine.run("2", "y = 2").await.unwrap();
        rig.engine.run("2", "z = 3").await.unwrap();
        let resets: Vec<bool> = rig.sent().iter().map(|r| r.reset).collect();
        assert_eq!(resets, vec![false, true, false]);
    }

    #[tokio::test]
    async fn submit_always_resets_and_records_passes() {
        let mut rig = ready_rig(Identity::User("ada".into())).await;

        let verdict = rig.engine.submit("1", "def hello_world():\n    return None").await.unwrap();
        assert!(!verdict.passed);
        assert!(rig.progress.0.lock().unwrap().is_empty());

        let verdict = rig.engine.submit("1", HELLO).await.unwrap();
        assert!(verdict.passed);
        assert!(verdict.message.starts_with("PASS:"));
        assert_eq!(rig.engine.session().verdict(), Some(&verdict));
        assert_eq!(*rig.progress.0.lock().unwrap(), vec![("ada".to_string(), "1".to_string())]);

        let sent = rig.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|r| r.reset));
        assert!(sent[1].program.starts_with(HELLO));
    }

    #[tokio::test]
    async fn submit_that_never_reaches_the_epilogue_is_unresolved() {
        let mut rig = ready_rig(Identity::Anonymous).await;
        let verdict = rig.engine.submit("24", "raise SyntaxError('bad')").await.unwrap();
        assert!(!verdict.passed);
        assert_eq!(verdict.message, crate::verdict::UNRESOLVED_MESSAGE);
        assert_eq!(verdict.raw_output, "Error: ValueError: boom");
    }

    #[tokio::test]
    async fn identity_switch_resets_the_interpreter_immediately() {
        let mut rig = ready_rig(Identity::User("ada".into())).await;
        rig.snapshots
            .save(&Identity::User("grace".into()), "1", "print('grace was here')")
            .unwrap();
        rig.engine.edit("print('ada was here')");

        assert!(rig.engine.switch_identity(Identity::User("grace".into())).await.unwrap());
        let sent = rig.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].reset);
        assert_eq!(sent[0].program, "# Reset environment");
        assert!(!rig.engine.session().reset_pending());
        assert_eq!(rig.engine.session().code(), "print('grace was here')");

        assert!(!rig.engine.switch_identity(Identity::User("grace".into())).await.unwrap());
        assert_eq!(rig.sent().len(), 1);
    }

    #[tokio::test]
    async fn identity_switch_before_ready_defers_the_reset() {
        let mut rig = rig(Identity::User("ada".into()));
        assert!(rig.engine.switch_identity(Identity::Anonymous).await.unwrap());
        assert!(rig.sent().is_empty());
        assert!(rig.engine.session().reset_pending());

        rig.correlator.deliver(HostMessage::Ready).await;
        rig.engine.run("1", "print(1)").await.unwrap();
        assert!(rig.sent()[0].reset);
    }

    #[tokio::test]
    async fn snapshots_follow_signed_in_edits_only() {
        let mut rig = ready_rig(Identity::User("ada".into())).await;
        rig.engine.edit("draft");
        assert_eq!(
            rig.snapshots.load(&Identity::User("ada".into()), "1").unwrap().as_deref(),
            Some("draft")
        );

        rig.engine.switch_identity(Identity::Anonymous).await.unwrap();
        rig.engine.edit("anonymous draft");
        assert_eq!(rig.snapshots.load(&Identity::Anonymous, "1").unwrap(), None);
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let mut rig = ready_rig(Identity::User("ada".into())).await;
        rig.engine.edit("broken");
        let first = rig.engine.reset("1").unwrap();
        let second = rig.engine.reset("1").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, rig.engine.exercise().unwrap().template());
        assert!(rig.sent().is_empty());
    }

    #[tokio::test]
    async fn unknown_exercise_is_rejected() {
        let mut rig = ready_rig(Identity::Anonymous).await;
        assert!(matches!(
            rig.engine.run("nope", "print(1)").await,
            Err(EngineError::UnknownExercise(_))
        ));
    }
}
