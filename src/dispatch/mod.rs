//! Dispatch correlator: tags every run request with a fresh id and hands the
//! matching reply back to whoever is waiting on it.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    error::EngineError,
    execution::{HostChannel, HostMessage, RunOutcome, RunRequest},
};

/// Lifecycle of the interpreter as seen from this side of the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostState {
    Loading,
    Ready,
    Failed(String),
}

pub struct Correlator {
    host: Arc<dyn HostChannel>,
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<RunOutcome>>>,
    state: watch::Sender<HostState>,
}

impl Correlator {
    pub fn new(host: Arc<dyn HostChannel>) -> Self {
        let (state, _) = watch::channel(HostState::Loading);
        Self {
            host,
            next_id: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
            state,
        }
    }

    pub fn state(&self) -> HostState {
        self.state.borrow().clone()
    }

    /// Sends `program` to the interpreter and waits for its tagged reply.
    ///
    /// Before the ready signal this resolves to [`RunOutcome::NotReady`]
    /// without registering anything. Replies are matched by id only, so
    /// concurrent callers may complete in any order.
    pub async fn send(&self, program: String, reset: bool) -> Result<RunOutcome, EngineError> {
        match self.state() {
            HostState::Loading => return Ok(RunOutcome::NotReady),
            HostState::Failed(reason) => return Err(EngineError::HostFailed(reason)),
            HostState::Ready => {}
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        debug!(id, reset, bytes = program.len(), "dispatching run request");
        if let Err(err) = self.host.post(RunRequest { id, program, reset }) {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }

        rx.await.map_err(|_| EngineError::Cancelled { id })
    }

    /// Routes one interpreter message to its continuation.
    pub async fn deliver(&self, message: HostMessage) {
        match message {
            HostMessage::Ready => {
                info!("python environment ready");
                self.state.send_replace(HostState::Ready);
            }
            HostMessage::Result { id, output } => self.resolve(id, RunOutcome::Output(output)).await,
            HostMessage::Error { id: Some(id), error } => {
                self.resolve(id, RunOutcome::Failure(error)).await
            }
            HostMessage::Error { id: None, error } => {
                error!(%error, "python environment failed");
                self.cancel_pending(&error).await;
                self.state.send_replace(HostState::Failed(error));
            }
        }
    }

    async fn resolve(&self, id: u64, outcome: RunOutcome) {
        let waiter = self.pending.lock().await.remove(&id);
        match waiter {
            Some(tx) => {
                if tx.send(outcome).is_err() {
                    debug!(id, "caller went away before its reply arrived");
                }
            }
            None => debug!(id, "discarding reply with no pending request"),
        }
    }

    /// Drops every registered continuation; their callers see `Cancelled`.
    async fn cancel_pending(&self, reason: &str) {
        let cancelled: Vec<u64> = {
            let mut pending = self.pending.lock().await;
            pending.drain().map(|(id, _)| id).collect()
        };
        if !cancelled.is_empty() {
            warn!(count = cancelled.len(), %reason, "cancelling pending run requests");
        }
    }

    /// Cancels every pending continuation and marks the host failed.
    pub async fn teardown(&self, reason: &str) {
        self.cancel_pending(reason).await;
        self.state.send_if_modified(|state| {
            if matches!(state, HostState::Failed(_)) {
                return false;
            }
            *state = HostState::Failed(reason.to_string());
            true
        });
    }

    /// Suspends until the interpreter is ready, has failed, or `timeout` elapses.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), EngineError> {
        let mut rx = self.state.subscribe();
        let wait = async {
            loop {
                let state = rx.borrow_and_update().clone();
                match state {
                    HostState::Ready => return Ok(()),
                    HostState::Failed(reason) => return Err(EngineError::HostFailed(reason)),
                    HostState::Loading => {}
                }
                if rx.changed().await.is_err() {
                    return Err(EngineError::ChannelClosed);
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .unwrap_or(Err(EngineError::NotReady))
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Feeds interpreter messages into the correlator until the stream ends,
    /// then tears down whatever is still pending.
    pub async fn pump(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<HostMessage>) {
        while let Some(message) = events.recv().await {
            self.deliver(message).await;
        }
        self.teardown("python process exited").await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correlator() -> (Arc<Correlator>, mpsc::UnboundedReceiver<RunRequest>) {
        let (tx, rx) = mpsc::unbounded_channel::<RunRequest>();
        (Arc::new(Correlator::new(Arc::new(tx))), rx)
    }

    #[tokio::test]
    async fn send_before_ready_returns_sentinel_without_registering() {
        let (c, mut posted) = correlator();
        let outcome = c.send("print(1)".into(), false).await.unwrap();
        assert_eq!(outcome, RunOutcome::NotReady);
        assert_eq!(c.pending_count().await, 0);
        assert!(posted.try_recv().is_err());
    }

    #[tokio::test]
    async fn replies_are_matched_by_id_not_arrival_order() {
        let (c, mut posted) = correlator();
        c.deliver(HostMessage::Ready).await;

        let first = tokio::spawn({
            let c = c.clone();
            async move { c.send("a".into(), false).await }
        });
        let a = posted.recv().await.unwrap();
        let second = tokio::spawn({
            let c = c.clone();
            async move { c.send("b".into(), true).await }
        });
        let b = posted.recv().await.unwrap();
        assert!(b.id > a.id);
        assert!(b.reset);

        c.deliver(HostMessage::Result { id: b.id, output: "from b".into() }).await;
        c.deliver(HostMessage::Result { id: a.id, output: "from a".into() }).await;

        assert_eq!(first.await.unwrap().unwrap(), RunOutcome::Output("from a".into()));
        assert_eq!(second.await.unwrap().unwrap(), RunOutcome::Output("from b".into()));
        assert_eq!(c.pending_count().await, 0);
    }

    #[tokio::test]
    async fn duplicate_and_unknown_replies_are_discarded() {
        let (c, mut posted) = correlator();
        c.deliver(HostMessage::Ready).await;

        let waiter = tokio::spawn({
            let c = c.clone();
            async move { c.send("x = 1".into(), false).await }
        });
        let req = posted.recv().await.unwrap();

        c.deliver(HostMessage::Result { id: req.id + 100, output: "stale".into() }).await;
        c.deliver(HostMessage::Result { id: req.id, output: "first".into() }).await;
        c.deliver(HostMessage::Result { id: req.id, output: "second".into() }).await;

        assert_eq!(waiter.await.unwrap().unwrap(), RunOutcome::Output("first".into()));
        assert_eq!(c.pending_count().await, 0);
    }

    #[tokio::test]
    async fn tagged_error_resolves_as_failure() {
        let (c, mut posted) = correlator();
        c.deliver(HostMessage::Ready).await;
        let waiter = tokio::spawn({
            let c = c.clone();
            async move { c.send("1/0".into(), false).await }
        });
        let req = posted.recv().await.unwrap();
        c.deliver(HostMessage::Error {
            id: Some(req.id),
            error: "ZeroDivisionError: division by zero".into(),
        })
        .await;
        assert_eq!(
            waiter.await.unwrap().unwrap(),
            RunOutcome::Failure("ZeroDivisionError: division by zero".into())
        );
    }

    #[tokio::test]
    async fn untagged_error_puts_host_in_failed_state() {
        let (c, _posted) = correlator();
        c.deliver(HostMessage::Error { id: None, error: "no interpreter".into() }).await;
        assert_eq!(c.state(), HostState::Failed("no interpreter".into()));
        let err = c.send("print(1)".into(), false).await.unwrap_err();
        assert!(matches!(err, EngineError::HostFailed(ref r) if r == "no interpreter"));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn untagged_error_cancels_requests_in_flight() {
        let (c, mut posted) = correlator();
        c.deliver(HostMessage::Ready).await;
        let waiter = tokio::spawn({
            let c = c.clone();
            async move { c.send("import time; time.sleep(60)".into(), false).await }
        });
        let req = posted.recv().await.unwrap();

        c.deliver(HostMessage::Error { id: None, error: "MemoryError: ".into() }).await;
        assert!(matches!(
            waiter.await.unwrap(),
            Err(EngineError::Cancelled { id }) if id == req.id
        ));
        assert_eq!(c.pending_count().await, 0);
        assert_eq!(c.state(), HostState::Failed("MemoryError: ".into()));

        // the tagged reply that arrives later resolves nothing
        c.deliver(HostMessage::Result { id: req.id, output: "late".into() }).await;
        assert_eq!(c.pending_count().await, 0);
    }

    #[tokio::test]
    async fn teardown_cancels_every_pending_request_once() {
        let (c, mut posted) = correlator();
        c.deliver(HostMessage::Ready).await;
        let waiter = tokio::spawn({
            let c = c.clone();
            async move { c.send("while True: pass".into(), false).await }
        });
        let req = posted.recv().await.unwrap();

        c.teardown("python process exited").await;
        assert!(matches!(
            waiter.await.unwrap(),
            Err(EngineError::Cancelled { id }) if id == req.id
        ));
        assert_eq!(c.pending_count().await, 0);

        // late reply for the cancelled id goes nowhere
        c.deliver(HostMessage::Result { id: req.id, output: "late".into() }).await;
        assert_eq!(c.state(), HostState::Failed("python process exited".into()));
    }

    #[tokio::test]
    async fn reply_for_abandoned_caller_is_tolerated() {
        let (c, mut posted) = correlator();
        c.deliver(HostMessage::Ready).await;
        let waiter = tokio::spawn({
            let c = c.clone();
            async move { c.send("print('bye')".into(), false).await }
        });
        let req = posted.recv().await.unwrap();
        waiter.abort();
        let _ = waiter.await;

        c.deliver(HostMessage::Result { id: req.id, output: "bye\n".into() }).await;
        assert_eq!(c.pending_count().await, 0);
    }

    #[tokio::test]
    async fn wait_ready_tracks_the_ready_signal() {
        let (c, _posted) = correlator();
        assert!(matches!(
            c.wait_ready(Duration::from_millis(20)).await,
            Err(EngineError::NotReady)
        ));

        let waiter = tokio::spawn({
            let c = c.clone();
            async move { c.wait_ready(Duration::from_secs(5)).await }
        });
        c.deliver(HostMessage::Ready).await;
        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn pump_tears_down_when_the_stream_closes() {
        let (c, mut posted) = correlator();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(c.clone().pump(events_rx));

        events_tx.send(HostMessage::Ready).unwrap();
        c.wait_ready(Duration::from_secs(5)).await.unwrap();

        let waiter = tokio::spawn({
            let c = c.clone();
            async move { c.send("pass".into(), false).await }
        });
        let _ = posted.recv().await.unwrap();
        drop(events_tx);
        pump.await.unwrap();

        assert!(matches!(waiter.await.unwrap(), Err(EngineError::Cancelled { .. })));
        assert!(matches!(c.state(), HostState::Failed(_)));
    }
}
