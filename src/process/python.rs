//! Python interpreter process bootstrap and I/O glue.

use std::{process::Stdio, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, Command},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::execution::{HostChannel, HostMessage, RunRequest};

/// Bootstrap passed to the interpreter with `-c`. Speaks the NDJSON protocol
/// on its own stdin/stdout.
pub const BOOTSTRAP: &str = include_str!("host.py");

/// A running interpreter process with its writer and reader tasks.
pub struct PythonHost {
    child: Child,
    requests: mpsc::UnboundedSender<RunRequest>,
    writer: JoinHandle<()>,
}

impl PythonHost {
    /// Spawns `python` with the bootstrap. Returns the host and the stream of
    /// interpreter messages, which ends when the process closes its stdout.
    pub fn spawn(python: &str) -> Result<(Self, mpsc::UnboundedReceiver<HostMessage>)> {
        let mut cmd = Command::new(python);
        cmd.arg("-u") // unbuffered
            .arg("-c")
            .arg(BOOTSTRAP)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to load Python environment: cannot start '{}'", python))?;
        let stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow!("no stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| anyhow!("no stderr"))?;
        info!(python, pid = child.id(), "python process started");

        let (requests, outbound) = mpsc::unbounded_channel();
        let (events, inbound) = mpsc::unbounded_channel();

        let writer = tokio::spawn(write_requests(stdin, outbound));

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match HostMessage::parse(&line) {
                        Ok(message) => {
                            if events.send(message).is_err() {
                                break;
                            }
                        }
                        Err(err) => warn!(%err, line = %line, "dropping unparseable interpreter line"),
                    },
                    Ok(None) => break,
                    Err(err) => {
                        warn!(%err, "reading interpreter stdout failed");
                        break;
                    }
                }
            }
            debug!("interpreter stdout closed");
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "techcoach::python", "{}", line);
            }
        });

        Ok((Self { child, requests, writer }, inbound))
    }

    /// Outbound channel for a [`crate::dispatch::Correlator`].
    pub fn channel(&self) -> Arc<dyn HostChannel> {
        Arc::new(self.requests.clone())
    }

    /// Closes the interpreter's stdin and waits briefly for it to exit,
    /// killing it otherwise.
    pub async fn shutdown(self) -> Result<()> {
        let Self { mut child, requests, writer } = self;
        drop(requests);
        // Other clones of the sender may still be alive; stop writing anyway.
        writer.abort();
        match tokio::time::timeout(Duration::from_secs(2), child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!(?status, "python process exited");
            }
            Err(_) => {
                warn!("python process did not exit, killing it");
                child.kill().await?;
            }
        }
        Ok(())
    }
}

async fn write_requests(mut stdin: ChildStdin, mut outbound: mpsc::UnboundedReceiver<RunRequest>) {
    while let Some(request) = outbound.recv().await {
        let id = request.id;
        let mut frame = match serde_json::to_string(&request) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(id, %err, "cannot encode run request");
                continue;
            }
        };
        frame.push('\n');
        let written = async {
            stdin.write_all(frame.as_bytes()).await?;
            stdin.flush().await
        };
        if let Err(err) = written.await {
            warn!(id, %err, "writing to interpreter failed");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python() -> Option<&'static str> {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|_| "python3")
    }

    async fn next(events: &mut mpsc::UnboundedReceiver<HostMessage>) -> HostMessage {
        tokio::time::timeout(Duration::from_secs(30), events.recv())
            .await
            .expect("interpreter timed out")
            .expect("interpreter stream closed")
    }

    #[tokio::test]
    async fn speaks_the_protocol_end_to_end() {
        let Some(python) = python() else {
            eprintln!("python3 not available, skipping");
            return;
        };
        let (host, mut events) = PythonHost::spawn(python).unwrap();
        assert_eq!(next(&mut events).await, HostMessage::Ready);

        let channel = host.channel();
        channel.post(RunRequest { id: 1, program: "x = 41\nprint(x + 1)".into(), reset: false }).unwrap();
        assert_eq!(next(&mut events).await, HostMessage::Result { id: 1, output: "42\n".into() });

        // State persists between requests until a reset.
        channel.post(RunRequest { id: 2, program: "print(x)".into(), reset: false }).unwrap();
        assert_eq!(next(&mut events).await, HostMessage::Result { id: 2, output: "41\n".into() });

        channel.post(RunRequest { id: 3, program: "print(x)".into(), reset: true }).unwrap();
        assert_eq!(
            next(&mut events).await,
            HostMessage::Error { id: Some(3), error: "NameError: name 'x' is not defined".into() }
        );

        host.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn learner_stdin_and_raw_stdout_cannot_touch_the_protocol() {
        let Some(python) = python() else {
            eprintln!("python3 not available, skipping");
            return;
        };
        let (host, mut events) = PythonHost::spawn(python).unwrap();
        assert_eq!(next(&mut events).await, HostMessage::Ready);

        let channel = host.channel();
        channel
            .post(RunRequest {
                id: 9,
                program: "import sys\nsys.__stdout__.write('{\"type\":\"ready\"}\\n')\ninput()".into(),
                reset: false,
            })
            .unwrap();
        assert_eq!(
            next(&mut events).await,
            HostMessage::Error { id: Some(9), error: "EOFError: EOF when reading a line".into() }
        );

        host.shutdown().await.unwrap();
    }

    #[test]
    fn missing_interpreter_is_reported() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let result = rt.block_on(async { PythonHost::spawn("definitely-not-a-python-binary").map(|_| ()) });
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Failed to load Python environment"), "{err}");
    }
}
