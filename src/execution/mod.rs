//! Execution engine: wire protocol and result types.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::EngineError;

/// One tagged request to the interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub id: u64,
    pub program: String,
    pub reset: bool,
}

/// Messages emitted by the interpreter, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HostMessage {
    Ready,
    Result {
        id: u64,
        #[serde(default)]
        output: String,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        error: String,
    },
}

impl HostMessage {
    pub fn parse(line: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(line)?)
    }
}

/// What a single request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Captured standard output of a program that ran to completion.
    Output(String),
    /// The program raised; carries the interpreter's error description.
    Failure(String),
    /// Sentinel returned without contacting the interpreter.
    NotReady,
}

impl RunOutcome {
    /// Learner-facing text for a run. Failures are prefixed, never hidden.
    pub fn into_text(self) -> Result<String, EngineError> {
        match self {
            Self::Output(text) if text.is_empty() => {
                Ok("Code executed successfully with no output.".to_string())
            }
            Self::Output(text) => Ok(text),
            Self::Failure(err) => Ok(format!("Error: {}", err)),
            Self::NotReady => Err(EngineError::NotReady),
        }
    }
}

/// Outbound half of the interpreter boundary.
///
/// Replies come back out of band and are handed to
/// [`crate::dispatch::Correlator::deliver`].
pub trait HostChannel: Send + Sync {
    fn post(&self, request: RunRequest) -> Result<(), EngineError>;
}

impl HostChannel for mpsc::UnboundedSender<RunRequest> {
    fn post(&self, request: RunRequest) -> Result<(), EngineError> {
        self.send(request).map_err(|_| EngineError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_reply_shape() {
        assert_eq!(HostMessage::parse(r#"{"type":"ready"}"#).unwrap(), HostMessage::Ready);
        assert_eq!(
            HostMessage::parse(r#"{"type":"result","id":3,"output":"hi\n"}"#).unwrap(),
            HostMessage::Result { id: 3, output: "hi\n".into() }
        );
        assert_eq!(
            HostMessage::parse(r#"{"type":"error","id":4,"error":"NameError: x"}"#).unwrap(),
            HostMessage::Error { id: Some(4), error: "NameError: x".into() }
        );
        assert_eq!(
            HostMessage::parse(r#"{"type":"error","error":"boom"}"#).unwrap(),
            HostMessage::Error { id: None, error: "boom".into() }
        );
    }

    #[test]
    fn rejects_unknown_message_type() {
        assert!(matches!(
            HostMessage::parse(r#"{"type":"progress","id":1}"#),
            Err(EngineError::Protocol(_))
        ));
    }

    #[test]
    fn request_serializes_with_protocol_field_names() {
        let req = RunRequest { id: 7, program: "print(1)".into(), reset: true };
        let value: serde_json::Value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["program"], "print(1)");
        assert_eq!(value["reset"], true);
    }

    #[test]
    fn run_text_prefixes_failures_and_fills_empty_output() {
        assert_eq!(
            RunOutcome::Failure("ZeroDivisionError: division by zero".into()).into_text().unwrap(),
            "Error: ZeroDivisionError: division by zero"
        );
        assert_eq!(
            RunOutcome::Output(String::new()).into_text().unwrap(),
            "Code executed successfully with no output."
        );
        assert!(matches!(RunOutcome::NotReady.into_text(), Err(EngineError::NotReady)));
    }
}
