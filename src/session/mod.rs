//! Session lifecycle: who is coding, on which exercise, and when the
//! interpreter's accumulated state has to be thrown away.
//!
//! The controller is a plain state machine. It never talks to the
//! interpreter itself; operations that require a reset say so in their return
//! value and the engine carries it out.

use std::fmt;

use crate::verdict::Verdict;

/// The learner the editor currently belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Identity {
    #[default]
    Anonymous,
    User(String),
}

impl Identity {
    pub fn from_user(user: Option<String>) -> Self {
        match user {
            Some(id) if !id.trim().is_empty() => Self::User(id.trim().to_string()),
            _ => Self::Anonymous,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self, Self::User(_))
    }

    /// Key used by the snapshot and progress stores.
    pub fn storage_key(&self) -> &str {
        match self {
            Self::Anonymous => "anonymous",
            Self::User(id) => id,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_key())
    }
}

#[derive(Debug, Clone)]
pub struct SessionController {
    identity: Identity,
    exercise_id: String,
    template: String,
    code: String,
    verdict: Option<Verdict>,
    first_load: bool,
    reset_pending: bool,
}

impl SessionController {
    pub fn new(identity: Identity, exercise_id: impl Into<String>, template: impl Into<String>) -> Self {
        let template = template.into();
        Self {
            identity,
            exercise_id: exercise_id.into(),
            code: template.clone(),
            template,
            verdict: None,
            first_load: true,
            reset_pending: false,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn exercise_id(&self) -> &str {
        &self.exercise_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        self.verdict.as_ref()
    }

    pub fn is_first_load(&self) -> bool {
        self.first_load
    }

    pub fn reset_pending(&self) -> bool {
        self.reset_pending
    }

    /// Sign-in, sign-out or account switch. Returns `true` when the identity
    /// actually changed, in which case the interpreter must be reset before
    /// anything else runs.
    pub fn switch_identity(&mut self, identity: Identity) -> bool {
        if self.identity == identity {
            return false;
        }
        self.identity = identity;
        self.code = self.template.clone();
        self.verdict = None;
        self.first_load = true;
        // Stays armed until the engine confirms the reset reached the host.
        self.reset_pending = true;
        true
    }

    /// Moves the editor to another exercise. No reset is sent now; the next
    /// run carries the reset flag instead.
    pub fn switch_exercise(&mut self, exercise_id: &str, template: impl Into<String>) -> bool {
        if self.exercise_id == exercise_id {
            return false;
        }
        self.exercise_id = exercise_id.to_string();
        self.template = template.into();
        self.code = self.template.clone();
        self.verdict = None;
        self.first_load = true;
        self.reset_pending = true;
        true
    }

    /// Applies the persisted snapshot for the current identity and exercise,
    /// once per first load. Returns `true` if the snapshot replaced the code.
    pub fn load_snapshot(&mut self, saved: Option<String>) -> bool {
        if !self.first_load {
            return false;
        }
        self.first_load = false;
        match saved {
            Some(code) if self.identity.is_signed_in() => {
                self.code = code;
                true
            }
            _ => {
                self.code = self.template.clone();
                false
            }
        }
    }

    /// Replaces the editor text. Returns whether listeners should hear about
    /// it, which is never the case during the first load.
    pub fn edit(&mut self, code: impl Into<String>) -> bool {
        self.code = code.into();
        self.verdict = None;
        !self.first_load
    }

    /// Restores the exercise's default template and returns it.
    pub fn reset_code(&mut self) -> &str {
        self.code = self.template.clone();
        self.verdict = None;
        &self.template
    }

    /// Whether the editor text should be written to the snapshot store.
    pub fn should_persist(&self) -> bool {
        self.identity.is_signed_in() && !self.first_load
    }

    /// Consumes the pending-reset flag for a run.
    pub fn take_run_reset(&mut self) -> bool {
        std::mem::take(&mut self.reset_pending)
    }

    /// Re-arms the flag when a reset-tagged request never reached the host.
    pub fn rearm_reset(&mut self) {
        self.reset_pending = true;
    }

    /// A reset-tagged request was executed by the host.
    pub fn host_was_reset(&mut self) {
        self.reset_pending = false;
    }

    pub fn record_verdict(&mut self, verdict: Verdict) {
        self.verdict = Some(verdict);
    }
}
