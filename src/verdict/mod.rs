//! Verdict classification over the harness text contract.
//!
//! The harness prints exactly one `PASS:` or `FAIL:` line as its last output.
//! Everything downstream works on [`Verdict`]; raw text is parsed here only.

use serde::{Deserialize, Serialize};

pub const PASS_MARKER: &str = "PASS:";
pub const FAIL_MARKER: &str = "FAIL:";

pub const UNRESOLVED_MESSAGE: &str = "Your solution could not be properly evaluated. \
Please review your code and make sure it implements all required functionality.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub message: String,
    pub raw_output: String,
}

impl Verdict {
    /// Classifies captured output. Any `FAIL:` disqualifies, wherever it
    /// appears; a pass needs at least one `PASS:` and no `FAIL:`; text with
    /// neither marker is a failure.
    pub fn from_raw(raw: &str) -> Self {
        let (passed, message) = match (first_marker_line(raw, PASS_MARKER), first_marker_line(raw, FAIL_MARKER)) {
            (_, Some(fail)) => (false, fail),
            (Some(pass), None) => (true, pass),
            (None, None) => (false, UNRESOLVED_MESSAGE.to_string()),
        };
        Self { passed, message, raw_output: raw.to_string() }
    }

    /// Whether the failure came from the grading routine rather than the
    /// learner's code.
    pub fn is_internal_error(&self) -> bool {
        !self.passed && self.message.starts_with(crate::harness::INTERNAL_ERROR_PREFIX)
    }
}

/// The first line holding `marker`, from the marker to the end of the line.
fn first_marker_line(raw: &str, marker: &str) -> Option<String> {
    raw.lines().find_map(|line| {
        line.find(marker)
            .map(|pos| line[pos..].trim_end().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_line_becomes_the_message() {
        let v = Verdict::from_raw("warming up\nPASS: All test cases passed for reverse_string!\n");
        assert!(v.passed);
        assert_eq!(v.message, "PASS: All test cases passed for reverse_string!");
        assert!(v.raw_output.starts_with("warming up"));
    }

    #[test]
    fn fail_wins_regardless_of_position() {
        let v = Verdict::from_raw("...FAIL: boundary case\n...PASS: main case");
        assert!(!v.passed);
        assert_eq!(v.message, "FAIL: boundary case");

        let v = Verdict::from_raw("PASS: main case\nFAIL: boundary case\n");
        assert!(!v.passed);
        assert_eq!(v.message, "FAIL: boundary case");
    }

    #[test]
    fn first_fail_line_is_reported() {
        let v = Verdict::from_raw("FAIL: first\nFAIL: second\n");
        assert_eq!(v.message, "FAIL: first");
    }

    #[test]
    fn no_marker_is_never_a_pass() {
        for raw in ["", "Error: NameError: name 'x' is not defined", "pass: lowercase"] {
            let v = Verdict::from_raw(raw);
            assert!(!v.passed, "{raw:?}");
            assert_eq!(v.message, UNRESOLVED_MESSAGE);
        }
    }

    #[test]
    fn internal_errors_are_distinguishable() {
        let v = Verdict::from_raw("FAIL: Internal grading error: KeyError: 'x'");
        assert!(v.is_internal_error());
        let v = Verdict::from_raw("FAIL: Error when testing your code: boom");
        assert!(!v.is_internal_error());
    }
}
