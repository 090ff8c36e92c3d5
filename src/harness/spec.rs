//! Typed verification specs. These are the source of truth for grading; the
//! renderer in the parent module turns them into Python only when a submit
//! program is built.

use serde::{Deserialize, Serialize};

/// A Python literal used as a call argument or an expected value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PyValue {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<PyValue>),
    Tuple(Vec<PyValue>),
    Dict(Vec<(PyValue, PyValue)>),
}

impl PyValue {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    pub fn ints(values: &[i64]) -> Self {
        Self::List(values.iter().copied().map(Self::Int).collect())
    }

    pub fn strs(values: &[&str]) -> Self {
        Self::List(values.iter().map(|s| Self::str(*s)).collect())
    }

    /// Renders the value as Python source.
    pub fn to_python(&self) -> String {
        match self {
            Self::None => "None".to_string(),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::Int(n) => n.to_string(),
            Self::Str(s) => quote(s),
            Self::List(items) => format!("[{}]", join(items)),
            Self::Tuple(items) if items.len() == 1 => format!("({},)", items[0].to_python()),
            Self::Tuple(items) => format!("({})", join(items)),
            Self::Dict(entries) => {
                let body = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.to_python(), v.to_python()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{{}}}", body)
            }
        }
    }
}

fn join(items: &[PyValue]) -> String {
    items.iter().map(PyValue::to_python).collect::<Vec<_>>().join(", ")
}

/// Single-quoted Python string literal.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// A function call with literal arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub function: String,
    pub args: Vec<PyValue>,
}

impl Call {
    pub fn new(function: &str, args: Vec<PyValue>) -> Self {
        Self { function: function.to_string(), args }
    }

    pub fn to_python(&self) -> String {
        format!("{}({})", self.function, join(&self.args))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameKind {
    Function,
    Class,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PyType {
    List,
    Dict,
    Str,
    Int,
    Bool,
}

impl PyType {
    pub fn builtin(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Dict => "dict",
            Self::Str => "str",
            Self::Int => "int",
            Self::Bool => "bool",
        }
    }
}

/// One statement of an object scenario. Variables are scenario-local.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    New { var: String, class: String },
    Do { var: String, method: String, args: Vec<PyValue> },
    Expect { var: String, method: String, args: Vec<PyValue>, expected: PyValue, message: String },
    ExpectAttr { var: String, path: String, expected: PyValue, message: String },
    ExpectRaises { var: String, method: String, args: Vec<PyValue>, exception: String, message: String },
}

/// One guarded assertion. A failing check never stops the checks after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Check {
    Defined { name: String, kind: NameKind },
    Returns { call: Call, expected: PyValue, message: Option<String> },
    ReturnsInstance { call: Call, ty: PyType, message: String },
    Unmodified { call: Call, message: String },
    Raises { call: Call, exception: String, message: String },
    Arity { function: String, min: usize, max: usize },
    PrintsLines { call: Call, lines: Vec<String> },
    Scenario { steps: Vec<Step> },
    /// Python function body returning a failure message or `None`.
    Snippet { source: String },
    /// Fallback for exercises without tests: never passes.
    Unverified { entry_point: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSpec {
    pub exercise_id: String,
    pub checks: Vec<Check>,
    /// `None` means the spec can only ever fail.
    pub pass_message: Option<String>,
}

impl VerificationSpec {
    pub fn new(exercise_id: &str, pass_message: &str) -> Self {
        Self {
            exercise_id: exercise_id.to_string(),
            checks: Vec::new(),
            pass_message: Some(pass_message.to_string()),
        }
    }

    /// Best-effort check for exercises that ship no vectors.
    pub fn fallback(exercise_id: &str) -> Self {
        Self {
            exercise_id: exercise_id.to_string(),
            checks: vec![Check::Unverified { entry_point: "solution".to_string() }],
            pass_message: None,
        }
    }

    pub fn function(mut self, name: &str) -> Self {
        self.checks.push(Check::Defined { name: name.to_string(), kind: NameKind::Function });
        self
    }

    pub fn class(mut self, name: &str) -> Self {
        self.checks.push(Check::Defined { name: name.to_string(), kind: NameKind::Class });
        self
    }

    pub fn returns(mut self, call: Call, expected: PyValue) -> Self {
        self.checks.push(Check::Returns { call, expected, message: None });
        self
    }

    pub fn returns_or(mut self, call: Call, expected: PyValue, message: &str) -> Self {
        self.checks.push(Check::Returns { call, expected, message: Some(message.to_string()) });
        self
    }

    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    pub fn scenario(mut self, steps: Vec<Step>) -> Self {
        self.checks.push(Check::Scenario { steps });
        self
    }

    /// Names the learner must define, in check order.
    pub fn required_names(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter_map(|c| match c {
                Check::Defined { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_python_literals() {
        assert_eq!(PyValue::None.to_python(), "None");
        assert_eq!(PyValue::Bool(false).to_python(), "False");
        assert_eq!(PyValue::Int(-42).to_python(), "-42");
        assert_eq!(PyValue::ints(&[1, 2]).to_python(), "[1, 2]");
        assert_eq!(PyValue::Tuple(vec![PyValue::Int(1)]).to_python(), "(1,)");
        assert_eq!(PyValue::Tuple(vec![]).to_python(), "()");
        assert_eq!(
            PyValue::Dict(vec![(PyValue::str("a"), PyValue::Int(1))]).to_python(),
            "{'a': 1}"
        );
    }

    #[test]
    fn quotes_strings_safely() {
        assert_eq!(quote("it's"), r"'it\'s'");
        assert_eq!(quote("a\\b"), r"'a\\b'");
        assert_eq!(quote("line\nnext\t"), r"'line\nnext\t'");
        assert_eq!(quote("\u{1}"), r"'\x01'");
        assert_eq!(quote("héllo"), "'héllo'");
    }

    #[test]
    fn call_renders_arguments_in_order() {
        let call = Call::new("gcd", vec![PyValue::Int(56), PyValue::Int(98)]);
        assert_eq!(call.to_python(), "gcd(56, 98)");
    }

    #[test]
    fn fallback_spec_can_never_pass() {
        let spec = VerificationSpec::fallback("24");
        assert!(spec.pass_message.is_none());
        assert!(matches!(spec.checks[0], Check::Unverified { .. }));
    }

    #[test]
    fn required_names_follow_check_order() {
        let spec = VerificationSpec::new("20", "ok")
            .function("matrix_add")
            .returns(Call::new("matrix_add", vec![]), PyValue::None)
            .function("matrix_multiply");
        assert_eq!(spec.required_names(), vec!["matrix_add", "matrix_multiply"]);
    }
}
