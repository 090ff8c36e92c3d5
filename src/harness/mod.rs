//! Harness synthesis: turns learner source plus a [`VerificationSpec`] into
//! the program text the interpreter executes.
//!
//! A run executes the learner's text as-is. A submit appends a verification
//! routine that captures standard output, runs every check under its own
//! guard, restores output and writes a single `PASS:`/`FAIL:` line last.
//! Every name the routine introduces carries the `__coach_` prefix and
//! builtins are reached through an alias, so learner definitions cannot
//! shadow them.

use std::collections::HashMap;

pub mod spec;
pub mod vectors;

pub use spec::{Check, NameKind, PyValue, Step, VerificationSpec};

use spec::quote;

pub const INTERNAL_ERROR_PREFIX: &str = "FAIL: Internal grading error:";

const UNVERIFIED_MESSAGE: &str = "This exercise has no automated tests, so correctness could not be verified automatically.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Run,
    Submit,
}

/// Verification specs keyed by exercise id.
#[derive(Debug, Clone, Default)]
pub struct Harness {
    specs: HashMap<String, VerificationSpec>,
}

impl Harness {
    pub fn new(specs: impl IntoIterator<Item = VerificationSpec>) -> Self {
        Self {
            specs: specs.into_iter().map(|s| (s.exercise_id.clone(), s)).collect(),
        }
    }

    /// Harness loaded with the built-in exercise vectors.
    pub fn builtin() -> Self {
        Self::new(vectors::all())
    }

    pub fn spec(&self, exercise_id: &str) -> Option<&VerificationSpec> {
        self.specs.get(exercise_id)
    }

    pub fn has_tests(&self, exercise_id: &str) -> bool {
        self.specs.contains_key(exercise_id)
    }

    /// Program text for `action` on `exercise_id`.
    pub fn program(&self, action: Action, exercise_id: &str, source: &str) -> String {
        match action {
            Action::Run => source.to_string(),
            Action::Submit => match self.spec(exercise_id) {
                Some(spec) => render_submit(source, spec),
                None => render_submit(source, &VerificationSpec::fallback(exercise_id)),
            },
        }
    }
}

/// Learner code, capture preamble, guarded checks, verdict epilogue.
pub fn render_submit(source: &str, spec: &VerificationSpec) -> String {
    let mut out = String::with_capacity(source.len() + 4096);
    out.push_str(source);
    if !source.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(PREAMBLE);

    out.push_str("try:\n");
    for (index, check) in spec.checks.iter().enumerate() {
        out.push_str(&format!("    def __coach_check_{}():\n", index));
        for line in render_check(check) {
            if line.is_empty() {
                out.push('\n');
            } else {
                out.push_str("        ");
                out.push_str(&line);
                out.push('\n');
            }
        }
        out.push_str("        return None\n");
        out.push_str(&format!("    __coach_guard(__coach_check_{})\n", index));
    }
    out.push_str("    if __coach_failures:\n");
    out.push_str("        __coach_verdict = 'FAIL: ' + __coach_failures[0]\n");
    out.push_str("    else:\n");
    match &spec.pass_message {
        Some(message) => out.push_str(&format!("        __coach_verdict = {}\n", quote(&format!("PASS: {}", message)))),
        None => out.push_str(&format!("        __coach_verdict = {}\n", quote(&format!("FAIL: {}", UNVERIFIED_MESSAGE)))),
    }
    out.push_str(EPILOGUE);
    out
}

const PREAMBLE: &str = r#"
import builtins as __coach_b
import sys as __coach_sys
import io as __coach_io
import copy as __coach_copy
import inspect as __coach_inspect

__coach_stdout = __coach_sys.stdout
__coach_sys.stdout = __coach_io.StringIO()
__coach_failures = []
__coach_verdict = None

def __coach_one_line(__coach_text):
    return ' '.join(__coach_b.str(__coach_text).split())

def __coach_guard(__coach_check):
    try:
        __coach_message = __coach_check()
    except __coach_b.BaseException as __coach_exc:
        __coach_message = 'Error when testing your code: ' + __coach_b.type(__coach_exc).__name__ + ': ' + __coach_b.str(__coach_exc)
    if __coach_message:
        __coach_failures.append(__coach_one_line(__coach_message))

"#;

const EPILOGUE: &str = r#"except __coach_b.BaseException as __coach_exc:
    __coach_verdict = 'FAIL: Internal grading error: ' + __coach_one_line(__coach_b.type(__coach_exc).__name__ + ': ' + __coach_b.str(__coach_exc))
finally:
    __coach_sys.stdout = __coach_stdout
__coach_stdout.write(__coach_verdict + '\n')
"#;

/// Python lines (unindented) for one check body. Each body returns a failure
/// message or falls through.
fn render_check(check: &Check) -> Vec<String> {
    match check {
        Check::Defined { name, kind } => {
            let (noun, test) = match kind {
                NameKind::Function => ("function", format!("__coach_b.callable({})", name)),
                NameKind::Class => ("class", format!("__coach_b.isinstance({}, __coach_b.type)", name)),
            };
            vec![
                format!("if {} not in __coach_b.globals():", quote(name)),
                format!(
                    "    return {}",
                    quote(&format!("Could not find a '{}' {} in your code. Make sure you've defined it correctly.", name, noun))
                ),
                format!("if not {}:", test),
                format!("    return {}", quote(&format!("'{}' should be a {}", name, noun))),
            ]
        }
        Check::Returns { call, expected, message } => {
            let mut lines = vec![
                format!("__coach_result = {}", call.to_python()),
                format!("if __coach_result != {}:", expected.to_python()),
            ];
            match message {
                Some(m) => lines.push(format!("    return {}", quote(m))),
                None => lines.push(format!(
                    "    return {} + __coach_b.repr(__coach_result)",
                    quote(&format!("{} expected {}, got ", call.to_python(), expected.to_python()))
                )),
            }
            lines
        }
        Check::ReturnsInstance { call, ty, message } => vec![
            format!("__coach_result = {}", call.to_python()),
            format!("if not __coach_b.isinstance(__coach_result, __coach_b.{}):", ty.builtin()),
            format!("    return {}", quote(message)),
        ],
        Check::Unmodified { call, message } => {
            let args = call.args.iter().map(PyValue::to_python).collect::<Vec<_>>().join(", ");
            vec![
                format!("__coach_args = [{}]", args),
                "__coach_before = __coach_copy.deepcopy(__coach_args)".to_string(),
                format!("{}(*__coach_args)", call.function),
                "if __coach_args != __coach_before:".to_string(),
                format!("    return {}", quote(message)),
            ]
        }
        Check::Raises { call, exception, message } => render_raises(&call.to_python(), exception, message),
        Check::Arity { function, min, max } => {
            let expectation = if min == max {
                format!("'{}' must take exactly {} parameter(s)", function, min)
            } else {
                format!("'{}' must take {}-{} parameters", function, min, max)
            };
            vec![
                format!("__coach_count = __coach_b.len(__coach_inspect.signature({}).parameters)", function),
                format!("if __coach_count < {} or __coach_count > {}:", min, max),
                format!("    return {}", quote(&expectation)),
            ]
        }
        Check::PrintsLines { call, lines: expected } => {
            let literal = PyValue::strs(&expected.iter().map(String::as_str).collect::<Vec<_>>()).to_python();
            vec![
                "__coach_buffer = __coach_io.StringIO()".to_string(),
                "__coach_previous = __coach_sys.stdout".to_string(),
                "__coach_sys.stdout = __coach_buffer".to_string(),
                "try:".to_string(),
                format!("    {}", call.to_python()),
                "finally:".to_string(),
                "    __coach_sys.stdout = __coach_previous".to_string(),
                "__coach_lines = [l.strip() for l in __coach_buffer.getvalue().splitlines() if l.strip()]".to_string(),
                format!("__coach_expected = {}", literal),
                "if __coach_b.len(__coach_lines) != __coach_b.len(__coach_expected):".to_string(),
                "    return 'Expected ' + __coach_b.str(__coach_b.len(__coach_expected)) + ' lines of output, got ' + __coach_b.str(__coach_b.len(__coach_lines))".to_string(),
                "for __coach_i, (__coach_got, __coach_want) in __coach_b.enumerate(__coach_b.zip(__coach_lines, __coach_expected)):".to_string(),
                "    if __coach_got != __coach_want:".to_string(),
                "        return 'Line ' + __coach_b.str(__coach_i + 1) + ' incorrect: expected ' + __coach_b.repr(__coach_want) + ', got ' + __coach_b.repr(__coach_got)".to_string(),
            ]
        }
        Check::Scenario { steps } => steps.iter().flat_map(render_step).collect(),
        Check::Snippet { source } => source.lines().map(str::to_string).collect(),
        // Every path ends with the unverified notice; none of them passes.
        Check::Unverified { entry_point } => vec![
            format!("if {} in __coach_b.globals():", quote(entry_point)),
            format!("    {}()", entry_point),
            format!(
                "    return {}",
                quote(&format!("CAUTION: {}() runs without errors. {}", entry_point, UNVERIFIED_MESSAGE))
            ),
            "__coach_found = [n for n, o in __coach_b.list(__coach_b.globals().items()) if __coach_b.callable(o) and not n.startswith('_')]".to_string(),
            "if __coach_found:".to_string(),
            format!(
                "    return 'Found user-defined functions: ' + ', '.join(__coach_found) + '. ' + {}",
                quote(UNVERIFIED_MESSAGE)
            ),
            format!(
                "return {}",
                quote(&format!(
                    "No user-defined functions found. Make sure you've implemented the required functionality. {}",
                    UNVERIFIED_MESSAGE
                ))
            ),
        ],
    }
}

fn render_raises(expr: &str, exception: &str, message: &str) -> Vec<String> {
    vec![
        "try:".to_string(),
        format!("    {}", expr),
        format!("except __coach_b.{}:", exception),
        "    pass".to_string(),
        "except __coach_b.Exception as __coach_exc:".to_string(),
        format!("    return {} + ' (raised ' + __coach_b.type(__coach_exc).__name__ + ')'", quote(message)),
        "else:".to_string(),
        format!("    return {}", quote(message)),
    ]
}

fn scenario_var(var: &str) -> String {
    format!("__coach_v_{}", var)
}

fn method_call(var: &str, method: &str, args: &[PyValue]) -> String {
    let args = args.iter().map(PyValue::to_python).collect::<Vec<_>>().join(", ");
    format!("{}.{}({})", scenario_var(var), method, args)
}

fn render_expectation(actual: &str, expected: &PyValue, message: &str) -> Vec<String> {
    let condition = match expected {
        PyValue::Bool(true) => format!("not __coach_b.bool({})", actual),
        PyValue::Bool(false) => format!("__coach_b.bool({})", actual),
        PyValue::None => format!("{} is not None", actual),
        other => format!("{} != {}", actual, other.to_python()),
    };
    vec![format!("if {}:", condition), format!("    return {}", quote(message))]
}

fn render_step(step: &Step) -> Vec<String> {
    match step {
        Step::New { var, class } => vec![format!("{} = {}()", scenario_var(var), class)],
        Step::Do { var, method, args } => vec![method_call(var, method, args)],
        Step::Expect { var, method, args, expected, message } => {
            render_expectation(&method_call(var, method, args), expected, message)
        }
        Step::ExpectAttr { var, path, expected, message } => {
            render_expectation(&format!("{}.{}", scenario_var(var), path), expected, message)
        }
        Step::ExpectRaises { var, method, args, exception, message } => {
            render_raises(&method_call(var, method, args), exception, message)
        }
    }
}
