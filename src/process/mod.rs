//! Interpreter process management (startup/IO/health).

pub mod python;

pub use python::PythonHost;
