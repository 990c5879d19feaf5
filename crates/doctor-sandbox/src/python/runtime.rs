//! Python runtime initialization.
//!
//! The sandbox runs on the interpreter pyo3 links against. Before the first
//! execution the runtime is probed once: the interpreter is initialized and
//! `pandas`, `numpy` and `pyarrow` are imported. The outcome is cached for the
//! life of the process, so a missing dependency is reported the same way on
//! every call instead of failing halfway through an execution.

use crate::error::SandboxError;
use pyo3::prelude::*;
use pyo3::types::PyAnyMethods;
use std::sync::OnceLock;

/// Modules a code unit scope needs, plus pyarrow for the DataFrame transfer.
const REQUIRED_MODULES: [&str; 3] = ["pandas", "numpy", "pyarrow"];

static RUNTIME: OnceLock<Result<RuntimeInfo, String>> = OnceLock::new();

/// Versions of the interpreter and libraries the sandbox runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
    pub python: String,
    pub pandas: String,
    pub numpy: String,
    pub pyarrow: String,
}

/// Ensure the Python runtime is usable, probing it on first call.
///
/// # Errors
///
/// Returns [`SandboxError::RuntimeUnavailable`] if any required module cannot
/// be imported. The error is cached; later calls fail the same way.
#[must_use = "initialization may fail; check the Result"]
pub fn ensure_ready() -> Result<&'static RuntimeInfo, SandboxError> {
    match RUNTIME.get_or_init(probe) {
        Ok(info) => Ok(info),
        Err(msg) => Err(SandboxError::RuntimeUnavailable(msg.clone())),
    }
}

fn probe() -> Result<RuntimeInfo, String> {
    Python::initialize();

    let info = Python::attach(|py| -> PyResult<RuntimeInfo> {
        let version = |name: &str| -> PyResult<String> {
            py.import(name)?.getattr("__version__")?.extract()
        };
        Ok(RuntimeInfo {
            python: py.version().to_string(),
            pandas: version("pandas")?,
            numpy: version("numpy")?,
            pyarrow: version("pyarrow")?,
        })
    })
    .map_err(|e| format!("{e} (the sandbox requires {})", REQUIRED_MODULES.join(", ")))?;

    tracing::info!(
        python = %info.python,
        pandas = %info.pandas,
        numpy = %info.numpy,
        "Python sandbox runtime ready"
    );
    Ok(info)
}
