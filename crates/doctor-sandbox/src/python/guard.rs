//! Bindings to the embedded guard module (`python_src/guard.py`).
//!
//! The guard screens and compiles code units, enforces the time budget and
//! detects in-place mutation. It lives in the host's namespace and is never
//! reachable from inside a code unit scope.

use crate::error::SandboxError;
use pyo3::prelude::*;
use pyo3::types::{PyAnyMethods, PyModule};
use std::ffi::CString;

/// Source of the guard module, compiled into the binary.
pub const GUARD_SOURCE: &str = include_str!("../python_src/guard.py");

/// Load a fresh instance of the guard module.
pub fn load(py: Python<'_>) -> Result<Bound<'_, PyModule>, SandboxError> {
    let source = CString::new(GUARD_SOURCE)
        .map_err(|e| SandboxError::RuntimeUnavailable(format!("guard source: {e}")))?;
    PyModule::from_code(py, &source, c"doctor_guard.py", c"doctor_guard")
        .map_err(|e| SandboxError::RuntimeUnavailable(format!("guard module: {e}")))
}

/// Map a Python exception raised while running a code unit to a [`SandboxError`].
///
/// The full traceback is logged at `debug`; the returned error keeps the
/// original exception message.
pub fn map_python_error(py: Python<'_>, err: PyErr) -> SandboxError {
    let error_type = err
        .get_type(py)
        .qualname()
        .map(|s| s.to_string())
        .unwrap_or_default();

    let message = err.value(py).to_string();

    if let Some(traceback) = err.traceback(py).and_then(|tb| tb.format().ok()) {
        tracing::debug!(error_type = %error_type, traceback = %traceback, "Code unit raised");
    }

    match error_type.as_str() {
        "SandboxViolation" => SandboxError::Violation(message),
        "SandboxTimeout" => SandboxError::Timeout(message),
        "ImportError" if message.contains("not permitted") => SandboxError::Violation(message),
        _ => SandboxError::Execution {
            message: format!("{error_type}: {message}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::python::runtime::ensure_ready;

    #[test]
    fn test_guard_source_is_embedded() {
        assert!(GUARD_SOURCE.contains("def prepare"));
        assert!(GUARD_SOURCE.contains("def detect_mutation"));
        assert!(!GUARD_SOURCE.contains('\0'));
    }

    fn prepare_error(code: &str) -> SandboxError {
        ensure_ready().expect("Python runtime unavailable");
        Python::attach(|py| {
            let guard = load(py).expect("guard loads");
            let err = guard
                .call_method1("prepare", (code,))
                .expect_err("code should be rejected");
            map_python_error(py, err)
        })
    }

    #[test]
    #[ignore = "Requires Python runtime with pandas"]
    fn test_prepare_rejects_forbidden_capabilities() {
        for code in [
            "import os",
            "from subprocess import run",
            "open('/etc/passwd')",
            "df.__class__",
            "df.to_csv('out.csv')",
            "pd.read_csv('x.csv')",
            "eval('1 + 1')",
            "import pandas.io.common",
            "x = pd.io.common.os.environ['GEMINI_API_KEY']",
            "pd.io.clipboard.subprocess.run(['id'])",
            "text = '{0.__globals__}'.format(pd.concat)",
            "bases = ValueError.mro()",
        ] {
            let err = prepare_error(code);
            assert!(
                matches!(err, SandboxError::Violation(_)),
                "{code:?} was mapped to {err:?}"
            );
        }
    }

    #[test]
    #[ignore = "Requires Python runtime with pandas"]
    fn test_prepare_rejects_handlers_that_could_swallow_timeouts() {
        for code in [
            "try:\n    x = 1\nexcept:\n    pass",
            "try:\n    x = 1\nexcept BaseException:\n    pass",
            "try:\n    x = 1\nexcept (ValueError, SystemExit):\n    pass",
            "try:\n    x = 1\nexcept Exception.mro()[1]:\n    pass",
            "try:\n    x = 1\nfinally:\n    y = 2",
            "def __exit__(a, b, c, d):\n    return True",
        ] {
            let err = prepare_error(code);
            assert!(
                matches!(err, SandboxError::Violation(_)),
                "{code:?} was mapped to {err:?}"
            );
        }
    }

    #[test]
    #[ignore = "Requires Python runtime with pandas"]
    fn test_prepare_accepts_named_handlers() {
        ensure_ready().expect("Python runtime unavailable");
        Python::attach(|py| {
            let guard = load(py).expect("guard loads");
            let code = "try:\n    x = int('a')\nexcept (ValueError, pd.errors.ParserError):\n    x = 0";
            assert!(guard.call_method1("prepare", (code,)).is_ok());
        });
    }

    #[test]
    #[ignore = "Requires Python runtime with pandas"]
    fn test_timeout_is_not_an_exception_subclass() {
        ensure_ready().expect("Python runtime unavailable");
        Python::attach(|py| {
            let guard = load(py).expect("guard loads");
            let timeout = guard.getattr("SandboxTimeout").unwrap();
            let exception = py.get_type::<pyo3::exceptions::PyException>();
            let caught_by_exception: bool = py
                .import("builtins")
                .unwrap()
                .call_method1("issubclass", (timeout, exception))
                .unwrap()
                .extract()
                .unwrap();
            assert!(!caught_by_exception);
        });
    }

    #[test]
    #[ignore = "Requires Python runtime with pandas"]
    fn test_syntax_error_is_execution_error() {
        let err = prepare_error("def clean_data(df)\n    return df");
        match err {
            SandboxError::Execution { message } => assert!(message.starts_with("SyntaxError")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
