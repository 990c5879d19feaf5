//! The sandboxed executor.

use crate::error::{Result, SandboxError};
use crate::limits::SandboxLimits;
use crate::python::{conversion, guard, runtime};
use crate::scope::{self, DATA_BINDING, ENTRY_POINT};
use polars::prelude::DataFrame;
use pyo3::prelude::*;
use pyo3::types::{PyAnyMethods, PyDict, PyDictMethods, PyModule};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs generated cleaning code against a private copy of a DataFrame.
///
/// # Example
///
/// ```no_run
/// use doctor_sandbox::{SandboxExecutor, SandboxLimits};
/// use polars::prelude::*;
///
/// let data = df!("age" => &[Some(20i64), None, Some(22)]).unwrap();
/// let code = "def clean_data(df):\n    return df.dropna()\n";
///
/// let cleaned = SandboxExecutor::new(SandboxLimits::default()).execute(&data, code)?;
/// assert_eq!(cleaned.height(), 2);
/// # Ok::<(), doctor_sandbox::SandboxError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SandboxExecutor {
    limits: SandboxLimits,
}

impl SandboxExecutor {
    pub fn new(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    /// Execute `code` against a copy of `data` and return the cleaned DataFrame.
    ///
    /// The result is resolved in order: the value returned by a callable
    /// `clean_data` in the scope (called with the private copy of `data`), else the scope's `df` if the code rebound
    /// or mutated it, else [`SandboxError::NoResult`]. `data` is never
    /// modified.
    ///
    /// # Errors
    ///
    /// Any failure of the code unit (syntax, runtime, sandbox violation,
    /// timeout, unusable result) is returned as a [`SandboxError`] carrying
    /// the original message.
    pub fn execute(&self, data: &DataFrame, code: &str) -> Result<DataFrame> {
        if code.trim().is_empty() {
            return Err(SandboxError::EmptyCode);
        }
        if code.contains('\0') {
            return Err(SandboxError::InvalidSource(
                "code contains NUL bytes".to_string(),
            ));
        }
        runtime::ensure_ready()?;

        let started = Instant::now();
        info!(
            rows = data.height(),
            columns = data.width(),
            code_len = code.len(),
            "Executing code unit"
        );

        let outcome = Python::attach(|py| self.execute_in(py, data, code));

        match &outcome {
            Ok(cleaned) => info!(
                rows = cleaned.height(),
                columns = cleaned.width(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Code unit completed"
            ),
            Err(e) => warn!(
                code = e.error_code(),
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Code unit failed"
            ),
        }
        outcome
    }

    fn execute_in(&self, py: Python<'_>, data: &DataFrame, code: &str) -> Result<DataFrame> {
        let started = Instant::now();
        let guard = guard::load(py)?;

        let compiled = guard
            .call_method1("prepare", (code,))
            .map_err(|e| guard::map_python_error(py, e))?;

        let working = conversion::dataframe_to_python(py, data)?;
        let baseline = working.call_method1("copy", (true,))?;
        let scope = scope::build(py, &guard, &working)?;

        // One budget covers the top-level code and the entry point
        let remaining = || self.limits.timeout().saturating_sub(started.elapsed()).as_secs_f64();

        guard
            .call_method1("run", (&compiled, &scope, remaining()))
            .map_err(|e| guard::map_python_error(py, e))?;

        let result = resolve(py, &guard, &scope, &working, &baseline, remaining())?;
        self.convert_result(py, &result, data.height())
    }

    fn convert_result(
        &self,
        py: Python<'_>,
        result: &Bound<'_, PyAny>,
        input_rows: usize,
    ) -> Result<DataFrame> {
        let frame_class = py.import("pandas")?.getattr("DataFrame")?;
        if !result.is_instance(&frame_class)? {
            let type_name = result.get_type().name()?.to_string();
            return Err(SandboxError::InvalidResult(format!(
                "expected a pandas DataFrame, got {type_name}"
            )));
        }

        // Checked before conversion so an oversized frame is never copied
        let (rows, columns): (usize, usize) = result.getattr("shape")?.extract()?;
        self.limits.check_result_shape(rows, columns, input_rows)?;

        conversion::python_to_dataframe(py, result)
    }
}

fn resolve<'py>(
    py: Python<'py>,
    guard: &Bound<'py, PyModule>,
    scope: &Bound<'py, PyDict>,
    working: &Bound<'py, PyAny>,
    baseline: &Bound<'py, PyAny>,
    seconds: f64,
) -> Result<Bound<'py, PyAny>> {
    if let Some(entry) = scope.get_item(ENTRY_POINT)?
        && entry.is_callable()
    {
        debug!("Invoking {ENTRY_POINT}");
        // Always the private copy, whatever the top-level code bound `df` to
        return guard
            .call_method1("invoke", (entry, working, seconds))
            .map_err(|e| guard::map_python_error(py, e));
    }

    let mutated = guard.call_method1("detect_mutation", (scope, working, baseline))?;
    if mutated.is_none() {
        return Err(SandboxError::NoResult {
            entry_point: ENTRY_POINT.to_string(),
        });
    }
    debug!("Using mutated '{DATA_BINDING}' binding");
    Ok(mutated)
}

static_assertions::assert_impl_all!(SandboxExecutor: Send, Sync);
