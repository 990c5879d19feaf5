//! The evaluation scope handed to a code unit.
//!
//! A scope holds exactly three bindings (`df`, `pd`, `np`) plus a restricted
//! `__builtins__`. Builtins are an allow-list of pure functions, constructors
//! and exception types; `print` is a no-op and `__import__` only resolves
//! the public `pandas`/`numpy` modules.
//!
//! `pd` and `np` are sandboxed views rather than the modules themselves:
//! private attributes and modules outside the guard's allow-list (such as
//! `pandas.io.common`, which holds `os`) cannot be reached through them.

use crate::error::SandboxError;
use pyo3::prelude::*;
use pyo3::types::{PyAnyMethods, PyDict, PyModule};

/// Name of the binding holding the working DataFrame.
pub const DATA_BINDING: &str = "df";

/// Name of the entry point a code unit is expected to define.
pub const ENTRY_POINT: &str = "clean_data";

/// Builtins available to a code unit.
pub const ALLOWED_BUILTINS: &[&str] = &[
    // values and constructors
    "bool", "bytes", "complex", "dict", "float", "frozenset", "int", "list", "object", "range",
    "set", "slice", "str", "tuple",
    // pure functions
    "abs", "all", "any", "callable", "chr", "divmod", "enumerate", "filter", "format", "hash",
    "isinstance", "issubclass", "iter", "len", "map", "max", "min", "next", "ord", "pow", "repr",
    "reversed", "round", "sorted", "sum", "zip",
    // exceptions a cleaning routine may raise or catch
    "ArithmeticError", "AssertionError", "AttributeError", "Exception", "IndexError", "KeyError",
    "LookupError", "OverflowError", "RuntimeError", "StopIteration", "TypeError", "ValueError",
    "ZeroDivisionError",
];

/// Build a fresh scope around the working DataFrame.
pub fn build<'py>(
    py: Python<'py>,
    guard: &Bound<'py, PyModule>,
    working: &Bound<'py, PyAny>,
) -> Result<Bound<'py, PyDict>, SandboxError> {
    let pd = guard.call_method1("sandboxed_module", (py.import("pandas")?,))?;
    let np = guard.call_method1("sandboxed_module", (py.import("numpy")?,))?;

    let modules = PyDict::new(py);
    modules.set_item("pandas", &pd)?;
    modules.set_item("numpy", &np)?;
    let builtins = guard.call_method1("make_builtins", (ALLOWED_BUILTINS.to_vec(), &modules))?;

    let scope = PyDict::new(py);
    scope.set_item("__builtins__", builtins)?;
    scope.set_item(DATA_BINDING, working)?;
    scope.set_item("pd", pd)?;
    scope.set_item("np", np)?;
    Ok(scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::python::{guard, runtime::ensure_ready};

    #[test]
    fn test_allow_list_excludes_escape_hatches() {
        for name in [
            "eval", "exec", "open", "compile", "getattr", "globals", "__import__", "input",
            "BaseException", "SystemExit", "type", "hasattr",
        ] {
            assert!(!ALLOWED_BUILTINS.contains(&name), "{name} must not be allowed");
        }
    }

    #[test]
    #[ignore = "Requires Python runtime with pandas"]
    fn test_scope_has_three_bindings() {
        ensure_ready().expect("Python runtime unavailable");
        Python::attach(|py| {
            let guard = guard::load(py).unwrap();
            let working = py.eval(c"__import__('pandas').DataFrame({'a': [1]})", None, None).unwrap();
            let scope = build(py, &guard, &working).unwrap();

            let mut keys: Vec<String> = scope.keys().extract().unwrap();
            keys.sort();
            assert_eq!(keys, vec!["__builtins__", "df", "np", "pd"]);
        });
    }
}
