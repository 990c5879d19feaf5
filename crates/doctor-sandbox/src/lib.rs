//! doctor-sandbox: sandboxed execution of generated cleaning code.
//!
//! Cleaning routines produced by the diagnosis model are untrusted pandas
//! code. This crate runs them in an embedded Python interpreter against a
//! private copy of a Polars DataFrame and hands back the cleaned result.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use doctor_sandbox::{SandboxExecutor, SandboxLimits};
//!
//! let executor = SandboxExecutor::new(SandboxLimits::default());
//! let cleaned = executor.execute(&dataframe, &diagnosis.code)?;
//! ```
//!
//! # The Code Unit Contract
//!
//! A code unit is evaluated in a scope with exactly three bindings:
//!
//! | Binding | Value |
//! |---------|-------|
//! | `df` | a pandas copy of the input DataFrame |
//! | `pd` | a sandboxed view of the `pandas` module |
//! | `np` | a sandboxed view of the `numpy` module |
//!
//! After the top-level code has run, the result is taken from a callable
//! `clean_data(df)` if the scope defines one, otherwise from `df` when it was
//! rebound or changed in place. A code unit that does neither fails with
//! [`SandboxError::NoResult`].
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  SandboxExecutor::execute(&DataFrame, code)                 │
//! │                                                             │
//! │  guard.prepare ──► AST screening + compile                  │
//! │  conversion    ──► Polars → Arrow IPC → pandas (copy)       │
//! │  scope::build  ──► df / pd / np + allow-listed builtins     │
//! │  guard.run     ──► exec under the wall-clock budget         │
//! │  resolve       ──► clean_data(df) │ mutated df │ NoResult   │
//! │  conversion    ──► pandas → Arrow IPC → Polars              │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Restrictions
//!
//! Before anything runs, the source is parsed and rejected when it imports
//! anything but the public `pandas`/`numpy` modules, touches private or
//! dunder attributes, names escape hatches such as `eval`, `exec`, `open` or
//! `getattr`, calls file IO methods (`read_*`, `to_csv`, `to_pickle`,
//! `np.load`, ...), writes a bare `except:` or a `finally` block.
//!
//! At run time the scope's `__builtins__` is an allow-list
//! ([`scope::ALLOWED_BUILTINS`]), and `pd`/`np` refuse to hand out modules
//! outside the allow-list, so internals like `pd.io.common.os` are out of
//! reach. The code unit runs on a worker thread. When the budget from
//! [`SandboxLimits`] is spent, the caller gets [`SandboxError::Timeout`] and
//! the worker is interrupted with an exception no code unit can catch.
//!
//! # Thread Safety
//!
//! The interpreter is process-global and the GIL serializes executions.
//! [`SandboxExecutor`] is `Send + Sync` and can be shared freely.

pub mod error;
pub mod executor;
pub mod limits;
pub mod python;
pub mod scope;

pub use error::{ArrowConversionKind, Result, SandboxError};
pub use executor::SandboxExecutor;
pub use limits::{
    DEFAULT_MAX_RESULT_CELLS, DEFAULT_MAX_RESULT_ROWS, DEFAULT_TIMEOUT_SECS, SandboxLimits,
};
pub use python::runtime::{RuntimeInfo, ensure_ready};
