//! DataFrame conversion between Rust and Python.
//!
//! Code units work on pandas DataFrames while the rest of the pipeline
//! works on Polars. Both directions go through the Arrow IPC **File format**,
//! which keeps the schema in the footer and is what Polars'
//! `IpcWriter`/`IpcReader` produce by default.
//!
//! ```text
//! Polars ──IpcWriter──▶ bytes ──pyarrow.ipc.open_file──▶ Table ──to_pandas──▶ pandas
//! pandas ──Table.from_pandas──▶ Table ──RecordBatchFileWriter──▶ bytes ──IpcReader──▶ Polars
//! ```
//!
//! The pandas index never crosses back into Polars: results are converted
//! with `preserve_index=False`, so a filtered frame does not grow an
//! `__index_level_0__` column.

use crate::error::{ArrowConversionKind, SandboxError};
use polars::prelude::*;
use pyo3::prelude::*;
use pyo3::types::{PyAnyMethods, PyBytes, PyBytesMethods, PyDict};
use std::io::Cursor;

/// Convert a Polars DataFrame into a fresh pandas DataFrame.
///
/// The returned object shares no memory with `df`; it is the private copy a
/// code unit is allowed to modify.
///
/// # Errors
///
/// Returns [`ArrowConversionKind::Serialize`] when Polars cannot write the
/// IPC bytes, or the Python error when pyarrow/pandas fail to read them.
#[must_use = "the converted pandas DataFrame should be used"]
pub fn dataframe_to_python<'py>(
    py: Python<'py>,
    df: &DataFrame,
) -> Result<Bound<'py, PyAny>, SandboxError> {
    // IpcWriter::finish() needs &mut DataFrame
    let mut df_clone = df.clone();

    let mut cursor = Cursor::new(Vec::new());
    IpcWriter::new(&mut cursor)
        .finish(&mut df_clone)
        .map_err(|e| ArrowConversionKind::Serialize(e.to_string()))?;

    let py_bytes = PyBytes::new(py, &cursor.into_inner());

    let io = py.import("io")?;
    let pyarrow_ipc = py.import("pyarrow.ipc")?;

    let buffer = io.call_method1("BytesIO", (py_bytes,))?;
    let reader = pyarrow_ipc.call_method1("open_file", (buffer,))?;
    let table = reader.call_method0("read_all")?;
    let pandas_df = table.call_method0("to_pandas")?;

    Ok(pandas_df)
}

/// Convert a pandas DataFrame produced by a code unit back into Polars.
///
/// Columns with `object` dtype that Arrow cannot type (for example a column
/// holding both numbers and strings after a partial cleanup) are retried as
/// pandas `string` columns, keeping missing values missing.
///
/// # Errors
///
/// Returns the Python error when the frame cannot be converted to an Arrow
/// table even after the retry, [`ArrowConversionKind::TypeConversion`] when
/// the IPC buffer is not `bytes`, and [`ArrowConversionKind::Deserialize`]
/// when Polars rejects the IPC data.
#[must_use = "the converted Polars DataFrame should be used"]
pub fn python_to_dataframe(
    py: Python<'_>,
    py_df: &Bound<'_, PyAny>,
) -> Result<DataFrame, SandboxError> {
    let io = py.import("io")?;
    let pyarrow_ipc = py.import("pyarrow.ipc")?;

    let table = match arrow_table(py, py_df) {
        Ok(table) => table,
        Err(first) => {
            tracing::debug!(error = %first, "Arrow rejected the result, retrying with string columns");
            let normalized = stringify_object_columns(py, py_df)?;
            arrow_table(py, &normalized)?
        }
    };

    let schema = table.getattr("schema")?;
    let sink = io.call_method0("BytesIO")?;
    let writer = pyarrow_ipc.call_method1("RecordBatchFileWriter", (&sink, &schema))?;
    writer.call_method1("write_table", (&table,))?;
    writer.call_method0("close")?;

    let py_bytes = sink.call_method0("getvalue")?;
    let py_bytes_bound: &Bound<'_, PyBytes> = py_bytes.cast().map_err(|e| {
        ArrowConversionKind::TypeConversion(format!("Failed to extract bytes: {}", e))
    })?;
    let ipc_bytes = py_bytes_bound.as_bytes().to_vec();

    let df = IpcReader::new(Cursor::new(ipc_bytes))
        .finish()
        .map_err(|e| ArrowConversionKind::Deserialize(e.to_string()))?;

    Ok(df)
}

fn arrow_table<'py>(py: Python<'py>, py_df: &Bound<'py, PyAny>) -> PyResult<Bound<'py, PyAny>> {
    let table_class = py.import("pyarrow")?.getattr("Table")?;
    let kwargs = PyDict::new(py);
    kwargs.set_item("preserve_index", false)?;
    table_class.call_method("from_pandas", (py_df,), Some(&kwargs))
}

fn stringify_object_columns<'py>(
    py: Python<'py>,
    py_df: &Bound<'py, PyAny>,
) -> PyResult<Bound<'py, PyAny>> {
    let object_columns = py_df
        .call_method1("select_dtypes", (vec!["object"],))?
        .getattr("columns")?;

    let casts = PyDict::new(py);
    for column in object_columns.try_iter()? {
        casts.set_item(column?, "string")?;
    }
    py_df.call_method1("astype", (casts,))
}
