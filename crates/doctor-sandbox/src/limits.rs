//! Resource limits applied to every code unit.

use crate::error::{Result, SandboxError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default wall-clock budget for a code unit in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default cap on the number of rows a code unit may return.
pub const DEFAULT_MAX_RESULT_ROWS: usize = 5_000_000;

/// Default cap on rows × columns of a returned frame.
pub const DEFAULT_MAX_RESULT_CELLS: usize = 200_000_000;

/// Limits enforced by the [`SandboxExecutor`](crate::SandboxExecutor).
///
/// The time budget covers both the top-level script and the call to the
/// entry point. The code unit runs on a worker thread; once the budget is
/// spent the host stops waiting and keeps raising an uncatchable timeout in
/// the worker until it ends. A native pandas call stuck in C is interrupted
/// only when it returns to Python, but the caller gets its error on time.
///
/// The result shape is checked before the frame is converted back, so an
/// oversized result is never copied. Memory the code unit allocates while
/// it runs is not bounded: the interpreter shares the host process, where
/// an address-space limit would apply to the host as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxLimits {
    /// Wall-clock budget in seconds.
    pub timeout_secs: u64,
    /// Results may never be larger than `max(input rows, max_result_rows)`.
    pub max_result_rows: usize,
    /// Results may never hold more than this many cells.
    #[serde(default = "default_max_result_cells")]
    pub max_result_cells: usize,
}

fn default_max_result_cells() -> usize {
    DEFAULT_MAX_RESULT_CELLS
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_result_rows: DEFAULT_MAX_RESULT_ROWS,
            max_result_cells: DEFAULT_MAX_RESULT_CELLS,
        }
    }
}

impl SandboxLimits {
    /// Wall-clock budget as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Largest result height accepted for an input of `input_rows` rows.
    pub fn row_ceiling(&self, input_rows: usize) -> usize {
        input_rows.max(self.max_result_rows)
    }

    /// Reject a `rows` × `columns` result that exceeds the row or cell cap.
    pub fn check_result_shape(&self, rows: usize, columns: usize, input_rows: usize) -> Result<()> {
        let ceiling = self.row_ceiling(input_rows);
        if rows > ceiling {
            return Err(SandboxError::InvalidResult(format!(
                "result has {rows} rows, more than the limit of {ceiling}"
            )));
        }
        let cells = rows.saturating_mul(columns);
        if cells > self.max_result_cells {
            return Err(SandboxError::InvalidResult(format!(
                "result has {cells} cells, more than the limit of {}",
                self.max_result_cells
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let limits = SandboxLimits::default();
        assert_eq!(limits.timeout(), Duration::from_secs(30));
        assert_eq!(limits.max_result_rows, DEFAULT_MAX_RESULT_ROWS);
    }

    #[test]
    fn test_row_ceiling_never_below_input() {
        let limits = SandboxLimits {
            timeout_secs: 5,
            max_result_rows: 10,
            ..SandboxLimits::default()
        };
        assert_eq!(limits.row_ceiling(3), 10);
        assert_eq!(limits.row_ceiling(50), 50);
    }

    #[test]
    fn test_result_shape_checks_rows_and_cells() {
        let limits = SandboxLimits {
            timeout_secs: 5,
            max_result_rows: 10,
            max_result_cells: 40,
        };
        assert!(limits.check_result_shape(10, 4, 3).is_ok());
        assert!(matches!(
            limits.check_result_shape(11, 1, 3),
            Err(SandboxError::InvalidResult(_))
        ));
        // A wide frame within the row cap is still refused
        assert!(matches!(
            limits.check_result_shape(2, 100_000, 3),
            Err(SandboxError::InvalidResult(msg)) if msg.contains("cells")
        ));
        assert!(limits.check_result_shape(usize::MAX, usize::MAX, usize::MAX).is_err());
    }

    #[test]
    fn test_cell_cap_defaults_when_absent() {
        let limits: SandboxLimits =
            serde_json::from_str(r#"{"timeout_secs": 3, "max_result_rows": 7}"#).unwrap();
        assert_eq!(limits.max_result_cells, DEFAULT_MAX_RESULT_CELLS);
    }
}
