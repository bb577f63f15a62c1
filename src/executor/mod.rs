//! Chart executor contract.
//!
//! Running generated chart code is delegated to an external collaborator.
//! Executors never fail the call: an error is reported inside the
//! [`ChartExecutorResponse`] so callers can surface it next to the code that
//! produced it.
//!
//! Two implementations are provided:
//!
//! - [`DryRunExecutor`] checks the scaffold contract without running
//!   anything and returns no raster.
//! - [`ProcessExecutor`] hands the program and the dataset to an interpreter
//!   process and reads back the rendered PNG.

mod process;

use async_trait::async_trait;
use tracing::debug;

use crate::data::DataFrame;
use crate::datamodel::{ChartExecutorResponse, Summary};
use crate::scaffold::{ChartLibrary, ENTRY_POINT, PLOT_SIGNATURE};

pub use process::{ProcessExecutor, DEFAULT_TIMEOUT};

/// Runs chart programs against a dataset.
#[async_trait]
pub trait ChartExecutor: Send + Sync {
    /// Executes every program in `code`, returning one response per program
    /// in the same order.
    async fn execute(
        &self,
        code: &[String],
        data: &DataFrame,
        summary: &Summary,
        library: ChartLibrary,
    ) -> Vec<ChartExecutorResponse>;

    /// Executor name for logs.
    fn name(&self) -> &str;
}

/// Checks that `code` follows the scaffold contract.
///
/// The program must define `plot(` and its last non-empty line must be the
/// unindented entry point.
pub fn check_contract(code: &str) -> Result<(), String> {
    if !code.contains(PLOT_SIGNATURE) {
        return Err("code does not define plot(data)".to_string());
    }
    let last = code.lines().rev().find(|l| !l.trim().is_empty());
    match last {
        Some(line) if line.trim_end() == ENTRY_POINT => Ok(()),
        Some(line) => Err(format!(
            "code must end with '{}', found '{}'",
            ENTRY_POINT,
            line.trim()
        )),
        None => Err("code is empty".to_string()),
    }
}

/// Executor that validates programs without running them.
///
/// Successful responses carry no raster. Columns the summary does not know
/// are not an error here; only the contract is checked.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExecutor;

#[async_trait]
impl ChartExecutor for DryRunExecutor {
    async fn execute(
        &self,
        code: &[String],
        data: &DataFrame,
        _summary: &Summary,
        library: ChartLibrary,
    ) -> Vec<ChartExecutorResponse> {
        code.iter()
            .map(|program| match check_contract(program) {
                Ok(()) => {
                    debug!(library = %library, rows = data.n_rows(), "Dry run accepted program");
                    ChartExecutorResponse::success(program.clone(), None, library.name())
                }
                Err(error) => ChartExecutorResponse::failure(program.clone(), error, library.name()),
            })
            .collect()
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}
