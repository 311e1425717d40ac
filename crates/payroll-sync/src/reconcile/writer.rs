//! Best-effort application of update instructions, one cell at a time.

use thiserror::Error;

use crate::Decimal;
use crate::cell::Cell;
use crate::reconcile::UpdateInstruction;
use crate::workbook::{CellStore, TableError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Re-read every cell after writing it and count mismatches as failures.
    pub verify: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions { verify: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("read back '{actual}' after writing {expected}")]
    VerificationMismatch { expected: Decimal, actual: Cell },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub instruction: UpdateInstruction,
    pub error: WriteError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub succeeded: usize,
    pub failures: Vec<WriteFailure>,
}

impl WriteReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Apply every instruction independently. A failing cell is logged and counted; it never
/// stops the remaining writes, and nothing is rolled back.
pub fn apply_updates(
    store: &mut impl CellStore,
    instructions: &[UpdateInstruction],
    options: WriteOptions,
) -> WriteReport {
    let mut report = WriteReport::default();

    for instruction in instructions {
        match apply_one(store, instruction, options) {
            Ok(()) => report.succeeded += 1,
            Err(error) => {
                tracing::error!(
                    "Failed to write {} for {} / {}: {error}",
                    instruction.address(),
                    instruction.employee,
                    instruction.category
                );
                report.failures.push(WriteFailure {
                    instruction: instruction.clone(),
                    error,
                });
            }
        }
    }

    tracing::info!(
        "Wrote {} cell(s), {} failed",
        report.succeeded,
        report.failed()
    );
    report
}

fn apply_one(
    store: &mut impl CellStore,
    instruction: &UpdateInstruction,
    options: WriteOptions,
) -> Result<(), WriteError> {
    let UpdateInstruction {
        tab, row, column, ..
    } = instruction;

    // previous value is only for the log, an unreadable cell still gets written
    let previous = store.cell(tab, *row, *column).unwrap_or_default();
    store.set_cell(tab, *row, *column, Cell::Number(instruction.value))?;

    if options.verify {
        let actual = store.cell(tab, *row, *column)?;
        if actual.as_decimal() != Some(instruction.value) {
            return Err(WriteError::VerificationMismatch {
                expected: instruction.value,
                actual,
            });
        }
    }

    tracing::info!(
        "{}: '{previous}' -> {} ({} / {})",
        instruction.address(),
        instruction.value,
        instruction.employee,
        instruction.category
    );
    Ok(())
}
