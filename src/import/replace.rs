// Replace-reconciliation: drop every imported load, re-import from a source
//
// Runs in one IMMEDIATE transaction. Any failure (count mismatch, unreadable
// source, storage error) drops the transaction and the store is unchanged.

use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

use crate::db::schema::{count_loads, count_user_loads, delete_imported_loads, DeleteOutcome, Source};
use crate::error::{LoadbookError, Result};
use super::pipeline::import_from_source;
use super::{RowError, RowSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceCounts {
    pub before: usize,
    pub after: usize,
    pub user_loads: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaceSummary {
    pub deleted: usize,
    pub preserved: usize,
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<RowError>,
    pub counts: ReplaceCounts,
}

fn verify_delete(outcome: &DeleteOutcome) -> Result<()> {
    if outcome.deleted_count != outcome.expected_deletes {
        log::error!(
            "Delete count mismatch: expected {}, deleted {}; rolling back",
            outcome.expected_deletes,
            outcome.deleted_count
        );
        return Err(LoadbookError::DeleteCountMismatch {
            expected: outcome.expected_deletes,
            actual: outcome.deleted_count,
        });
    }
    Ok(())
}

pub fn replace_imported_data(conn: &mut Connection, source: &dyn RowSource) -> Result<ReplaceSummary> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let before = count_loads(&tx)?;

    let outcome = delete_imported_loads(&tx)?;
    verify_delete(&outcome)?;
    log::info!(
        "Deleted {} imported loads, preserved {} user loads",
        outcome.deleted_count,
        outcome.preserved_count
    );

    let import = import_from_source(&tx, source, &Source::imported());
    if !import.success {
        return Err(LoadbookError::ImportFailedAfterDelete {
            deleted: outcome.deleted_count,
            errors: import.errors,
        });
    }

    let after = count_loads(&tx)?;
    let user_loads = count_user_loads(&tx)?;
    tx.commit()?;

    log::info!(
        "Replace from {} complete: {} -> {} loads ({} imported, {} skipped, {} errors)",
        source.describe(),
        before,
        after,
        import.imported,
        import.skipped,
        import.errors.len()
    );

    Ok(ReplaceSummary {
        deleted: outcome.deleted_count,
        preserved: outcome.preserved_count,
        imported: import.imported,
        skipped: import.skipped,
        errors: import.errors,
        counts: ReplaceCounts {
            before,
            after,
            user_loads,
        },
    })
}
