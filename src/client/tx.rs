use deadpool_postgres::{Object, Transaction};
use log::{debug, warn};

use super::error::{op, ClientError, Result};

pub(crate) async fn begin<'a>(
    client: &'a mut Object,
    operation: &'static str,
) -> Result<Transaction<'a>> {
    client
        .transaction()
        .await
        .map_err(|e| ClientError::query_step(operation, Some(op::START_TRANSACTION), e))
}

/// Run one statement inside `tx`, returning the affected row count.
pub(crate) async fn execute(
    tx: &Transaction<'_>,
    operation: &'static str,
    step: &'static str,
    sql: &str,
) -> Result<u64> {
    let rows = tx
        .execute(sql, &[])
        .await
        .map_err(|e| ClientError::query_step(operation, Some(step), e))?;
    debug!("query executed successfully, rows_affected={}", rows);
    Ok(rows)
}

/// Commit on success, roll back otherwise.
pub(crate) async fn finish<T>(
    tx: Transaction<'_>,
    operation: &'static str,
    result: Result<T>,
) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| ClientError::query_step(operation, Some(op::COMMIT_TRANSACTION), e))?;
            Ok(value)
        }
        Err(err) => {
            rollback(tx, operation).await;
            Err(err)
        }
    }
}

/// A rollback failure never masks the original error.
pub(crate) async fn rollback(tx: Transaction<'_>, operation: &'static str) {
    match tx.rollback().await {
        Ok(()) => debug!("{}: transaction rolled back", operation),
        Err(e) if e.is_closed() => {
            debug!("{}: transaction already finished before rollback", operation)
        }
        Err(e) => warn!("{}: error rolling back transaction: {}", operation, e),
    }
}
