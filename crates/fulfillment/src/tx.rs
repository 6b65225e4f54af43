use store::Transaction;

use crate::error::Result;

/// Ends a transaction according to the outcome of the work done in it:
/// commits on success, rolls back on error and hands the error back.
pub(crate) async fn finish<T: Transaction, R>(tx: T, outcome: Result<R>) -> Result<R> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
