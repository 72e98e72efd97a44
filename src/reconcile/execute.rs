// ABOUTME: Runs one statement batch inside a single transaction
// ABOUTME: Sets a local lock timeout first and rolls back everything on the first failure

use super::statement::Statement;
use crate::utils::quote_literal;
use anyhow::{Context, Result};
use tokio_postgres::Client;

/// Execute `statements` atomically on `client`
///
/// `SET LOCAL lock_timeout` runs before anything else so a statement blocked
/// on a lock fails fast instead of hanging. The first failing statement aborts
/// the batch and nothing from it is committed.
pub async fn execute_batch(
    client: &mut Client,
    label: &str,
    statements: &[Statement],
    lock_timeout: &str,
) -> Result<()> {
    if statements.is_empty() {
        tracing::debug!(server = %label, "Nothing to execute");
        return Ok(());
    }

    let transaction = client
        .transaction()
        .await
        .with_context(|| format!("Failed to begin transaction on {}", label))?;

    transaction
        .batch_execute(&format!(
            "SET LOCAL lock_timeout = {}",
            quote_literal(lock_timeout)
        ))
        .await
        .with_context(|| format!("Failed to set lock_timeout on {}", label))?;

    for (position, statement) in statements.iter().enumerate() {
        tracing::debug!(server = %label, "{}", statement);
        let outcome = transaction.batch_execute(&statement.render()).await;
        if let Err(e) = outcome {
            tracing::error!(
                server = %label,
                "Statement {} of {} failed, rolling back: {}",
                position + 1,
                statements.len(),
                e
            );
            if let Err(rollback) = transaction.rollback().await {
                tracing::warn!(server = %label, "Rollback failed: {}", rollback);
            }
            return Err(anyhow::Error::new(e).context(format!(
                "Failed to execute on {}: {}",
                label, statement
            )));
        }
    }

    transaction
        .commit()
        .await
        .with_context(|| format!("Failed to commit batch on {}", label))?;

    tracing::info!(server = %label, "Executed {} statement(s)", statements.len());
    Ok(())
}
