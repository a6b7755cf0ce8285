//! Retry loop for the asset archive outbox.
//!
//! Success reconciliation archives inline on a best-effort basis; anything
//! that failed (or was interrupted) is picked up here once its backoff has
//! elapsed. Claims are leased, so several instances can run this loop.

use std::time::Duration;

use mediagen_pipeline::AssetArchiver;
use tokio_util::sync::CancellationToken;

/// Run the archive retry loop until `cancel` is triggered.
pub async fn run(
    archiver: AssetArchiver,
    interval: Duration,
    batch_size: i64,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        batch_size,
        "Asset archive job started"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Asset archive job stopping");
                break;
            }
            _ = ticker.tick() => {
                match archiver.run_due(batch_size).await {
                    Ok(summary) if summary.archived + summary.retried + summary.failed > 0 => {
                        tracing::info!(
                            archived = summary.archived,
                            retried = summary.retried,
                            failed = summary.failed,
                            "Asset archive: processed due jobs"
                        );
                    }
                    Ok(_) => tracing::debug!("Asset archive: no due jobs"),
                    Err(e) => tracing::error!(error = %e, "Asset archive: cycle failed"),
                }
            }
        }
    }
}
