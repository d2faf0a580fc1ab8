use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that compacts the WAL once enough commits have piled up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        maybe_compact(&engine, threshold).await;
    }
}

/// Compact if at least `threshold` commits were appended since the last
/// compaction. Returns whether a compaction ran.
pub async fn maybe_compact(engine: &Engine, threshold: u64) -> bool {
    let appends = engine.wal_appends_since_compact().await;
    if threshold == 0 || appends < threshold {
        return false;
    }
    match engine.compact_wal().await {
        Ok(()) => {
            info!("compacted WAL after {appends} commits");
            true
        }
        Err(e) => {
            tracing::warn!("WAL compaction failed: {e}");
            false
        }
    }
}
