use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::board::{now_ms, Board};
use crate::store::{RecordStore, WalStore};

/// Background task that drops undo tokens whose window has closed.
pub async fn run_reaper<S: RecordStore>(board: Arc<Board<S>>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let purged = board.purge_expired_undo(now_ms());
        if purged > 0 {
            debug!("reaped {purged} expired undo tokens");
        }
    }
}

/// Background task that rewrites the log once enough appends piled up.
pub async fn run_compactor(store: Arc<WalStore>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_due(&store, threshold).await {
            warn!("compaction of {} failed: {e}", store.path().display());
        }
    }
}

/// One compactor tick. Returns the number of records written, if it ran.
pub async fn compact_if_due(
    store: &WalStore,
    threshold: u64,
) -> Result<Option<usize>, crate::store::StoreError> {
    let appends = store.appends_since_compact().await?;
    if appends < threshold {
        return Ok(None);
    }
    let kept = store.compact().await?;
    info!(
        "compacted {}: {appends} appends down to {kept} records",
        store.path().display()
    );
    Ok(Some(kept))
}
