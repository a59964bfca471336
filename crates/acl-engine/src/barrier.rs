use std::sync::Arc;

use tokio::task;
use tracing::{debug, info, warn};

use cardbridge_acs_store::AcsStore;

use crate::config::BarrierConfig;
use crate::errors::EngineError;

async fn download_pending(store: &Arc<dyn AcsStore>) -> Result<bool, EngineError> {
    let store = Arc::clone(store);
    let pending = task::spawn_blocking(move || store.full_download_pending())
        .await
        .map_err(|err| EngineError::Task(err.to_string()))??;
    Ok(pending)
}

/// Polls until the comm server has cleared every full-download flag.
///
/// Each check runs on the blocking pool and holds the store guard only for the read.
pub(crate) async fn wait_for_full_download(
    store: &Arc<dyn AcsStore>,
    config: &BarrierConfig,
) -> Result<u32, EngineError> {
    for attempt in 1..=config.attempts {
        if !download_pending(store).await? {
            info!(attempt, "comm server finished downloading");
            return Ok(attempt);
        }
        debug!(attempt, interval = ?config.interval, "download still pending");
        if attempt < config.attempts {
            tokio::time::sleep(config.interval).await;
        }
    }
    warn!(attempts = config.attempts, "comm server download timed out");
    Err(EngineError::BarrierTimeout {
        attempts: config.attempts,
    })
}
