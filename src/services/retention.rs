use std::time::SystemTime;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{services::sse_events, state::SharedState};

/// Periodically delete sessions that have been idle past the configured TTL.
///
/// Swept sessions get a terminal `session.closed` event before their stream
/// is torn down; the sweep skips silently while storage is unavailable.
pub async fn run(state: SharedState) {
    let interval = state.config().sweep_interval;
    let ttl = state.config().session_ttl;

    loop {
        sleep(interval).await;

        let Some(store) = state.session_store().await else {
            continue;
        };

        let cutoff = SystemTime::now() - ttl;
        match store.delete_idle_since(cutoff).await {
            Ok(codes) if codes.is_empty() => {}
            Ok(codes) => {
                info!(count = codes.len(), "swept idle sessions");
                for code in codes {
                    sse_events::broadcast_session_closed(&state, &code, "expired");
                    state.forget_snapshot(&code);
                }
            }
            Err(err) => warn!(error = %err, "retention sweep failed"),
        }
    }
}
