use std::collections::VecDeque;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::core::Shared;
use crate::prefetch::DeferredCall;

/// Replay `calls` in arrival order on a separate task.
///
/// Callers publish the cycle's new state before scheduling, so every replayed
/// call re-runs its overlap check against it.
pub(crate) fn schedule_replay(
    shared: &Arc<Shared>,
    calls: VecDeque<DeferredCall>,
) -> Option<JoinHandle<()>> {
    if calls.is_empty() {
        return None;
    }
    #[cfg(feature = "tracing")]
    tracing::debug!(calls = calls.len(), "scheduling deferred replay");
    let shared = Arc::clone(shared);
    Some(tokio::spawn(async move {
        for call in calls {
            shared.admit(call);
        }
    }))
}
