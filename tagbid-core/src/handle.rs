use tokio::task::JoinHandle;

/// Handle to a spawned prefetch cycle.
///
/// Dropping the handle does not cancel the prefetch: once issued, a fetch is
/// always driven to completion so the cycle reaches its terminal state.
#[derive(Debug)]
pub struct PrefetchHandle {
    inner: Option<JoinHandle<()>>,
}

impl PrefetchHandle {
    /// Wrap the task running a prefetch cycle.
    #[must_use]
    pub const fn new(inner: JoinHandle<()>) -> Self {
        Self { inner: Some(inner) }
    }

    /// Handle for a prefetch that was skipped (e.g. prefetching is disabled).
    #[must_use]
    pub const fn skipped() -> Self {
        Self { inner: None }
    }

    /// True if no fetch was issued for this call.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        self.inner.is_none()
    }

    /// Return `true` if the cycle's fetch has completed (or was skipped).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait until the cycle's fetch has completed and its state was published.
    pub async fn wait(self) {
        if let Some(h) = self.inner {
            let _ = h.await;
        }
    }
}
