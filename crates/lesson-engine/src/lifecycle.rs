//! Screen-orientation ownership for the lifetime of a lesson view.
//!
//! Orientation changes are platform calls that may stall, so they run on a
//! worker task fed through a channel. Focus changes only queue a request and
//! never wait for the platform.

use crate::error::LessonError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long [`LifecycleGuard::release`] waits for the platform to unlock.
const RELEASE_TIMEOUT: Duration = Duration::from_secs(2);

/// The platform's screen-orientation control.
#[async_trait]
pub trait OrientationLock: Send + Sync {
    async fn lock_landscape(&self) -> Result<(), LessonError>;
    async fn unlock(&self) -> Result<(), LessonError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrientationRequest {
    Lock,
    Unlock,
}

/// Holds the landscape lock while the lesson view is in focus.
///
/// Locking is best-effort: a failure is logged and the lesson carries on.
/// Releasing always asks the platform to unlock, even when the lock was
/// refused, so a partially applied lock is undone too. Dropping an
/// unreleased guard releases it.
pub struct LifecycleGuard {
    requests: Option<mpsc::UnboundedSender<OrientationRequest>>,
    worker: Option<JoinHandle<()>>,
    focused: bool,
}

impl LifecycleGuard {
    /// Starts the orientation worker and asks for the landscape lock.
    pub fn acquire(orientation: Arc<dyn OrientationLock>) -> Self {
        let (requests, rx) = mpsc::unbounded_channel();
        let mut guard = Self {
            requests: Some(requests),
            worker: Some(tokio::spawn(apply_requests(orientation, rx))),
            focused: false,
        };
        guard.focus_gained();
        guard
    }

    pub fn focus_gained(&mut self) {
        if !self.focused {
            self.focused = self.send(OrientationRequest::Lock);
        }
    }

    pub fn focus_lost(&mut self) {
        if self.focused {
            self.focused = false;
            self.send(OrientationRequest::Unlock);
        }
    }

    /// Unlocks the orientation and waits, for a bounded time, until the
    /// platform has been told. Safe to call repeatedly.
    pub async fn release(&mut self) {
        let Some(requests) = self.requests.take() else {
            return;
        };
        self.focused = false;
        let _ = requests.send(OrientationRequest::Unlock);
        drop(requests);

        if let Some(worker) = self.worker.take() {
            if tokio::time::timeout(RELEASE_TIMEOUT, worker).await.is_err() {
                warn!("Orientation unlock is still pending; leaving it to finish in the background");
            }
        }
    }

    fn send(&self, request: OrientationRequest) -> bool {
        self.requests
            .as_ref()
            .is_some_and(|requests| requests.send(request).is_ok())
    }
}

impl Drop for LifecycleGuard {
    fn drop(&mut self) {
        if let Some(requests) = self.requests.take() {
            let _ = requests.send(OrientationRequest::Unlock);
        }
    }
}

async fn apply_requests(
    orientation: Arc<dyn OrientationLock>,
    mut requests: mpsc::UnboundedReceiver<OrientationRequest>,
) {
    while let Some(request) = requests.recv().await {
        let result = match request {
            OrientationRequest::Lock => orientation.lock_landscape().await,
            OrientationRequest::Unlock => orientation.unlock().await,
        };
        match result {
            Ok(()) => debug!(?request, "Orientation updated"),
            Err(err) => warn!(?request, error = %err, "Orientation change failed"),
        }
    }
}
