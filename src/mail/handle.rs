use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use uuid::Uuid;

use super::DeliveryOutcome;

/// Caller-held reference to a pending mail delivery.
///
/// Resolves exactly once. A worker that goes away without reporting (panic,
/// runtime shutdown) resolves the handle as failed.
#[derive(Debug)]
pub struct DeliveryHandle {
    request_id: Uuid,
    state: HandleState,
}

#[derive(Debug)]
enum HandleState {
    Pending(oneshot::Receiver<DeliveryOutcome>),
    Resolved(DeliveryOutcome),
}

/// Worker side of a [`DeliveryHandle`]
#[derive(Debug)]
pub(crate) struct OutcomeSender(oneshot::Sender<DeliveryOutcome>);

impl OutcomeSender {
    pub(crate) fn resolve(self, outcome: DeliveryOutcome) {
        // The caller may have dropped the handle; nothing to report to then
        let _ = self.0.send(outcome);
    }
}

impl DeliveryHandle {
    pub(crate) fn pending(request_id: Uuid) -> (OutcomeSender, Self) {
        let (tx, rx) = oneshot::channel();
        (
            OutcomeSender(tx),
            Self {
                request_id,
                state: HandleState::Pending(rx),
            },
        )
    }

    pub(crate) fn resolved(request_id: Uuid, outcome: DeliveryOutcome) -> Self {
        Self {
            request_id,
            state: HandleState::Resolved(outcome),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Outcome if already resolved, without waiting
    pub fn try_outcome(&mut self) -> Option<DeliveryOutcome> {
        match &mut self.state {
            HandleState::Resolved(outcome) => Some(*outcome),
            HandleState::Pending(rx) => {
                let outcome = match rx.try_recv() {
                    Ok(outcome) => outcome,
                    Err(oneshot::error::TryRecvError::Empty) => return None,
                    Err(oneshot::error::TryRecvError::Closed) => DeliveryOutcome::failed(),
                };
                self.state = HandleState::Resolved(outcome);
                Some(outcome)
            }
        }
    }

    /// Block the current thread until resolved.
    ///
    /// Must not be called from inside an async runtime.
    pub fn wait_blocking(self) -> DeliveryOutcome {
        match self.state {
            HandleState::Resolved(outcome) => outcome,
            HandleState::Pending(rx) => rx.blocking_recv().unwrap_or_else(|_| DeliveryOutcome::failed()),
        }
    }
}

impl Future for DeliveryHandle {
    type Output = DeliveryOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = match &mut self.state {
            HandleState::Resolved(outcome) => *outcome,
            HandleState::Pending(rx) => match Pin::new(rx).poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(result) => result.unwrap_or_else(|_| DeliveryOutcome::failed()),
            },
        };
        self.state = HandleState::Resolved(outcome);
        Poll::Ready(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[test]
    fn test_pending_then_resolved() {
        let (sender, handle) = DeliveryHandle::pending(Uuid::new_v4());
        let mut task = task::spawn(handle);

        assert_pending!(task.poll());
        sender.resolve(DeliveryOutcome::delivered());
        assert!(task.is_woken());
        assert_ready_eq!(task.poll(), DeliveryOutcome::delivered());
    }

    #[test]
    fn test_dropped_sender_resolves_failed() {
        let (sender, mut handle) = DeliveryHandle::pending(Uuid::new_v4());
        assert_eq!(handle.try_outcome(), None);

        drop(sender);
        assert_eq!(handle.try_outcome(), Some(DeliveryOutcome::failed()));
        // Terminal once resolved
        assert_eq!(handle.try_outcome(), Some(DeliveryOutcome::failed()));
    }

    #[test]
    fn test_wait_blocking_on_plain_thread() {
        let (sender, handle) = DeliveryHandle::pending(Uuid::new_v4());
        let worker = std::thread::spawn(move || sender.resolve(DeliveryOutcome::delivered()));

        assert!(handle.wait_blocking().is_success());
        worker.join().unwrap();
    }

    #[tokio::test]
    async fn test_pre_resolved_handle() {
        let handle = DeliveryHandle::resolved(Uuid::new_v4(), DeliveryOutcome::failed());
        assert!(!handle.await.success);
    }
}
