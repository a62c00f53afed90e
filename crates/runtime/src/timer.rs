use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;

/// A pending one-shot timer that can be cancelled by its owner.
///
/// Cancelling is best effort: a fire that is already queued on the receiving
/// side is not recalled, so receivers must still check that the fire is
/// current.
pub trait TimerHandle: fmt::Debug + Send {
    fn cancel(&self);
}

impl TimerHandle for AbortHandle {
    fn cancel(&self) {
        self.abort();
    }
}

/// Deliver `message` on `tx` once `delay` has elapsed.
///
/// Must be called from within a tokio runtime. A closed channel drops the
/// message silently.
pub fn send_after<T>(delay: Duration, tx: UnboundedSender<T>, message: T) -> AbortHandle
where
    T: Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(message);
    })
    .abort_handle()
}
