use std::time::Duration;

use engine::playback::{TickHandle, TickScheduler, TickToken};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;

/// Delivers ticks through a channel after a `tokio::time::sleep`.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    sender: UnboundedSender<TickToken>,
}

impl TokioScheduler {
    pub fn channel() -> (Self, UnboundedReceiver<TickToken>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl TickScheduler for TokioScheduler {
    fn schedule(&mut self, delay: Duration, token: TickToken) -> TickHandle {
        let sender = self.sender.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The receiver is gone once the player shuts down.
            let _ = sender.send(token);
        });
        TickHandle::new(AbortOnDrop(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scheduled_tick_arrives_after_the_delay() {
        let (mut scheduler, mut ticks) = TokioScheduler::channel();
        let _handle = scheduler.schedule(Duration::from_millis(5), TickToken(7));
        assert_eq!(ticks.recv().await, Some(TickToken(7)));
    }

    #[tokio::test]
    async fn dropping_the_handle_cancels_the_tick() {
        let (mut scheduler, mut ticks) = TokioScheduler::channel();
        drop(scheduler.schedule(Duration::from_millis(20), TickToken(1)));
        let _live = scheduler.schedule(Duration::from_millis(40), TickToken(2));
        assert_eq!(ticks.recv().await, Some(TickToken(2)));
    }
}
