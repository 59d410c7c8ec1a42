// Progress publisher - fire-and-forget broadcast of execution events
use crate::domain::event::{EventEnvelope, ExecutionEvent};
use futures::{Stream, StreamExt};
use tokio::sync::broadcast::{self, Receiver, Sender};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct ProgressPublisher {
    sender: Sender<EventEnvelope>,
}

impl ProgressPublisher {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self { sender }
    }

    /// Never blocks; slow subscribers lag and drop events instead of stalling the emitter.
    pub fn publish(&self, event: ExecutionEvent) {
        let envelope = EventEnvelope::from(event);
        if self.sender.send(envelope).is_err() {
            tracing::trace!("no subscribers for execution event");
        }
    }

    /// Events emitted from now on, for every execution
    pub fn subscribe(&self) -> Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Events emitted from now on for one execution, in emission order
    pub fn subscribe_execution(
        &self,
        execution_id: Uuid,
    ) -> impl Stream<Item = EventEnvelope> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(move |item| async move {
            match item {
                Ok(envelope) if envelope.execution_id == execution_id => Some(envelope),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        "event subscriber for {} lagged, {} events skipped",
                        execution_id,
                        skipped
                    );
                    None
                }
            }
        })
    }
}
