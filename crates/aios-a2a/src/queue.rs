//! Outbound event queues for the server role.

use aios_protocol::{A2aError, A2aResult, EventQueue, WireEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Bounded channel queue. The receiving half is handed to whoever streams the
/// events out (an SSE response, usually); once it is dropped every write
/// fails with [`A2aError::Sink`].
#[derive(Debug, Clone)]
pub struct ChannelEventQueue {
    sender: mpsc::Sender<WireEvent>,
}

impl ChannelEventQueue {
    pub fn channel(buffer: usize) -> (Self, ReceiverStream<WireEvent>) {
        let (sender, receiver) = mpsc::channel(buffer);
        (Self { sender }, ReceiverStream::new(receiver))
    }
}

#[async_trait]
impl EventQueue for ChannelEventQueue {
    async fn write(&self, event: WireEvent) -> A2aResult<()> {
        self.sender
            .send(event)
            .await
            .map_err(|_| A2aError::Sink("event queue receiver dropped".into()))
    }
}

/// Buffers every event in memory, for request/response style calls.
#[derive(Debug, Default)]
pub struct CollectingEventQueue {
    events: Mutex<Vec<WireEvent>>,
}

impl CollectingEventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<WireEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

#[async_trait]
impl EventQueue for CollectingEventQueue {
    async fn write(&self, event: WireEvent) -> A2aResult<()> {
        self.events.lock().push(event);
        Ok(())
    }
}
