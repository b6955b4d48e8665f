//! The single ordered output channel of a request.
//!
//! The scheduler writes one-shot results and drains streaming stages into the
//! same [`EventWriter`] strictly in stage order; the caller reads the
//! [`EventStream`]. Dropping the stream closes the channel and the scheduler
//! stops at the next stage boundary.

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::core::PipelineEvent;

/// Creates a bounded event channel.
///
/// ```
/// use routeflow::core::{PipelineEvent, StageName};
/// use routeflow::events::channel;
///
/// # tokio_test::block_on(async {
/// let (writer, stream) = channel(8);
/// assert!(writer.write(PipelineEvent::token(StageName::Summary, "hi")).await);
/// drop(writer);
/// assert_eq!(stream.collect_all().await.len(), 1);
/// # });
/// ```
#[must_use]
pub fn channel(capacity: usize) -> (EventWriter, EventStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventWriter { tx }, EventStream { rx })
}

/// The writing half held by the scheduler.
#[derive(Debug, Clone)]
pub struct EventWriter {
    tx: mpsc::Sender<PipelineEvent>,
}

impl EventWriter {
    /// Writes one event. Returns false if the caller has gone away.
    pub async fn write(&self, event: PipelineEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    /// Returns true if the caller dropped the stream.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The reading half returned to the caller.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<PipelineEvent>,
}

impl EventStream {
    /// Receives the next event.
    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        self.rx.recv().await
    }

    /// Drains the stream to completion.
    pub async fn collect_all(mut self) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}

impl Stream for EventStream {
    type Item = PipelineEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageName;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_events_arrive_in_write_order() {
        let (writer, stream) = channel(8);
        writer
            .write(PipelineEvent::fatal("first"))
            .await;
        writer
            .write(PipelineEvent::token(StageName::Summary, "second"))
            .await;
        drop(writer);

        let events = stream.collect_all().await;
        assert_eq!(events.len(), 2);
        assert!(events[0].is_error());
        assert!(events[1].is_token());
    }

    #[tokio::test]
    async fn test_writer_notices_dropped_stream() {
        let (writer, stream) = channel(1);
        drop(stream);

        assert!(writer.is_closed());
        assert!(!writer.write(PipelineEvent::fatal("lost")).await);
    }

    #[tokio::test]
    async fn test_event_stream_implements_stream() {
        let (writer, mut stream) = channel(4);
        writer.write(PipelineEvent::fatal("x")).await;
        drop(writer);

        assert!(StreamExt::next(&mut stream).await.is_some());
        assert!(StreamExt::next(&mut stream).await.is_none());
    }
}
