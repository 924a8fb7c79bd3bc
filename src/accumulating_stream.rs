//! Accumulates proxy stream events into the assistant's reply while passing events through.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;

use crate::types::{Message, StreamEvent, StreamEventType};
use crate::{Error, Reply};

/// Lifecycle of one streamed reply.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StreamState {
    /// Nothing received yet.
    Idle,
    /// At least one event received; the reply is still open.
    Streaming,
    /// `stream_end` received or the stream closed cleanly.
    Finalized,
    /// The stream failed, timed out, or was cancelled.
    Failed,
}

/// A stream wrapper that accumulates [`StreamEvent`]s into the reply text.
///
/// `message` events append their content.  A `completed_message` with content
/// replaces the accumulated text.  After `stream_end` the wrapper yields that
/// event and then ends, even if the underlying stream has more to say.
pub struct AccumulatingStream {
    inner: Pin<Box<dyn Stream<Item = Result<StreamEvent, Error>> + Send>>,
    state: StreamState,
    text: String,
    error: Option<Error>,
}

impl AccumulatingStream {
    /// Wraps a `StreamEvent` stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<StreamEvent, Error>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
            state: StreamState::Idle,
            text: String::new(),
            error: None,
        }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// The text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Mark the stream failed from outside, e.g. on idle timeout or cancellation.
    ///
    /// Has no effect once the stream is finalized or already failed.
    pub fn fail(&mut self, error: Error) {
        if matches!(self.state, StreamState::Idle | StreamState::Streaming) {
            self.state = StreamState::Failed;
            self.error = Some(error);
        }
    }

    /// Consume the wrapper and produce the reply.
    ///
    /// A failed stream keeps whatever text had accumulated alongside its error.
    /// A stream that is still open is treated as cut short.
    pub fn finalize(self) -> Reply {
        let message = Message::assistant(self.text);
        match self.state {
            StreamState::Finalized => Reply::completed(message),
            StreamState::Failed => Reply::failed(
                message,
                self.error
                    .unwrap_or_else(|| Error::streaming("stream failed", None)),
            ),
            StreamState::Idle | StreamState::Streaming => Reply::failed(
                message,
                Error::streaming("stream finalized before it ended", None),
            ),
        }
    }

    fn accumulate_event(&mut self, event: &StreamEvent) {
        self.state = StreamState::Streaming;
        match event.kind {
            StreamEventType::Message => {
                if let Some(content) = &event.content {
                    self.text.push_str(content);
                }
            }
            StreamEventType::CompletedMessage => {
                if let Some(content) = &event.content {
                    self.text.clone_from(content);
                }
            }
            StreamEventType::StreamEnd => {
                self.state = StreamState::Finalized;
            }
            StreamEventType::Unknown => {}
        }
    }
}

impl Stream for AccumulatingStream {
    type Item = Result<StreamEvent, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if matches!(self.state, StreamState::Finalized | StreamState::Failed) {
            return Poll::Ready(None);
        }
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(event))) => {
                self.accumulate_event(&event);
                Poll::Ready(Some(Ok(event)))
            }
            Poll::Ready(Some(Err(e))) => {
                self.state = StreamState::Failed;
                self.error = Some(e.clone());
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.state = StreamState::Finalized;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::{self, StreamExt};

    fn events(items: Vec<Result<StreamEvent, Error>>) -> AccumulatingStream {
        AccumulatingStream::new(stream::iter(items))
    }

    #[tokio::test]
    async fn deltas_accumulate_in_order() {
        let mut acc = events(vec![
            Ok(StreamEvent::delta("Hel")),
            Ok(StreamEvent::delta("lo")),
            Ok(StreamEvent::end()),
        ]);
        assert_eq!(acc.state(), StreamState::Idle);
        acc.next().await;
        assert_eq!(acc.state(), StreamState::Streaming);
        assert_eq!(acc.text(), "Hel");
        while acc.next().await.is_some() {}
        assert_eq!(acc.state(), StreamState::Finalized);
        let reply = acc.finalize();
        assert!(!reply.is_error());
        assert_eq!(reply.message.content, "Hello");
    }

    #[tokio::test]
    async fn completed_message_replaces_text() {
        let mut acc = events(vec![
            Ok(StreamEvent::delta("Hi")),
            Ok(StreamEvent::completed(Some("Hi there!".to_string()))),
            Ok(StreamEvent::end()),
        ]);
        while acc.next().await.is_some() {}
        assert_eq!(acc.finalize().message.content, "Hi there!");
    }

    #[tokio::test]
    async fn completed_message_without_content_keeps_text() {
        let mut acc = events(vec![
            Ok(StreamEvent::delta("Hi")),
            Ok(StreamEvent::completed(None)),
            Ok(StreamEvent::end()),
        ]);
        while acc.next().await.is_some() {}
        assert_eq!(acc.finalize().message.content, "Hi");
    }

    #[tokio::test]
    async fn nothing_after_stream_end() {
        let mut acc = events(vec![
            Ok(StreamEvent::delta("a")),
            Ok(StreamEvent::end()),
            Ok(StreamEvent::delta("b")),
        ]);
        let seen: Vec<_> = (&mut acc).collect().await;
        assert_eq!(seen.len(), 2);
        assert_eq!(acc.finalize().message.content, "a");
    }

    #[tokio::test]
    async fn unknown_events_are_ignored() {
        let unknown = StreamEvent {
            kind: StreamEventType::Unknown,
            content: Some("ignored".to_string()),
        };
        let mut acc = events(vec![Ok(StreamEvent::delta("a")), Ok(unknown)]);
        while acc.next().await.is_some() {}
        assert_eq!(acc.state(), StreamState::Finalized);
        assert_eq!(acc.finalize().message.content, "a");
    }

    #[tokio::test]
    async fn error_keeps_partial_text() {
        let mut acc = events(vec![
            Ok(StreamEvent::delta("partial")),
            Err(Error::streaming("connection reset", None)),
            Ok(StreamEvent::delta("never")),
        ]);
        while acc.next().await.is_some() {}
        assert_eq!(acc.state(), StreamState::Failed);
        let reply = acc.finalize();
        assert!(reply.is_error());
        assert_eq!(reply.message.content, "partial");
    }

    #[tokio::test]
    async fn external_failure() {
        let mut acc = AccumulatingStream::new(
            stream::iter(vec![Ok(StreamEvent::delta("x"))]).chain(stream::pending()),
        );
        acc.next().await;
        acc.fail(Error::timeout("stream idle", Some(1.0)));
        assert_eq!(acc.state(), StreamState::Failed);
        assert!(acc.next().await.is_none());
        let reply = acc.finalize();
        assert!(reply.error.as_ref().unwrap().is_timeout());
        assert_eq!(reply.message.content, "x");
    }

    #[test]
    fn fail_after_finalize_is_ignored() {
        let mut acc = events(vec![]);
        acc.state = StreamState::Finalized;
        acc.fail(Error::abort("late"));
        assert_eq!(acc.state(), StreamState::Finalized);
        assert!(!acc.finalize().is_error());
    }
}
