//! Backends that turn a conversation history into one assistant reply.
//!
//! - [`DirectBackend`] sends one non-streaming completion request to the hosted
//!   deployment, attaching search grounding when it is configured.
//! - [`ProxyBackend`] posts the history to the local proxy and renders its event
//!   stream as it arrives.
//!
//! Neither backend touches the conversation log; that is the session's job.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::accumulating_stream::AccumulatingStream;
use crate::client::AzureOpenAI;
use crate::error::{Error, Result};
use crate::observability::{STREAM_DURATION, STREAM_IDLE_TIMEOUTS};
use crate::proxy::ProxyClient;
use crate::render::Renderer;
use crate::reply::Reply;
use crate::settings::SearchSettings;
use crate::types::{
    ChatCompletionRequest, Message, Role, SamplingParams, StreamEvent, StreamEventType,
};

const INTERRUPTED: &str = "interrupted by user";

/// Something that can answer a conversation.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// One-line description for banners and `/config`.
    fn describe(&self) -> String;

    /// Change the backend address.  Backends without one reject this.
    fn set_address(&mut self, address: &str) -> Result<()> {
        Err(Error::validation(
            format!("this backend has no address to change (got {address:?})"),
            Some("address".to_string()),
        ))
    }

    /// Produce the reply to `history`, rendering text as it becomes available.
    ///
    /// Never fails: transport and protocol failures come back as error-marked
    /// replies.  Tripping `cancel` ends the turn early with whatever arrived.
    async fn complete(
        &self,
        history: &[Message],
        sampling: &SamplingParams,
        renderer: &mut dyn Renderer,
        cancel: &CancellationToken,
    ) -> Reply;
}

///////////////////////////////////////////// Direct ////////////////////////////////////////////

/// Non-streaming completions against the hosted deployment.
#[derive(Debug, Clone)]
pub struct DirectBackend {
    client: AzureOpenAI,
    search: SearchSettings,
}

impl DirectBackend {
    /// Create a backend from a client and search settings.
    pub fn new(client: AzureOpenAI, search: SearchSettings) -> Self {
        Self { client, search }
    }

    /// The search settings used for grounding.
    pub fn search(&self) -> &SearchSettings {
        &self.search
    }

    /// Shape the request for `history`.
    ///
    /// When the first message is a non-blank system message its text doubles as
    /// the role information of the search data source.
    pub fn shape_request(
        &self,
        history: &[Message],
        sampling: &SamplingParams,
    ) -> ChatCompletionRequest {
        let role_information = history
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str());
        let extra_body = self.search.descriptor(role_information);
        ChatCompletionRequest::shape(self.client.deployment(), history, sampling, extra_body)
    }
}

#[async_trait]
impl ChatBackend for DirectBackend {
    fn describe(&self) -> String {
        format!(
            "Model: {} · {}",
            self.client.deployment(),
            self.search.status()
        )
    }

    async fn complete(
        &self,
        history: &[Message],
        sampling: &SamplingParams,
        renderer: &mut dyn Renderer,
        cancel: &CancellationToken,
    ) -> Reply {
        let request = self.shape_request(history, sampling);
        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Reply::failed(Message::assistant(""), Error::abort(INTERRUPTED))
            }
            result = self.client.send(&request) => Reply::from_completion(result),
        };
        if !reply.message.content.is_empty() {
            renderer.print_text(&reply.message.content);
        }
        reply
    }
}

///////////////////////////////////////////// Proxy /////////////////////////////////////////////

/// Streaming replies from the local proxy backend.
#[derive(Debug, Clone)]
pub struct ProxyBackend {
    client: ProxyClient,
    idle_timeout: Duration,
}

impl ProxyBackend {
    /// Create a backend that abandons a turn after `idle_timeout` of silence,
    /// whether waiting for the response or reading the stream.
    pub fn new(client: ProxyClient, idle_timeout: Duration) -> Self {
        Self {
            client,
            idle_timeout,
        }
    }

    /// The underlying client.
    pub fn client(&self) -> &ProxyClient {
        &self.client
    }
}

#[async_trait]
impl ChatBackend for ProxyBackend {
    fn describe(&self) -> String {
        format!("Backend: {}", self.client.base_url())
    }

    fn set_address(&mut self, address: &str) -> Result<()> {
        self.client.set_base_url(address)
    }

    async fn complete(
        &self,
        history: &[Message],
        _sampling: &SamplingParams,
        renderer: &mut dyn Renderer,
        cancel: &CancellationToken,
    ) -> Reply {
        // The idle timeout also bounds the wait for response headers.
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::abort(INTERRUPTED)),
            opened = tokio::time::timeout(self.idle_timeout, self.client.chat(history)) => {
                opened.unwrap_or_else(|_| {
                    STREAM_IDLE_TIMEOUTS.click();
                    tracing::warn!(idle_timeout = ?self.idle_timeout, "no response from backend");
                    Err(Error::timeout(
                        "no response from backend",
                        Some(self.idle_timeout.as_secs_f64()),
                    ))
                })
            }
        };
        let stream = match opened {
            Ok(stream) => stream,
            Err(err) => return Reply::failed(Message::assistant(""), err),
        };
        let reply = consume_stream(stream, renderer, self.idle_timeout, cancel).await;
        if !reply.is_error() {
            if let Some(logger) = self.client.logger() {
                logger.log_stream_message(&reply.message);
            }
        }
        reply
    }
}

enum Step {
    Event(StreamEvent),
    Failed,
    Done,
    Idle,
    Cancelled,
}

/// Drain an event stream into a reply, rendering text as it arrives.
///
/// Each read waits at most `idle_timeout`.  An idle timeout, a transport error
/// or `cancel` ends the reply with the text accumulated so far and an error.
pub async fn consume_stream<S>(
    stream: S,
    renderer: &mut dyn Renderer,
    idle_timeout: Duration,
    cancel: &CancellationToken,
) -> Reply
where
    S: Stream<Item = Result<StreamEvent>> + Send + 'static,
{
    let start = Instant::now();
    let mut acc = AccumulatingStream::new(stream);
    loop {
        let step = tokio::select! {
            biased;
            _ = cancel.cancelled() => Step::Cancelled,
            next = tokio::time::timeout(idle_timeout, acc.next()) => match next {
                Ok(Some(Ok(event))) => Step::Event(event),
                Ok(Some(Err(_))) => Step::Failed,
                Ok(None) => Step::Done,
                Err(_) => Step::Idle,
            },
        };
        match step {
            Step::Event(event) => match (event.kind, event.content) {
                (StreamEventType::Message, Some(delta)) => renderer.print_text(&delta),
                (StreamEventType::CompletedMessage, Some(_)) => renderer.replace_text(acc.text()),
                _ => {}
            },
            Step::Failed | Step::Done => break,
            Step::Idle => {
                STREAM_IDLE_TIMEOUTS.click();
                tracing::warn!(?idle_timeout, "stream idle; giving up");
                acc.fail(Error::timeout(
                    "no data received from backend",
                    Some(idle_timeout.as_secs_f64()),
                ));
                break;
            }
            Step::Cancelled => {
                tracing::info!("stream cancelled");
                acc.fail(Error::abort(INTERRUPTED));
                break;
            }
        }
    }
    STREAM_DURATION.add(start.elapsed().as_secs_f64());
    acc.finalize()
}
