//! Client for the local proxy backend, which streams replies as server-sent events.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures::{Stream, StreamExt};
use reqwest::Client as ReqwestClient;
use reqwest::header::{self, HeaderValue};
use url::Url;

use crate::client::{map_request_error, normalize_base_url, process_error_response};
use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::observability::{STREAM_ERRORS, STREAM_EVENTS, STREAM_REQUESTS, STREAM_TTFB};
use crate::settings::ProxySettings;
use crate::sse::process_sse;
use crate::types::{Message, ProxyChatRequest, StreamEvent};

/// Client for `POST {base}/chat` on the proxy backend.
///
/// Only connecting is bounded by a timeout; an open stream is bounded by the
/// caller's idle timeout instead.
#[derive(Clone)]
pub struct ProxyClient {
    client: ReqwestClient,
    base_url: Url,
    username: Option<String>,
    password: Option<String>,
    connect_timeout: std::time::Duration,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl std::fmt::Debug for ProxyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyClient")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("has_logger", &self.logger.is_some())
            .finish()
    }
}

impl ProxyClient {
    /// Create a client from resolved proxy settings.
    pub fn new(settings: &ProxySettings) -> Result<Self> {
        let base_url = parse_base_url(&settings.base_url)
            .map_err(|e| Error::client_init(e.to_string(), Some(Box::new(e))))?;
        let client = ReqwestClient::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|e| {
                Error::client_init(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;
        Ok(Self {
            client,
            base_url,
            username: settings.username.clone(),
            password: settings.password.clone(),
            connect_timeout: settings.connect_timeout,
            logger: None,
        })
    }

    /// Attach a logger that sees every stream event.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The logger, if one is attached.
    pub fn logger(&self) -> Option<&Arc<dyn ClientLogger>> {
        self.logger.as_ref()
    }

    /// The backend base address.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Point the client at a different backend.
    ///
    /// The address is validated before it replaces the current one.
    pub fn set_base_url(&mut self, base_url: &str) -> Result<()> {
        self.base_url = parse_base_url(base_url)?;
        tracing::info!(base_url = %self.base_url, "backend address changed");
        Ok(())
    }

    /// Post the conversation and return the decoded event stream.
    pub async fn chat(
        &self,
        history: &[Message],
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>> {
        STREAM_REQUESTS.click();
        let url = self.base_url.join("chat")?;
        tracing::debug!(%url, messages = history.len(), "opening chat stream");

        let mut request = self
            .client
            .post(url)
            .header(header::ACCEPT, HeaderValue::from_static("text/event-stream"))
            .json(&ProxyChatRequest::new(history));
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        let start = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| map_request_error(e, self.connect_timeout))
            .inspect_err(|_| STREAM_ERRORS.click())?;
        if !response.status().is_success() {
            STREAM_ERRORS.click();
            return Err(process_error_response(response).await);
        }
        STREAM_TTFB.add(start.elapsed().as_secs_f64());

        let logger = self.logger.clone();
        let events = process_sse(response.bytes_stream()).inspect(move |event| match event {
            Ok(event) => {
                STREAM_EVENTS.click();
                tracing::trace!(kind = ?event.kind, "stream event");
                if let Some(logger) = &logger {
                    logger.log_stream_event(event);
                }
            }
            Err(err) => {
                STREAM_ERRORS.click();
                tracing::warn!(error = %err, "stream interrupted");
            }
        });
        Ok(Box::pin(events))
    }
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(&normalize_base_url(base_url))
        .map_err(|e| Error::url(format!("invalid backend address {base_url:?}: {e}"), Some(e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Error::url(
            format!("unsupported scheme {scheme:?} in backend address"),
            None,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings(base_url: &str) -> ProxySettings {
        ProxySettings {
            base_url: base_url.to_string(),
            username: None,
            password: None,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = ProxyClient::new(&settings("http://localhost:8000")).unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8000/");
        assert_eq!(
            client.base_url().join("chat").unwrap().as_str(),
            "http://localhost:8000/chat"
        );
    }

    #[test]
    fn nested_base_url() {
        let client = ProxyClient::new(&settings("https://example.com/api")).unwrap();
        assert_eq!(
            client.base_url().join("chat").unwrap().as_str(),
            "https://example.com/api/chat"
        );
    }

    #[test]
    fn set_base_url_validates() {
        let mut client = ProxyClient::new(&settings("http://localhost:8000/")).unwrap();
        assert!(client.set_base_url("not a url").is_err());
        assert!(client.set_base_url("ftp://example.com/").is_err());
        assert_eq!(client.base_url().as_str(), "http://localhost:8000/");
        client.set_base_url("http://backend:9000").unwrap();
        assert_eq!(client.base_url().as_str(), "http://backend:9000/");
    }

    #[test]
    fn invalid_initial_url() {
        let err = ProxyClient::new(&settings("::")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ClientInitFailure);
    }
}
