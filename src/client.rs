use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde::Deserialize;
use url::Url;

use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_GROUNDED_REQUESTS, CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS,
};
use crate::settings::ModelSettings;
use crate::types::{ChatCompletion, ChatCompletionRequest};

/// Client for an Azure OpenAI chat completions deployment.
#[derive(Clone)]
pub struct AzureOpenAI {
    api_key: HeaderValue,
    client: ReqwestClient,
    endpoint: Url,
    deployment: String,
    api_version: String,
    timeout: Duration,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl std::fmt::Debug for AzureOpenAI {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureOpenAI")
            .field("endpoint", &self.endpoint.as_str())
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .field("has_logger", &self.logger.is_some())
            .finish()
    }
}

impl AzureOpenAI {
    /// Create a new client from resolved model settings.
    pub fn new(settings: &ModelSettings) -> Result<Self> {
        let endpoint = Url::parse(&normalize_base_url(&settings.endpoint)).map_err(|e| {
            Error::client_init(
                format!("invalid endpoint {:?}: {e}", settings.endpoint),
                Some(Box::new(e)),
            )
        })?;
        let mut api_key = HeaderValue::from_str(&settings.api_key).map_err(|e| {
            Error::client_init("API key is not a valid header value", Some(Box::new(e)))
        })?;
        api_key.set_sensitive(true);

        let timeout = settings.timeout;
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::client_init(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            api_key,
            client,
            endpoint,
            deployment: settings.deployment.clone(),
            api_version: settings.api_version.clone(),
            timeout,
            logger: None,
        })
    }

    /// Attach a logger that sees every successful completion.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The deployment (model) name requests are sent to.
    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    /// The completions URL for this deployment, including the API version.
    pub fn completions_url(&self) -> Result<Url> {
        let mut url = self.endpoint.join(&format!(
            "openai/deployments/{}/chat/completions",
            self.deployment
        ))?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("api-key", self.api_key.clone());
        headers
    }

    /// Send one non-streaming completion request.
    pub async fn send(&self, request: &ChatCompletionRequest) -> Result<ChatCompletion> {
        CLIENT_REQUESTS.click();
        if request.is_grounded() {
            CLIENT_GROUNDED_REQUESTS.click();
        }
        let start = Instant::now();
        let result = self.send_inner(request).await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        match &result {
            Ok(completion) => {
                tracing::debug!(
                    deployment = %self.deployment,
                    id = %completion.id,
                    choices = completion.choices.len(),
                    "completion received"
                );
                if let Some(logger) = &self.logger {
                    logger.log_response(completion);
                }
            }
            Err(err) => {
                CLIENT_REQUEST_ERRORS.click();
                tracing::warn!(deployment = %self.deployment, error = %err, "completion failed");
            }
        }
        result
    }

    async fn send_inner(&self, request: &ChatCompletionRequest) -> Result<ChatCompletion> {
        let url = self.completions_url()?;
        tracing::debug!(
            %url,
            messages = request.messages.len(),
            grounded = request.is_grounded(),
            "sending completion request"
        );
        let response = self
            .client
            .post(url)
            .headers(self.default_headers())
            .json(request)
            .send()
            .await
            .map_err(|e| map_request_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(process_error_response(response).await);
        }

        response.json::<ChatCompletion>().await.map_err(|e| {
            Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        })
    }
}

/// Ensure a base URL ends in `/` so relative paths resolve beneath it.
pub(crate) fn normalize_base_url(base: &str) -> String {
    let base = base.trim();
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}

/// Map a transport failure to an [`Error`].
pub(crate) fn map_request_error(e: reqwest::Error, timeout: Duration) -> Error {
    if e.is_timeout() {
        Error::timeout(
            format!("Request timed out: {e}"),
            Some(timeout.as_secs_f64()),
        )
    } else if e.is_connect() {
        Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
    } else {
        Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
    }
}

/// Convert a non-success response into an [`Error`].
pub(crate) async fn process_error_response(response: Response) -> Error {
    let status_code = response.status().as_u16();

    let request_id = response
        .headers()
        .get("x-request-id")
        .or_else(|| response.headers().get("apim-request-id"))
        .and_then(|val| val.to_str().ok())
        .map(String::from);

    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.parse::<u64>().ok());

    #[derive(Deserialize)]
    struct ErrorResponse {
        error: Option<ErrorDetail>,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        code: Option<String>,
        message: Option<String>,
        param: Option<String>,
    }

    let error_body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            return Error::http_client(
                format!("Failed to read error response: {e}"),
                Some(Box::new(e)),
            );
        }
    };

    let detail = serde_json::from_str::<ErrorResponse>(&error_body)
        .ok()
        .and_then(|r| r.error);
    let error_code = detail.as_ref().and_then(|d| d.code.clone());
    let error_param = detail.as_ref().and_then(|d| d.param.clone());
    let error_message = detail
        .and_then(|d| d.message)
        .unwrap_or_else(|| error_body.clone());

    match status_code {
        400 => Error::bad_request(error_message, error_param),
        401 => Error::authentication(error_message),
        403 => Error::permission(error_message),
        404 => Error::not_found(error_message),
        408 => Error::timeout(error_message, None),
        429 => Error::rate_limit(error_message, retry_after),
        500 => Error::internal_server(error_message, request_id),
        502..=504 => Error::service_unavailable(error_message, retry_after),
        _ => Error::api(status_code, error_code, error_message, request_id),
    }
}
