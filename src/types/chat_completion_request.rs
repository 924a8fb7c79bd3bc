use serde::{Deserialize, Serialize};

use crate::types::{DataSources, Message, Role};

/// Nucleus sampling probability sent with every request.
pub const TOP_P: f64 = 0.95;

/// Frequency penalty sent with every request.
pub const FREQUENCY_PENALTY: f64 = 0.0;

/// Presence penalty sent with every request.
pub const PRESENCE_PENALTY: f64 = 0.0;

/// User-adjustable sampling parameters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SamplingParams {
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f64,

    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
}

impl SamplingParams {
    /// Create new sampling parameters.
    pub fn new(temperature: f64, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }
}

/// Body of a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionRequest {
    /// Deployment or model name.
    pub model: String,

    /// The conversation, system message first.
    pub messages: Vec<Message>,

    /// Maximum number of tokens to generate.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: f64,

    /// Nucleus sampling probability.
    pub top_p: f64,

    /// Frequency penalty.
    pub frequency_penalty: f64,

    /// Presence penalty.
    pub presence_penalty: f64,

    /// Whether the service should stream its answer.
    pub stream: bool,

    /// Retrieval data sources, flattened into the top level of the body.
    #[serde(flatten)]
    pub extra_body: Option<DataSources>,
}

impl ChatCompletionRequest {
    /// Shape a non-streaming request from a conversation history.
    ///
    /// The history is copied in order; `extra_body` is attached verbatim when present.
    pub fn shape(
        model: impl Into<String>,
        history: &[Message],
        sampling: &SamplingParams,
        extra_body: Option<DataSources>,
    ) -> Self {
        Self {
            model: model.into(),
            messages: history.to_vec(),
            max_tokens: sampling.max_tokens,
            temperature: sampling.temperature,
            top_p: TOP_P,
            frequency_penalty: FREQUENCY_PENALTY,
            presence_penalty: PRESENCE_PENALTY,
            stream: false,
            extra_body,
        }
    }

    /// Returns the mapped `(role, content)` pairs in order.
    pub fn messages(&self) -> impl Iterator<Item = (Role, &str)> {
        self.messages.iter().map(|m| (m.role, m.content.as_str()))
    }

    /// Returns true if the request carries a retrieval data source.
    pub fn is_grounded(&self) -> bool {
        self.extra_body
            .as_ref()
            .is_some_and(|body| !body.data_sources.is_empty())
    }
}
