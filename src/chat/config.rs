//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use arrrg_derive::CommandLine;

use crate::error::{Error, Result};
use crate::types::SamplingParams;

/// System prompt used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Provide clear, accurate, and friendly responses. If a data source is available, ground your answers in the provided documents.";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Default maximum tokens per response.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Command-line arguments for the grounded-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Talk to the local proxy backend instead of the hosted deployment.
    #[arrrg(flag, "Use the streaming proxy backend")]
    pub proxy: bool,

    /// Proxy backend address.
    #[arrrg(optional, "Proxy backend address (default: $BACKEND_URL)", "URL")]
    pub backend_url: Option<String>,

    /// System prompt to set context for the conversation.
    #[arrrg(optional, "System prompt for the conversation", "PROMPT")]
    pub system: Option<String>,

    /// Sampling temperature, parsed by [`parse_temperature`].
    #[arrrg(optional, "Sampling temperature 0.0-1.0 (default: 0.7)", "TEMP")]
    pub temperature: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Max tokens per response (default: 1000)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// System prompt synthesized at the head of every request.
    pub system_prompt: String,

    /// Sampling temperature and token limit.
    pub sampling: SamplingParams,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - System prompt: [`DEFAULT_SYSTEM_PROMPT`]
    /// - Temperature: 0.7
    /// - Max tokens: 1000
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            sampling: SamplingParams::new(DEFAULT_TEMPERATURE, DEFAULT_MAX_TOKENS),
            use_color: true,
        }
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.sampling.temperature = temperature;
        self
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.sampling.max_tokens = max_tokens;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Checks that the sampling parameters are in range.
    pub fn validate(&self) -> Result<()> {
        validate_temperature(self.sampling.temperature)?;
        validate_max_tokens(self.sampling.max_tokens)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = Error;

    fn try_from(args: ChatArgs) -> Result<Self> {
        let mut config = ChatConfig::new();
        if let Some(system) = args.system.filter(|s| !s.trim().is_empty()) {
            config = config.with_system_prompt(system);
        }
        if let Some(temperature) = args.temperature {
            config = config.with_temperature(parse_temperature(&temperature)?);
        }
        if let Some(max_tokens) = args.max_tokens {
            config = config.with_max_tokens(max_tokens);
        }
        if args.no_color {
            config = config.without_color();
        }
        config.validate()?;
        Ok(config)
    }
}

/// Parse a temperature given on the command line and check its range.
pub fn parse_temperature(value: &str) -> Result<f64> {
    let temperature = value.trim().parse::<f64>().map_err(|_| {
        Error::validation(
            format!("temperature must be a number, got {value:?}"),
            Some("temperature".to_string()),
        )
    })?;
    validate_temperature(temperature)?;
    Ok(temperature)
}

/// Check that a temperature lies in `[0, 1]`.
pub fn validate_temperature(temperature: f64) -> Result<()> {
    if temperature.is_finite() && (0.0..=1.0).contains(&temperature) {
        Ok(())
    } else {
        Err(Error::validation(
            format!("temperature must be between 0.0 and 1.0, got {temperature}"),
            Some("temperature".to_string()),
        ))
    }
}

/// Check that a token limit is positive.
pub fn validate_max_tokens(max_tokens: u32) -> Result<()> {
    if max_tokens > 0 {
        Ok(())
    } else {
        Err(Error::validation(
            "max_tokens must be positive",
            Some("max_tokens".to_string()),
        ))
    }
}
