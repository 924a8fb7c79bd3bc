//! Send one prompt to the hosted deployment and print the completion as JSON.
//!
//! # Usage
//!
//! ```bash
//! grounded-prompt "What does the travel policy say about hotels?"
//!
//! # Read the prompt from stdin
//! echo "Summarize the onboarding guide" | grounded-prompt --max-tokens 400
//! ```
//!
//! Search grounding is attached when the search settings are complete.  The
//! process exits nonzero if configuration is missing or the request fails.

use std::io::Read;
use std::process::ExitCode;

use arrrg::CommandLine;
use arrrg_derive::CommandLine;
use tracing_subscriber::EnvFilter;

use grounded_chat::chat::{parse_temperature, validate_max_tokens};
use grounded_chat::{
    AzureOpenAI, DirectBackend, ERROR_SENTINEL, Environment, Error, Message, ModelSettings,
    Result, SamplingParams, SearchSettings,
};

const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI assistant that helps people find information.";
const DEFAULT_MAX_TOKENS: u32 = 6553;
const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Command-line arguments for the grounded-prompt tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
struct Args {
    /// System prompt sent ahead of the user prompt.
    #[arrrg(optional, "System prompt (default: helpful information assistant)", "PROMPT")]
    system: Option<String>,

    /// Maximum tokens to generate.
    #[arrrg(optional, "Max tokens to generate (default: 6553)", "TOKENS")]
    max_tokens: Option<u32>,

    /// Sampling temperature.
    #[arrrg(optional, "Sampling temperature 0.0-1.0 (default: 0.7)", "TEMP")]
    temperature: Option<String>,
}

impl Args {
    /// Sampling parameters, validated the same way as the chat REPL.
    fn sampling(&self) -> Result<SamplingParams> {
        let temperature = match &self.temperature {
            Some(value) => parse_temperature(value)?,
            None => DEFAULT_TEMPERATURE,
        };
        let max_tokens = self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        validate_max_tokens(max_tokens)?;
        Ok(SamplingParams::new(temperature, max_tokens))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let (args, words) = Args::from_command_line_relaxed("grounded-prompt [OPTIONS] [PROMPT...]");
    match run(args, words).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{ERROR_SENTINEL} {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, words: Vec<String>) -> Result<()> {
    let prompt = if words.is_empty() {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).map_err(|e| {
            Error::validation(format!("failed to read prompt from stdin: {e}"), None)
        })?;
        buf
    } else {
        words.join(" ")
    };
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(Error::validation("no prompt given", Some("PROMPT".to_string())));
    }

    let sampling = args.sampling()?;
    let system = args
        .system
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

    let env = Environment::from_process();
    let model = ModelSettings::from_env(&env)?;
    let client = AzureOpenAI::new(&model)?;
    let backend = DirectBackend::new(client.clone(), SearchSettings::from_env(&env));

    let history = [Message::system(system), Message::user(prompt)];
    let request = backend.shape_request(&history, &sampling);
    let completion = client.send(&request).await?;
    println!("{}", serde_json::to_string_pretty(&completion)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_defaults() {
        let sampling = Args::default().sampling().unwrap();
        assert_eq!(sampling, SamplingParams::new(0.7, 6553));
    }

    #[test]
    fn sampling_from_flags() {
        let args = Args {
            temperature: Some("0.2".to_string()),
            max_tokens: Some(400),
            ..Args::default()
        };
        assert_eq!(args.sampling().unwrap(), SamplingParams::new(0.2, 400));
    }

    #[test]
    fn sampling_rejects_bad_values() {
        let args = Args {
            temperature: Some("abc".to_string()),
            ..Args::default()
        };
        assert!(args.sampling().unwrap_err().is_validation());

        let args = Args {
            max_tokens: Some(0),
            ..Args::default()
        };
        assert!(args.sampling().unwrap_err().is_validation());
    }
}
