//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the chat session without sending messages
//! to the backend.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Clear the conversation history.
    /// `Some(seed)` starts the new conversation with that system message.
    Clear(Option<String>),

    /// Set the system prompt.
    /// `None` restores the default prompt.
    System(Option<String>),

    /// Set the maximum tokens per response.
    MaxTokens(u32),

    /// Set the sampling temperature.
    Temperature(f64),

    /// Point the proxy backend at a new address.
    Backend(String),

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Display session statistics.
    Stats,

    /// Show the current configuration.
    ShowConfig,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use grounded_chat::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/temperature 0.2").is_some());
/// assert!(parse_command("What is in the handbook?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(str::trim).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "clear" | "reset" => ChatCommand::Clear(argument.map(String::from)),
        "system" => ChatCommand::System(argument.map(String::from)),
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stats" | "status" => ChatCommand::Stats,
        "config" => ChatCommand::ShowConfig,
        "max_tokens" => match argument {
            Some(arg) => match arg.parse::<u32>() {
                Ok(value) if value > 0 => ChatCommand::MaxTokens(value),
                _ => ChatCommand::Invalid("/max_tokens expects a positive integer".to_string()),
            },
            None => ChatCommand::Invalid("/max_tokens requires a value".to_string()),
        },
        "temperature" => match argument {
            Some(arg) => match parse_f64_in_range(arg, 0.0, 1.0) {
                Ok(value) => ChatCommand::Temperature(value),
                Err(err) => ChatCommand::Invalid(format!("/temperature {err}")),
            },
            None => ChatCommand::Invalid("/temperature requires a value".to_string()),
        },
        "backend" => match argument {
            Some(url) => ChatCommand::Backend(url.to_string()),
            None => ChatCommand::Invalid("/backend requires an address".to_string()),
        },
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

fn parse_f64_in_range(value: &str, min: f64, max: f64) -> Result<f64, String> {
    let parsed: f64 = value
        .parse()
        .map_err(|_| format!("expects a value between {min} and {max}"))?;
    if parsed.is_finite() && parsed >= min && parsed <= max {
        Ok(parsed)
    } else {
        Err(format!("expects a value between {min} and {max}"))
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /clear [seed]          Clear conversation history (optionally seed a system message)
  /system [prompt]       Set system prompt (no argument restores the default)
  /max_tokens <n>        Set maximum response tokens
  /temperature <v>       Set temperature 0.0-1.0
  /backend <url>         Change the proxy backend address
  /stats                 Show session statistics
  /config                Show current configuration
  /help                  Show this help message
  /quit                  Exit the chat"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_clear() {
        assert_eq!(parse_command("/clear"), Some(ChatCommand::Clear(None)));
        assert_eq!(parse_command("/CLEAR"), Some(ChatCommand::Clear(None)));
        assert_eq!(
            parse_command("/clear Answer in French."),
            Some(ChatCommand::Clear(Some("Answer in French.".to_string())))
        );
    }

    #[test]
    fn parse_system() {
        assert_eq!(
            parse_command("/system You are a helpful assistant"),
            Some(ChatCommand::System(Some(
                "You are a helpful assistant".to_string()
            )))
        );
        assert_eq!(parse_command("/system"), Some(ChatCommand::System(None)));
        assert_eq!(parse_command("/system   "), Some(ChatCommand::System(None)));
    }

    #[test]
    fn parse_temperature() {
        assert_eq!(
            parse_command("/temperature 0.5"),
            Some(ChatCommand::Temperature(0.5))
        );
        assert_eq!(
            parse_command("/temperature 1"),
            Some(ChatCommand::Temperature(1.0))
        );
        assert!(matches!(
            parse_command("/temperature"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("requires")
        ));
        assert!(matches!(
            parse_command("/temperature 1.5"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("between")
        ));
        assert!(matches!(
            parse_command("/temperature NaN"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_max_tokens() {
        assert_eq!(
            parse_command("/max_tokens 800"),
            Some(ChatCommand::MaxTokens(800))
        );
        assert!(matches!(
            parse_command("/max_tokens 0"),
            Some(ChatCommand::Invalid(_))
        ));
        assert!(matches!(
            parse_command("/max_tokens lots"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_backend() {
        assert_eq!(
            parse_command("/backend http://localhost:9000/"),
            Some(ChatCommand::Backend("http://localhost:9000/".to_string()))
        );
        assert!(matches!(
            parse_command("/backend"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_stats_and_config() {
        assert_eq!(parse_command("/stats"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/config"), Some(ChatCommand::ShowConfig));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/model gpt-4o"),
            Some(ChatCommand::Invalid("Unknown command: /model".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("what about /quit?"), None);
    }

    #[test]
    fn help_text_not_empty() {
        let help = help_text();
        assert!(help.contains("/quit"));
        assert!(help.contains("/backend"));
    }
}
