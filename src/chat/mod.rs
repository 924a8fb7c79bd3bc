//! Chat application module for interactive grounded conversations.
//!
//! This module provides the REPL-facing pieces of the chat client:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: Conversation state and request cycles
//! - [`commands`]: Slash command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{
    ChatArgs, ChatConfig, DEFAULT_MAX_TOKENS, DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPERATURE,
    parse_temperature, validate_max_tokens, validate_temperature,
};
pub use session::{ChatSession, SessionStats};
