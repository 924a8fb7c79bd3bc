//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the conversation
//! log and drives one request cycle at a time through a [`ChatBackend`].

use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use crate::backend::ChatBackend;
use crate::chat::config::{
    ChatConfig, DEFAULT_SYSTEM_PROMPT, validate_max_tokens, validate_temperature,
};
use crate::error::Result;
use crate::observability::{SESSION_CANCELLED_TURNS, SESSION_FAILED_TURNS, SESSION_TURNS};
use crate::render::Renderer;
use crate::reply::Reply;
use crate::types::{CompletionUsage, Conversation, Message, Role};

/// A chat session that manages conversation state and backend interactions.
///
/// Every request carries exactly one system message, synthesized fresh from
/// the seeded system message (if the log was reset with one) or the configured
/// prompt.  Replies are appended to the log only when they are not errors.
pub struct ChatSession<B: ChatBackend> {
    backend: B,
    config: ChatConfig,
    conversation: Conversation,
    usage_totals: CompletionUsage,
    last_turn_usage: Option<CompletionUsage>,
    request_count: u64,
    failed_turns: u64,
    last_message_at: Option<OffsetDateTime>,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    /// Backend description.
    pub backend: String,
    /// The number of messages in the conversation.
    pub message_count: usize,
    /// The system prompt in effect.
    pub system_prompt: String,
    /// The sampling temperature.
    pub temperature: f64,
    /// The maximum tokens per response.
    pub max_tokens: u32,
    /// Total number of backend requests made.
    pub total_requests: u64,
    /// Requests whose reply was an error.
    pub failed_turns: u64,
    /// Total prompt tokens across all requests.
    pub total_prompt_tokens: u64,
    /// Total completion tokens across all requests.
    pub total_completion_tokens: u64,
    /// Prompt tokens for the last turn, if reported.
    pub last_turn_prompt_tokens: Option<u64>,
    /// Completion tokens for the last turn, if reported.
    pub last_turn_completion_tokens: Option<u64>,
    /// When the last successful reply arrived.
    pub last_message_at: Option<OffsetDateTime>,
}

impl<B: ChatBackend> ChatSession<B> {
    /// Creates a new chat session with the given backend and configuration.
    pub fn new(backend: B, config: ChatConfig) -> Self {
        Self {
            backend,
            config,
            conversation: Conversation::new(),
            usage_totals: CompletionUsage::default(),
            last_turn_usage: None,
            request_count: 0,
            failed_turns: 0,
            last_message_at: None,
        }
    }

    /// Sends a user message and renders the reply.
    ///
    /// The user message is recorded before the request.  The reply is recorded
    /// only if it is not an error; failed replies are returned for display.
    pub async fn send(
        &mut self,
        user_input: &str,
        renderer: &mut dyn Renderer,
        cancel: &CancellationToken,
    ) -> Reply {
        SESSION_TURNS.click();
        self.conversation.append(Message::user(user_input));
        let history = self.request_history();
        self.request_count = self.request_count.saturating_add(1);

        let reply = self
            .backend
            .complete(&history, &self.config.sampling, renderer, cancel)
            .await;

        if let Some(usage) = reply.usage {
            self.last_turn_usage = Some(usage);
            self.usage_totals = self.usage_totals + usage;
        }
        if reply.is_error() {
            self.failed_turns = self.failed_turns.saturating_add(1);
            SESSION_FAILED_TURNS.click();
            if reply.error.as_ref().is_some_and(|e| e.is_abort()) {
                SESSION_CANCELLED_TURNS.click();
            }
            tracing::debug!(error = ?reply.error, "reply not recorded");
        } else {
            self.conversation.append(reply.message.clone());
            self.last_message_at = Some(OffsetDateTime::now_utc());
        }
        reply
    }

    /// The messages the next request would carry: one system message, then
    /// the user and assistant messages of the log in order.
    pub fn request_history(&self) -> Vec<Message> {
        let system = match self.conversation.seed() {
            Some(seed) => seed.content.clone(),
            None => self.config.system_prompt.clone(),
        };
        std::iter::once(Message::system(system))
            .chain(
                self.conversation
                    .snapshot()
                    .iter()
                    .filter(|m| m.role != Role::System)
                    .cloned(),
            )
            .collect()
    }

    /// Appends a message to the log without contacting the backend.
    pub fn append(&mut self, message: Message) {
        self.conversation.append(message);
    }

    /// Clears the log, optionally seeding it with a system message.
    ///
    /// A blank seed counts as no seed.
    pub fn reset(&mut self, seed: Option<String>) {
        let seed = seed
            .filter(|s| !s.trim().is_empty())
            .map(Message::system);
        self.conversation.reset(seed);
    }

    /// Clears the conversation history.
    pub fn clear(&mut self) {
        self.reset(None);
    }

    /// The conversation log.
    pub fn snapshot(&self) -> &[Message] {
        self.conversation.snapshot()
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.conversation.len()
    }

    /// Sets the system prompt; `None` restores the default.
    pub fn set_system_prompt(&mut self, prompt: Option<String>) {
        self.config.system_prompt = prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
    }

    /// Returns the configured system prompt.
    pub fn system_prompt(&self) -> &str {
        &self.config.system_prompt
    }

    /// Sets the sampling temperature.  Must be within `[0, 1]`.
    pub fn set_temperature(&mut self, temperature: f64) -> Result<()> {
        validate_temperature(temperature)?;
        self.config.sampling.temperature = temperature;
        Ok(())
    }

    /// Sets the maximum tokens per response.  Must be positive.
    pub fn set_max_tokens(&mut self, max_tokens: u32) -> Result<()> {
        validate_max_tokens(max_tokens)?;
        self.config.sampling.max_tokens = max_tokens;
        Ok(())
    }

    /// Changes the backend address.
    pub fn set_backend_address(&mut self, address: &str) -> Result<()> {
        self.backend.set_address(address)
    }

    /// The active configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            backend: self.backend.describe(),
            message_count: self.message_count(),
            system_prompt: self.config.system_prompt.clone(),
            temperature: self.config.sampling.temperature,
            max_tokens: self.config.sampling.max_tokens,
            total_requests: self.request_count,
            failed_turns: self.failed_turns,
            total_prompt_tokens: self.usage_totals.prompt_tokens,
            total_completion_tokens: self.usage_totals.completion_tokens,
            last_turn_prompt_tokens: self.last_turn_usage.map(|u| u.prompt_tokens),
            last_turn_completion_tokens: self.last_turn_usage.map(|u| u.completion_tokens),
            last_message_at: self.last_message_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::Error;
    use crate::types::SamplingParams;

    struct ScriptedBackend {
        replies: Mutex<VecDeque<Reply>>,
        seen: Mutex<Vec<(Vec<Message>, SamplingParams)>>,
    }

    impl ScriptedBackend {
        fn with(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::default(),
            }
        }

        fn requests(&self) -> Vec<(Vec<Message>, SamplingParams)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        fn describe(&self) -> String {
            "scripted".to_string()
        }

        async fn complete(
            &self,
            history: &[Message],
            sampling: &SamplingParams,
            renderer: &mut dyn Renderer,
            _cancel: &CancellationToken,
        ) -> Reply {
            self.seen
                .lock()
                .unwrap()
                .push((history.to_vec(), *sampling));
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Reply::completed(Message::assistant("ok")));
            renderer.print_text(&reply.message.content);
            reply
        }
    }

    struct Quiet;

    impl Renderer for Quiet {
        fn print_text(&mut self, _: &str) {}
        fn print_error(&mut self, _: &str) {}
        fn print_info(&mut self, _: &str) {}
        fn finish_response(&mut self) {}
    }

    fn session(replies: Vec<Reply>) -> ChatSession<ScriptedBackend> {
        ChatSession::new(ScriptedBackend::with(replies), ChatConfig::new())
    }

    async fn say<B: ChatBackend>(session: &mut ChatSession<B>, text: &str) -> Reply {
        session
            .send(text, &mut Quiet, &CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn first_turn_carries_default_system_prompt() {
        let mut session = session(vec![Reply::completed(Message::assistant("Hello!"))]);
        let reply = say(&mut session, "Hi").await;
        assert!(!reply.is_error());

        let requests = session.backend().requests();
        assert_eq!(
            requests[0].0,
            vec![Message::system(DEFAULT_SYSTEM_PROMPT), Message::user("Hi")]
        );
        assert_eq!(requests[0].1, SamplingParams::new(0.7, 1000));
        assert_eq!(
            session.snapshot(),
            &[Message::user("Hi"), Message::assistant("Hello!")]
        );
    }

    #[tokio::test]
    async fn exactly_one_system_message_across_turns() {
        let mut session = session(vec![]);
        say(&mut session, "one").await;
        session.set_system_prompt(Some("Be terse.".to_string()));
        say(&mut session, "two").await;

        let requests = session.backend().requests();
        let last = &requests[1].0;
        assert_eq!(last.iter().filter(|m| m.role == Role::System).count(), 1);
        assert_eq!(last[0], Message::system("Be terse."));
        assert_eq!(
            &last[1..],
            &[
                Message::user("one"),
                Message::assistant("ok"),
                Message::user("two")
            ]
        );
    }

    #[tokio::test]
    async fn seed_replaces_configured_prompt() {
        let mut session = session(vec![]);
        session.reset(Some("Answer in French.".to_string()));
        assert_eq!(session.snapshot(), &[Message::system("Answer in French.")]);
        say(&mut session, "Bonjour").await;

        let history = &session.backend().requests()[0].0;
        assert_eq!(
            history,
            &vec![
                Message::system("Answer in French."),
                Message::user("Bonjour")
            ]
        );
    }

    #[tokio::test]
    async fn error_replies_are_not_recorded() {
        let mut session = session(vec![
            Reply::failed(Message::assistant("Hel"), Error::abort("interrupted")),
            Reply::completed(Message::assistant("⚠️ backend warming up")),
        ]);
        let reply = say(&mut session, "Hi").await;
        assert!(reply.is_error());
        say(&mut session, "Again").await;

        assert_eq!(
            session.snapshot(),
            &[Message::user("Hi"), Message::user("Again")]
        );
        let stats = session.stats();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.failed_turns, 2);
        assert!(stats.last_message_at.is_none());
    }

    #[tokio::test]
    async fn usage_is_accumulated() {
        let mut session = session(vec![
            Reply::completed(Message::assistant("a")).with_usage(Some(CompletionUsage::new(10, 2))),
            Reply::completed(Message::assistant("b")).with_usage(Some(CompletionUsage::new(20, 3))),
        ]);
        say(&mut session, "1").await;
        say(&mut session, "2").await;
        let stats = session.stats();
        assert_eq!(stats.total_prompt_tokens, 30);
        assert_eq!(stats.total_completion_tokens, 5);
        assert_eq!(stats.last_turn_prompt_tokens, Some(20));
        assert_eq!(stats.last_turn_completion_tokens, Some(3));
        assert_eq!(stats.message_count, 4);
        assert!(stats.last_message_at.is_some());
        assert_eq!(stats.backend, "scripted");
    }

    #[test]
    fn settings_are_validated() {
        let mut session = session(vec![]);
        assert!(session.set_temperature(1.2).is_err());
        assert!(session.set_temperature(-0.1).is_err());
        session.set_temperature(0.0).unwrap();
        assert!(session.set_max_tokens(0).is_err());
        session.set_max_tokens(2000).unwrap();
        assert_eq!(session.config().sampling, SamplingParams::new(0.0, 2000));
        assert!(session.set_backend_address("http://x/").is_err());
    }

    #[test]
    fn system_prompt_reset_to_default() {
        let mut session = session(vec![]);
        session.set_system_prompt(Some("Custom".to_string()));
        assert_eq!(session.system_prompt(), "Custom");
        session.set_system_prompt(None);
        assert_eq!(session.system_prompt(), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn clear_and_blank_seed() {
        let mut session = session(vec![]);
        session.append(Message::user("x"));
        session.reset(Some("  ".to_string()));
        assert_eq!(session.message_count(), 0);
        session.append(Message::user("y"));
        session.clear();
        assert!(session.snapshot().is_empty());
    }
}
