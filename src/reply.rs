//! The outcome of one turn: the assistant's text, and the error if the turn failed.

use crate::types::{ChatCompletion, CompletionUsage, Message};
use crate::Error;

/// Prefix that marks a reply as an error report.
pub const ERROR_SENTINEL: &str = "❌ Error:";

/// Prefix that marks a reply as a warning.
pub const WARNING_MARKER: &str = "⚠️";

/// The assistant's reply to one user message.
///
/// A failed reply may still carry text that arrived before the failure.  Failed
/// replies are shown to the user but never become part of the conversation.
#[derive(Debug, Clone)]
pub struct Reply {
    /// The assistant message (possibly partial).
    pub message: Message,
    /// Why the reply failed, if it did.
    pub error: Option<Error>,
    /// Token usage, when the backend reports it.
    pub usage: Option<CompletionUsage>,
}

impl Reply {
    /// A successful reply.
    pub fn completed(message: Message) -> Self {
        Self {
            message,
            error: None,
            usage: None,
        }
    }

    /// A failed reply carrying whatever text arrived first.
    pub fn failed(partial: Message, error: Error) -> Self {
        Self {
            message: partial,
            error: Some(error),
            usage: None,
        }
    }

    /// Interpret the outcome of a non-streaming completion call.
    ///
    /// A response with no choices is a failure.  A `null` content is an empty reply.
    pub fn from_completion(result: crate::Result<ChatCompletion>) -> Self {
        match result {
            Ok(completion) => match completion.first_content() {
                Some(content) => Self {
                    message: Message::assistant(content),
                    error: None,
                    usage: completion.usage,
                },
                None => Self::failed(
                    Message::assistant(""),
                    Error::serialization("completion contained no choices", None),
                ),
            },
            Err(err) => Self::failed(Message::assistant(""), err),
        }
    }

    /// Attach token usage.
    pub fn with_usage(mut self, usage: Option<CompletionUsage>) -> Self {
        self.usage = usage;
        self
    }

    /// Returns true if the turn failed.
    pub fn is_error(&self) -> bool {
        self.error.is_some() || is_error_marked(&self.message.content)
    }

    /// The error line to show for a failed reply, e.g. `❌ Error: Request aborted: ...`.
    pub fn error_annotation(&self) -> Option<String> {
        self.error
            .as_ref()
            .map(|err| format!("{ERROR_SENTINEL} {err}"))
    }

    /// What the user sees.
    ///
    /// A failed reply with no text is just the error line.  A failed reply with
    /// partial text shows the text followed by the error line.
    pub fn display_text(&self) -> String {
        match self.error_annotation() {
            None => self.message.content.clone(),
            Some(annotation) if self.message.content.is_empty() => annotation,
            Some(annotation) => format!("{}\n\n{annotation}", self.message.content),
        }
    }

    /// The message to record in the conversation, or `None` for failed turns.
    pub fn into_persistable(self) -> Option<Message> {
        if self.is_error() {
            None
        } else {
            Some(self.message)
        }
    }
}

/// Returns true if `text` begins with the error sentinel or the warning marker.
pub fn is_error_marked(text: &str) -> bool {
    let text = text.trim_start();
    text.starts_with('❌') || text.starts_with(WARNING_MARKER)
}
