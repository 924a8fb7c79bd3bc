use crate::types::{Message, Role};

/// Ordered, append-only message log for one chat session.
///
/// The log can be reset wholesale but never spliced or reordered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// An empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the end of the log.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Clear the log, optionally starting over with a single system message.
    pub fn reset(&mut self, seed: Option<Message>) {
        self.messages.clear();
        if let Some(seed) = seed {
            self.messages.push(Message::system(seed.content));
        }
    }

    /// The messages in order.
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    /// The seeded system message, if the log starts with one.
    pub fn seed(&self) -> Option<&Message> {
        self.messages.first().filter(|m| m.role == Role::System)
    }

    /// Number of messages in the log.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
