use serde::{Deserialize, Serialize};

use crate::types::Message;

/// Body of `POST /chat` on the proxy backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyChatRequest {
    /// The conversation, system message first.
    pub messages: Vec<Message>,
}

impl ProxyChatRequest {
    /// Copy a history into a request body.
    pub fn new(history: &[Message]) -> Self {
        Self {
            messages: history.to_vec(),
        }
    }
}
