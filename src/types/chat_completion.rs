use std::ops::Add;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token accounting reported with a completion.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionUsage {
    /// Tokens in the prompt.
    #[serde(default)]
    pub prompt_tokens: u64,

    /// Tokens in the generated completion.
    #[serde(default)]
    pub completion_tokens: u64,

    /// Sum of the two.
    #[serde(default)]
    pub total_tokens: u64,
}

impl CompletionUsage {
    /// Create a new `CompletionUsage`.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

impl Add for CompletionUsage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            prompt_tokens: self.prompt_tokens.saturating_add(rhs.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_add(rhs.completion_tokens),
            total_tokens: self.total_tokens.saturating_add(rhs.total_tokens),
        }
    }
}

/// The message inside a completion choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChoiceMessage {
    /// Role reported by the service, normally `assistant`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Generated text.  The service sends `null` when filtered or empty.
    #[serde(default)]
    pub content: Option<String>,

    /// Retrieval context (citations, intent) returned for grounded requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

/// One completion alternative.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Choice {
    /// Position of this choice.
    #[serde(default)]
    pub index: u32,

    /// The generated message.
    #[serde(default)]
    pub message: ChoiceMessage,

    /// Why generation stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// A non-streaming chat completion response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletion {
    /// Response identifier.
    #[serde(default)]
    pub id: String,

    /// Object type, `chat.completion`.
    #[serde(default)]
    pub object: String,

    /// Unix timestamp of creation.
    #[serde(default)]
    pub created: i64,

    /// Model that produced the completion.
    #[serde(default)]
    pub model: String,

    /// Completion alternatives.
    #[serde(default)]
    pub choices: Vec<Choice>,

    /// Token accounting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<CompletionUsage>,
}

impl ChatCompletion {
    /// Text of the first choice.  `None` when there are no choices; an empty
    /// string when the first choice has no content.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .map(|choice| choice.message.content.as_deref().unwrap_or(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn completion_deserialization() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Hello!",
                    "context": {"citations": []}
                },
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15},
            "prompt_filter_results": []
        }))
        .unwrap();
        assert_eq!(completion.first_content(), Some("Hello!"));
        assert_eq!(completion.usage, Some(CompletionUsage::new(12, 3)));
        assert!(completion.choices[0].message.context.is_some());
    }

    #[test]
    fn null_content_is_empty() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        }))
        .unwrap();
        assert_eq!(completion.first_content(), Some(""));
    }

    #[test]
    fn no_choices() {
        let completion: ChatCompletion = serde_json::from_value(json!({"choices": []})).unwrap();
        assert_eq!(completion.first_content(), None);
    }

    #[test]
    fn usage_adds() {
        let total = CompletionUsage::new(10, 5) + CompletionUsage::new(1, 2);
        assert_eq!(total, CompletionUsage::new(11, 7));
    }
}
