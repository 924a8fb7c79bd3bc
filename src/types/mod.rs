// Public modules
pub mod chat_completion;
pub mod chat_completion_request;
pub mod conversation;
pub mod data_source;
pub mod message;
pub mod proxy_chat_request;
pub mod stream_event;

// Re-exports
pub use chat_completion::{ChatCompletion, Choice, ChoiceMessage, CompletionUsage};
pub use chat_completion_request::{
    ChatCompletionRequest, FREQUENCY_PENALTY, PRESENCE_PENALTY, SamplingParams, TOP_P,
};
pub use conversation::Conversation;
pub use data_source::{AzureSearchParameters, DataSource, DataSources, SearchAuthentication};
pub use message::{Message, Role};
pub use proxy_chat_request::ProxyChatRequest;
pub use stream_event::{StreamEvent, StreamEventType};
