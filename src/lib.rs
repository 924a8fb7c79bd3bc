// Public modules
pub mod accumulating_stream;
pub mod backend;
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod env;
pub mod error;
pub mod proxy;
pub mod render;
pub mod reply;
pub mod settings;
pub mod sse;
pub mod types;

mod observability;

// Re-exports
pub use accumulating_stream::{AccumulatingStream, StreamState};
pub use backend::{ChatBackend, DirectBackend, ProxyBackend, consume_stream};
pub use client::AzureOpenAI;
pub use client_logger::ClientLogger;
pub use env::Environment;
pub use error::{Error, ErrorKind, Result};
pub use observability::register_biometrics;
pub use proxy::ProxyClient;
pub use render::{PlainTextRenderer, Renderer};
pub use reply::{ERROR_SENTINEL, Reply, WARNING_MARKER, is_error_marked};
pub use settings::{ModelSettings, ProxySettings, RetrievalStatus, SearchSettings};
pub use sse::process_sse;
pub use types::*;
