//! Logging trait for backend traffic.
//!
//! This module provides the [`ClientLogger`] trait that allows users to capture
//! every completion and stream event passing through [`AzureOpenAI`](crate::AzureOpenAI)
//! and [`ProxyClient`](crate::ProxyClient).

use crate::types::{ChatCompletion, Message, StreamEvent};

/// A trait for logging backend traffic.
///
/// # Example
///
/// ```rust,ignore
/// use grounded_chat::{ChatCompletion, ClientLogger, Message, StreamEvent};
/// use std::io::Write;
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl ClientLogger for FileLogger {
///     fn log_response(&self, completion: &ChatCompletion) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Response: {}", serde_json::to_string(completion).unwrap()).unwrap();
///     }
///
///     fn log_stream_event(&self, event: &StreamEvent) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Stream event: {}", serde_json::to_string(event).unwrap()).unwrap();
///     }
///
///     fn log_stream_message(&self, message: &Message) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Stream complete: {}", serde_json::to_string(message).unwrap()).unwrap();
///     }
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log a complete response from a direct completion call.
    fn log_response(&self, completion: &ChatCompletion);

    /// Log an individual event from the proxy stream.
    fn log_stream_event(&self, event: &StreamEvent);

    /// Log the assistant message reconstructed from a stream that finished cleanly.
    fn log_stream_message(&self, message: &Message);
}
