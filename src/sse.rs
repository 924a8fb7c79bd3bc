//! Server-Sent Events (SSE) processing for the proxy backend's event stream.
//!
//! Raw bytes arrive in arbitrary chunks.  They are decoded to text incrementally,
//! split into frames on blank lines, and each frame's `data:` payload is decoded
//! as a [`StreamEvent`].  Payloads that are not valid events are skipped.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::STREAM_EVENTS_SKIPPED;
use crate::types::StreamEvent;
use crate::{Error, Result};

struct SseState<S> {
    stream: S,
    pending: Vec<u8>,
    buffer: String,
    done: bool,
}

/// Process a stream of bytes into a stream of proxy events.
///
/// A transport error is yielded once as a streaming error and ends the stream.
/// A frame left in the buffer when the byte stream ends is still parsed.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<StreamEvent>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = SseState {
        stream: byte_stream,
        pending: Vec::new(),
        buffer: String::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            while let Some(frame) = next_frame(&mut state.buffer) {
                if let Some(event) = parse_frame(&frame) {
                    return Some((Ok(event), state));
                }
            }
            if state.done {
                return None;
            }

            match state.stream.next().await {
                Some(Ok(bytes)) => {
                    state.pending.extend_from_slice(&bytes);
                    decode_pending(&mut state.pending, &mut state.buffer);
                }
                Some(Err(e)) => {
                    state.done = true;
                    state.buffer.clear();
                    let err = Error::streaming(
                        format!("Error in HTTP stream: {e}"),
                        Some(Box::new(e)),
                    );
                    return Some((Err(err), state));
                }
                None => {
                    state.done = true;
                    if !state.pending.is_empty() {
                        let tail = std::mem::take(&mut state.pending);
                        state.buffer.push_str(&String::from_utf8_lossy(&tail));
                    }
                    let tail = std::mem::take(&mut state.buffer);
                    if let Some(event) = parse_frame(&normalize(tail)) {
                        return Some((Ok(event), state));
                    }
                    return None;
                }
            }
        }
    })
}

/// Move the longest valid UTF-8 prefix of `pending` into `buffer`.
///
/// An incomplete multi-byte sequence at the end is kept for the next chunk.
/// Invalid sequences are replaced with U+FFFD.
fn decode_pending(pending: &mut Vec<u8>, buffer: &mut String) {
    loop {
        match std::str::from_utf8(pending) {
            Ok(text) => {
                buffer.push_str(text);
                pending.clear();
                break;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                buffer.push_str(&String::from_utf8_lossy(&pending[..valid]));
                match e.error_len() {
                    Some(bad) => {
                        buffer.push(char::REPLACEMENT_CHARACTER);
                        pending.drain(..valid + bad);
                    }
                    None => {
                        pending.drain(..valid);
                        break;
                    }
                }
            }
        }
    }
    if buffer.contains('\r') {
        *buffer = normalize(std::mem::take(buffer));
    }
}

fn normalize(text: String) -> String {
    if text.contains("\r\n") {
        text.replace("\r\n", "\n")
    } else {
        text
    }
}

/// Pop the next complete frame off the front of `buffer`.
fn next_frame(buffer: &mut String) -> Option<String> {
    let end = buffer.find("\n\n")?;
    let frame = buffer[..end].to_string();
    buffer.drain(..end + 2);
    Some(frame)
}

/// Decode one frame.  Returns `None` for comments, empty payloads, and payloads
/// that are not valid events.
fn parse_frame(frame: &str) -> Option<StreamEvent> {
    let data = frame
        .lines()
        .filter(|line| !line.starts_with(':'))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect::<Vec<_>>()
        .join("\n");
    let data = data.trim();
    if data.is_empty() {
        return None;
    }
    match serde_json::from_str::<StreamEvent>(data) {
        Ok(event) => Some(event),
        Err(e) => {
            STREAM_EVENTS_SKIPPED.click();
            tracing::debug!(error = %e, payload = data, "skipping malformed stream event");
            None
        }
    }
}
