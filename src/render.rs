//! Output rendering for chat replies.
//!
//! This module provides the [`Renderer`] trait the backends write reply text
//! through, and a plain-text implementation for terminals.

use std::io::{self, Write};

/// ANSI escape code for dim text (used for informational lines).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for yellow text (used for interruptions).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// Trait for rendering one reply at a time.
pub trait Renderer: Send {
    /// Called before any text of a reply is shown.
    fn start_response(&mut self) {}

    /// Append streamed or complete reply text.
    fn print_text(&mut self, text: &str);

    /// The backend sent the authoritative final text for the reply.
    ///
    /// The default shows nothing; implementations that can reconcile what was
    /// already shown with `text` should override it.
    fn replace_text(&mut self, text: &str) {
        let _ = text;
    }

    /// Show an error line.
    fn print_error(&mut self, error: &str);

    /// Show an informational line.
    fn print_info(&mut self, info: &str);

    /// Called after the reply is complete.
    fn finish_response(&mut self);

    /// The reply was cut short by the user.
    fn print_interrupted(&mut self) {
        self.print_info("[interrupted]");
    }
}

/// Plain text renderer with optional ANSI styling.
///
/// Writes to stdout unless another writer is supplied.
pub struct PlainTextRenderer {
    out: Box<dyn Write + Send>,
    use_color: bool,
    shown: String,
    line_start: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(Box::new(io::stdout()), use_color)
    }

    /// Creates a renderer that writes to `out`.
    pub fn with_writer(out: Box<dyn Write + Send>, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            shown: String::new(),
            line_start: true,
        }
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
        self.line_start = text.ends_with('\n');
    }

    fn write_line(&mut self, color: &str, text: &str) {
        if !self.line_start {
            self.write("\n");
        }
        if self.use_color {
            self.write(&format!("{color}{text}{ANSI_RESET}\n"));
        } else {
            self.write(&format!("{text}\n"));
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn start_response(&mut self) {
        self.shown.clear();
    }

    fn print_text(&mut self, text: &str) {
        self.shown.push_str(text);
        self.write(text);
    }

    fn replace_text(&mut self, text: &str) {
        if let Some(rest) = text.strip_prefix(self.shown.as_str()) {
            let rest = rest.to_string();
            self.print_text(&rest);
        } else {
            // The final text diverges from what was streamed; show it whole.
            self.write("\n");
            self.shown.clear();
            self.print_text(text);
        }
    }

    fn print_error(&mut self, error: &str) {
        if !self.shown.is_empty() && !self.line_start {
            self.write("\n");
        }
        if !self.shown.is_empty() {
            self.write("\n");
        }
        self.write_line(ANSI_RED, error);
    }

    fn print_info(&mut self, info: &str) {
        self.write_line(ANSI_DIM, info);
    }

    fn finish_response(&mut self) {
        if !self.line_start {
            self.write("\n");
        }
        self.shown.clear();
    }

    fn print_interrupted(&mut self) {
        self.write_line(ANSI_YELLOW, "[interrupted]");
    }
}
