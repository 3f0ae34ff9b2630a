//! Lightweight-markup to safe HTML renderer for streamed agent responses.
//!
//! The renderer is re-run on the full accumulated response text after every
//! delta, so it is pure, deterministic, and total: unrecognized or unterminated
//! syntax passes through as escaped plain text.
//!
//! ```
//! use transcript_markup::render;
//!
//! let html = render("# Title\n\nSome **bold** and `code`");
//! assert_eq!(
//!     html.as_str(),
//!     "<h1>Title</h1><p>Some <strong>bold</strong> and <code>code</code></p>"
//! );
//! ```
//!
//! Pass a renderer to consumers through [`MarkupRenderer`] so tests can
//! substitute their own.

mod blocks;
mod escape;
mod inline;
mod pipeline;
mod placeholder;

use std::fmt;

pub use escape::escape_html;

/// HTML fragment that is safe to insert into a transcript.
///
/// Only this crate can build a `SafeMarkup` from arbitrary text, and every
/// constructor escapes raw input outside of code regions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SafeMarkup(String);

impl SafeMarkup {
    /// Escapes plain text without applying any markup rules.
    pub fn from_plain_text(text: &str) -> Self {
        Self(escape_html(text))
    }

    pub(crate) fn from_trusted(html: String) -> Self {
        Self(html)
    }

    /// Returns the markup as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the fragment and returns the inner string.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Returns true when the fragment has no content.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SafeMarkup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SafeMarkup {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Renderer abstraction: convert lightweight markup to safe HTML.
pub trait MarkupRenderer: Send + Sync {
    fn render(&self, text: &str) -> SafeMarkup;
}

/// Default renderer backed by the staged rewrite pipeline.
#[derive(Clone, Copy, Debug, Default)]
pub struct StagedRenderer;

impl MarkupRenderer for StagedRenderer {
    fn render(&self, text: &str) -> SafeMarkup {
        render(text)
    }
}

/// Renders `text` into a safe HTML fragment.
pub fn render(text: &str) -> SafeMarkup {
    SafeMarkup::from_trusted(pipeline::run(text))
}
