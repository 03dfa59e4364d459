//! Streaming filter for hidden reasoning regions
//!
//! Reasoning models interleave `<think>...</think>` blocks with the visible
//! reply. The filter consumes the raw token stream fragment by fragment and
//! emits only the text outside those blocks. Markers may be split across
//! fragment boundaries, so a small tail is carried between calls.

const OPEN_MARKER: &str = "<think>";
const CLOSE_MARKER: &str = "</think>";

/// Stateful scanner that strips `<think>...</think>` regions from a
/// fragment stream.
///
/// One filter instance covers exactly one generation; create a fresh one
/// (or call [`ThinkFilter::reset`]) per streaming call. State is never
/// shared across concurrent generations.
#[derive(Debug, Default)]
pub struct ThinkFilter {
    inside: bool,
    carry: String,
}

impl ThinkFilter {
    /// Create a filter in the outside-region state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore the initial state for a new generation
    pub fn reset(&mut self) {
        self.inside = false;
        self.carry.clear();
    }

    /// Feed the next fragment and return its visible portion.
    ///
    /// A trailing run that could be the start of a marker is held back and
    /// re-examined together with the next fragment, so markers split across
    /// fragment boundaries are still recognized.
    pub fn push(&mut self, fragment: &str) -> String {
        if fragment.is_empty() && self.carry.is_empty() {
            return String::new();
        }

        let text = if self.carry.is_empty() {
            fragment.to_string()
        } else {
            let mut held = std::mem::take(&mut self.carry);
            held.push_str(fragment);
            held
        };

        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        while i < text.len() {
            let rest = &text[i..];
            let marker = if self.inside { CLOSE_MARKER } else { OPEN_MARKER };

            if rest.starts_with(marker) {
                self.inside = !self.inside;
                i += marker.len();
                continue;
            }

            // Fragment ends mid-marker: hold the tail for the next call
            if rest.len() < marker.len() && marker.starts_with(rest) {
                self.carry.push_str(rest);
                break;
            }

            let Some(ch) = rest.chars().next() else { break };
            if !self.inside {
                out.push(ch);
            }
            i += ch.len_utf8();
        }

        out
    }

    /// Flush any held-back tail at end of stream.
    ///
    /// A partial marker that never completed is literal text when the
    /// scanner is outside a region. Inside a region everything stays
    /// suppressed: an unmatched open marker fails closed.
    pub fn finish(&mut self) -> String {
        if self.inside {
            self.carry.clear();
            return String::new();
        }
        std::mem::take(&mut self.carry)
    }

    /// Whether the scanner is currently inside a hidden region
    #[must_use]
    pub const fn inside_hidden_region(&self) -> bool {
        self.inside
    }
}

/// Filter a complete (non-streamed) text in one call
#[must_use]
pub fn strip_think_regions(text: &str) -> String {
    let mut filter = ThinkFilter::new();
    let mut out = filter.push(text);
    out.push_str(&filter.finish());
    out
}
