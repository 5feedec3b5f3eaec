//! Inline reasoning tags
//!
//! Splits a tagged content stream into thinking and answer text as it
//! arrives. Only the first `<think>` … `</think>` span is reasoning; the
//! delimiters belong to neither side and any later `<think>` is literal
//! answer text. Work is linear in the total stream length.

pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    BeforeSpan,
    InSpan,
    AfterSpan,
}

#[derive(Debug, Default)]
pub struct TagScanner {
    phase: Phase,
    /// Tail that may be the start of the delimiter being searched for
    held: String,
}

impl TagScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_thinking_open(&self) -> bool {
        self.phase == Phase::InSpan
    }

    /// Route one fragment into `thinking` / `answer`.
    pub fn feed(&mut self, fragment: &str, thinking: &mut String, answer: &mut String) {
        let mut text = std::mem::take(&mut self.held);
        text.push_str(fragment);
        let mut rest = text.as_str();

        loop {
            let (delimiter, sink, next) = match self.phase {
                Phase::BeforeSpan => (THINK_OPEN, &mut *answer, Phase::InSpan),
                Phase::InSpan => (THINK_CLOSE, &mut *thinking, Phase::AfterSpan),
                Phase::AfterSpan => {
                    answer.push_str(rest);
                    return;
                }
            };

            match rest.find(delimiter) {
                Some(pos) => {
                    sink.push_str(&rest[..pos]);
                    rest = &rest[pos + delimiter.len()..];
                    self.phase = next;
                }
                None => {
                    let keep = partial_delimiter_len(rest, delimiter);
                    let (ready, held) = rest.split_at(rest.len() - keep);
                    sink.push_str(ready);
                    self.held = held.to_string();
                    return;
                }
            }
        }
    }

    /// End of stream: a held-back partial delimiter was literal text after all.
    ///
    /// Returns whether anything was flushed.
    pub fn finish(&mut self, thinking: &mut String, answer: &mut String) -> bool {
        if self.held.is_empty() {
            return false;
        }
        let held = std::mem::take(&mut self.held);
        match self.phase {
            Phase::InSpan => thinking.push_str(&held),
            Phase::BeforeSpan | Phase::AfterSpan => answer.push_str(&held),
        }
        true
    }
}

/// Length of the longest proper prefix of `delimiter` that ends `text`.
/// Delimiters are ASCII, so the cut is always on a char boundary.
fn partial_delimiter_len(text: &str, delimiter: &str) -> usize {
    (1..delimiter.len())
        .rev()
        .find(|&n| text.ends_with(&delimiter[..n]))
        .unwrap_or(0)
}
