//! Paragraph-aware content splitter
//!
//! Long article bodies are cut into fragments sized for a full-text index.
//! Sizes are measured in runes (Unicode scalar values), never bytes.
//!
//! # Algorithm
//!
//! 1. A body of at most `max` runes is returned unchanged as one fragment.
//! 2. Otherwise the body is cut after every `</p>` and the pieces are
//!    accumulated into a buffer that is flushed once it grows past `opt`.
//!    A buffer is flushed early if the next piece would push it past `max`.
//!    A single paragraph longer than `max` is re-cut on line breaks.
//! 3. Whatever is left in the buffer at the end is appended to the previous
//!    fragment when that stays within `max`.
//! 4. If all of that still produced a single fragment longer than
//!    `max + opt`, the text is cut into sentences instead.
//!
//! # Example
//!
//! ```
//! use feedmill::splitter::Splitter;
//!
//! let splitter = Splitter::new(10, 20);
//! let fragments = splitter.split("<p>first one</p><p>second one</p><p>third</p>");
//! assert_eq!(fragments.concat(), "<p>first one</p><p>second one</p><p>third</p>");
//! assert!(fragments.len() > 1);
//! ```

use crate::models::Entry;
use crate::utils::rune_count;

/// Default optimal fragment size in runes
pub const DEFAULT_OPTIMAL_SIZE: usize = 1800;

/// Default maximum fragment size in runes
pub const DEFAULT_MAX_SIZE: usize = 3600;

const PARAGRAPH_END: &str = "</p>";

/// Separators tried, in order, on a paragraph that alone exceeds `max`
const LINE_SEPARATORS: &[&str] = &["\n", "<br>"];

/// Content splitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Splitter {
    opt: usize,
    max: usize,
}

impl Default for Splitter {
    fn default() -> Self {
        Self::new(DEFAULT_OPTIMAL_SIZE, DEFAULT_MAX_SIZE)
    }
}

impl Splitter {
    /// Create a splitter; `opt` is clamped to `max`
    pub fn new(opt: usize, max: usize) -> Self {
        Self {
            opt: opt.min(max),
            max,
        }
    }

    pub fn optimal_size(&self) -> usize {
        self.opt
    }

    pub fn max_size(&self) -> usize {
        self.max
    }

    /// Split an entry into fragments numbered from 1.
    ///
    /// Every field except `content`, `chunk` and `id` is copied unchanged.
    pub fn split_entry(&self, entry: &Entry) -> Vec<Entry> {
        let fragments = self.split(&entry.content);

        tracing::debug!(
            url = %entry.url,
            runes = entry.content_len(),
            fragments = fragments.len(),
            sizes = ?fragments.iter().map(|f| rune_count(f)).collect::<Vec<_>>(),
            "Split entry content"
        );

        fragments
            .into_iter()
            .enumerate()
            .map(|(index, content)| Entry {
                id: None,
                content,
                chunk: index as u32 + 1,
                ..entry.clone()
            })
            .collect()
    }

    /// Split content into fragments
    pub fn split(&self, content: &str) -> Vec<String> {
        if rune_count(content) <= self.max {
            return vec![content.to_string()];
        }

        let mut acc = Accumulator::new(self.opt, self.max);

        for unit in content.split_inclusive(PARAGRAPH_END) {
            if rune_count(unit) > self.max {
                for piece in self.split_oversized(unit, LINE_SEPARATORS) {
                    acc.push(&piece);
                }
            } else {
                acc.push(unit);
            }
        }

        let fragments = acc.finish();

        if let [only] = fragments.as_slice() {
            if rune_count(only) > self.max + self.opt {
                tracing::debug!(runes = rune_count(only), "Falling back to sentence splitting");
                return self.split_sentences(only);
            }
        }

        fragments
    }

    /// Cut one oversized paragraph on the first separator that actually
    /// divides it. Each piece is wrapped in its own paragraph. Pieces that are
    /// still too long are cut on the remaining separators; if nothing divides
    /// the text it is kept whole.
    fn split_oversized(&self, unit: &str, separators: &[&str]) -> Vec<String> {
        let Some((separator, rest)) = separators.split_first() else {
            return vec![unit.to_string()];
        };

        let inner = unwrap_paragraph(unit);
        if !inner.contains(separator) {
            return self.split_oversized(unit, rest);
        }

        tracing::debug!(separator = ?separator, "Splitting oversized paragraph");

        let mut pieces = Vec::new();
        for part in inner.split(separator) {
            if part.trim().is_empty() {
                continue;
            }
            let wrapped = wrap_paragraph(part);
            if rune_count(&wrapped) > self.max {
                pieces.extend(self.split_oversized(&wrapped, rest));
            } else {
                pieces.push(wrapped);
            }
        }
        pieces
    }

    /// Sentence fallback: cut after every `.` and regroup sentences below `opt`
    fn split_sentences(&self, text: &str) -> Vec<String> {
        let body = text.trim();
        let body = body.strip_prefix("<div>").unwrap_or(body);
        let body = body.strip_suffix("</div>").unwrap_or(body);
        // Earlier fallback output comes back as a single paragraph
        let body = match unwrap_paragraph(body) {
            inner if !inner.contains(PARAGRAPH_END) => inner,
            _ => body,
        };

        let mut fragments = Vec::new();
        let mut buffer = String::new();
        let mut buffer_len = 0;

        for sentence in body.split_inclusive('.') {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            let sentence_len = rune_count(sentence);

            if buffer_len > 0 && buffer_len + sentence_len >= self.opt {
                fragments.push(wrap_paragraph(buffer.trim_end()));
                buffer.clear();
                buffer_len = 0;
            }

            buffer.push_str(sentence);
            buffer.push(' ');
            buffer_len += sentence_len + 1;
        }

        if !buffer.trim().is_empty() {
            fragments.push(wrap_paragraph(buffer.trim_end()));
        }

        fragments
    }
}

/// Concatenate fragments back into one body
pub fn join_fragments<S: AsRef<str>>(fragments: &[S]) -> String {
    fragments.iter().map(AsRef::as_ref).collect()
}

/// Running buffer of paragraph pieces
struct Accumulator {
    opt: usize,
    max: usize,
    fragments: Vec<String>,
    buffer: String,
    buffer_len: usize,
}

impl Accumulator {
    fn new(opt: usize, max: usize) -> Self {
        Self {
            opt,
            max,
            fragments: Vec::new(),
            buffer: String::new(),
            buffer_len: 0,
        }
    }

    fn push(&mut self, piece: &str) {
        let piece_len = rune_count(piece);

        if self.buffer_len > 0 && self.buffer_len + piece_len > self.max {
            self.flush();
        }

        self.buffer.push_str(piece);
        self.buffer_len += piece_len;

        if self.buffer_len > self.opt {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        self.fragments.push(std::mem::take(&mut self.buffer));
        self.buffer_len = 0;
    }

    /// Merge the remainder into the previous fragment when it fits
    fn finish(mut self) -> Vec<String> {
        if self.buffer.is_empty() {
            return self.fragments;
        }

        match self.fragments.last_mut() {
            Some(last) if rune_count(last) + self.buffer_len <= self.max => {
                last.push_str(&self.buffer);
            }
            _ => self.fragments.push(self.buffer),
        }

        self.fragments
    }
}

fn unwrap_paragraph(unit: &str) -> &str {
    let trimmed = unit.trim();
    match trimmed
        .strip_prefix("<p>")
        .and_then(|rest| rest.strip_suffix(PARAGRAPH_END))
    {
        Some(inner) => inner,
        None => unit,
    }
}

fn wrap_paragraph(text: &str) -> String {
    format!("<p>{text}</p>")
}
