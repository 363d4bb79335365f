// Word segmentation of region text.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};
use crate::parser::Region;
use crate::Position;

/// Punctuation treated as word boundaries, in addition to whitespace.
pub const DEFAULT_SEPARATORS: &str = ".=+{}*()[]_`\\|,@#&!/<>:-'\"";

lazy_static! {
    static ref DEFAULT_PATTERN: Regex = Regex::new(&separator_class(DEFAULT_SEPARATORS)).unwrap();
}

fn separator_class(chars: &str) -> String {
    let escaped: String = chars
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .map(|ch| regex::escape(ch.encode_utf8(&mut [0; 4])))
        .collect();
    format!(r"[\s{escaped}]+")
}

/// The separator class: whitespace plus a fixed set of characters.
#[derive(Debug, Clone)]
pub struct Separators {
    chars: String,
    pattern: Regex,
}

impl Separators {
    pub fn new(chars: &str) -> Result<Self> {
        let pattern = Regex::new(&separator_class(chars)).map_err(|e| Error::Separators {
            chars: chars.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            chars: chars.to_string(),
            pattern,
        })
    }

    pub fn chars(&self) -> &str {
        &self.chars
    }

    pub fn is_separator(&self, ch: char) -> bool {
        ch.is_whitespace() || self.chars.contains(ch)
    }
}

impl Default for Separators {
    fn default() -> Self {
        Self {
            chars: DEFAULT_SEPARATORS.to_string(),
            pattern: DEFAULT_PATTERN.clone(),
        }
    }
}

/// A word inside some text, with byte offsets into that text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordSlice<'a> {
    pub word: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Split `text` on separator runs. Empty candidates are never returned.
pub fn split_words<'a>(text: &'a str, separators: &Separators) -> Vec<WordSlice<'a>> {
    let mut words = Vec::new();
    let mut cut = 0;

    let mut emit = |start: usize, end: usize| {
        if start < end {
            words.push(WordSlice {
                word: &text[start..end],
                start,
                end,
            });
        }
    };

    for run in separators.pattern.find_iter(text) {
        emit(cut, run.start());
        cut = run.end();
    }
    // Text after the last separator run.
    emit(cut, text.len());

    words
}

/// A word positioned in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordSegment {
    pub word: String,
    pub start: Position,
    pub end: Position,
}

/// Segment a region's text into words with absolute document positions.
pub fn segment_region(region: &Region, separators: &Separators) -> Vec<WordSegment> {
    split_words(&region.text, separators)
        .into_iter()
        .map(|slice| WordSegment {
            word: slice.word.to_string(),
            start: region.position_at(slice.start),
            end: region.position_at(slice.end),
        })
        .collect()
}

/// Split a camelCase or PascalCase word into its parts, with byte offsets into `word`.
///
/// A run of capitals followed by a lowercase letter keeps the last capital
/// for the next part, so `HTTPServer` gives `HTTP` and `Server`.
pub fn split_camel_case(word: &str) -> Vec<WordSlice<'_>> {
    let chars: Vec<(usize, char)> = word.char_indices().collect();
    let mut parts = Vec::new();
    let mut start = 0;

    for i in 1..chars.len() {
        let (offset, ch) = chars[i];
        let prev = chars[i - 1].1;
        let next = chars.get(i + 1).map(|&(_, c)| c);

        let lower_to_upper = (prev.is_lowercase() || prev.is_ascii_digit()) && ch.is_uppercase();
        let acronym_end =
            prev.is_uppercase() && ch.is_uppercase() && next.is_some_and(char::is_lowercase);

        if lower_to_upper || acronym_end {
            parts.push(WordSlice {
                word: &word[start..offset],
                start,
                end: offset,
            });
            start = offset;
        }
    }

    if start < word.len() {
        parts.push(WordSlice {
            word: &word[start..],
            start,
            end: word.len(),
        });
    }

    parts
}
