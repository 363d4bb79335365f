pub mod grammar;
pub mod line_tokenizer;
pub mod syntax_tree;

use serde::{Deserialize, Serialize};
use std::ops::Range as ByteRange;
use std::path::Path;
use tracing::{debug, warn};

use crate::document::{utf16_len, Document};
use crate::error::{Error, Result};
use crate::Position;
use grammar::GrammarRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceLang {
    Rust,
    JavaScript,
    TypeScript,
    Python,
    Go,
    Java,
    C,
    Cpp,
    Jsx,
    Tsx,
    Bash,
    Other,
}

impl SourceLang {
    /// Detect the language from a path or URI extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "rs" => SourceLang::Rust,
            "js" | "mjs" | "cjs" => SourceLang::JavaScript,
            "ts" | "mts" | "cts" => SourceLang::TypeScript,
            "jsx" => SourceLang::Jsx,
            "tsx" => SourceLang::Tsx,
            "py" | "pyw" => SourceLang::Python,
            "go" => SourceLang::Go,
            "java" => SourceLang::Java,
            "c" | "h" => SourceLang::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => SourceLang::Cpp,
            "sh" | "bash" => SourceLang::Bash,
            _ => SourceLang::Other,
        }
    }

    /// Language identifier used when looking up grammars.
    pub fn id(self) -> &'static str {
        match self {
            SourceLang::Rust => "rust",
            SourceLang::JavaScript => "javascript",
            SourceLang::TypeScript => "typescript",
            SourceLang::Python => "python",
            SourceLang::Go => "go",
            SourceLang::Java => "java",
            SourceLang::C => "c",
            SourceLang::Cpp => "cpp",
            SourceLang::Jsx => "jsx",
            SourceLang::Tsx => "tsx",
            SourceLang::Bash => "bash",
            SourceLang::Other => "plaintext",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Comment,
    String,
}

impl RegionKind {
    /// Classify a token scope or node kind such as `comment.block` or `string_literal`.
    pub fn from_scope(scope: &str) -> Option<Self> {
        if scope.contains("comment") {
            Some(RegionKind::Comment)
        } else if scope.contains("string") {
            Some(RegionKind::String)
        } else {
            None
        }
    }
}

/// Which syntax analyzer locates regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Syntax tree when a grammar exists, line tokenizer otherwise
    #[default]
    Auto,
    SyntaxTree,
    LineTokenizer,
}

/// A comment or string literal in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub kind: RegionKind,
    pub start: Position,
    pub end: Position,
    /// Exact document text between `start` and `end`.
    pub text: String,
    /// Byte offsets of `text` in the document.
    pub span: ByteRange<usize>,
}

impl Region {
    /// Build a region from document byte offsets, or `None` if the offsets
    /// cannot be rendered as a valid range.
    pub fn from_span(document: &Document, kind: RegionKind, span: ByteRange<usize>) -> Option<Self> {
        if span.start > span.end {
            return None;
        }
        let start = document.position_at(span.start)?;
        let end = document.position_at(span.end)?;
        Some(Self {
            kind,
            start,
            end,
            text: document.text()[span.clone()].to_string(),
            span,
        })
    }

    /// Map a byte offset inside `text` to an absolute document position.
    ///
    /// Columns on the first line are shifted by the region's start column,
    /// later lines restart at zero. The result never passes `end`.
    pub fn position_at(&self, local: usize) -> Position {
        let local = local.min(self.text.len());
        let before = &self.text[..local];
        let position = match before.rfind('\n') {
            None => Position::new(self.start.row, self.start.column + utf16_len(before)),
            Some(newline) => {
                let row = self.start.row + before.matches('\n').count();
                Position::new(row, utf16_len(&before[newline + 1..]))
            }
        };
        position.min(self.end)
    }
}

/// Locates the regions of a document with the configured strategy.
pub struct RegionExtractor {
    strategy: Strategy,
    grammars: GrammarRegistry,
}

impl RegionExtractor {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            grammars: GrammarRegistry::default(),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Extract regions in document order.
    ///
    /// Fails with [`Error::GrammarLoad`] when no analyzer exists for the
    /// document's language and with [`Error::ScanFailure`] when the analyzer
    /// gives up on the document.
    pub fn extract(&self, document: &Document) -> Result<Vec<Region>> {
        let language = document.language();
        let regions = match self.strategy {
            Strategy::SyntaxTree => {
                let parser = self.grammars.parser(language)?;
                syntax_tree::extract(document, &parser)?
            }
            Strategy::LineTokenizer => line_regions(document)?,
            Strategy::Auto => match self.grammars.parser(language) {
                Ok(parser) => syntax_tree::extract(document, &parser)?,
                Err(err) => {
                    debug!(language = language.id(), "{err}, falling back to line tokenizer");
                    line_regions(document)?
                }
            },
        };

        Ok(retain_disjoint(regions))
    }
}

impl Default for RegionExtractor {
    fn default() -> Self {
        Self::new(Strategy::default())
    }
}

fn line_regions(document: &Document) -> Result<Vec<Region>> {
    let language = document.language();
    let tokenizer = line_tokenizer::DelimiterTokenizer::for_language(language).ok_or_else(|| {
        Error::GrammarLoad {
            language: language.id().to_string(),
            reason: "no comment syntax known for this language".to_string(),
        }
    })?;
    Ok(line_tokenizer::extract(document, &tokenizer))
}

// Drops regions that would overlap or run backwards relative to their predecessor.
fn retain_disjoint(regions: Vec<Region>) -> Vec<Region> {
    let mut kept: Vec<Region> = Vec::with_capacity(regions.len());
    for region in regions {
        if let Some(previous) = kept.last() {
            if region.span.start < previous.span.end {
                warn!(
                    start = %region.start,
                    end = %region.end,
                    "dropping region overlapping its predecessor"
                );
                continue;
            }
        }
        kept.push(region);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentUri;
    use std::path::PathBuf;

    fn doc(name: &str, text: &str) -> Document {
        Document::new(DocumentUri::new(format!("file:///src/{name}")), 1, text)
    }

    #[test]
    fn test_language_detection() {
        assert_eq!(SourceLang::from_path(&PathBuf::from("main.rs")), SourceLang::Rust);
        assert_eq!(SourceLang::from_path(&PathBuf::from("app.tsx")), SourceLang::Tsx);
        assert_eq!(SourceLang::from_path(&PathBuf::from("run.sh")), SourceLang::Bash);
        assert_eq!(SourceLang::from_path(&PathBuf::from("notes.txt")), SourceLang::Other);
    }

    #[test]
    fn test_scope_classification() {
        assert_eq!(RegionKind::from_scope("comment.line"), Some(RegionKind::Comment));
        assert_eq!(RegionKind::from_scope("block_comment"), Some(RegionKind::Comment));
        assert_eq!(RegionKind::from_scope("string_literal"), Some(RegionKind::String));
        assert_eq!(RegionKind::from_scope("identifier"), None);
    }

    #[test]
    fn test_region_rejects_bad_spans() {
        let document = doc("a.ts", "// héllo");
        assert!(Region::from_span(&document, RegionKind::Comment, 5..2).is_none());
        assert!(Region::from_span(&document, RegionKind::Comment, 0..99).is_none());
        // inside the two-byte 'é'
        assert!(Region::from_span(&document, RegionKind::Comment, 0..5).is_none());
    }

    #[test]
    fn test_region_position_mapping() {
        let document = doc("a.ts", "let x = 1; /* one\n   two */");
        let region = Region::from_span(&document, RegionKind::Comment, 11..document.text().len())
            .unwrap();
        assert_eq!(region.start, Position::new(0, 11));
        assert_eq!(region.end, Position::new(1, 9));
        assert_eq!(region.position_at(3), Position::new(0, 14));
        // "two" starts three columns into the second line
        assert_eq!(region.position_at(10), Position::new(1, 3));
        assert_eq!(region.position_at(usize::MAX), region.end);
    }

    #[test]
    fn test_overlapping_regions_are_dropped() {
        let document = doc("a.ts", "// one two");
        let outer = Region::from_span(&document, RegionKind::Comment, 0..10).unwrap();
        let inner = Region::from_span(&document, RegionKind::String, 3..6).unwrap();
        let kept = retain_disjoint(vec![outer.clone(), inner]);
        assert_eq!(kept, vec![outer]);
    }

    #[test]
    fn test_unknown_language_is_grammar_error() {
        let extractor = RegionExtractor::default();
        let err = extractor.extract(&doc("notes.txt", "hello")).unwrap_err();
        assert!(matches!(err, Error::GrammarLoad { .. }));
    }

    #[test]
    fn test_both_strategies_agree_on_comments() {
        let text = "const a = 1; // first note\n/* second\n   note */\n";
        let document = doc("a.ts", text);
        let tree = RegionExtractor::new(Strategy::SyntaxTree).extract(&document).unwrap();
        let lines = RegionExtractor::new(Strategy::LineTokenizer).extract(&document).unwrap();

        let comments = |regions: &[Region]| -> Vec<(Position, Position, String)> {
            regions
                .iter()
                .filter(|r| r.kind == RegionKind::Comment)
                .map(|r| (r.start, r.end, r.text.clone()))
                .collect()
        };
        assert_eq!(comments(&tree), comments(&lines));
        assert_eq!(comments(&tree).len(), 2);
    }
}
