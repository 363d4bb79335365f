//! Region extraction with a stateful line tokenizer.
//!
//! The document is tokenized one line at a time and the tokenizer state is
//! carried from line to line, so block comments and multi-line strings keep
//! their region open across line breaks.

use crate::document::Document;
use crate::parser::{Region, RegionKind, SourceLang};
use tracing::warn;

/// A run of text on one line sharing a scope such as `comment.block` or `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Byte offset into the line.
    pub offset: usize,
    pub scope: &'static str,
}

#[derive(Debug, Clone)]
pub struct LineTokens<S> {
    pub tokens: Vec<Token>,
    pub end_state: S,
}

/// Tokenizes one line at a time, threading state between lines.
pub trait LineTokenizer {
    type State: Clone;

    fn initial_state(&self) -> Self::State;

    fn tokenize(&self, line: &str, state: &Self::State) -> LineTokens<Self::State>;

    /// Whether a comment or string is still open at the end of a line that ended in `state`.
    fn continues(&self, state: &Self::State) -> bool;
}

/// Collect regions by walking every line of `document` through `tokenizer`.
pub fn extract<T: LineTokenizer>(document: &Document, tokenizer: &T) -> Vec<Region> {
    let mut regions = Vec::new();
    let mut state = tokenizer.initial_state();
    // Kind and document byte offset of the region currently open.
    let mut open: Option<(RegionKind, usize)> = None;
    let mut line_end = 0;

    for row in 0..document.line_count() {
        let (Some(line), Some(base)) = (document.line(row), document.line_start(row)) else {
            break;
        };
        line_end = base + line.len();

        let LineTokens { tokens, end_state } = tokenizer.tokenize(line, &state);
        for token in &tokens {
            let kind = RegionKind::from_scope(token.scope);
            let at = base + token.offset;
            match (open, kind) {
                (Some((current, _)), Some(next)) if current == next => {}
                (Some((current, start)), next) => {
                    push_region(document, &mut regions, current, start, at);
                    open = next.map(|kind| (kind, at));
                }
                (None, next) => open = next.map(|kind| (kind, at)),
            }
        }

        if let Some((current, start)) = open {
            if !tokenizer.continues(&end_state) {
                push_region(document, &mut regions, current, start, line_end);
                open = None;
            }
        }
        state = end_state;
    }

    // Unterminated at end of document.
    if let Some((current, start)) = open {
        push_region(document, &mut regions, current, start, line_end);
    }

    regions
}

fn push_region(
    document: &Document,
    regions: &mut Vec<Region>,
    kind: RegionKind,
    start: usize,
    end: usize,
) {
    match Region::from_span(document, kind, start..end) {
        Some(region) => regions.push(region),
        None => warn!(start, end, "dropping region with unusable range"),
    }
}

/// Comment and string delimiters of a language family.
#[derive(Debug, Clone, Copy)]
pub struct CommentSyntax {
    pub line: &'static [&'static str],
    pub block: Option<(&'static str, &'static str)>,
    /// Quotes that close at the end of the line.
    pub quotes: &'static [char],
    /// Quotes that may span lines. Longer delimiters go first.
    pub multiline_quotes: &'static [&'static str],
    /// `'x'` is a char literal and a lone `'` is a lifetime.
    pub char_literals: bool,
}

const C_FAMILY: CommentSyntax = CommentSyntax {
    line: &["//"],
    block: Some(("/*", "*/")),
    quotes: &['"', '\''],
    multiline_quotes: &["`"],
    char_literals: false,
};

const JAVA_FAMILY: CommentSyntax = CommentSyntax {
    line: &["//"],
    block: Some(("/*", "*/")),
    quotes: &['"', '\''],
    multiline_quotes: &["\"\"\""],
    char_literals: false,
};

// `'` starts lifetimes and char literals, so only double quotes are strings.
// Char literals are still skipped whole so `'"'` does not open a string.
const RUST: CommentSyntax = CommentSyntax {
    line: &["//"],
    block: Some(("/*", "*/")),
    quotes: &[],
    multiline_quotes: &["\""],
    char_literals: true,
};

const PYTHON: CommentSyntax = CommentSyntax {
    line: &["#"],
    block: None,
    quotes: &['"', '\''],
    multiline_quotes: &["\"\"\"", "'''"],
    char_literals: false,
};

const SHELL: CommentSyntax = CommentSyntax {
    line: &["#"],
    block: None,
    quotes: &[],
    multiline_quotes: &["\"", "'"],
    char_literals: false,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexState {
    Code,
    BlockComment,
    MultilineString(&'static str),
}

/// Delimiter-driven tokenizer producing `comment.*`, `string.*` and `source` scopes.
#[derive(Debug, Clone, Copy)]
pub struct DelimiterTokenizer {
    syntax: CommentSyntax,
}

impl DelimiterTokenizer {
    pub fn new(syntax: CommentSyntax) -> Self {
        Self { syntax }
    }

    pub fn for_language(lang: SourceLang) -> Option<Self> {
        let syntax = match lang {
            SourceLang::JavaScript
            | SourceLang::TypeScript
            | SourceLang::Jsx
            | SourceLang::Tsx
            | SourceLang::Go => C_FAMILY,
            SourceLang::Java | SourceLang::C | SourceLang::Cpp => JAVA_FAMILY,
            SourceLang::Rust => RUST,
            SourceLang::Python => PYTHON,
            SourceLang::Bash => SHELL,
            SourceLang::Other => return None,
        };
        Some(Self::new(syntax))
    }
}

impl LineTokenizer for DelimiterTokenizer {
    type State = LexState;

    fn initial_state(&self) -> LexState {
        LexState::Code
    }

    fn tokenize(&self, line: &str, state: &LexState) -> LineTokens<LexState> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut state = *state;
        let mut pos = 0;

        let mark = |tokens: &mut Vec<Token>, offset: usize, scope: &'static str| {
            if tokens.last().map(|t| t.scope) != Some(scope) {
                tokens.push(Token { offset, scope });
            }
        };

        while pos < line.len() {
            let rest = &line[pos..];
            match state {
                LexState::BlockComment => {
                    mark(&mut tokens, pos, "comment.block");
                    let close = self.syntax.block.map_or("*/", |(_, close)| close);
                    match rest.find(close) {
                        Some(idx) => {
                            pos += idx + close.len();
                            state = LexState::Code;
                        }
                        None => pos = line.len(),
                    }
                }
                LexState::MultilineString(delim) => {
                    mark(&mut tokens, pos, "string.template");
                    match find_closing(rest, delim) {
                        Some(end) => {
                            pos += end;
                            state = LexState::Code;
                        }
                        None => pos = line.len(),
                    }
                }
                LexState::Code => {
                    if self.syntax.line.iter().any(|prefix| rest.starts_with(prefix)) {
                        mark(&mut tokens, pos, "comment.line");
                        pos = line.len();
                    } else if let Some((open, _)) =
                        self.syntax.block.filter(|(open, _)| rest.starts_with(open))
                    {
                        mark(&mut tokens, pos, "comment.block");
                        pos += open.len();
                        state = LexState::BlockComment;
                    } else if let Some(len) = self
                        .syntax
                        .char_literals
                        .then(|| char_literal_len(rest))
                        .flatten()
                    {
                        mark(&mut tokens, pos, "source");
                        pos += len;
                    } else if let Some(delim) = self
                        .syntax
                        .multiline_quotes
                        .iter()
                        .find(|delim| rest.starts_with(**delim))
                    {
                        mark(&mut tokens, pos, "string.template");
                        pos += delim.len();
                        state = LexState::MultilineString(*delim);
                    } else if let Some(quote) = rest
                        .chars()
                        .next()
                        .filter(|ch| self.syntax.quotes.contains(ch))
                    {
                        mark(&mut tokens, pos, "string.quoted");
                        let body = &rest[quote.len_utf8()..];
                        pos += quote.len_utf8()
                            + find_closing(body, quote.encode_utf8(&mut [0; 4]))
                                .unwrap_or(body.len());
                    } else {
                        mark(&mut tokens, pos, "source");
                        pos += rest.chars().next().map_or(1, char::len_utf8);
                    }
                }
            }
        }

        LineTokens {
            tokens,
            end_state: state,
        }
    }

    fn continues(&self, state: &LexState) -> bool {
        !matches!(state, LexState::Code)
    }
}

/// Length of the char literal at the start of `text`, or `None` for a lifetime.
fn char_literal_len(text: &str) -> Option<usize> {
    let body = text.strip_prefix('\'')?;
    let mut chars = body.chars();
    let first = chars.next()?;
    if first == '\\' {
        let escaped = chars.next()?;
        let after = 1 + first.len_utf8() + escaped.len_utf8();
        // `\u{..}` and `\x..` run on to the closing quote.
        return text[after..].find('\'').map(|idx| after + idx + 1);
    }
    let after = 1 + first.len_utf8();
    text[after..].starts_with('\'').then_some(after + 1)
}

/// Byte offset just past the first unescaped `delim` in `text`.
fn find_closing(text: &str, delim: &str) -> Option<usize> {
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if text[idx..].starts_with(delim) {
            return Some(idx + delim.len());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentUri;
    use crate::Position;

    fn regions(name: &str, text: &str) -> Vec<Region> {
        let document = Document::new(DocumentUri::new(format!("file:///src/{name}")), 1, text);
        let tokenizer = DelimiterTokenizer::for_language(document.language()).unwrap();
        extract(&document, &tokenizer)
    }

    fn scopes(tokens: &[Token]) -> Vec<(usize, &'static str)> {
        tokens.iter().map(|t| (t.offset, t.scope)).collect()
    }

    #[test]
    fn test_tokenize_line_comment() {
        let tokenizer = DelimiterTokenizer::new(C_FAMILY);
        let out = tokenizer.tokenize("x = 1; // done", &LexState::Code);
        assert_eq!(scopes(&out.tokens), vec![(0, "source"), (7, "comment.line")]);
        assert_eq!(out.end_state, LexState::Code);
    }

    #[test]
    fn test_tokenize_carries_block_state() {
        let tokenizer = DelimiterTokenizer::new(C_FAMILY);
        let first = tokenizer.tokenize("a /* open", &LexState::Code);
        assert_eq!(first.end_state, LexState::BlockComment);
        assert!(tokenizer.continues(&first.end_state));

        let second = tokenizer.tokenize("still */ b", &first.end_state);
        assert_eq!(scopes(&second.tokens), vec![(0, "comment.block"), (8, "source")]);
        assert_eq!(second.end_state, LexState::Code);
    }

    #[test]
    fn test_escaped_quote_stays_in_string() {
        let tokenizer = DelimiterTokenizer::new(C_FAMILY);
        let out = tokenizer.tokenize(r#"s = "a \" b"; c"#, &LexState::Code);
        assert_eq!(
            scopes(&out.tokens),
            vec![(0, "source"), (4, "string.quoted"), (12, "source")]
        );
    }

    #[test]
    fn test_single_line_comment_region() {
        let found = regions("a.ts", "// this is a tpyo");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "// this is a tpyo");
        assert_eq!(found[0].end, Position::new(0, 17));
    }

    #[test]
    fn test_block_comment_spans_lines() {
        let found = regions("a.c", "int x; /* line one\n   line two */ int y;");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, RegionKind::Comment);
        assert_eq!(found[0].start, Position::new(0, 7));
        assert_eq!(found[0].end, Position::new(1, 14));
        assert_eq!(found[0].text, "/* line one\n   line two */");
    }

    #[test]
    fn test_line_comment_closes_at_end_of_line() {
        let found = regions("a.go", "// one\nx := 1\n// two\n");
        let texts: Vec<_> = found.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["// one", "// two"]);
    }

    #[test]
    fn test_python_triple_quoted_string() {
        let found = regions("a.py", "x = \"\"\"first\nsecond\"\"\"  # trailing\n");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, RegionKind::String);
        assert_eq!(found[0].text, "\"\"\"first\nsecond\"\"\"");
        assert_eq!(found[1].kind, RegionKind::Comment);
        assert_eq!(found[1].text, "# trailing");
    }

    #[test]
    fn test_rust_lifetimes_are_code() {
        let found = regions("a.rs", "fn f<'a>(s: &'a str) {} // ok");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "// ok");
    }

    #[test]
    fn test_rust_char_literals_are_code() {
        let found = regions("a.rs", "let q = '\"'; // note");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, RegionKind::Comment);
        assert_eq!(found[0].text, "// note");

        let found = regions("a.rs", "let e = ['\\'', '\\u{22}', 'é'];\nlet s: &'static str = \"ok\";");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, RegionKind::String);
        assert_eq!(found[0].text, "\"ok\"");
    }

    #[test]
    fn test_char_literal_len() {
        assert_eq!(char_literal_len("'a' x"), Some(3));
        assert_eq!(char_literal_len("'\\n'"), Some(4));
        assert_eq!(char_literal_len("'\\''"), Some(4));
        assert_eq!(char_literal_len("'a>"), None);
        assert_eq!(char_literal_len("'static str"), None);
    }

    #[test]
    fn test_unterminated_block_runs_to_end() {
        let found = regions("a.ts", "x\n/* never\nclosed");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "/* never\nclosed");
        assert_eq!(found[0].end, Position::new(2, 6));
    }

    #[test]
    fn test_empty_document() {
        assert!(regions("a.ts", "").is_empty());
    }
}
