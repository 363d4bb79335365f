//! Region extraction over a full tree-sitter parse of the document.

use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};
use tree_sitter::{Parser, Tree};

use crate::document::Document;
use crate::error::{Error, Result};
use crate::parser::{Region, RegionKind};

/// Parse `document` and collect every comment and string node.
///
/// # Errors
///
/// Returns `Error::ScanFailure` if tree-sitter gives up on the text.
pub fn extract(document: &Document, parser: &Mutex<Parser>) -> Result<Vec<Region>> {
    let tree = {
        let mut parser = parser.lock().unwrap_or_else(PoisonError::into_inner);
        // Each scan starts from scratch; no previous tree is reused.
        parser.reset();
        parser.parse(document.text(), None)
    }
    .ok_or_else(|| Error::ScanFailure {
        uri: document.uri().clone(),
        reason: "tree-sitter returned no tree".to_string(),
    })?;

    if tree.root_node().has_error() {
        debug!(uri = %document.uri(), "syntax errors in document, extracting what parsed");
    }

    Ok(collect_regions(document, &tree))
}

/// Node kinds that hold natural-language text.
fn classify(kind: &str) -> Option<RegionKind> {
    if kind.contains("comment") {
        Some(RegionKind::Comment)
    } else if matches!(kind, "string" | "template_string" | "raw_string")
        || kind.ends_with("string_literal")
    {
        Some(RegionKind::String)
    } else {
        None
    }
}

// Depth-first, pre-order. A textual node is emitted whole and its children skipped.
// Only named nodes are classified: anonymous keyword tokens such as the `string`
// in a TypeScript type annotation share a kind name with literals.
fn collect_regions(document: &Document, tree: &Tree) -> Vec<Region> {
    let mut regions = Vec::new();
    let mut cursor = tree.walk();

    'walk: loop {
        let node = cursor.node();
        let kind = if node.is_named() { classify(node.kind()) } else { None };
        match kind {
            Some(kind) => match Region::from_span(document, kind, node.byte_range()) {
                Some(region) => regions.push(region),
                None => warn!(kind = node.kind(), "dropping node with unusable range"),
            },
            None => {
                if cursor.goto_first_child() {
                    continue;
                }
            }
        }

        loop {
            if cursor.goto_next_sibling() {
                continue 'walk;
            }
            if !cursor.goto_parent() {
                break 'walk;
            }
        }
    }

    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentUri;
    use crate::parser::grammar::GrammarRegistry;
    use crate::Position;

    fn regions(name: &str, text: &str) -> (Document, Vec<Region>) {
        let document = Document::new(DocumentUri::new(format!("file:///src/{name}")), 1, text);
        let registry = GrammarRegistry::default();
        let parser = registry.parser(document.language()).unwrap();
        let regions = extract(&document, &parser).unwrap();
        (document, regions)
    }

    #[test]
    fn test_single_line_comment() {
        let (_, found) = regions("a.ts", "// this is a tpyo");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, RegionKind::Comment);
        assert_eq!(found[0].text, "// this is a tpyo");
        assert_eq!(found[0].start, Position::new(0, 0));
        assert_eq!(found[0].end, Position::new(0, 17));
    }

    #[test]
    fn test_multi_line_block_comment() {
        let (_, found) = regions("a.ts", "/* line one\n   line two */");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start, Position::new(0, 0));
        assert_eq!(found[0].end, Position::new(1, 14));
        assert_eq!(found[0].text, "/* line one\n   line two */");
    }

    #[test]
    fn test_strings_and_comments_in_order() {
        let text = "const greeting = \"hello world\"; // say hi\nlet t = `multi\nline`;\n";
        let (_, found) = regions("a.ts", text);
        let kinds: Vec<_> = found.iter().map(|r| (r.kind, r.text.as_str())).collect();
        assert_eq!(
            kinds,
            vec![
                (RegionKind::String, "\"hello world\""),
                (RegionKind::Comment, "// say hi"),
                (RegionKind::String, "`multi\nline`"),
            ]
        );
    }

    #[test]
    fn test_region_text_matches_document_positions() {
        let text = "def f():\n    \"\"\"Docstring with\n    two lines.\"\"\"\n    # note ünïcode\n    return 'x'\n";
        let (document, found) = regions("a.py", text);
        assert_eq!(found.len(), 3);
        for region in &found {
            let start = document.offset_at(region.start).unwrap();
            let end = document.offset_at(region.end).unwrap();
            assert_eq!(&document.text()[start..end], region.text);
        }
    }

    #[test]
    fn test_empty_document() {
        let (_, found) = regions("a.rs", "");
        assert!(found.is_empty());
    }

    #[test]
    fn test_type_annotations_are_code() {
        let text = "let x: string = 1;\nfunction f(a: string): string { return a; }\n";
        let (_, found) = regions("a.ts", text);
        assert!(found.is_empty(), "{found:?}");

        let (_, found) = regions("a.ts", "let s: string = \"wrold\";");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "\"wrold\"");
    }

    #[test]
    fn test_code_only_document() {
        let (_, found) = regions("a.go", "package main\n\nfunc main() {}\n");
        assert!(found.is_empty());
    }
}
