//! Tree-sitter grammar resolution and parser reuse.

use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;
use tree_sitter::{Language, Parser};

use crate::error::{Error, Result};
use crate::parser::SourceLang;

/// Map a language to its compiled tree-sitter grammar, if one is linked in.
pub fn language_for(lang: SourceLang) -> Option<Language> {
    match lang {
        SourceLang::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
        SourceLang::JavaScript | SourceLang::TypeScript => {
            Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
        }
        SourceLang::Jsx | SourceLang::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        SourceLang::Python => Some(tree_sitter_python::LANGUAGE.into()),
        SourceLang::Go => Some(tree_sitter_go::LANGUAGE.into()),
        SourceLang::Bash => Some(tree_sitter_bash::LANGUAGE.into()),
        SourceLang::Java | SourceLang::C | SourceLang::Cpp | SourceLang::Other => None,
    }
}

/// One parser per language, created on first use.
///
/// A parser carries mutable state, so each sits behind a mutex and two scans
/// of the same language take turns.
#[derive(Default)]
pub struct GrammarRegistry {
    parsers: DashMap<SourceLang, Arc<Mutex<Parser>>>,
}

impl GrammarRegistry {
    pub fn parser(&self, lang: SourceLang) -> Result<Arc<Mutex<Parser>>> {
        if let Some(parser) = self.parsers.get(&lang) {
            return Ok(Arc::clone(&parser));
        }

        let language = language_for(lang).ok_or_else(|| Error::GrammarLoad {
            language: lang.id().to_string(),
            reason: "no tree-sitter grammar available".to_string(),
        })?;

        let mut parser = Parser::new();
        parser.set_language(&language).map_err(|e| Error::GrammarLoad {
            language: lang.id().to_string(),
            reason: e.to_string(),
        })?;
        debug!(language = lang.id(), "loaded grammar");

        let parser = self
            .parsers
            .entry(lang)
            .or_insert_with(|| Arc::new(Mutex::new(parser)));
        Ok(Arc::clone(&parser))
    }
}
