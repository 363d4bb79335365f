pub mod dictionary;
pub mod tokenizer;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::config::Config;
use crate::document::{utf16_len, Document};
use crate::error::{Error, Result};
use crate::parser::{Region, RegionExtractor};
use crate::scheduler::DocumentScanner;
use crate::{MisspellingRecord, Position, Range};
use dictionary::{Dictionary, Speller};
use tokenizer::{segment_region, split_camel_case, Separators};

/// How a word is cased before it is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CasePolicy {
    /// Pass the word through unchanged and let the dictionary decide
    #[default]
    AsWritten,
    /// Fold to lowercase first
    Lowercase,
}

impl CasePolicy {
    pub fn apply<'a>(&self, word: &'a str) -> Cow<'a, str> {
        match self {
            CasePolicy::AsWritten => Cow::Borrowed(word),
            CasePolicy::Lowercase => Cow::Owned(word.to_lowercase()),
        }
    }
}

/// Runs the extract, segment and spell steps over whole documents.
pub struct SpellChecker {
    dictionary: Arc<Dictionary>,
    extractor: RegionExtractor,
    separators: Separators,
    case_policy: CasePolicy,
    split_camel_case: bool,
}

impl SpellChecker {
    pub fn new(config: &Config) -> Result<Self> {
        // Load main dictionary
        let dir = config.dictionary_dir().ok_or_else(|| Error::DictionaryLoad {
            source_name: config.language.clone(),
            reason: "no dictionary directory configured".to_string(),
        })?;
        let dictionary = Dictionary::load(&config.language, &dir)?;

        // Load personal dictionary
        if let Some(personal) = &config.personal_dictionary {
            dictionary.load_personal(personal)?;
        }

        Self::with_dictionary(Arc::new(dictionary), config)
    }

    pub fn with_dictionary(dictionary: Arc<Dictionary>, config: &Config) -> Result<Self> {
        Ok(Self {
            dictionary,
            extractor: RegionExtractor::new(config.strategy),
            separators: Separators::new(&config.separators)?,
            case_policy: config.case_policy,
            split_camel_case: config.split_camel_case,
        })
    }

    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dictionary
    }

    /// Scan a document from its first line and report every misspelled word.
    pub fn scan(&self, document: &Document) -> Result<Vec<MisspellingRecord>> {
        let started = Instant::now();
        let regions = self.extractor.extract(document)?;

        let lease = self.dictionary.lease();
        let records = self.check_regions(&regions, &lease);
        drop(lease);

        debug!(
            uri = %document.uri(),
            version = document.version(),
            regions = regions.len(),
            misspellings = records.len(),
            elapsed = ?started.elapsed(),
            "scan complete"
        );
        Ok(records)
    }

    /// The spell pass: regions in order, words in order, every failing occurrence reported.
    pub fn check_regions(&self, regions: &[Region], speller: &impl Speller) -> Vec<MisspellingRecord> {
        let mut records = Vec::new();

        for region in regions {
            for segment in segment_region(region, &self.separators) {
                if !self.split_camel_case {
                    if !speller.spell(&self.case_policy.apply(&segment.word)) {
                        records.push(MisspellingRecord::new(
                            segment.word,
                            Range::new(segment.start, segment.end),
                        ));
                    }
                    continue;
                }

                // Segments never cross a line break, so parts share the segment's row.
                for part in split_camel_case(&segment.word) {
                    if speller.spell(&self.case_policy.apply(part.word)) {
                        continue;
                    }
                    let column = |offset: usize| {
                        Position::new(
                            segment.start.row,
                            segment.start.column + utf16_len(&segment.word[..offset]),
                        )
                    };
                    records.push(MisspellingRecord::new(
                        part.word,
                        Range::new(column(part.start), column(part.end)),
                    ));
                }
            }
        }

        records
    }
}

impl DocumentScanner for SpellChecker {
    fn scan(&self, document: &Document) -> Result<Vec<MisspellingRecord>> {
        SpellChecker::scan(self, document)
    }
}
