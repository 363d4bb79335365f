use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Anything that can answer "is this word spelled correctly".
pub trait Speller {
    fn spell(&self, word: &str) -> bool;
}

/// A loaded Hunspell-format dictionary.
///
/// Queries take a shared lock and [`Dictionary::add_word`] takes the
/// exclusive one, so a word added while scans are running becomes visible
/// only once every in-flight [`Lease`] has been released.
pub struct Dictionary {
    name: String,
    engine: RwLock<Option<spellbook::Dictionary>>,
}

impl Dictionary {
    /// Load from in-memory affix and dictionary data.
    pub fn from_buffers(name: &str, aff: &[u8], dic: &[u8]) -> Result<Self> {
        let load_error = |reason: String| Error::DictionaryLoad {
            source_name: name.to_string(),
            reason,
        };
        let aff = std::str::from_utf8(aff).map_err(|e| load_error(format!("affix data: {e}")))?;
        let dic =
            std::str::from_utf8(dic).map_err(|e| load_error(format!("dictionary data: {e}")))?;
        let engine = spellbook::Dictionary::new(aff, dic).map_err(|e| load_error(e.to_string()))?;

        info!(dictionary = name, "dictionary loaded");
        Ok(Self {
            name: name.to_string(),
            engine: RwLock::new(Some(engine)),
        })
    }

    /// Load from an `.aff`/`.dic` pair on disk.
    pub fn load_from_paths(aff_path: &Path, dic_path: &Path) -> Result<Self> {
        let read = |path: &Path| {
            fs::read(path).map_err(|e| Error::DictionaryLoad {
                source_name: path.display().to_string(),
                reason: e.to_string(),
            })
        };
        let aff = read(aff_path)?;
        let dic = read(dic_path)?;
        Self::from_buffers(&dic_path.display().to_string(), &aff, &dic)
    }

    /// Load `<language>.aff` and `<language>.dic` from `dir`.
    pub fn load(language: &str, dir: &Path) -> Result<Self> {
        let (aff, dic) = Self::paths(language, dir);
        Self::load_from_paths(&aff, &dic)
    }

    pub fn paths(language: &str, dir: &Path) -> (PathBuf, PathBuf) {
        (
            dir.join(format!("{}.aff", language)),
            dir.join(format!("{}.dic", language)),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check a single word. The word must not be empty.
    ///
    /// # Panics
    ///
    /// Panics if the dictionary has been disposed.
    pub fn spell(&self, word: &str) -> bool {
        self.lease().spell(word)
    }

    /// Ranked suggestions for `word`, at most `limit` of them.
    ///
    /// # Panics
    ///
    /// Panics if the dictionary has been disposed.
    pub fn suggest(&self, word: &str, limit: usize) -> Vec<String> {
        let guard = self.read();
        let mut suggestions = Vec::new();
        live(&guard, &self.name).suggest(word, &mut suggestions);
        suggestions.truncate(limit);
        suggestions
    }

    /// Add a word for the lifetime of this dictionary.
    ///
    /// Waits for in-flight leases to be released.
    ///
    /// # Panics
    ///
    /// Panics if the dictionary has been disposed.
    pub fn add_word(&self, word: &str) -> Result<()> {
        let mut guard = self.engine.write().unwrap_or_else(PoisonError::into_inner);
        let Some(engine) = guard.as_mut() else {
            panic!("dictionary {} used after dispose", self.name);
        };
        engine.add(word).map_err(|e| Error::AddWord {
            word: word.to_string(),
            reason: e.to_string(),
        })?;
        debug!(word, "added word to dictionary");
        Ok(())
    }

    /// Add every word of a personal word list (one per line, `#` starts a comment).
    pub fn load_personal(&self, path: &Path) -> Result<usize> {
        if !path.exists() {
            return Ok(0);
        }
        let content = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut added = 0;
        for line in content.lines() {
            let word = line.trim();
            if !word.is_empty() && !word.starts_with('#') {
                self.add_word(word)?;
                added += 1;
            }
        }
        debug!(path = %path.display(), added, "personal dictionary applied");
        Ok(added)
    }

    /// Shared read access held for the duration of one scan.
    ///
    /// # Panics
    ///
    /// Panics if the dictionary has been disposed.
    pub fn lease(&self) -> Lease<'_> {
        let guard = self.read();
        live(&guard, &self.name);
        Lease { guard }
    }

    /// Release the engine. Idempotent; any later query panics.
    pub fn dispose(&self) {
        let mut guard = self.engine.write().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            info!(dictionary = %self.name, "dictionary disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.read().is_none()
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<spellbook::Dictionary>> {
        self.engine.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Dictionary {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn live<'a>(engine: &'a Option<spellbook::Dictionary>, name: &str) -> &'a spellbook::Dictionary {
    match engine {
        Some(engine) => engine,
        None => panic!("dictionary {name} used after dispose"),
    }
}

/// A read lock on the dictionary; `add_word` blocks while any lease is alive.
pub struct Lease<'a> {
    guard: RwLockReadGuard<'a, Option<spellbook::Dictionary>>,
}

impl Speller for Lease<'_> {
    fn spell(&self, word: &str) -> bool {
        debug_assert!(!word.is_empty(), "empty words are never spell checked");
        live(&self.guard, "lease").check(word)
    }
}
