use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checker::tokenizer::DEFAULT_SEPARATORS;
use crate::checker::CasePolicy;
use crate::parser::Strategy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dictionary name; `<language>.aff` and `<language>.dic` are loaded.
    pub language: String,
    pub dictionary_dir: Option<PathBuf>,
    pub personal_dictionary: Option<PathBuf>,
    pub separators: String,
    pub case_policy: CasePolicy,
    pub split_camel_case: bool,
    pub strategy: Strategy,
    pub debounce_ms: u64,
    pub max_suggestions: usize,
}

fn default_language() -> String {
    "en_US".to_string()
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_max_suggestions() -> usize {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: default_language(),
            dictionary_dir: None,
            personal_dictionary: None,
            separators: DEFAULT_SEPARATORS.to_string(),
            case_policy: CasePolicy::default(),
            split_camel_case: false,
            strategy: Strategy::default(),
            debounce_ms: default_debounce_ms(),
            max_suggestions: default_max_suggestions(),
        }
    }
}

/// One config file as written. Keys left out do not reset earlier layers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    language: Option<String>,
    dictionary_dir: Option<PathBuf>,
    personal_dictionary: Option<PathBuf>,
    separators: Option<String>,
    case_policy: Option<CasePolicy>,
    split_camel_case: Option<bool>,
    strategy: Option<Strategy>,
    debounce_ms: Option<u64>,
    max_suggestions: Option<usize>,
}

/// Values given on the command line; they win over every config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub language: Option<String>,
    pub dictionary_dir: Option<PathBuf>,
    pub personal_dictionary: Option<PathBuf>,
    pub strategy: Option<Strategy>,
}

impl Config {
    /// Load configuration with priority: CLI args > local config > global config > defaults
    pub fn load(overrides: Overrides) -> Result<Self> {
        let global = Self::global_config_path();
        Self::load_from(global.as_deref(), Path::new(".spellscan.toml"), overrides)
    }

    pub fn load_from(global: Option<&Path>, local: &Path, overrides: Overrides) -> Result<Self> {
        let mut config = Self::default();

        if let Some(global_path) = global {
            if global_path.exists() {
                config = config.merge(Self::from_file(global_path)?);
            }
        }

        // Local config overrides global
        if local.exists() {
            config = config.merge(Self::from_file(local)?);
        }

        if let Some(language) = overrides.language {
            config.language = language;
        }
        if let Some(dir) = overrides.dictionary_dir {
            config.dictionary_dir = Some(dir);
        }
        if let Some(path) = overrides.personal_dictionary {
            config.personal_dictionary = Some(path);
        }
        if let Some(strategy) = overrides.strategy {
            config.strategy = strategy;
        }

        if config.personal_dictionary.is_none() {
            config.personal_dictionary = Self::default_personal_dict_path();
        }

        // Ensure personal dictionary file exists
        if let Some(path) = &config.personal_dictionary {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .context("Failed to create personal dictionary directory")?;
            }
            if !path.exists() {
                fs::write(path, "").context("Failed to create personal dictionary file")?;
            }
        }

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<ConfigFile> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .map_err(crate::Error::from)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Apply the keys a file actually sets; absent keys keep the current value.
    fn merge(mut self, file: ConfigFile) -> Self {
        if let Some(language) = file.language {
            self.language = language;
        }
        if let Some(dir) = file.dictionary_dir {
            self.dictionary_dir = Some(dir);
        }
        if let Some(path) = file.personal_dictionary {
            self.personal_dictionary = Some(path);
        }
        if let Some(separators) = file.separators {
            self.separators = separators;
        }
        if let Some(case_policy) = file.case_policy {
            self.case_policy = case_policy;
        }
        if let Some(split) = file.split_camel_case {
            self.split_camel_case = split;
        }
        if let Some(strategy) = file.strategy {
            self.strategy = strategy;
        }
        if let Some(debounce_ms) = file.debounce_ms {
            self.debounce_ms = debounce_ms;
        }
        if let Some(max) = file.max_suggestions {
            self.max_suggestions = max;
        }
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Directory holding the `.aff`/`.dic` pairs.
    pub fn dictionary_dir(&self) -> Option<PathBuf> {
        self.dictionary_dir.clone().or_else(Self::data_dir)
    }

    pub fn global_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "spellscan").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn default_personal_dict_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "spellscan").map(|dirs| dirs.config_dir().join("personal.txt"))
    }

    pub fn data_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "spellscan").map(|dirs| dirs.data_dir().to_path_buf())
    }
}
