use anyhow::{Context, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checker::dictionary::Dictionary;

pub struct DictionaryInfo {
    pub language: String,
    pub aff_path: PathBuf,
    pub dic_path: PathBuf,
    /// Entry count from the first line of the `.dic` file.
    pub word_count: Option<usize>,
    pub size_bytes: u64,
}

impl DictionaryInfo {
    fn read(language: &str, dir: &Path) -> Result<Option<Self>> {
        let (aff_path, dic_path) = Dictionary::paths(language, dir);
        if !aff_path.is_file() || !dic_path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&dic_path)
            .with_context(|| format!("Failed to read {}", dic_path.display()))?;
        let word_count = content
            .lines()
            .next()
            .and_then(|line| line.trim().parse().ok());
        let size_bytes = fs::metadata(&aff_path)?.len() + fs::metadata(&dic_path)?.len();

        Ok(Some(Self {
            language: language.to_string(),
            aff_path,
            dic_path,
            word_count,
            size_bytes,
        }))
    }
}

/// Every complete `.aff`/`.dic` pair in `dir`, sorted by language.
pub fn find_dictionaries(dir: &Path) -> Result<Vec<DictionaryInfo>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) != Some("dic") {
            continue;
        }
        let Some(language) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Some(info) = DictionaryInfo::read(language, dir)? {
            found.push(info);
        }
    }
    found.sort_by(|a, b| a.language.cmp(&b.language));
    Ok(found)
}

pub fn list_dictionaries(dir: &Path) -> Result<()> {
    let found = find_dictionaries(dir)?;

    if found.is_empty() {
        println!("{}", "No dictionaries installed.".yellow());
        println!(
            "Copy a Hunspell {} and {} pair into {}.",
            "<lang>.aff".cyan(),
            "<lang>.dic".cyan(),
            dir.display()
        );
        return Ok(());
    }

    println!("{}", "Installed dictionaries:".bold());
    println!();

    for info in &found {
        println!(
            "  {} {} ({})",
            "✓".green(),
            info.language.cyan().bold(),
            format!("{}KB", info.size_bytes / 1024).dimmed()
        );
    }

    println!();
    println!("Dictionary directory: {}", dir.display().to_string().dimmed());

    Ok(())
}

pub fn show_info(language: &str, dir: &Path) -> Result<()> {
    let Some(info) = DictionaryInfo::read(language, dir)? else {
        println!(
            "{} Dictionary for {} not found in {}.",
            "✗".red().bold(),
            language.yellow(),
            dir.display()
        );
        return Ok(());
    };

    println!("{}", format!("Dictionary: {}", language).bold());
    println!("  Affix file: {}", info.aff_path.display());
    println!("  Word list:  {}", info.dic_path.display());
    println!("  Size: {} KB", info.size_bytes / 1024);
    match info.word_count {
        Some(count) => println!("  Entries: {}", count),
        None => println!("  Entries: {}", "Unknown".yellow()),
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(80));
    pb.set_message("Loading...");
    let loaded = Dictionary::load_from_paths(&info.aff_path, &info.dic_path);
    pb.finish_and_clear();

    match loaded {
        Ok(_) => println!("  Status: {}", "loads".green()),
        Err(e) => println!("  {}: {}", "Error loading dictionary".red(), e),
    }

    Ok(())
}

/// Append words to the personal word list, skipping ones already there.
pub fn add_words(personal: &Path, words: &[String]) -> Result<usize> {
    let existing = if personal.exists() {
        fs::read_to_string(personal)
            .with_context(|| format!("Failed to read {}", personal.display()))?
    } else {
        String::new()
    };
    let known: Vec<&str> = existing.lines().map(str::trim).collect();

    let mut fresh: Vec<&str> = Vec::new();
    for word in words.iter().map(|w| w.trim()) {
        if !word.is_empty() && !known.contains(&word) && !fresh.contains(&word) {
            fresh.push(word);
        }
    }
    if fresh.is_empty() {
        return Ok(0);
    }

    if let Some(parent) = personal.parent() {
        fs::create_dir_all(parent).context("Failed to create personal dictionary directory")?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(personal)
        .with_context(|| format!("Failed to open {}", personal.display()))?;
    if !existing.is_empty() && !existing.ends_with('\n') {
        writeln!(file)?;
    }
    for word in &fresh {
        writeln!(file, "{}", word)?;
    }

    Ok(fresh.len())
}
