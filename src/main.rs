use anyhow::{Context, Result};
use clap::{ArgAction, CommandFactory, Parser};
use clap_complete::{generate, Shell};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use spellscan::cli::check::{check_files, collect_files};
use spellscan::cli::output::{self, OutputFormat};
use spellscan::config::Overrides;
use spellscan::parser::Strategy;
use spellscan::{cli, dict, Config, SpellChecker};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "spellscan")]
#[command(version, about = "Spell check the comments and strings of source code", long_about = None)]
struct Cli {
    /// Files or directories to check
    #[arg(value_name = "PATHS")]
    paths: Vec<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Exit with code 0 even if misspellings are found
    #[arg(long)]
    no_fail: bool,

    /// Dictionary to use (e.g., en_US, en_GB)
    #[arg(short, long, global = true)]
    language: Option<String>,

    /// Directory holding <language>.aff and <language>.dic
    #[arg(long, global = true, env = "SPELLSCAN_DICTIONARY_DIR")]
    dictionary_dir: Option<PathBuf>,

    /// Personal dictionary file
    #[arg(long, global = true)]
    personal_dict: Option<PathBuf>,

    /// Add words to personal dictionary
    #[arg(long)]
    add_to_dict: Vec<String>,

    /// How comments and strings are found
    #[arg(long, global = true)]
    strategy: Option<Strategy>,

    /// Show suggestions for each misspelling
    #[arg(short, long, global = true)]
    suggest: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, default_value = "text")]
    format: OutputFormat,

    /// Generate shell completion script
    #[arg(long, value_name = "SHELL")]
    completion: Option<Shell>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Check files, then re-check them whenever they change
    Watch {
        /// Files or directories to watch
        #[arg(value_name = "PATHS", default_value = ".")]
        paths: Vec<PathBuf>,
    },
    /// Dictionary management
    Dict {
        #[command(subcommand)]
        action: DictCommands,
    },
}

#[derive(Parser, Debug)]
enum DictCommands {
    /// List installed dictionaries
    List,
    /// Show dictionary info
    Info {
        /// Language code
        language: String,
    },
    /// Add words to the personal dictionary
    Add {
        #[arg(required = true)]
        words: Vec<String>,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("spellscan={}", level.as_str().to_lowercase()))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Handle shell completion generation
    if let Some(shell) = cli.completion {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "spellscan", &mut io::stdout());
        return Ok(());
    }

    if cli.no_color {
        colored::control::set_override(false);
    }
    let colored_output = !cli.no_color;

    // Load configuration
    let config = Config::load(Overrides {
        language: cli.language.clone(),
        dictionary_dir: cli.dictionary_dir.clone(),
        personal_dictionary: cli.personal_dict.clone(),
        strategy: cli.strategy,
    })?;
    debug!(?config, "configuration loaded");

    if !cli.add_to_dict.is_empty() {
        add_to_personal(&config, &cli.add_to_dict)?;
    }

    // Handle subcommands
    match cli.command {
        Some(Commands::Dict { action }) => return handle_dict(action, &config),
        Some(Commands::Watch { paths }) => {
            let checker = load_checker(&config)?;
            let suggestions = if cli.suggest { config.max_suggestions } else { 0 };
            return cli::watch::run(checker, &paths, config.debounce(), suggestions, colored_output);
        }
        None => {}
    }

    // Validate input paths
    if cli.paths.is_empty() {
        if !cli.add_to_dict.is_empty() {
            return Ok(());
        }
        anyhow::bail!("No files specified. Use --help for usage information.");
    }

    let checker = load_checker(&config)?;
    let files = collect_files(&cli.paths);
    let suggestions = if cli.suggest { config.max_suggestions } else { 0 };
    let reports = check_files(&checker, &files, suggestions)?;

    output::print_report(&reports, colored_output, cli.format);
    checker.dictionary().dispose();

    // Exit with appropriate code
    let total_errors: usize = reports.iter().map(|r| r.findings.len()).sum();
    if total_errors > 0 && !cli.no_fail {
        std::process::exit(1);
    }

    Ok(())
}

fn load_checker(config: &Config) -> Result<SpellChecker> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(80));
    pb.set_message(format!("Loading dictionary {}...", config.language));

    let checker = SpellChecker::new(config);
    pb.finish_and_clear();
    checker.with_context(|| format!("Cannot start without dictionary {}", config.language))
}

fn personal_dict_path(config: &Config) -> Result<PathBuf> {
    config
        .personal_dictionary
        .clone()
        .context("No personal dictionary location available")
}

fn add_to_personal(config: &Config, words: &[String]) -> Result<()> {
    let path = personal_dict_path(config)?;
    let added = dict::manager::add_words(&path, words)?;
    println!(
        "{} Added {} {} to {}",
        "✓".green().bold(),
        added,
        if added == 1 { "word" } else { "words" },
        path.display()
    );
    Ok(())
}

fn dictionary_dir(config: &Config) -> Result<PathBuf> {
    config
        .dictionary_dir()
        .context("Failed to determine the dictionary directory")
}

fn handle_dict(action: DictCommands, config: &Config) -> Result<()> {
    match action {
        DictCommands::List => {
            dict::manager::list_dictionaries(&dictionary_dir(config)?)?;
        }
        DictCommands::Info { language } => {
            dict::manager::show_info(&language, &dictionary_dir(config)?)?;
        }
        DictCommands::Add { words } => {
            add_to_personal(config, &words)?;
        }
    }
    Ok(())
}
