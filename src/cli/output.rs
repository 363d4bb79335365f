use crate::diagnostics::Diagnostic;
use crate::Range;
use colored::*;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::check::{FileReport, Finding};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonDiagnostic<'a> {
    file: String,
    word: &'a str,
    message: String,
    range: Range,
    severity: crate::Severity,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    suggestions: Vec<String>,
}

#[derive(Debug, Serialize)]
struct JsonOutput<'a> {
    files_checked: usize,
    total_errors: usize,
    skipped: Vec<JsonSkipped<'a>>,
    errors: Vec<JsonDiagnostic<'a>>,
}

#[derive(Debug, Serialize)]
struct JsonSkipped<'a> {
    file: String,
    reason: &'a str,
}

/// Print every report followed by a summary (text) or one JSON document.
pub fn print_report(reports: &[FileReport], colored_output: bool, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            for report in reports {
                print_findings(report, colored_output);
            }
            let total = reports.iter().map(|r| r.findings.len()).sum();
            print_check_summary(total, reports.len(), colored_output);
        }
        OutputFormat::Json => match render_json(reports) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!("failed to render JSON: {}", e),
        },
    }
}

pub fn render_json(reports: &[FileReport]) -> serde_json::Result<String> {
    let errors = reports
        .iter()
        .flat_map(|report| {
            report.findings.iter().map(|finding| {
                let diagnostic = Diagnostic::from(&finding.record);
                JsonDiagnostic {
                    file: report.path.display().to_string(),
                    word: &finding.record.word,
                    message: diagnostic.message,
                    range: diagnostic.range,
                    severity: diagnostic.severity,
                    suggestions: finding.suggestions.clone(),
                }
            })
        })
        .collect::<Vec<_>>();

    let skipped = reports
        .iter()
        .filter_map(|report| {
            report.skipped.as_deref().map(|reason| JsonSkipped {
                file: report.path.display().to_string(),
                reason,
            })
        })
        .collect();

    serde_json::to_string_pretty(&JsonOutput {
        files_checked: reports.len(),
        total_errors: errors.len(),
        skipped,
        errors,
    })
}

/// Print the misspellings of one file, nothing if there are none.
pub fn print_findings(report: &FileReport, colored_output: bool) {
    if report.findings.is_empty() {
        return;
    }

    let file_name = report.path.display().to_string();

    if colored_output {
        println!("\n{}", file_name.bold().underline());
    } else {
        println!("\n{}", file_name);
    }

    for finding in &report.findings {
        println!("{}", format_finding(finding, colored_output));
        if let Some(line) = format_suggestions(&finding.suggestions, colored_output) {
            println!("{}", line);
        }
    }
}

fn format_finding(finding: &Finding, colored: bool) -> String {
    let word = &finding.record.word;
    let position = finding.record.range.start.to_string();
    let context = finding.context.trim();

    if colored {
        format!(
            "  {} {} {}",
            position.blue().bold(),
            word.red().bold(),
            format_context(context, word, colored)
        )
    } else {
        format!("  {} {} {}", position, word, context)
    }
}

fn format_suggestions(suggestions: &[String], colored: bool) -> Option<String> {
    if suggestions.is_empty() {
        return None;
    }
    let line = if colored {
        let list = suggestions
            .iter()
            .map(|s| s.green().to_string())
            .collect::<Vec<_>>()
            .join(&", ".dimmed().to_string());
        format!("    {} {}", "→".dimmed(), list)
    } else {
        format!("    → {}", suggestions.join(", "))
    };
    Some(line)
}

fn format_context(context: &str, word: &str, colored: bool) -> String {
    if colored {
        context.replace(word, &word.red().bold().to_string())
    } else {
        context.to_string()
    }
}

pub fn print_check_summary(total_errors: usize, files_checked: usize, colored: bool) {
    let file_word = if files_checked == 1 { "file" } else { "files" };
    println!();
    if total_errors == 0 {
        if colored {
            println!(
                "{} ({} {} checked)",
                "✓ No spelling errors found!".green().bold(),
                files_checked,
                file_word
            );
        } else {
            println!("✓ No spelling errors found! ({} {} checked)", files_checked, file_word);
        }
    } else {
        let error_word = if total_errors == 1 { "error" } else { "errors" };
        if colored {
            println!(
                "{} {} {} found in {} {}",
                "✗".red().bold(),
                total_errors.to_string().red().bold(),
                error_word,
                files_checked,
                file_word
            );
        } else {
            println!(
                "✗ {} {} found in {} {}",
                total_errors, error_word, files_checked, file_word
            );
        }
    }
}

/// One line per watch report.
pub fn print_watch_update(report: &FileReport, colored: bool) {
    let count = report.findings.len();
    let summary = format!(
        "{}: {} {}",
        report.path.display(),
        count,
        if count == 1 { "misspelling" } else { "misspellings" }
    );
    if colored {
        let summary = if count == 0 { summary.green() } else { summary.yellow() };
        println!("{}", summary.bold());
    } else {
        println!("{}", summary);
    }
    for finding in &report.findings {
        println!("{}", format_finding(finding, colored));
    }
}
