use clap::{Parser, Subcommand};
use colored::Colorize;
use qbank::config::Config;
use qbank::error::UsageError;
use qbank::{
    analyze_dataset, analyze_file, compute_stats, discover_sources, load_dataset, merge_files,
    renumber, save_dataset, source_name, AnalysisReport, Strategy,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// qbank - Find near-duplicate exam questions and merge question banks
#[derive(Parser)]
#[command(name = "qbank")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true, default_value = ".qbank.toml")]
    config: PathBuf,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Report duplicates and statistics for a file or a directory of files
    Analyze {
        /// Question file or directory
        path: PathBuf,

        /// Similarity threshold (0.0 to 1.0]
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Grouping strategy: anchor or transitive
        #[arg(short, long)]
        strategy: Option<Strategy>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Merge question files, combining duplicates
    Merge {
        /// Source files, in priority order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output file for the merged dataset
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Similarity threshold (0.0 to 1.0]
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Grouping strategy: anchor or transitive
        #[arg(short, long)]
        strategy: Option<Strategy>,

        /// Print the merge summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show statistics for a question file
    Stats {
        /// Question file
        file: PathBuf,

        /// Similarity threshold (0.0 to 1.0]
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Grouping strategy: anchor or transitive
        #[arg(short, long)]
        strategy: Option<Strategy>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Renumber questions 1..N and rewrite ids as <prefix>_qNNN
    Renumber {
        /// Question file
        file: PathBuf,

        /// Id prefix, e.g. p2
        #[arg(short, long)]
        prefix: Option<String>,

        /// Write here instead of rewriting the file in place
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = Config::load(&cli.config)
        .map_err(|e| -> Box<dyn std::error::Error> { Box::new(e) })
        .and_then(|config| match cli.command {
            Commands::Analyze { path, threshold, strategy, json } => {
                cmd_analyze(&path, threshold, strategy, json, &config)
            }
            Commands::Merge { files, output, threshold, strategy, json } => {
                cmd_merge(&files, output.as_deref(), threshold, strategy, json, cli.quiet, &config)
            }
            Commands::Stats { file, threshold, strategy, json } => {
                cmd_stats(&file, threshold, strategy, json, &config)
            }
            Commands::Renumber { file, prefix, output } => {
                cmd_renumber(&file, prefix, output.as_deref(), cli.quiet, &config)
            }
        });

    if let Err(e) = result {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn cmd_analyze(
    path: &Path,
    threshold: Option<f64>,
    strategy: Option<Strategy>,
    json: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = config.analysis_options(threshold, strategy)?;
    let files = discover_sources(path, &config.sources.include)?;

    let mut reports: Vec<AnalysisReport> = Vec::new();
    for file in &files {
        match analyze_file(file, &options) {
            Ok(report) => reports.push(report),
            Err(e) => warn!(path = %e.path().display(), error = %e, "skipping source"),
        }
    }

    if json {
        if path.is_dir() {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        } else if let Some(report) = reports.first() {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        return Ok(());
    }

    if reports.is_empty() {
        println!("{}", "No question files could be analyzed.".yellow());
        return Ok(());
    }

    for (i, report) in reports.iter().enumerate() {
        if i > 0 {
            println!("\n{}\n", "=".repeat(60));
        }
        print_report(report, config.report.high_frequency_min, config.report.preview_chars);
    }

    Ok(())
}

fn cmd_merge(
    files: &[PathBuf],
    output: Option<&Path>,
    threshold: Option<f64>,
    strategy: Option<Strategy>,
    json: bool,
    quiet: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = output.ok_or(UsageError::MissingOutput)?;
    let options = config.group_options(threshold, strategy)?;
    let start = Instant::now();

    let report = merge_files(files, &options)?;
    save_dataset(&report.dataset, output)?;

    let elapsed = start.elapsed();

    if json {
        let summary = serde_json::json!({
            "output": output.display().to_string(),
            "loaded": report.loaded,
            "skipped": report.skipped,
            "inputQuestions": report.input_questions,
            "outputQuestions": report.dataset.total_questions,
            "duplicateGroups": report.duplicate_groups,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if quiet {
        return Ok(());
    }

    for source in &report.loaded {
        println!(
            "{} Loaded {} questions from {}",
            "✓".green(),
            source.questions.to_string().cyan(),
            source.name
        );
    }
    for source in &report.skipped {
        println!("{} Skipped {}", "✗".red(), source.name.yellow());
    }

    println!();
    println!("{}", "Merge Summary".green().bold());
    println!("  Input questions:   {}", report.input_questions.to_string().cyan());
    println!("  Unique questions:  {}", report.dataset.total_questions.to_string().cyan());
    println!("  Duplicate groups:  {}", report.duplicate_groups.to_string().cyan());
    println!("  Threshold:         {} ({})", options.threshold, options.strategy);
    println!("  Time elapsed:      {:.2?}", elapsed);
    println!();
    println!("{} {}", "Saved to".green(), output.display().to_string().cyan());

    Ok(())
}

fn cmd_stats(
    file: &Path,
    threshold: Option<f64>,
    strategy: Option<Strategy>,
    json: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = config.analysis_options(threshold, strategy)?;

    let dataset = match load_dataset(file) {
        Ok(d) => d,
        Err(e) => {
            warn!(path = %e.path().display(), error = %e, "skipping source");
            return Ok(());
        }
    };

    if json {
        let stats = compute_stats(&dataset, &options);
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let mut report = analyze_dataset(&source_name(file), &dataset, &options);
    report.duplicates.clear();
    print_report(&report, options.high_frequency_min, config.report.preview_chars);

    Ok(())
}

fn cmd_renumber(
    file: &Path,
    prefix: Option<String>,
    output: Option<&Path>,
    quiet: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let prefix = prefix
        .or_else(|| config.renumber.prefix.clone())
        .ok_or(UsageError::EmptyPrefix)?;

    let mut dataset = load_dataset(file)?;
    renumber(&mut dataset, &prefix)?;

    let target = output.unwrap_or(file);
    save_dataset(&dataset, target)?;

    if !quiet {
        println!(
            "{} Renumbered {} questions from 1 to {}",
            "✓".green(),
            dataset.total_questions.to_string().cyan(),
            dataset.total_questions
        );
        println!("{} {}", "Saved to".green(), target.display().to_string().cyan());
    }

    Ok(())
}

fn print_report(report: &AnalysisReport, high_frequency_min: u32, preview_chars: usize) {
    let stats = &report.stats;

    println!("{}", "Question Analysis Report".green().bold());
    println!("{}", "=".repeat(50));
    println!("  File:                 {}", report.file.cyan());
    println!("  Total questions:      {}", stats.total.to_string().cyan());
    println!("  Unique questions:     {}", stats.unique.to_string().cyan());
    println!("  Duplicate groups:     {}", stats.duplicate_groups.to_string().cyan());
    println!(
        "  High frequency (>={}): {}",
        high_frequency_min,
        stats.high_frequency.to_string().cyan()
    );
    println!("  With images:          {}", stats.with_images.to_string().cyan());
    println!("  Exact duplicates:     {}", stats.exact_duplicates.to_string().dimmed());

    if report.duplicates.is_empty() {
        return;
    }

    println!();
    println!("{}", "Duplicate Question Groups".yellow().bold());
    for (i, group) in report.duplicates.iter().enumerate() {
        println!("  Group {} ({} questions):", i + 1, group.len());
        for member in group {
            println!(
                "    {} Q{}: {} {}",
                "-".dimmed(),
                member.number,
                preview(&member.text, preview_chars),
                format!("{}%", (member.similarity * 100.0) as u32).dimmed()
            );
        }
        println!();
    }
}

/// First `max_chars` characters of `text` on one line.
fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut)
}
