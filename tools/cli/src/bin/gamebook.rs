use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use gamebook_engine::{
    export_package, import_package, load_story, save_story, CollectSink, CsvStore, Diagnostic,
    LoadResponse, PackageManifest, ProjectConfig, SaveOutcome, Severity, StoryPackage,
};

#[derive(Parser)]
#[command(author, version, about = "Gamebook story-data CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LintFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the CSV tables and print diagnostics.
    Lint {
        /// Directory containing the four CSV tables.
        dir: PathBuf,
        #[arg(long, value_enum, default_value = "table")]
        format: LintFormat,
        /// Fail when the warning count exceeds this cap.
        #[arg(long)]
        max_warnings: Option<usize>,
        /// Treat warnings as errors.
        #[arg(long)]
        strict: bool,
    },
    /// Compile the tables and emit the story-model JSON artifact.
    Build {
        dir: PathBuf,
        #[arg(short, long, default_value = "story.json")]
        output: PathBuf,
        #[arg(long)]
        validate_only: bool,
    },
    /// Package the current tables as a portable story bundle.
    Export {
        dir: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        story_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long, default_value = "v1")]
        version_tag: String,
    },
    /// Verify a story bundle and write its tables into a directory.
    Import {
        package: PathBuf,
        dir: PathBuf,
    },
}

#[derive(Serialize)]
struct LintPayload {
    success: bool,
    #[serde(rename = "errorCount")]
    error_count: usize,
    #[serde(rename = "warningCount")]
    warning_count: usize,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            // Fatal failures (I/O, CSV tokenization, bad bundles) are
            // distinct from content errors and exit 2.
            eprintln!("Fatal: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Lint {
            dir,
            format,
            max_warnings,
            strict,
        } => lint(dir, format, max_warnings, strict),
        Command::Build {
            dir,
            output,
            validate_only,
        } => build(dir, output, validate_only),
        Command::Export {
            dir,
            output,
            story_id,
            title,
            author,
            version_tag,
        } => export(dir, output, story_id, title, author, version_tag),
        Command::Import { package, dir } => import(package, dir),
    }
}

fn load_checked(dir: &PathBuf) -> Result<(LoadResponse, ProjectConfig)> {
    let config = ProjectConfig::load_or_default(dir)
        .with_context(|| format!("loading config from {}", dir.display()))?;
    let store = CsvStore::new(dir.clone());
    let mut sink = CollectSink::default();
    let response = load_story(&store, &config.graph_options(), &mut sink)
        .with_context(|| format!("loading tables from {}", dir.display()))?;
    for message in &sink.messages {
        eprintln!("Warning: {message}");
    }
    Ok((response, config))
}

fn lint(
    dir: PathBuf,
    format: LintFormat,
    max_warnings: Option<usize>,
    strict: bool,
) -> Result<ExitCode> {
    let (response, config) = load_checked(&dir)?;

    let mut errors = response.errors;
    let mut warnings = response.warnings;
    if strict {
        errors.append(&mut warnings);
    }

    let error_count = errors.len();
    let warning_count = warnings.len();
    let warning_cap = max_warnings.or(config.max_warnings);
    let over_warning_limit = warning_cap.is_some_and(|cap| warning_count > cap);
    let success = error_count == 0 && !over_warning_limit;

    match format {
        LintFormat::Json => {
            let payload = LintPayload {
                success,
                error_count,
                warning_count,
                errors,
                warnings,
            };
            println!("{}", serde_json::to_string(&payload)?);
        }
        LintFormat::Table => {
            print_grouped(&errors, "error");
            print_grouped(&warnings, "warning");
            if error_count > 0 || warning_count > 0 {
                println!("\n{error_count} error(s), {warning_count} warning(s)");
            } else {
                println!("No errors or warnings.");
            }
        }
    }

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn print_grouped(diagnostics: &[Diagnostic], label: &str) {
    let mut by_file: BTreeMap<&str, Vec<&Diagnostic>> = BTreeMap::new();
    for diagnostic in diagnostics {
        by_file
            .entry(diagnostic.file.as_deref().unwrap_or("(global)"))
            .or_default()
            .push(diagnostic);
    }
    for (file, group) in by_file {
        println!("\n{file} [{label}]");
        for diagnostic in group {
            let location = diagnostic
                .row
                .map(|row| format!(":{row}"))
                .unwrap_or_default();
            println!("  {}{location}: {}", diagnostic.code, diagnostic.message);
        }
    }
}

fn build(dir: PathBuf, output: PathBuf, validate_only: bool) -> Result<ExitCode> {
    let (response, _) = load_checked(&dir)?;

    for warning in &response.warnings {
        eprintln!("Warning: {}", warning.message);
    }
    for error in &response.errors {
        eprintln!("Error: {}", error.message);
    }
    if !response.errors.is_empty() {
        return Ok(ExitCode::from(1));
    }
    if validate_only {
        println!("Validation complete. No errors.");
        return Ok(ExitCode::SUCCESS);
    }

    let model = response.model;
    fs::write(&output, serde_json::to_string_pretty(&model)?)
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "Wrote {} ({} nodes, {} items, {} enemies, {} encounters)",
        output.display(),
        model.nodes.len(),
        model.items.len(),
        model.enemies.len(),
        model.encounters.len()
    );
    Ok(ExitCode::SUCCESS)
}

fn export(
    dir: PathBuf,
    output: PathBuf,
    story_id: String,
    title: String,
    author: String,
    version_tag: String,
) -> Result<ExitCode> {
    let (response, _) = load_checked(&dir)?;
    if !response.errors.is_empty() {
        for error in &response.errors {
            eprintln!("Error: {}", error.message);
        }
        return Ok(ExitCode::from(1));
    }

    let package = StoryPackage {
        manifest: PackageManifest {
            story_id,
            version: version_tag,
            title,
            author,
            description: None,
            created_at: Some(Utc::now().to_rfc3339()),
        },
        model: response.model,
        assets: Vec::new(),
    };
    let json = export_package(&package)?;
    fs::write(&output, json).with_context(|| format!("writing {}", output.display()))?;
    println!("Exported bundle to {}", output.display());
    Ok(ExitCode::SUCCESS)
}

fn import(package_path: PathBuf, dir: PathBuf) -> Result<ExitCode> {
    let json = fs::read_to_string(&package_path)
        .with_context(|| format!("reading {}", package_path.display()))?;
    let (package, asset_diagnostics) = import_package(&json)?;

    let rejected: Vec<&Diagnostic> = asset_diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .collect();
    if !rejected.is_empty() {
        for diagnostic in rejected {
            eprintln!("Error: {}", diagnostic.message);
        }
        return Ok(ExitCode::from(1));
    }

    let config = ProjectConfig::load_or_default(&dir)?;
    let store = CsvStore::new(dir);
    let outcome = save_story(
        &store,
        &package.model,
        &config.graph_options(),
        Utc::now().timestamp_millis(),
    )?;
    match outcome {
        SaveOutcome::Saved {
            written, backups, ..
        } => {
            println!(
                "Imported \"{}\": wrote {} file(s), {} backup(s)",
                package.manifest.title,
                written.len(),
                backups.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        SaveOutcome::Rejected { errors, .. } => {
            for error in &errors {
                eprintln!("Error: {}", error.message);
            }
            Ok(ExitCode::from(1))
        }
    }
}
