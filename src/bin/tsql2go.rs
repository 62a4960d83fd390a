//! tsql2go — lower T-SQL procedure ASTs into Go
//!
//! Reads procedure ASTs serialized as JSON (one procedure or an array per
//! file) and writes one Go file.
//!
//! # Usage
//!
//! ```bash
//! # Lower to stdout with the default sql backend
//! tsql2go procs/usp_GetOrder.json
//!
//! # gRPC backend, SQL Server placeholders, written to a file
//! tsql2go procs/*.json --backend rpc --dialect sqlserver -o gen/procedures.go
//!
//! # Machine-readable result with warnings
//! tsql2go procs/usp_GetOrder.json --format json
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::*;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use tsql2go::prelude::*;

#[derive(Parser)]
#[command(name = "tsql2go")]
#[command(version)]
#[command(about = "Lower parsed T-SQL stored procedures into Go functions", long_about = None)]
#[command(after_help = "EXAMPLES:
    tsql2go usp_GetOrder.json
    tsql2go procs/*.json --backend rpc -o gen/procedures.go
    tsql2go usp_GetOrder.json --format json")]
struct Cli {
    /// Procedure AST files (JSON)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long, env = "TSQL2GO_CONFIG")]
    config: Option<PathBuf>,

    /// Primary backend: sql, rpc or mock
    #[arg(short, long)]
    backend: Option<BackendKind>,

    /// SQL dialect for query text
    #[arg(short, long)]
    dialect: Option<Dialect>,

    /// Go package clause
    #[arg(short, long)]
    package: Option<String>,

    /// Emit log/slog calls
    #[arg(long)]
    log_hook: bool,

    /// Output file path (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Fail when any warning is reported
    #[arg(long)]
    deny_warnings: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    package: &'a str,
    procedures: &'a [LoweredProcedure],
    source: &'a str,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "tsql2go=debug" } else { "tsql2go=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Explicit path, then `$XDG_CONFIG_HOME/tsql2go/config.toml`, then
/// `./tsql2go.toml`.
fn config_path(cli: &Cli) -> Option<PathBuf> {
    if let Some(path) = &cli.config {
        return Some(path.clone());
    }
    let user = dirs::config_dir().map(|d| d.join("tsql2go").join("config.toml"));
    user.into_iter()
        .chain(std::iter::once(PathBuf::from("tsql2go.toml")))
        .find(|p| p.is_file())
}

fn load_config(cli: &Cli) -> Result<LowerConfig> {
    let mut config = match config_path(cli) {
        Some(path) => {
            if cli.verbose {
                eprintln!("{} {}", "Config:".dimmed(), path.display());
            }
            LowerConfig::load(&path)
                .with_context(|| format!("failed to load config {}", path.display()))?
        }
        None => LowerConfig::default(),
    };
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(dialect) = cli.dialect {
        config.dialect = dialect;
    }
    if let Some(package) = &cli.package {
        config.package = package.clone();
    }
    if cli.log_hook {
        config.log_hook = true;
    }
    config.validate()?;
    Ok(config)
}

/// A file holds one procedure or an array of them.
fn read_procedures(path: &Path) -> Result<Vec<Procedure>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let procedures = if value.is_array() {
        serde_json::from_value(value)
    } else {
        serde_json::from_value(value).map(|p| vec![p])
    };
    procedures.with_context(|| format!("{} is not a procedure AST", path.display()))
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    if cli.verbose {
        eprintln!(
            "{} backend={} dialect={} package={}",
            "Lowering:".dimmed(),
            config.backend.to_string().cyan(),
            config.dialect.to_string().cyan(),
            config.package.cyan()
        );
    }

    let mut lowered = Vec::new();
    for path in &cli.files {
        for procedure in read_procedures(path)? {
            let result = lower_procedure(&procedure, &config)
                .with_context(|| format!("in {}", path.display()))?;
            lowered.push(result);
        }
    }

    let warnings: usize = lowered.iter().map(|p| p.warnings.len()).sum();
    for p in &lowered {
        for w in &p.warnings {
            eprintln!("{} {}: {}", "warning:".yellow().bold(), p.source_name.white(), w);
        }
    }

    let source = render_file(&config.package, &lowered);
    let output = match cli.format {
        OutputFormat::Text => source.clone(),
        OutputFormat::Json => serde_json::to_string_pretty(&JsonReport {
            package: &config.package,
            procedures: &lowered,
            source: &source,
        })?,
    };

    match &cli.output {
        Some(path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "{} Wrote {} procedure(s) to {}",
                "✓".green(),
                lowered.len(),
                path.display().to_string().cyan()
            );
        }
        None => print!("{}", output),
    }

    if cli.deny_warnings && warnings > 0 {
        anyhow::bail!("{} warning(s) reported", warnings);
    }
    Ok(())
}
