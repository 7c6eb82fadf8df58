//! cqt: compile command trees to T-SQL
//!
//! # Usage
//!
//! ```bash
//! # Compile one tree
//! cqt query.json
//!
//! # Target an older server
//! cqt query.json --dialect sql2005
//!
//! # A file holding an array of same-table modification trees
//! cqt updates.json --batch --rows-affected RowsAffected
//! ```

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use cqt::prelude::*;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cqt")]
#[command(version)]
#[command(about = "Compile command trees to T-SQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    cqt query.json
    cqt query.json --dialect sql2000
    cqt batch.json --batch --rows-affected RowsAffected --json")]
struct Cli {
    /// JSON command tree file, or '-' for stdin
    input: Option<PathBuf>,

    /// Target server version (sql2000, sql2005, sql2008, sql2012)
    #[arg(short, long, env = "CQT_DIALECT")]
    dialect: Option<Dialect>,

    /// Input is an array of modification trees compiled into one command
    #[arg(short, long)]
    batch: bool,

    /// Output parameter receiving the affected row count
    #[arg(long)]
    rows_affected: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "sql")]
    format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, conflicts_with = "format")]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Sql,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported dialects
    Dialects,
    /// Show the effective configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Some(Commands::Dialects) => {
            show_dialects();
            Ok(())
        }
        Some(Commands::Config) => show_config(&cli),
        None => match &cli.input {
            Some(input) => compile_file(input, &cli),
            None => {
                println!("{}", "cqt: command trees to T-SQL".cyan().bold());
                println!();
                println!("Usage: cqt <TREE.json> [OPTIONS]");
                println!();
                println!("Try: cqt --help");
                Ok(())
            }
        },
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// File config, overridden by flags.
fn effective_config(cli: &Cli) -> Result<CompilerConfig> {
    let mut config = CompilerConfig::load().context("loading cqt.toml")?;
    if let Some(dialect) = cli.dialect {
        config.dialect = dialect;
    }
    if let Some(name) = &cli.rows_affected {
        config.rows_affected_parameter = Some(name.clone());
    }
    Ok(config)
}

fn read_input(input: &Path) -> Result<String> {
    if input.as_os_str() == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("reading stdin")?;
        return Ok(content);
    }
    fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))
}

fn compile_file(input: &Path, cli: &Cli) -> Result<()> {
    let config = effective_config(cli)?;
    let options = config.to_options();
    let content = read_input(input)?;

    if cli.verbose {
        println!("{} {}", "Input:".dimmed(), input.display().to_string().yellow());
        println!("{} {}", "Dialect:".dimmed(), options.dialect.to_string().yellow());
    }

    let compiled = if cli.batch {
        let trees: Vec<CommandTree> =
            serde_json::from_str(&content).context("parsing command tree array")?;
        debug!(trees = trees.len(), "compiling batch");
        compile_batch(&trees, &options)?
    } else {
        let tree: CommandTree = serde_json::from_str(&content).context("parsing command tree")?;
        compile(&tree, &options)?
    };

    let format = if cli.json { OutputFormat::Json } else { cli.format.clone() };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&compiled)?),
        OutputFormat::Sql => print_command(&compiled),
    }
    Ok(())
}

fn print_command(compiled: &CompiledCommand) {
    let heading = match compiled.command_type {
        CommandType::Text => "Generated SQL:",
        CommandType::StoredProcedure => "Stored procedure:",
    };
    println!("{}", heading.green().bold());
    println!("{}", compiled.sql.white());

    if !compiled.parameters.is_empty() {
        println!();
        println!("{}", "Parameters:".cyan());
        for p in &compiled.parameters {
            let direction = match p.direction {
                ParameterDirection::Input => "",
                ParameterDirection::Output => " output",
            };
            let store_type = p.store_type.as_deref().unwrap_or("?");
            let ansi = if compiled.non_unicode_parameters.contains(p.name.trim_start_matches('@')) {
                " (non-unicode)".dimmed().to_string()
            } else {
                String::new()
            };
            match &p.value {
                Some(value) => println!(
                    "  {} {}{} = {}{}",
                    p.name.yellow(),
                    store_type,
                    direction,
                    value,
                    ansi
                ),
                None => println!("  {} {}{}{}", p.name.yellow(), store_type, direction, ansi),
            }
        }
    }
}

fn show_dialects() {
    println!("{}", "Dialects:".cyan().bold());
    for dialect in [Dialect::Sql2000, Dialect::Sql2005, Dialect::Sql2008, Dialect::Sql2012] {
        let mut notes = Vec::new();
        if dialect.is_legacy() {
            notes.push("EXCEPT/INTERSECT/SKIP rewritten, no APPLY");
        }
        if dialect.supports_offset_fetch() {
            notes.push("OFFSET/FETCH paging");
        } else if !dialect.is_legacy() {
            notes.push("row_number() paging");
        }
        if dialect.is_pre_2008() {
            notes.push("no datetime2/time/spatial");
        }
        let default = if dialect == Dialect::default() { " (default)" } else { "" };
        println!("  {}{}  {}", dialect.name().yellow(), default, notes.join(", ").dimmed());
    }
}

fn show_config(cli: &Cli) -> Result<()> {
    let config = effective_config(cli)?;
    let found = CompilerConfig::search_paths().into_iter().find(|p| p.exists());
    match found {
        Some(path) => println!("{} {}", "Loaded:".dimmed(), path.display()),
        None => println!("{}", "No cqt.toml found, using defaults".dimmed()),
    }
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
