mod dump;
mod order;

use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sql-backup")]
#[command(version)]
#[command(
    about = "Back up a SQLite or DuckDB database as a dependency-ordered SQL script",
    long_about = None
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write CREATE and INSERT statements for a database to a .sql file
    Dump {
        /// Source database (.db, .sqlite, .sqlite3 or .duckdb)
        source: PathBuf,

        /// Output SQL file (.sql), replaced atomically on success
        output: PathBuf,

        /// Only dump tables matching these patterns (comma-separated, % and _ wildcards)
        #[arg(short, long)]
        tables: Option<String>,

        /// Skip tables matching these patterns (comma-separated)
        #[arg(short, long)]
        exclude: Option<String>,

        /// Use CREATE TABLE IF NOT EXISTS instead of dropping existing tables
        #[arg(long)]
        soft: bool,

        /// Write each CREATE TABLE on a single line
        #[arg(long)]
        compact: bool,

        /// Table ordering: topological (default) or pairwise
        #[arg(long)]
        ordering: Option<String>,

        /// Append tables in foreign-key cycles instead of failing
        #[arg(long)]
        allow_cycles: bool,

        /// Quote character for string values: single (default) or double
        #[arg(long)]
        quote: Option<String>,

        /// Only write CREATE statements
        #[arg(long, conflicts_with = "data_only")]
        schema_only: bool,

        /// Only write INSERT statements
        #[arg(long, conflicts_with = "schema_only")]
        data_only: bool,

        /// YAML config file with dump options
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Show progress while dumping table data
        #[arg(short, long)]
        progress: bool,

        /// Show the tables and their order without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Print tables in the order they would be created
    Order {
        /// Source database (.db, .sqlite, .sqlite3 or .duckdb)
        source: PathBuf,

        /// Table ordering: topological (default) or pairwise
        #[arg(long)]
        ordering: Option<String>,

        /// Output the order and dependencies as JSON
        #[arg(long)]
        json: bool,

        /// Only verify that an order exists; fails on foreign-key cycles
        #[arg(long)]
        check: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Dump {
            source,
            output,
            tables,
            exclude,
            soft,
            compact,
            ordering,
            allow_cycles,
            quote,
            schema_only,
            data_only,
            config,
            progress,
            dry_run,
        } => dump::run(dump::DumpArgs {
            source,
            output,
            tables,
            exclude,
            soft,
            compact,
            ordering,
            allow_cycles,
            quote,
            schema_only,
            data_only,
            config,
            progress,
            dry_run,
        }),
        Commands::Order {
            source,
            ordering,
            json,
            check,
        } => order::run(source, ordering, json, check),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "sql-backup", &mut io::stdout());
            Ok(())
        }
    }
}
