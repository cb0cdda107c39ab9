//! Dump command - write a database's schema and data as a SQL script.

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use sql_backup::dump::{validate_paths, DumpConfig, DumpOptions, Dumper, SourceKind};
use sql_backup::render::{QuoteStyle, RenderOptions};
use sql_backup::schema::OrderStrategy;
use sql_backup::source::{DuckDbSource, MetadataSource, SqliteSource, TableFilter, TablePattern};
use sql_backup::writer::OutputFile;
use std::path::PathBuf;
use std::time::Instant;

/// Dump command arguments
pub struct DumpArgs {
    pub source: PathBuf,
    pub output: PathBuf,
    pub tables: Option<String>,
    pub exclude: Option<String>,
    pub soft: bool,
    pub compact: bool,
    pub ordering: Option<String>,
    pub allow_cycles: bool,
    pub quote: Option<String>,
    pub schema_only: bool,
    pub data_only: bool,
    pub config: Option<PathBuf>,
    pub progress: bool,
    pub dry_run: bool,
}

pub fn run(args: DumpArgs) -> Result<()> {
    let kind = validate_paths(&args.source, &args.output)?;

    let config = match args.config {
        Some(ref path) => DumpConfig::load(path)
            .with_context(|| format!("failed to load config file: {}", path.display()))?,
        None => DumpConfig::default(),
    };
    let options = build_options(&args, &config)?;

    match kind {
        SourceKind::Sqlite => {
            let mut source = SqliteSource::open(&args.source).with_context(|| {
                format!("failed to open SQLite database: {}", args.source.display())
            })?;
            if let Some(batch_size) = config.batch_size {
                source = source.with_batch_size(batch_size);
            }
            execute(&source, kind, options, &args)
        }
        SourceKind::DuckDb => {
            let mut source = DuckDbSource::open(&args.source).with_context(|| {
                format!("failed to open DuckDB database: {}", args.source.display())
            })?;
            if let Some(batch_size) = config.batch_size {
                source = source.with_batch_size(batch_size);
            }
            execute(&source, kind, options, &args)
        }
    }
}

/// Merge config file values with command-line flags; flags win
fn build_options(args: &DumpArgs, config: &DumpConfig) -> Result<DumpOptions> {
    let filter = if args.tables.is_some() || args.exclude.is_some() {
        let include = match args.tables {
            Some(ref list) => TableFilter::parse(Some(list.as_str()), None)?
                .include_patterns()
                .to_vec(),
            None => patterns(&config.tables)?,
        };
        let exclude = match args.exclude {
            Some(ref list) => TableFilter::parse(None, Some(list.as_str()))?
                .exclude_patterns()
                .to_vec(),
            None => patterns(&config.exclude)?,
        };
        TableFilter::new(include, exclude)
    } else {
        TableFilter::new(patterns(&config.tables)?, patterns(&config.exclude)?)
    };

    let ordering = match args.ordering {
        Some(ref s) => s
            .parse::<OrderStrategy>()
            .map_err(|e| anyhow::anyhow!(e))?,
        None => config.ordering,
    };

    let quote = match args.quote {
        Some(ref s) => s.parse::<QuoteStyle>().map_err(|e| anyhow::anyhow!(e))?,
        None => config.quote,
    };

    let schema_only = args.schema_only || config.schema_only;
    let data_only = args.data_only || config.data_only;
    if schema_only && data_only {
        bail!("schema_only and data_only cannot both be set");
    }

    Ok(DumpOptions {
        filter,
        render: RenderOptions {
            soft: args.soft || config.soft,
            pretty: config.pretty && !args.compact,
            quote,
        },
        ordering,
        allow_cycles: args.allow_cycles || config.allow_cycles,
        schema_only,
        data_only,
    })
}

fn patterns(list: &[String]) -> Result<Vec<TablePattern>> {
    let patterns = list
        .iter()
        .map(|p| TablePattern::new(p))
        .collect::<sql_backup::Result<Vec<_>>>()?;
    Ok(patterns)
}

fn execute<S: MetadataSource>(
    source: &S,
    kind: SourceKind,
    options: DumpOptions,
    args: &DumpArgs,
) -> Result<()> {
    let dumper = Dumper::new(source, options);

    if args.dry_run {
        let plan = dumper.plan()?;
        eprintln!(
            "Dry run: {} {} tables would be written to {}",
            plan.order.len(),
            kind,
            args.output.display()
        );
        for (i, table) in plan.order.iter().enumerate() {
            eprintln!("  {}. {}", i + 1, table);
        }
        for warning in &plan.warnings {
            eprintln!("Warning: {}", warning);
        }
        return Ok(());
    }

    let start_time = Instant::now();
    let mut output = OutputFile::create(&args.output)
        .with_context(|| format!("failed to create output file: {}", args.output.display()))?;

    let stats = if args.progress {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} tables {msg}",
            )
            .unwrap()
            .progress_chars("█▓▒░  ")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        let pb_clone = pb.clone();
        let stats = dumper
            .with_progress(move |done, total, table| {
                pb_clone.set_length(total as u64);
                pb_clone.set_position(done as u64);
                pb_clone.set_message(table.to_string());
            })
            .dump(output.writer())?;
        pb.finish_with_message("done");
        stats
    } else {
        dumper.dump(output.writer())?
    };

    let path = output
        .persist()
        .with_context(|| format!("failed to write output file: {}", args.output.display()))?;

    for warning in &stats.warnings {
        eprintln!("Warning: {}", warning);
    }
    if !stats.cyclic_tables.is_empty() {
        eprintln!(
            "Warning: tables in foreign-key cycles were written last: {}",
            stats.cyclic_tables.join(", ")
        );
    }

    eprintln!(
        "Dumped {} tables ({} rows) to {} in {:.2?}",
        stats.tables,
        stats.rows,
        path.display(),
        start_time.elapsed()
    );

    Ok(())
}
