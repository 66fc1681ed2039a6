//! db-sampler CLI - copy a referentially-consistent database sample.

use clap::{Parser, Subcommand};
use db_sampler::config::TableOrder;
use db_sampler::{drivers, plan_set, Config, Migrator, RunResult, SamplerError, SamplerRegistry};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "db-sampler")]
#[command(about = "Copy a referentially-consistent sample of a relational database")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample the selected sets into the destination
    Run {
        /// Set to run (repeatable; default: every set)
        #[arg(long = "set", value_name = "NAME")]
        sets: Vec<String>,

        /// Fail tables whose referenced values were never remembered
        #[arg(long)]
        strict_references: bool,

        /// Override table order: dependency or declared
        #[arg(long, value_name = "ORDER")]
        table_order: Option<String>,

        /// Override the writer batch size
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Show table order and samplers without connecting
    Plan {
        /// Set to plan (repeatable; default: every set)
        #[arg(long = "set", value_name = "NAME")]
        sets: Vec<String>,
    },

    /// Test database connections
    HealthCheck,
}

/// Outcome of the `health-check` command.
#[derive(Debug, Serialize)]
struct HealthCheckResult {
    source_connected: bool,
    source_latency_ms: u64,
    source_error: Option<String>,
    destination_connected: bool,
    destination_latency_ms: u64,
    destination_error: Option<String>,
    dialects_match: bool,
    healthy: bool,
}

#[derive(Serialize)]
struct PlannedSet<'a> {
    set: &'a str,
    config_hash: &'a str,
    tables: Vec<db_sampler::PlannedTable>,
    views: &'a [String],
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), SamplerError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(SamplerError::Config)?;

    let mut config = load_config(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            sets,
            strict_references,
            table_order,
            batch_size,
        } => {
            // Apply overrides
            if strict_references {
                config.migration.strict_references = true;
            }
            if let Some(order) = table_order {
                config.migration.table_order = TableOrder::parse(&order)?;
            }
            if let Some(size) = batch_size {
                config.migration.batch_size = size;
            }
            config.validate(&SamplerRegistry::with_builtins())?;

            let selected = config.select_sets(&sets)?;
            let (source, destination) = drivers::connect(
                &config.source,
                &config.destination,
                config.migration.max_connections,
            )
            .await?;
            let migrator = Migrator::new(source, destination, config.migration.clone())
                .with_config_hash(config.hash()?);

            let mut results = Vec::with_capacity(selected.len());
            for set in selected {
                let result = migrator.execute(set).await?;
                if !cli.output_json {
                    print_summary(&result);
                }
                results.push(result);
            }

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            }
        }

        Commands::Plan { sets } => {
            let registry = SamplerRegistry::with_builtins();
            let config_hash = config.hash()?;
            let mut plans = Vec::new();
            for set in config.select_sets(&sets)? {
                plans.push(PlannedSet {
                    set: &set.name,
                    config_hash: &config_hash,
                    tables: plan_set(set, &config.migration, &registry)?,
                    views: &set.views,
                });
            }

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&plans)?);
            } else {
                for plan in &plans {
                    println!("Set '{}':", plan.set);
                    for (i, table) in plan.tables.iter().enumerate() {
                        println!("  {}. {} ({})", i + 1, table.table, table.sampler);
                    }
                    for view in plan.views {
                        println!("  view {}", view);
                    }
                }
            }
        }

        Commands::HealthCheck => {
            let result = health_check(&config).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source ({}): {} ({}ms)",
                    config.source.r#type,
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Destination ({}): {} ({}ms)",
                    config.destination.r#type,
                    if result.destination_connected { "OK" } else { "FAILED" },
                    result.destination_latency_ms
                );
                if let Some(ref err) = result.destination_error {
                    println!("    Error: {}", err);
                }
                if result.source_connected && result.destination_connected && !result.dialects_match {
                    println!("  Dialects differ");
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(SamplerError::Config("Health check failed".to_string()));
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<Config, SamplerError> {
    if !path.exists() {
        return Err(SamplerError::Config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }
    Config::load(path)
}

fn print_summary(result: &RunResult) {
    println!("\nSet '{}' completed!", result.set);
    println!("  Run ID: {}", result.run_id);
    if let Some(ref hash) = result.config_hash {
        println!("  Config hash: {}", hash);
    }
    println!("  Duration: {:.2}s", result.duration_seconds);
    for table in &result.tables {
        println!("  {} ({}): {} rows", table.table, table.sampler, table.rows);
    }
    println!("  Rows: {}", result.rows_total);
    if !result.views.is_empty() {
        println!("  Views: {}", result.views.join(", "));
    }
    for failure in &result.trigger_failures {
        println!("  Triggers not applied on {}: {}", failure.table, failure.error);
    }
}

async fn health_check(config: &Config) -> HealthCheckResult {
    let max_conns = 1;

    let start = Instant::now();
    let source = drivers::connect_source(&config.source, max_conns).await;
    let source_latency_ms = start.elapsed().as_millis() as u64;

    let start = Instant::now();
    let destination = drivers::connect_destination(&config.destination, max_conns).await;
    let destination_latency_ms = start.elapsed().as_millis() as u64;

    let dialects_match = match (&source, &destination) {
        (Ok(s), Ok(d)) => s.dialect() == d.dialect(),
        _ => false,
    };
    let source_connected = source.is_ok();
    let destination_connected = destination.is_ok();

    HealthCheckResult {
        source_connected,
        source_latency_ms,
        source_error: source.err().map(|e| e.to_string()),
        destination_connected,
        destination_latency_ms,
        destination_error: destination.err().map(|e| e.to_string()),
        dialects_match,
        healthy: source_connected && destination_connected && dialects_match,
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("Invalid verbosity '{}'. Valid values: debug, info, warn, error", other)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("Invalid log format '{}'. Valid values: text, json", other)),
    }

    Ok(())
}
