//! tree-sync CLI - incremental tree inventory synchronization.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tree_sync::{Config, Operation, Orchestrator, SyncError, SyncPlan, SyncReport};

#[derive(Parser)]
#[command(name = "tree-sync")]
#[command(about = "Incremental synchronization of a tree inventory into PostgreSQL")]
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

#[derive(Args)]
struct SyncOverrides {
    /// Override the original (durable) table
    #[arg(long)]
    original_table: Option<String>,

    /// Override the staging table
    #[arg(long)]
    staging_table: Option<String>,

    /// Override number of workers
    #[arg(long)]
    workers: Option<usize>,

    /// Run every operation as one full-table pass
    #[arg(long)]
    no_partitioning: bool,
}

impl SyncOverrides {
    fn apply(self, config: &mut Config) -> Result<(), SyncError> {
        if let Some(table) = self.original_table {
            config.sync.original_table = table;
        }
        if let Some(table) = self.staging_table {
            config.sync.staging_table = table;
        }
        if let Some(w) = self.workers {
            config.sync.workers = Some(w);
        }
        if self.no_partitioning {
            config.sync.partitioning.enabled = false;
        }
        config.validate()
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize the staging table into the original table
    Run {
        #[command(flatten)]
        overrides: SyncOverrides,
    },

    /// Print every statement a run would execute, without connecting
    Plan {
        #[command(flatten)]
        overrides: SyncOverrides,
    },

    /// Create the original table if it does not exist
    EnsureSchema,

    /// Test the database connection and staging table
    HealthCheck,
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

async fn run() -> Result<(), SyncError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(SyncError::Config)?;

    let mut config = Config::load(&cli.config)?
        .with_env_overrides()?
        .with_auto_tuning();
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run { overrides } => {
            overrides.apply(&mut config)?;

            let orchestrator = Orchestrator::new(config).await?;
            let report = orchestrator.run().await;
            orchestrator.close();
            let report = report?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                print_report(&report);
            }

            if !report.is_complete() {
                let failed = report
                    .operations
                    .iter()
                    .flat_map(|s| {
                        s.failed_partitions
                            .iter()
                            .map(move |p| format!("{} {}", s.operation, p))
                    })
                    .collect();
                return Err(SyncError::PartitionsFailed {
                    operation: "sync".to_string(),
                    partitions: failed,
                });
            }
        }

        Commands::Plan { overrides } => {
            overrides.apply(&mut config)?;
            let plan = SyncPlan::from_config(&config)?;
            if cli.output_json {
                println!("{}", plan.to_json()?);
            } else {
                print!("{}", plan);
            }
        }

        Commands::EnsureSchema => {
            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.ensure_schema().await;
            orchestrator.close();
            result?;
            println!("Schema is in place");
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::connect_lazy(config)?;
            let result = orchestrator.health_check().await;
            orchestrator.close();

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Target ({}): {} ({}ms)",
                    result.target,
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                match result.staging_rows {
                    Some(rows) => println!("  Staging table: {} rows", rows),
                    None => println!("  Staging table: not available"),
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(SyncError::Unhealthy(
                    result
                        .target_error
                        .unwrap_or_else(|| format!("{} is not healthy", result.target)),
                ));
            }
        }
    }

    Ok(())
}

fn print_report(report: &SyncReport) {
    let status_msg = if report.is_complete() {
        "Sync completed!"
    } else {
        "Sync completed with failed partitions!"
    };
    println!("\n{}", status_msg);
    println!("  Run ID: {}", report.run_id);
    println!("  Duration: {:.2}s", report.duration_seconds);
    println!(
        "  Tables: {} -> {} ({} staging rows)",
        report.staging_table, report.original_table, report.staging_rows
    );
    for op in Operation::SEQUENCE {
        if let Some(summary) = report.summary(op) {
            println!(
                "  {}: {} ({}/{} partitions)",
                op.label(),
                summary.rows,
                summary.partitions_total - summary.partitions_failed,
                summary.partitions_total
            );
            for (partition, reason) in summary
                .failed_partitions
                .iter()
                .zip(&summary.failure_reasons)
            {
                println!("    failed {}: {}", partition, reason);
            }
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("Invalid verbosity '{}'", other)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("Invalid log format '{}'", other)),
    }

    Ok(())
}
