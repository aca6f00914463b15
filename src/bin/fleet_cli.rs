//! Fleet expiry command line
//!
//! # Usage
//!
//! ```bash
//! # Weekly batch: merge the ERP export into the master registry
//! fleet_cli run --config config/fleet.yaml --weekly vencimientos_erp.csv
//!
//! # Preview without writing anything
//! fleet_cli run --dry-run --now 2024-03-01
//!
//! # Current alert list as JSON
//! fleet_cli --format json classify
//!
//! # Record that reminders were sent
//! fleet_cli ack 1234ABC 9999XYZ
//!
//! # WhatsApp links for pending reminders
//! fleet_cli links
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use fleet_expiry::alerts::AckOutcome;
use fleet_expiry::normalizer::dates;
use fleet_expiry::outbound::{AlertReport, MailSender, NullMailer, OutboxMailer};
use fleet_expiry::run::{self, RunOptions, RunSummary};
use fleet_expiry::{FleetConfig, Urgency};

#[derive(Parser)]
#[command(name = "fleet_cli")]
#[command(version)]
#[command(about = "Vehicle document expiry reconciliation and alerts")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file (defaults apply when omitted)
    #[arg(long, short, global = true, env = "FLEET_CONFIG")]
    config: Option<PathBuf>,

    /// Master registry CSV, overrides paths.registry
    #[arg(long, global = true, env = "FLEET_REGISTRY")]
    registry: Option<PathBuf>,

    /// Reference time (RFC 3339 or a date), defaults to now
    #[arg(long, global = true)]
    now: Option<String>,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "text", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the weekly export into the registry and send the digest
    Run {
        /// Weekly ERP export CSV, overrides paths.weekly
        #[arg(long, env = "FLEET_WEEKLY")]
        weekly: Option<PathBuf>,

        /// Acknowledgement JSON from the UI host, overrides paths.acknowledgements
        #[arg(long)]
        acks: Option<PathBuf>,

        /// Compute and print, write nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// Classify the current registry
    Classify,

    /// Mark keys as notified now
    Ack {
        /// Vehicle keys (any spacing or case)
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// WhatsApp links for expired and urgent alerts
    Links,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli) -> Result<()> {
    let mut config = FleetConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(registry) = &cli.registry {
        config.paths.registry = registry.clone();
    }
    let now = parse_now(cli.now.as_deref())?;

    match &cli.command {
        Commands::Run {
            weekly,
            acks,
            dry_run,
        } => {
            if let Some(weekly) = weekly {
                config.paths.weekly = weekly.clone();
            }
            if let Some(acks) = acks {
                config.paths.acknowledgements = acks.clone();
            }
            cmd_run(&config, now, *dry_run, cli.format)
        }
        Commands::Classify => cmd_classify(&config, now, cli.format),
        Commands::Ack { keys } => cmd_ack(&config, keys, now, cli.format),
        Commands::Links => cmd_links(&config, now, cli.format),
    }
}

fn parse_now(raw: Option<&str>) -> Result<DateTime<Utc>> {
    match raw {
        None => Ok(Utc::now()),
        Some(raw) => dates::parse_timestamp(raw)
            .ok_or_else(|| anyhow!("--now: cannot parse {:?} as a date or timestamp", raw)),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

fn cmd_run(
    config: &FleetConfig,
    now: DateTime<Utc>,
    dry_run: bool,
    format: OutputFormat,
) -> Result<()> {
    let options = RunOptions { now, dry_run };
    let outbox = OutboxMailer::new(&config.mail.outbox_dir);
    let mailer: &dyn MailSender = if dry_run { &NullMailer } else { &outbox };

    let summary = run::run_batch(config, &options, mailer)?;
    match format {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Text => {
            print_run_summary(&summary, dry_run);
            Ok(())
        }
    }
}

fn print_run_summary(summary: &RunSummary, dry_run: bool) {
    let changes = &summary.changes;
    let status = if dry_run {
        "DRY RUN".yellow()
    } else {
        "SAVED".green()
    };
    println!(
        "{} {} new, {} updated, {} unchanged",
        status,
        changes.new.len(),
        changes.updated.len(),
        changes.unchanged
    );
    for entry in &changes.new {
        println!("  {} {}", "+".green(), entry.key);
    }
    for change in &changes.updated {
        println!("  {} {}", "~".yellow(), change.key);
    }
    for (label, stats) in [
        ("registry", &summary.registry_stats),
        ("weekly", &summary.weekly_stats),
    ] {
        if stats.has_warnings() {
            println!(
                "  {} {}: {} unparsable dates, {} blank keys",
                "warning".yellow(),
                label,
                stats.unparsable_dates,
                stats.blank_keys
            );
        }
    }
    print_ack_outcome(&summary.acknowledgements);
    if !dry_run && !summary.mail_sent {
        println!("  {} digest mail was not queued", "warning".yellow());
    }
    println!();
    print_alerts(&summary.alerts);
}

fn print_ack_outcome(outcome: &AckOutcome) {
    if !outcome.applied.is_empty() {
        println!("  {} acknowledged: {}", "OK".green(), outcome.applied.join(", "));
    }
    if !outcome.stale.is_empty() {
        println!("  already acknowledged: {}", outcome.stale.join(", "));
    }
    if !outcome.unknown_keys.is_empty() {
        println!(
            "  {} unknown keys: {}",
            "warning".yellow(),
            outcome.unknown_keys.join(", ")
        );
    }
}

fn print_alerts(report: &AlertReport) {
    for line in report.render_text().lines() {
        let colored = match line.split_whitespace().next() {
            Some(word) if word == Urgency::Expired.as_str() => line.red().bold(),
            Some(word) if word == Urgency::Urgent.as_str() => line.red(),
            Some(word) if word == Urgency::Upcoming.as_str() => line.yellow(),
            Some(word) if word == Urgency::Acknowledged.as_str() => line.dimmed(),
            _ => line.normal(),
        };
        println!("{}", colored);
    }
}

fn cmd_classify(config: &FleetConfig, now: DateTime<Utc>, format: OutputFormat) -> Result<()> {
    let report = run::classify_registry(config, now)?;
    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            print_alerts(&report);
            Ok(())
        }
    }
}

fn cmd_ack(
    config: &FleetConfig,
    keys: &[String],
    now: DateTime<Utc>,
    format: OutputFormat,
) -> Result<()> {
    let outcome = run::acknowledge_keys(config, keys, now)?;
    match format {
        OutputFormat::Json => print_json(&outcome),
        OutputFormat::Text => {
            print_ack_outcome(&outcome);
            Ok(())
        }
    }
}

fn cmd_links(config: &FleetConfig, now: DateTime<Utc>, format: OutputFormat) -> Result<()> {
    let links = run::alert_links(config, now)?;
    match format {
        OutputFormat::Json => print_json(&links),
        OutputFormat::Text => {
            if links.is_empty() {
                println!("No reminders pending.");
            }
            for item in &links {
                let record = &item.entry.record;
                match &item.link {
                    Some(link) => println!("{} {}", record.key.bold(), link),
                    None => println!("{} {}", record.key.bold(), "(no usable phone)".dimmed()),
                }
            }
            Ok(())
        }
    }
}
