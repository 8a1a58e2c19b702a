//! Bathroom Monitor CLI
//!
//! Overnight motion detection and the morning visit report.

use anyhow::Context;
use bathroom_monitor::{
    collector::{DetectorConfig, MotionDetector, PlatformSensor, StabilizationOutcome},
    config::Config,
    core::{plan_detection, report_window},
    jobs::{detection_limit, format_report_summary, run_detection, run_report},
    notify::{format_time_display, Mailer, SmtpMailer},
    store::EventStore,
    VERSION,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "bathroom-monitor")]
#[command(version = VERSION)]
#[command(about = "Overnight PIR motion monitor with a daily bathroom visit report", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record motion events until the end of the nightly window
    Detect {
        /// Run for this many seconds instead (0 runs until Ctrl+C)
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Detect visits for a night and email the report
    Report {
        /// Night to report on (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Print the report data as JSON
        #[arg(long)]
        json: bool,

        /// Skip sending email
        #[arg(long)]
        no_email: bool,
    },

    /// Show schedule and storage status
    Status,

    /// Show configuration
    Config,
}

fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Detect { duration } => cmd_detect(duration),
        Commands::Report {
            date,
            json,
            no_email,
        } => cmd_report(date, json, no_email),
        Commands::Status => cmd_status(),
        Commands::Config => cmd_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bathroom_monitor=info")),
        )
        .init();
}

fn load_config() -> anyhow::Result<Config> {
    let config = Config::load_with_env().context("failed to load configuration")?;
    config.validate()?;
    Ok(config)
}

fn cmd_detect(duration: Option<u64>) -> anyhow::Result<()> {
    let config = load_config()?;
    config.ensure_directories()?;
    let zone = config.zone()?;
    let plan = plan_detection(&zone, zone.now(), &config.night_window());

    let limit = match duration {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => Some(detection_limit(&plan)),
    };

    println!("Bathroom Monitor v{VERSION}");
    println!("=======================");
    println!();
    println!("Current time: {}", zone.format_default(&plan.now));
    match limit {
        Some(_) if duration.is_none() => println!(
            "Monitoring until {} ({:.1} hours)",
            zone.format_default(&plan.target_end),
            plan.duration_hours()
        ),
        Some(limit) => println!("Monitoring for {} seconds", limit.as_secs()),
        None => println!("Monitoring until stopped"),
    }
    println!("GPIO pin: {}", config.gpio_pin);
    println!("Database: {}", config.database_path.display());
    println!();
    println!("Press Ctrl+C to stop.");
    println!();

    let store = EventStore::open(&config.database_path)
        .context("failed to open event store")?
        .with_zone(zone);

    let keep_running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(keep_running.clone())?;

    let sensor = PlatformSensor::new(config.gpio_pin);
    let mut detector = MotionDetector::new(sensor, DetectorConfig::default());
    let summary = run_detection(&mut detector, &store, limit, &keep_running)?;

    println!();
    if summary.stabilization == StabilizationOutcome::TimedOut {
        println!("Warning: sensor did not settle before detection started.");
    }
    println!(
        "Detection {} after {}s.",
        if summary.interrupted {
            "stopped"
        } else {
            "finished"
        },
        summary.elapsed.as_secs()
    );
    println!("Events saved: {}", summary.events_saved);
    if summary.events_failed > 0 {
        println!("Events lost: {}", summary.events_failed);
    }
    Ok(())
}

fn cmd_report(date: Option<NaiveDate>, json: bool, no_email: bool) -> anyhow::Result<()> {
    let config = load_config()?;
    let zone = config.zone()?;
    let date = date.unwrap_or_else(|| zone.today());

    let mailer = if no_email {
        None
    } else {
        config.validate_email()?;
        if config.email_enabled() {
            Some(SmtpMailer::from_config(&config.smtp).context("failed to configure SMTP")?)
        } else {
            tracing::warn!("no report recipients configured, email disabled");
            None
        }
    };

    let mut store = EventStore::open(&config.database_path)
        .context("failed to open event store")?
        .with_zone(zone);

    let outcome = run_report(
        &config,
        &mut store,
        mailer.as_ref().map(|m| m as &dyn Mailer),
        date,
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.report)?);
        return Ok(());
    }

    println!(
        "Analyzed {} motion events between {} and {}",
        outcome.events_analyzed,
        zone.format_default(&outcome.window.start),
        zone.format_default(&outcome.window.end)
    );
    println!("New visits saved: {}", outcome.visits_saved);
    println!();
    print!("{}", format_report_summary(&outcome.report, &zone));

    if !outcome.deliveries.is_empty() {
        println!();
        for delivery in &outcome.deliveries {
            println!(
                "  {} {}",
                if delivery.delivered { "✓" } else { "✗" },
                delivery.recipient
            );
        }
    }
    Ok(())
}

fn cmd_status() -> anyhow::Result<()> {
    let config = load_config()?;
    let zone = config.zone()?;
    let window = config.night_window();
    let now = zone.now();
    let plan = plan_detection(&zone, now, &window);
    let report = report_window(&zone, zone.today(), &window);

    println!("Bathroom Monitor Status");
    println!("=======================");
    println!();
    println!("Current time: {}", zone.format_default(&now));
    println!(
        "Nightly window: {} - {} ({})",
        format_time_display(window.start),
        format_time_display(window.end),
        if window.contains(now.time()) {
            "active"
        } else {
            "inactive"
        }
    );
    println!(
        "Detection started now would run until {} ({:.1} hours)",
        zone.format_default(&plan.target_end),
        plan.duration_hours()
    );
    println!(
        "Today's report covers {} to {}",
        zone.format_default(&report.start),
        zone.format_default(&report.end)
    );
    println!("Report scheduled at: {}", format_time_display(config.report_time));
    println!();

    if config.database_path.exists() {
        let store = EventStore::open(&config.database_path)?.with_zone(zone);
        println!("Stored motion events: {}", store.count_events()?);
        let visits = store.visits_for_dates(report.date, report.date)?;
        println!("Visits recorded today: {}", visits.len());
    } else {
        println!("No database found at {}", config.database_path.display());
    }

    println!(
        "Email: {}",
        if config.email_enabled() {
            format!("{} recipient(s)", config.smtp.recipients.len())
        } else {
            "disabled (no recipients)".to_string()
        }
    );
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load_with_env().context("failed to load configuration")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config.redacted())?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(keep_running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        keep_running.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")
}
