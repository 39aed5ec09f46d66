use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use signal_hook::consts::signal::{SIGINT, SIGTERM};

use nadi_config::{CONFIG_FILE, IdlePolicy, ShipperConfig, load_config};
use nadi_core::probe::{self, ProbeReport};
use nadi_core::{RunSummary, Shipment, ShutdownSignal};
use nadi_tracker::{DeliveryStore, FileStore};
use nadi_transport::HttpTransport;
use nadi_types::Reporter;

#[derive(Parser, Debug)]
#[command(name = "nadi", version)]
#[command(about = "Store-and-forward shipper for JSON documents")]
struct Cli {
    /// Path to the configuration file (YAML, or TOML with a .toml extension)
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ship every pending document in the storage directory.
    Record {
        /// Make exactly one pass and exit.
        #[arg(long, conflicts_with = "watch")]
        once: bool,

        /// Keep polling the directory until interrupted.
        #[arg(long)]
        watch: bool,
    },
    /// Check the configured credentials against the API.
    Verify,
    /// Check that the API is reachable.
    Test,
    /// Print the delivery tracker.
    Status,
}

struct CliReporter;

impl Reporter for CliReporter {
    fn info(&mut self, msg: &str) {
        eprintln!("[info] {msg}");
    }

    fn warn(&mut self, msg: &str) {
        eprintln!("[warn] {msg}");
    }

    fn error(&mut self, msg: &str) {
        eprintln!("[error] {msg}");
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let mut reporter = CliReporter;

    match cli.cmd {
        Commands::Record { once, watch } => {
            let summary = run_record(&config, once, watch, &mut reporter)?;
            print_summary(&summary);
            if summary.unsaved > 0 {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Commands::Verify => {
            let transport = HttpTransport::from_config(&config)?;
            let report = probe::verify(&transport, &mut reporter);
            Ok(print_probe(&report, "API verification"))
        }
        Commands::Test => {
            let transport = HttpTransport::from_config(&config)?;
            let report = probe::probe(&transport, &mut reporter);
            Ok(print_probe(&report, "Connection to Nadi"))
        }
        Commands::Status => {
            run_status(&config.tracker_file)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_record(
    config: &ShipperConfig,
    once: bool,
    watch: bool,
    reporter: &mut dyn Reporter,
) -> Result<RunSummary> {
    let shutdown = ShutdownSignal::new();
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, shutdown.flag())
            .with_context(|| format!("failed to install handler for signal {signal}"))?;
    }

    let transport = HttpTransport::from_config(config)?;
    let store = FileStore::new(&config.tracker_file);
    let shipment = Shipment::new(config, &transport, &store);

    reporter.info(&format!(
        "shipping {} to {}",
        config.storage.display(),
        config.endpoint
    ));

    if once {
        shipment.run_once(&shutdown, reporter)
    } else if watch {
        shipment.run_forever(&shutdown, reporter)
    } else {
        match config.idle {
            IdlePolicy::Exit => shipment.run_until_idle(&shutdown, reporter),
            IdlePolicy::Poll => shipment.run_forever(&shutdown, reporter),
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "passes: {}, sent: {}, failed: {}, retrying: {}",
        summary.passes, summary.sent, summary.failed, summary.retrying
    );
    if summary.unsaved > 0 {
        println!("tracker not saved after {} pass(es)", summary.unsaved);
    }
    if summary.interrupted {
        println!("stopped by shutdown request");
    }
}

fn print_probe(report: &ProbeReport, what: &str) -> ExitCode {
    if report.ok {
        println!("{what} successful.");
        ExitCode::SUCCESS
    } else {
        let message = report.message.as_deref().unwrap_or("unknown error");
        println!("{what} failed: {message}");
        ExitCode::FAILURE
    }
}

fn run_status(tracker_file: &Path) -> Result<()> {
    let set = FileStore::new(tracker_file).load()?;

    for (name, rec) in set.iter() {
        println!("{name}: {} (tries={})", rec.status, rec.tries);
    }

    let counts = set.counts();
    println!(
        "{} file(s): {} pending, {} sent, {} failed",
        set.len(),
        counts.pending,
        counts.sent,
        counts.failed
    );

    Ok(())
}
