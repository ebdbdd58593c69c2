use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use medscan_lib::api::{start_api_server_on, ApiContext};
use medscan_lib::config::{self, ScanConfig};
use medscan_lib::models::MedicineRecord;
use medscan_lib::pipeline::capture::FileCapture;
use medscan_lib::pipeline::{Presenter, ScanPipeline, ScanSession};

#[derive(Parser)]
#[command(name = "medscan")]
#[command(about = "Identify a medicine from a photo of its package", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API for the web frontend
    Serve {
        /// Listen address (overrides MEDSCAN_BIND)
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// Scan one image file
    Scan {
        /// Photo of the medicine package or label
        file: PathBuf,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// List recently saved scans
    History {
        /// Number of scans to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

/// Prints scan progress and results to the terminal.
struct ConsolePresenter {
    json: bool,
}

impl Presenter for ConsolePresenter {
    fn set_analyzing(&mut self, analyzing: bool) {
        if analyzing {
            eprintln!("Analyzing medicine...");
        }
    }

    fn show_record(&mut self, record: &MedicineRecord) {
        if self.json {
            match serde_json::to_string_pretty(record) {
                Ok(text) => println!("{text}"),
                Err(e) => eprintln!("Failed to encode record: {e}"),
            }
        } else {
            print_record(record);
        }
    }

    fn show_error(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

fn print_record(record: &MedicineRecord) {
    println!("{}", record.name);
    println!("{}", record.description);
    println!();
    println!("Price:        {}", record.price);
    println!("Availability: {}", record.availability);
    println!();
    println!("Ingredients:");
    for item in &record.ingredients {
        println!("  - {item}");
    }
    println!("Precautions:");
    for item in &record.precautions {
        println!("  - {item}");
    }
    if let Some(alternatives) = &record.alternatives {
        println!("Alternatives:");
        for item in alternatives {
            println!("  - {item}");
        }
    }
}

fn main() -> Result<()> {
    medscan_lib::init_tracing();
    let cli = Cli::parse();

    let config = ScanConfig::from_env().context("Invalid configuration")?;
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    // Cooperative single-threaded scheduling: one logical flow per scan.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(run(cli.command, config))
}

async fn run(command: Commands, config: ScanConfig) -> Result<()> {
    let pipeline = ScanPipeline::from_config(&config).context("Failed to build HTTP client")?;

    match command {
        Commands::Serve { bind } => {
            let addr = bind.unwrap_or(config.bind_addr);
            let server = start_api_server_on(ApiContext::new(pipeline), addr)
                .await
                .with_context(|| format!("Failed to bind {addr}"))?;
            println!("Listening on http://{}", server.addr);

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for ctrl-c")?;
            server.stop().await;
        }

        Commands::Scan { file, json } => {
            let mut session = ScanSession::new(pipeline, ConsolePresenter { json });
            session.start_capture()?;
            let report = session.capture_from(&FileCapture::new(file)).await?;

            // The process is about to exit; let the save finish first.
            if let Some(handle) = report.and_then(|r| r.persistence) {
                let _ = handle.await;
            }
        }

        Commands::History { limit } => {
            let rows = pipeline
                .sink()
                .recent(limit)
                .await
                .context("Failed to load scan history")?;
            if rows.is_empty() {
                println!("No saved scans.");
            }
            for row in rows {
                println!(
                    "{}  {}",
                    row.scanned_at.format("%Y-%m-%d %H:%M"),
                    row.record.name
                );
            }
        }
    }

    Ok(())
}
