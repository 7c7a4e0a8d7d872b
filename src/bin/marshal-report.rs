//! Project CARS marshal report CLI.
//!
//! Live mode binds the game's UDP broadcast port and keeps `output.json`
//! current for the live timing page; replay mode runs a recorded capture
//! directory through the same pipeline. Every finalized race is additionally
//! written to its own `race_<n>.json`.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::Parser;
use futures::StreamExt;
use tracing::info;

use marshal::providers::live::DEFAULT_PORT;
use marshal::{Connection, Marshal, UdpSource, UpdateRate};

#[derive(Parser, Debug)]
#[command(name = "marshal-report", version, about = "Project CARS Marshal Report")]
struct Args {
    /// Capture directory to replay; omit to listen for live telemetry
    telemetry: Option<PathBuf>,

    /// UDP port to listen on in live mode
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Save received datagrams for future analysis
    #[arg(short, long)]
    save_packets: bool,

    /// Path of the live report file
    #[arg(short, long, default_value = "output.json")]
    output: PathBuf,

    /// Maximum live report updates per second
    #[arg(long, default_value_t = 1)]
    rate: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let mut connection = match &args.telemetry {
        Some(directory) => Marshal::replay(directory)
            .await
            .with_context(|| format!("opening capture {}", directory.display()))?,
        None => {
            let source = UdpSource::bind(args.port).await.context("binding telemetry port")?;
            let source = if args.save_packets {
                source.with_capture(capture_directory_name())
            } else {
                source
            };
            Connection::from_source(source)
        }
    };

    let mut snapshots = connection.report_stream(UpdateRate::Max(args.rate));
    let mut finalized = 0u32;

    loop {
        tokio::select! {
            // Biased: drain finalized races before the snapshot arm can
            // observe end-of-stream and break with races still queued.
            biased;

            _ = tokio::signal::ctrl_c() => {
                info!("interrupted; shutting down");
                break;
            }
            race = connection.next_race() => {
                let Some(report) = race else { break };
                finalized += 1;
                let path = args
                    .output
                    .with_file_name(format!("race_{}.json", report.race.race_number));
                report
                    .write_json(&path)
                    .with_context(|| format!("writing {}", path.display()))?;
                info!(race_number = report.race.race_number, path = %path.display(),
                    "finalized race written");
            }
            snapshot = snapshots.next() => {
                let Some(report) = snapshot else { break };
                report
                    .write_json(&args.output)
                    .with_context(|| format!("writing {}", args.output.display()))?;
            }
        }
    }

    connection.shutdown();
    info!(finalized, "marshal report stopped");
    Ok(())
}

/// Per-run capture directory, matching the recorder's `packetdata-` naming.
fn capture_directory_name() -> String {
    let seconds =
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default();
    format!("packetdata-{seconds}")
}
