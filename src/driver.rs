//! Driver spawns and manages the datagram processing task.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::engine::MarshalEngine;
use crate::provider::PacketSource;
use crate::report::Report;

/// Result of spawning the driver task.
pub struct DriverChannels {
    /// Latest live report snapshot, refreshed after every applied datagram.
    pub reports: watch::Receiver<Option<Arc<Report>>>,
    /// Finalized reports, one per completed race.
    pub races: mpsc::Receiver<Arc<Report>>,
    /// Cancellation token for graceful shutdown.
    pub cancel: CancellationToken,
}

/// Driver spawns and manages the datagram processing task.
///
/// One task owns both the source and the engine, so datagrams are decoded and
/// applied strictly in arrival order with no shared-mutability hazard.
pub struct Driver;

impl Driver {
    /// Spawn the processing task for the given source.
    ///
    /// Returns the live report watch receiver, the finalized race channel and
    /// a cancellation token for graceful shutdown.
    pub fn spawn<S>(source: S) -> DriverChannels
    where
        S: PacketSource,
    {
        let (report_tx, report_rx) = watch::channel(None);
        let (race_tx, race_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        tokio::spawn(async move {
            Self::packet_loop(source, report_tx, race_tx, cancel_task).await;
        });

        DriverChannels { reports: report_rx, races: race_rx, cancel }
    }

    async fn packet_loop<S>(
        mut source: S,
        report_tx: watch::Sender<Option<Arc<Report>>>,
        race_tx: mpsc::Sender<Arc<Report>>,
        cancel: CancellationToken,
    ) where
        S: PacketSource,
    {
        info!("packet loop started");
        let mut engine = MarshalEngine::new();
        let mut packet_count = 0u64;
        let mut error_count = 0u32;
        const MAX_ERRORS: u32 = 10;

        loop {
            if cancel.is_cancelled() {
                info!("packet loop cancelled");
                break;
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("packet loop cancelled during receive");
                    break;
                }
                result = source.next_packet() => result,
            };

            match result {
                Ok(Some(datagram)) => {
                    packet_count += 1;
                    error_count = 0;
                    trace!(packet_count, len = datagram.len(), "applying datagram");

                    match engine.apply_bytes(&datagram) {
                        Ok(finalized) => {
                            if let Some(report) = finalized {
                                info!(
                                    race_number = report.race.race_number,
                                    "race finalized"
                                );
                                if race_tx.try_send(Arc::new(report)).is_err() {
                                    warn!("finalized race dropped; receiver not keeping up");
                                }
                            }
                            let snapshot = Arc::new(engine.snapshot());
                            if report_tx.send(Some(snapshot)).is_err() {
                                debug!("report receiver dropped, shutting down");
                                break;
                            }
                        }
                        Err(error) => {
                            // Sequence and reconciliation failures mean the
                            // stream can no longer be attributed safely.
                            error!(%error, "fatal protocol error; stopping stream");
                            for suggestion in error.recovery_suggestions() {
                                warn!(suggestion);
                            }
                            let _ = report_tx.send(None);
                            break;
                        }
                    }
                }
                Ok(None) => {
                    info!("source ended after {} datagrams", packet_count);
                    let _ = report_tx.send(None);
                    break;
                }
                Err(e) => {
                    error_count += 1;
                    error!("source error ({}/{}): {}", error_count, MAX_ERRORS, e);

                    if error_count >= MAX_ERRORS {
                        error!("too many source errors, shutting down");
                        let _ = report_tx.send(None);
                        break;
                    }

                    // Exponential backoff: 50ms, 100ms, 200ms, ...
                    let backoff = std::time::Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        info!("packet loop ended (processed {} datagrams)", packet_count);
    }
}
