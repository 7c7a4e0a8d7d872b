//! User-facing connection to a marshal report stream.
//!
//! A [`Connection`] wraps the driver task for one source: it exposes the live
//! report snapshot as a throttleable stream, finalized race reports as an
//! async queue, and a graceful shutdown handle. Live and replay connections
//! behave identically.

use std::path::Path;
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::driver::Driver;
use crate::provider::PacketSource;
use crate::providers::{CaptureSource, UdpSource};
use crate::report::Report;
use crate::stream::{ThrottleExt, UpdateRate};
use crate::Result;

/// Handle to a running marshal pipeline.
pub struct Connection {
    reports: watch::Receiver<Option<Arc<Report>>>,
    races: mpsc::Receiver<Arc<Report>>,
    cancel: CancellationToken,
    source_hz: f64,
}

impl Connection {
    /// Listen for live telemetry on a UDP port.
    pub async fn listen(port: u16) -> Result<Self> {
        let source = UdpSource::bind(port).await?;
        Ok(Self::from_source(source))
    }

    /// Replay a capture directory of `pdata<N>` files.
    pub async fn replay<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let source = CaptureSource::open(directory)?;
        Ok(Self::from_source(source))
    }

    /// Build a connection around any datagram source.
    pub fn from_source<S: PacketSource>(source: S) -> Self {
        let source_hz = source.tick_rate();
        let channels = Driver::spawn(source);
        info!(source_hz, "marshal pipeline running");
        Self {
            reports: channels.reports,
            races: channels.races,
            cancel: channels.cancel,
            source_hz,
        }
    }

    /// Stream of live report snapshots, at most `rate` updates per second.
    ///
    /// The stream ends when the source ends or the pipeline stops. Each item
    /// is the latest full projection; intermediate snapshots are dropped,
    /// never queued.
    pub fn report_stream(&self, rate: UpdateRate) -> BoxStream<'static, Arc<Report>> {
        // from_changes: the watch slot holds None until the first datagram,
        // which must not end the stream before it starts. The driver writes
        // None again only as its end-of-stream marker.
        let snapshots = WatchStream::from_changes(self.reports.clone())
            .take_while(|item| futures::future::ready(item.is_some()))
            .filter_map(futures::future::ready);

        match rate.throttle_interval(self.source_hz) {
            Some(interval) => snapshots.throttle(interval).boxed(),
            None => snapshots.boxed(),
        }
    }

    /// Latest live report snapshot, if any datagram has been applied yet.
    pub fn latest(&self) -> Option<Arc<Report>> {
        self.reports.borrow().clone()
    }

    /// Next finalized race report. Returns `None` once the pipeline stops and
    /// all finalized races have been taken.
    pub async fn next_race(&mut self) -> Option<Arc<Report>> {
        self.races.recv().await
    }

    /// Nominal source rate in Hz.
    pub fn source_hz(&self) -> f64 {
        self.source_hz
    }

    /// Stop the pipeline. Idempotent; already-queued race reports remain
    /// readable.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
