//! Live UDP datagram source.
//!
//! Project CARS broadcasts telemetry to UDP port 5606. The source binds the
//! port, hands datagrams to the driver in arrival order, and can optionally
//! capture every datagram to disk as `pdata<N>` files for later replay.

use std::path::PathBuf;

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::provider::PacketSource;
use crate::{MarshalError, Result};

/// The UDP port Project CARS broadcasts to.
pub const DEFAULT_PORT: u16 = 5606;

/// Largest frame defined by the protocol, with headroom for foreign traffic.
const MAX_DATAGRAM: usize = 2048;

/// Nominal broadcast rate of the game.
const NOMINAL_HZ: f64 = 60.0;

/// Live datagram source bound to a UDP port.
pub struct UdpSource {
    socket: UdpSocket,
    buffer: Vec<u8>,
    capture: Option<CaptureWriter>,
}

impl UdpSource {
    /// Bind the source to a local UDP port.
    pub async fn bind(port: u16) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).await.map_err(|source| {
            MarshalError::socket_error(format!("binding UDP port {port}"), source)
        })?;
        info!(port, "listening for telemetry datagrams");
        Ok(Self { socket, buffer: vec![0u8; MAX_DATAGRAM], capture: None })
    }

    /// Capture every received datagram into `directory` as `pdata<N>` files.
    ///
    /// The directory is created lazily on the first datagram, so an idle
    /// session leaves nothing behind.
    pub fn with_capture(mut self, directory: impl Into<PathBuf>) -> Self {
        let directory = directory.into();
        info!(directory = %directory.display(), "datagram capture enabled");
        self.capture = Some(CaptureWriter { directory, next_index: 0 });
        self
    }
}

#[async_trait::async_trait]
impl PacketSource for UdpSource {
    async fn next_packet(&mut self) -> Result<Option<Vec<u8>>> {
        let (len, peer) = self.socket.recv_from(&mut self.buffer).await.map_err(|source| {
            MarshalError::socket_error("receiving datagram", source)
        })?;
        debug!(len, %peer, "datagram received");

        let datagram = self.buffer[..len].to_vec();
        if let Some(capture) = &mut self.capture {
            // Capture failures should not take down the live stream.
            if let Err(error) = capture.save(&datagram) {
                warn!(%error, "datagram capture failed; disabling capture");
                self.capture = None;
            }
        }
        Ok(Some(datagram))
    }

    fn tick_rate(&self) -> f64 {
        NOMINAL_HZ
    }
}

struct CaptureWriter {
    directory: PathBuf,
    next_index: usize,
}

impl CaptureWriter {
    fn save(&mut self, datagram: &[u8]) -> Result<()> {
        if self.next_index == 0 {
            std::fs::create_dir_all(&self.directory)
                .map_err(|source| MarshalError::file_error(self.directory.clone(), source))?;
        }
        let path = self.directory.join(format!("pdata{}", self.next_index));
        std::fs::write(&path, datagram)
            .map_err(|source| MarshalError::file_error(path, source))?;
        self.next_index += 1;
        Ok(())
    }
}
