//! Capture replay datagram source.
//!
//! Replays a directory of `pdata<N>` files recorded by the live source (or
//! the original capture tooling). Files are ordered by their numeric suffix,
//! so `pdata2` replays before `pdata10`. Replay runs flat out by default; an
//! optional pacing rate approximates the original broadcast cadence.

use std::path::{Path, PathBuf};

use tokio::time::{Duration, Interval, interval};
use tracing::{info, trace, warn};

use crate::provider::PacketSource;
use crate::{MarshalError, Result};

const NOMINAL_HZ: f64 = 60.0;

/// Replays captured datagrams from a directory.
pub struct CaptureSource {
    files: Vec<PathBuf>,
    next: usize,
    pacing: Option<Interval>,
    rate: f64,
}

impl CaptureSource {
    /// Scan a capture directory for `pdata*` files.
    pub fn open<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref();
        let entries = std::fs::read_dir(directory)
            .map_err(|source| MarshalError::file_error(directory.to_path_buf(), source))?;

        let mut files: Vec<(u64, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|source| MarshalError::file_error(directory.to_path_buf(), source))?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(suffix) = name.strip_prefix("pdata") else {
                continue;
            };
            match suffix.parse::<u64>() {
                Ok(index) => files.push((index, path)),
                Err(_) => warn!(file = name, "ignoring capture file without numeric suffix"),
            }
        }
        files.sort_by_key(|(index, _)| *index);

        if files.is_empty() {
            warn!(directory = %directory.display(), "capture directory holds no pdata files");
        } else {
            info!(
                directory = %directory.display(),
                datagrams = files.len(),
                "capture opened for replay"
            );
        }

        Ok(Self {
            files: files.into_iter().map(|(_, path)| path).collect(),
            next: 0,
            pacing: None,
            rate: NOMINAL_HZ,
        })
    }

    /// Pace replay at `hz` datagrams per second instead of replaying flat out.
    pub fn with_rate(mut self, hz: f64) -> Self {
        let hz = hz.clamp(1.0, 1000.0);
        self.rate = hz;
        self.pacing = Some(interval(Duration::from_secs_f64(1.0 / hz)));
        self
    }

    /// Number of datagrams in the capture.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait::async_trait]
impl PacketSource for CaptureSource {
    async fn next_packet(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        if let Some(pacing) = &mut self.pacing {
            pacing.tick().await;
        }

        let datagram = std::fs::read(path)
            .map_err(|source| MarshalError::file_error(path.clone(), source))?;
        trace!(index = self.next, len = datagram.len(), "replaying datagram");
        self.next += 1;
        Ok(Some(datagram))
    }

    fn tick_rate(&self) -> f64 {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_capture(dir: &Path, files: &[(&str, &[u8])]) {
        for (name, payload) in files {
            std::fs::write(dir.join(name), payload).unwrap();
        }
    }

    #[tokio::test]
    async fn replays_in_numeric_order() {
        let dir = tempfile::tempdir().unwrap();
        write_capture(
            dir.path(),
            &[("pdata10", b"ten"), ("pdata2", b"two"), ("pdata0", b"zero"), ("notes.txt", b"x")],
        );

        let mut source = CaptureSource::open(dir.path()).unwrap();
        assert_eq!(source.len(), 3);
        assert_eq!(source.next_packet().await.unwrap().unwrap(), b"zero");
        assert_eq!(source.next_packet().await.unwrap().unwrap(), b"two");
        assert_eq!(source.next_packet().await.unwrap().unwrap(), b"ten");
        assert_eq!(source.next_packet().await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_directory_is_a_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(CaptureSource::open(&missing), Err(MarshalError::File { .. })));
    }

    #[tokio::test]
    async fn empty_capture_ends_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = CaptureSource::open(dir.path()).unwrap();
        assert!(source.is_empty());
        assert_eq!(source.next_packet().await.unwrap(), None);
    }
}
