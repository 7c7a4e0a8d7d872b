//! Source trait for datagram producers.

use crate::Result;

/// A source of raw protocol datagrams.
///
/// Sources hand datagrams to the engine strictly in emission order; a live
/// socket and a replayed capture are indistinguishable to the consumer. Each
/// source handles its own timing internally (a socket waits on the network, a
/// replay paces itself).
#[async_trait::async_trait]
pub trait PacketSource: Send + 'static {
    /// Get the next raw datagram.
    ///
    /// Returns:
    /// - `Ok(Some(bytes))` - next datagram payload
    /// - `Ok(None)` - stream ended (normal termination, e.g. replay exhausted)
    /// - `Err(e)` - source failure; the driver retries transient errors
    async fn next_packet(&mut self) -> Result<Option<Vec<u8>>>;

    /// Nominal datagram rate in Hz, used to normalize report throttling.
    fn tick_rate(&self) -> f64;
}
