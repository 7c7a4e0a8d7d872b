//! Datagram source implementations.

pub mod live;
pub mod replay;

pub use live::UdpSource;
pub use replay::CaptureSource;
