//! Link between a vehicle process and a simulation running elsewhere.
//!
//! Every message is a frame: a 4 byte big-endian payload length followed by
//! the payload. Payloads are packets with a one byte tag and a fixed layout
//! of big-endian fields, see [`packet`].

pub mod client;
pub mod frame;
pub mod packet;
pub mod server;

pub use client::{RemoteImu, RemoteThruster, SimulationClient, UpdateSimClient};
pub use frame::{MAX_FRAME_SIZE, read_frame, write_frame};
pub use packet::{CommandPacket, ImuPacket, Packet, PacketTag};
pub use server::{SimulationServer, TelemetrySource};

use hardware::HardwareErrors;
use rotations::prelude::QuaternionErrors;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayErrors {
    #[error("packet with tag {0:#04x} should carry {1} bytes, got {2}")]
    BadLength(u8, usize, usize),
    #[error("peer closed the connection")]
    Closed,
    #[error("connection dropped after an earlier failure, reconnect first")]
    Disconnected,
    #[error("got an empty packet")]
    EmptyPacket,
    #[error("frame of {0} bytes exceeds the {1} byte limit")]
    FrameTooLarge(usize, usize),
    #[error("timeout must be greater than zero, got {0:?}")]
    InvalidTimeout(Duration),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("packet carries non-finite values")]
    NonFinite,
    #[error("{0}")]
    Quaternion(#[from] QuaternionErrors),
    #[error("telemetry source failed: {0}")]
    Source(String),
    #[error("stream ended inside a frame")]
    Truncated,
    #[error("expected {0} but got {1:?}")]
    UnexpectedPacket(&'static str, PacketTag),
    #[error("unknown packet tag {0:#04x}")]
    UnknownTag(u8),
}

impl From<RelayErrors> for HardwareErrors {
    fn from(e: RelayErrors) -> HardwareErrors {
        match e {
            RelayErrors::Io(e) => HardwareErrors::Io(e),
            RelayErrors::Closed | RelayErrors::Disconnected => {
                HardwareErrors::Disconnected("simulation relay".to_string())
            }
            e => HardwareErrors::Device("simulation relay".to_string(), e.to_string()),
        }
    }
}
