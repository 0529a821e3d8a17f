//! Sensor types shared by every trainer channel.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Decoded telemetry snapshot from a trainer.
///
/// Fields the source frame did not flag as present stay `None`; zero is a
/// legitimate reading and is never used as a stand-in.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetryFrame {
    /// Instantaneous power in watts (signed on the wire)
    pub power_w: Option<i16>,
    /// Instantaneous speed in km/h
    pub speed_kmh: Option<f64>,
    /// Instantaneous cadence in RPM
    pub cadence_rpm: Option<f64>,
    /// Milliseconds since the Unix epoch when the frame was decoded
    pub timestamp_ms: u64,
}

impl TelemetryFrame {
    /// True when no optional field is present.
    pub fn is_empty(&self) -> bool {
        self.power_w.is_none() && self.speed_kmh.is_none() && self.cadence_rpm.is_none()
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Coarse connection status for display.
///
/// `Failed` is distinct from `Disconnected` so a user can tell "never tried"
/// from "tried and failed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "DISCONNECTED"),
            ConnectionStatus::Connecting => write!(f, "CONNECTING"),
            ConnectionStatus::Connected => write!(f, "CONNECTED"),
            ConnectionStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Link state of a hardware trainer.
///
/// Telemetry flows from `Subscribed` onward; simulation parameters are only
/// written in `ControlGranted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrainerState {
    #[default]
    Disconnected,
    Connecting,
    /// Telemetry only
    Subscribed,
    /// Request-control written, waiting for the grant
    ControlRequested,
    ControlGranted,
    Failed,
}

impl TrainerState {
    pub fn status(&self) -> ConnectionStatus {
        match self {
            TrainerState::Disconnected => ConnectionStatus::Disconnected,
            TrainerState::Connecting => ConnectionStatus::Connecting,
            TrainerState::Subscribed
            | TrainerState::ControlRequested
            | TrainerState::ControlGranted => ConnectionStatus::Connected,
            TrainerState::Failed => ConnectionStatus::Failed,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }
}

impl std::fmt::Display for TrainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainerState::Disconnected => write!(f, "Disconnected"),
            TrainerState::Connecting => write!(f, "Connecting..."),
            TrainerState::Subscribed => write!(f, "Connected (telemetry only)"),
            TrainerState::ControlRequested => write!(f, "Requesting control..."),
            TrainerState::ControlGranted => write!(f, "Connected (resistance control)"),
            TrainerState::Failed => write!(f, "Failed"),
        }
    }
}

/// Malformed or truncated frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Frame truncated: needed {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Unexpected op code 0x{0:02x}")]
    UnexpectedOpCode(u8),
}

/// Failure to establish a trainer connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// BLE adapter not found or unavailable
    #[error("Bluetooth adapter not found")]
    AdapterNotFound,

    /// No device was selected (scan timed out or the user cancelled)
    #[error("Device selection cancelled")]
    SelectionCancelled,

    /// Device lacks a required characteristic
    #[error("Characteristic missing: {0}")]
    CharacteristicMissing(Uuid),

    /// GATT connection or service discovery failed
    #[error("GATT unavailable: {0}")]
    GattUnavailable(String),

    #[error("Connection timed out")]
    Timeout,
}

/// Errors that can occur in the trainer channels.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("Connection failed: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Not connected")]
    NotConnected,

    #[error("Failed to subscribe to notifications: {0}")]
    SubscriptionFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("BLE error: {0}")]
    BleError(String),
}
