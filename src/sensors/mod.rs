//! Trainer telemetry and control over BLE FTMS, plus a synthetic stand-in.

pub mod channel;
pub mod ftms;
pub mod hardware;
pub mod synthetic;
pub mod transport;
pub mod types;

pub use channel::{telemetry_queue, DebugLog, ResistanceControl, TrainerChannel};
pub use hardware::{HardwareTrainer, HardwareTrainerConfig, HeartRateMonitor};
pub use synthetic::{SyntheticControls, SyntheticTrainer, SyntheticValues};
pub use transport::{BtleTransport, BtleTransportConfig, GattNotification, GattTransport};
pub use types::{
    ConnectionError, ConnectionStatus, ProtocolError, TelemetryFrame, TrainerError, TrainerState,
};
