//! GhostRide - Indoor Cycling Ghost Racing
//!
//! Simulates a rider's motion from live trainer power, races them against
//! AI ghosts that share the same physics and drafting model, and drives a
//! BLE FTMS smart trainer's resistance to match the course.

pub mod racing;
pub mod sensors;
pub mod session;
pub mod storage;
pub mod world;

// Re-export commonly used types
pub use racing::race::Race;
pub use sensors::channel::TrainerChannel;
pub use session::Session;
pub use storage::config::AppConfig;
