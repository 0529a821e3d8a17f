//! Trainer channel contract shared by the hardware and synthetic backends.
//!
//! Optional features are exposed as capability traits that a backend opts
//! into; callers query for them instead of assuming every trainer can
//! control resistance.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crossbeam::channel::Receiver;

use crate::sensors::types::{ConnectionStatus, TelemetryFrame, TrainerError};

/// Consumer of decoded telemetry.
pub type TelemetryCallback = Box<dyn FnMut(TelemetryFrame) + Send + 'static>;

/// A source of trainer telemetry.
///
/// Exactly one consumer is registered at a time: `on_data` replaces any
/// previous callback. Fan-out belongs to the consumer side.
#[async_trait]
pub trait TrainerChannel: Send + Sync {
    /// Establish the connection and start telemetry.
    async fn connect(&mut self) -> Result<(), TrainerError>;

    /// Tear down the connection. Idempotent and safe before `connect`.
    async fn disconnect(&mut self);

    /// Register the telemetry consumer, replacing any previous one.
    fn on_data(&mut self, callback: TelemetryCallback);

    fn is_connected(&self) -> bool;

    fn status(&self) -> ConnectionStatus;

    /// Human readable backend name for logs.
    fn name(&self) -> &str;

    /// Hardware resistance control, if this backend supports it.
    fn resistance_control(&self) -> Option<&dyn ResistanceControl> {
        None
    }

    /// Raw exchange log, if this backend keeps one.
    fn debug_log(&self) -> Option<&dyn DebugLog> {
        None
    }
}

/// Capability: push simulation parameters to the trainer.
#[async_trait]
pub trait ResistanceControl: Send + Sync {
    /// Send grade (rise/run), rolling resistance and wind resistance (kg/m).
    ///
    /// Implementations that cannot currently write (no grant, not connected)
    /// return `Ok(())` without writing; nothing is queued.
    async fn set_simulation_params(&self, grade: f64, crr: f64, cwa: f64)
        -> Result<(), TrainerError>;

    /// Whether a write right now would reach the device.
    fn has_control(&self) -> bool {
        true
    }
}

/// Capability: export recent raw protocol exchanges.
pub trait DebugLog: Send + Sync {
    fn download_debug_log(&self) -> String;
}

/// Route telemetry into a queue drained by the simulation loop.
///
/// Replaces the channel's current consumer.
pub fn telemetry_queue(channel: &mut dyn TrainerChannel) -> Receiver<TelemetryFrame> {
    let (tx, rx) = crossbeam::channel::unbounded();
    channel.on_data(Box::new(move |frame| {
        // Receiver dropped means the ride is over
        let _ = tx.send(frame);
    }));
    rx
}

/// Single-consumer slot shared between a channel and its background task.
pub struct ConsumerSlot<T> {
    inner: Arc<Mutex<Option<Box<dyn FnMut(T) + Send + 'static>>>>,
}

impl<T> Clone for ConsumerSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for ConsumerSlot<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }
}

impl<T> ConsumerSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a consumer, dropping the previous one.
    pub fn set(&self, callback: Box<dyn FnMut(T) + Send + 'static>) {
        if let Ok(mut slot) = self.inner.lock() {
            *slot = Some(callback);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.inner.lock() {
            *slot = None;
        }
    }

    pub fn is_set(&self) -> bool {
        self.inner.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Hand a value to the consumer. Returns false when nobody is listening.
    pub fn dispatch(&self, value: T) -> bool {
        match self.inner.lock() {
            Ok(mut slot) => match slot.as_mut() {
                Some(callback) => {
                    callback(value);
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }
}
