//! Synthetic trainer for riding without hardware.
//!
//! Emits a frame as soon as it connects and then on a fixed interval, using
//! whatever values were last set. Values can be changed while connected
//! through a [`SyntheticControls`] handle.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::sensors::channel::{ConsumerSlot, ResistanceControl, TelemetryCallback, TrainerChannel};
use crate::sensors::types::{now_millis, ConnectionStatus, TelemetryFrame, TrainerError};

/// Values reported by the synthetic trainer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticValues {
    pub power_w: Option<i16>,
    pub speed_kmh: Option<f64>,
    pub cadence_rpm: Option<f64>,
}

impl Default for SyntheticValues {
    fn default() -> Self {
        Self {
            power_w: Some(200),
            speed_kmh: None,
            cadence_rpm: Some(90.0),
        }
    }
}

impl SyntheticValues {
    fn frame(&self) -> TelemetryFrame {
        TelemetryFrame {
            power_w: self.power_w,
            speed_kmh: self.speed_kmh,
            cadence_rpm: self.cadence_rpm,
            timestamp_ms: now_millis(),
        }
    }
}

/// Cloneable setter handle for a [`SyntheticTrainer`].
#[derive(Debug, Clone)]
pub struct SyntheticControls {
    values: Arc<Mutex<SyntheticValues>>,
}

impl SyntheticControls {
    pub fn set_power(&self, watts: i16) {
        self.update(|v| v.power_w = Some(watts));
    }

    pub fn set_speed(&self, kmh: f64) {
        self.update(|v| v.speed_kmh = Some(kmh));
    }

    pub fn set_cadence(&self, rpm: f64) {
        self.update(|v| v.cadence_rpm = Some(rpm));
    }

    /// Replace all values at once; `None` fields are omitted from frames.
    pub fn set_values(&self, values: SyntheticValues) {
        self.update(|v| *v = values);
    }

    pub fn values(&self) -> SyntheticValues {
        self.values.lock().map(|v| *v).unwrap_or_default()
    }

    fn update(&self, f: impl FnOnce(&mut SyntheticValues)) {
        if let Ok(mut values) = self.values.lock() {
            f(&mut values);
        }
    }
}

/// Trainer channel backed by a timer instead of a device.
pub struct SyntheticTrainer {
    interval: Duration,
    controls: SyntheticControls,
    consumer: ConsumerSlot<TelemetryFrame>,
    task: Option<JoinHandle<()>>,
}

impl Default for SyntheticTrainer {
    fn default() -> Self {
        Self::new(SyntheticValues::default(), Duration::from_secs(1))
    }
}

impl SyntheticTrainer {
    pub fn new(values: SyntheticValues, interval: Duration) -> Self {
        Self {
            // A zero period would spin the timer
            interval: interval.max(Duration::from_millis(1)),
            controls: SyntheticControls {
                values: Arc::new(Mutex::new(values)),
            },
            consumer: ConsumerSlot::new(),
            task: None,
        }
    }

    /// Handle for changing the emitted values while riding.
    pub fn controls(&self) -> SyntheticControls {
        self.controls.clone()
    }

    pub fn set_power(&self, watts: i16) {
        self.controls.set_power(watts);
    }

    pub fn set_speed(&self, kmh: f64) {
        self.controls.set_speed(kmh);
    }

    pub fn set_cadence(&self, rpm: f64) {
        self.controls.set_cadence(rpm);
    }
}

#[async_trait]
impl TrainerChannel for SyntheticTrainer {
    async fn connect(&mut self) -> Result<(), TrainerError> {
        if self.task.is_some() {
            return Ok(());
        }

        let period = self.interval;
        let controls = self.controls.clone();
        let consumer = self.consumer.clone();

        self.task = Some(tokio::spawn(async move {
            // First tick completes immediately
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                consumer.dispatch(controls.values().frame());
            }
        }));

        tracing::info!("Synthetic trainer started ({:?} interval)", period);
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.consumer.clear();
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::info!("Synthetic trainer stopped");
        }
    }

    fn on_data(&mut self, callback: TelemetryCallback) {
        self.consumer.set(callback);
    }

    fn is_connected(&self) -> bool {
        self.task.is_some()
    }

    fn status(&self) -> ConnectionStatus {
        if self.task.is_some() {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }

    fn name(&self) -> &str {
        "Synthetic trainer"
    }

    fn resistance_control(&self) -> Option<&dyn ResistanceControl> {
        Some(self)
    }
}

/// Accepts simulation parameters and ignores them; there is no resistance
/// to set.
#[async_trait]
impl ResistanceControl for SyntheticTrainer {
    async fn set_simulation_params(
        &self,
        grade: f64,
        crr: f64,
        cwa: f64,
    ) -> Result<(), TrainerError> {
        tracing::trace!(
            "Synthetic trainer ignoring grade={:.4} crr={:.4} cwa={:.3}",
            grade,
            crr,
            cwa
        );
        Ok(())
    }
}
