//! Decides when the trainer needs new simulation parameters.

use serde::{Deserialize, Serialize};

use crate::sensors::ftms::SimulationParams;

/// Minimum change before parameters are resent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResistanceThresholds {
    /// Rise/run, 0.001 = 0.1 %
    pub grade: f64,
    pub crr: f64,
    /// kg/m
    pub cwa: f64,
}

impl Default for ResistanceThresholds {
    fn default() -> Self {
        Self {
            grade: 0.001,
            crr: 0.0001,
            cwa: 0.01,
        }
    }
}

/// Hysteresis filter between the race loop and the trainer.
#[derive(Debug, Clone, Default)]
pub struct ResistanceSync {
    thresholds: ResistanceThresholds,
    last_sent: Option<SimulationParams>,
}

impl ResistanceSync {
    pub fn new(thresholds: ResistanceThresholds) -> Self {
        Self {
            thresholds,
            last_sent: None,
        }
    }

    /// Returns the parameters to send, or `None` when the change since the
    /// last send is below every threshold.
    pub fn update(&mut self, params: SimulationParams) -> Option<SimulationParams> {
        let changed = match self.last_sent {
            None => true,
            Some(last) => {
                (params.grade - last.grade).abs() >= self.thresholds.grade
                    || (params.crr - last.crr).abs() >= self.thresholds.crr
                    || (params.cwa - last.cwa).abs() >= self.thresholds.cwa
            }
        };

        if changed {
            self.last_sent = Some(params);
            Some(params)
        } else {
            None
        }
    }

    /// Forget the last send so the next update goes through.
    pub fn reset(&mut self) {
        self.last_sent = None;
    }

    pub fn last_sent(&self) -> Option<SimulationParams> {
        self.last_sent
    }
}
