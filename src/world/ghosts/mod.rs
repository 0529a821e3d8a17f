//! Ghost riders: AI competitors sharing the rider's physics and drafting.
//!
//! A [`RacerProfile`] is fixed for an encounter; [`GhostState`] is the
//! per-tick simulation state the race loop owns for each ghost.

pub mod roster;

use serde::{Deserialize, Serialize};

use crate::world::physics::{Kinematics, PhysicsConfig, AIR_DENSITY};

pub use roster::{GhostRoster, JerseyPalette};

/// Ghost strength relative to the rider's FTP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GhostDifficulty {
    /// 50% of rider FTP
    Easy,
    #[default]
    /// 80% of rider FTP
    Medium,
    /// 100% of rider FTP
    MatchUser,
    /// 110% of rider FTP
    Hard,
    /// 130% of rider FTP
    VeryHard,
}

impl GhostDifficulty {
    /// Get FTP multiplier for this difficulty
    pub fn ftp_multiplier(&self) -> f64 {
        match self {
            Self::Easy => 0.5,
            Self::Medium => 0.8,
            Self::MatchUser => 1.0,
            Self::Hard => 1.1,
            Self::VeryHard => 1.3,
        }
    }
}

/// Immutable identity and physical profile of one ghost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RacerProfile {
    pub id: u32,
    pub name: String,
    /// Short flavor line shown alongside the name
    pub flavor: String,
    /// Constant power output in watts
    pub power_w: f64,
    /// System mass (rider + bike) in kilograms
    pub mass_kg: f64,
    pub cda: f64,
    /// Rolling resistance on the reference surface
    pub crr: f64,
    /// Jersey primary color (RGB)
    pub primary_color: [u8; 3],
    /// Jersey secondary color (RGB)
    pub secondary_color: [u8; 3],
}

impl RacerProfile {
    /// Physics config seeded from this profile on flat ground.
    pub fn physics_config(&self) -> PhysicsConfig {
        PhysicsConfig {
            mass_kg: self.mass_kg,
            cda: self.cda,
            crr: self.crr,
            rho_air: AIR_DENSITY,
            grade: 0.0,
        }
    }
}

/// Mutable simulation state of one ghost during a race.
#[derive(Debug, Clone)]
pub struct GhostState {
    profile: RacerProfile,
    pub kinematics: Kinematics,
    /// Grade and crr track the course under the ghost
    pub physics: PhysicsConfig,
    /// Race time (s) at which the ghost crossed the finish
    pub finished_at: Option<f64>,
    /// Drafting factor used in the latest tick
    pub draft_factor: f64,
}

impl GhostState {
    /// Place a ghost at `distance_m` with the given starting speed.
    pub fn new(profile: RacerProfile, distance_m: f64, velocity_ms: f64) -> Self {
        let physics = profile.physics_config();
        Self {
            profile,
            kinematics: Kinematics {
                distance_m,
                velocity_ms: velocity_ms.max(0.0),
            },
            physics,
            finished_at: None,
            draft_factor: 0.0,
        }
    }

    pub fn profile(&self) -> &RacerProfile {
        &self.profile
    }

    pub fn id(&self) -> u32 {
        self.profile.id
    }

    pub fn distance_m(&self) -> f64 {
        self.kinematics.distance_m
    }

    pub fn velocity_ms(&self) -> f64 {
        self.kinematics.velocity_ms
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}
