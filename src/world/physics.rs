//! Cyclist physics model.
//!
//! Converts power output into longitudinal acceleration for one rider or
//! ghost. The model is a pure function of its inputs; integrating velocity
//! and position is left to the caller (see [`integrate`]).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Physics constants
pub const GRAVITY: f64 = 9.81; // m/s²
pub const AIR_DENSITY: f64 = 1.225; // kg/m³ at sea level
pub const DEFAULT_CDA: f64 = 0.32; // m² (hoods position)
pub const DEFAULT_CRR: f64 = 0.004; // Rolling resistance for road tires
pub const BIKE_MASS: f64 = 8.0; // kg

/// Velocity floor used only as the divisor for propulsive force.
pub const V_EPSILON: f64 = 0.1; // m/s

/// Drag reduction is capped here so effective CdA never reaches zero.
pub const MAX_DRAG_REDUCTION: f64 = 0.99;

/// Aerodynamic and mass profile of one entity plus the grade under it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// System mass (rider + bike) in kilograms
    pub mass_kg: f64,
    /// Drag coefficient times frontal area (m²)
    pub cda: f64,
    /// Rolling resistance coefficient
    pub crr: f64,
    /// Air density (kg/m³)
    pub rho_air: f64,
    /// Road grade as rise/run (0.05 = 5% climb)
    pub grade: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            mass_kg: 75.0 + BIKE_MASS,
            cda: DEFAULT_CDA,
            crr: DEFAULT_CRR,
            rho_air: AIR_DENSITY,
            grade: 0.0,
        }
    }
}

impl PhysicsConfig {
    /// Create a config for a rider of the given body mass on the default bike.
    pub fn for_rider(rider_mass_kg: f64) -> Self {
        Self {
            mass_kg: rider_mass_kg + BIKE_MASS,
            ..Default::default()
        }
    }

    /// Check that every physical quantity is strictly positive and finite.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        let fields = [
            ("mass_kg", self.mass_kg),
            ("cda", self.cda),
            ("crr", self.crr),
            ("rho_air", self.rho_air),
        ];

        for (name, value) in fields {
            if !(value.is_finite() && value > 0.0) {
                return Err(PhysicsError::NonPositive { field: name, value });
            }
        }

        if !self.grade.is_finite() {
            return Err(PhysicsError::InvalidGrade(self.grade));
        }

        Ok(())
    }

    /// Wind resistance coefficient (½·ρ·CdA) in kg/m, as sent to trainers.
    pub fn wind_resistance(&self) -> f64 {
        0.5 * self.rho_air * self.cda
    }
}

/// Run-wide multiplicative modifiers from progression systems.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunModifiers {
    pub power_mult: f64,
    /// Fraction of drag area removed (0..1)
    pub drag_reduction: f64,
    pub weight_mult: f64,
    pub crr_mult: f64,
}

impl Default for RunModifiers {
    fn default() -> Self {
        Self {
            power_mult: 1.0,
            drag_reduction: 0.0,
            weight_mult: 1.0,
            crr_mult: 1.0,
        }
    }
}

impl RunModifiers {
    /// Copy with `extra` added to the drag reduction (e.g. from drafting).
    pub fn with_extra_drag_reduction(&self, extra: f64) -> Self {
        Self {
            drag_reduction: self.drag_reduction + extra,
            ..*self
        }
    }

    /// Drag reduction as actually applied by the physics model.
    pub fn effective_drag_reduction(&self) -> f64 {
        self.drag_reduction.clamp(0.0, MAX_DRAG_REDUCTION)
    }
}

/// Errors for physically meaningless configurations.
#[derive(Debug, Error, PartialEq)]
pub enum PhysicsError {
    #[error("{field} must be strictly positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("Grade must be finite, got {0}")]
    InvalidGrade(f64),
}

/// Effective drag area after modifiers.
pub fn effective_cda(cfg: &PhysicsConfig, modifiers: &RunModifiers) -> f64 {
    cfg.cda * (1.0 - modifiers.effective_drag_reduction())
}

/// Instantaneous acceleration (m/s²) for the given power and velocity.
///
/// Resistive forces oppose motion; the grade term turns into assistance on
/// descents. Near-zero velocity is floored at [`V_EPSILON`] for the
/// propulsive-force division only.
pub fn acceleration(
    power_w: f64,
    velocity_ms: f64,
    cfg: &PhysicsConfig,
    modifiers: &RunModifiers,
) -> f64 {
    let power = power_w * modifiers.power_mult;
    let mass = cfg.mass_kg * modifiers.weight_mult;
    let cda = effective_cda(cfg, modifiers);
    let crr = cfg.crr * modifiers.crr_mult;

    let f_propulsive = power / velocity_ms.max(V_EPSILON);
    let f_air = 0.5 * cfg.rho_air * cda * velocity_ms * velocity_ms;
    let f_rolling = crr * mass * GRAVITY;
    let f_gravity = mass * GRAVITY * cfg.grade.atan().sin();

    (f_propulsive - f_air - f_rolling - f_gravity) / mass
}

/// Longitudinal state of one entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Kinematics {
    /// Distance along the course in meters
    pub distance_m: f64,
    /// Speed in m/s
    pub velocity_ms: f64,
}

/// Explicit Euler step.
///
/// Distance advances with the velocity from the start of the step, then the
/// velocity is updated and floored at zero. Distance never decreases.
pub fn integrate(state: &mut Kinematics, accel: f64, dt: f64) {
    if !(dt.is_finite() && dt > 0.0) {
        return;
    }

    state.distance_m += state.velocity_ms.max(0.0) * dt;

    let next = state.velocity_ms + accel * dt;
    state.velocity_ms = if next.is_finite() { next.max(0.0) } else { 0.0 };
}

/// Speed (m/s) at which the given power exactly balances resistance.
///
/// Newton-Raphson on `v * F(v) - P = 0`. Used to seed entities near a
/// sensible cruising speed; the per-tick model remains [`acceleration`].
pub fn steady_state_speed(power_w: f64, cfg: &PhysicsConfig, modifiers: &RunModifiers) -> f64 {
    let power = power_w * modifiers.power_mult;
    let mass = cfg.mass_kg * modifiers.weight_mult;
    let cda = effective_cda(cfg, modifiers);
    let crr = cfg.crr * modifiers.crr_mult;

    // Grade + rolling are speed independent
    let f_static = mass * GRAVITY * (crr + cfg.grade.atan().sin());

    if power <= 0.0 && f_static >= 0.0 {
        return 0.0;
    }

    // Better initial guess based on gradient
    let mut v: f64 = if cfg.grade < -0.03 {
        15.0
    } else if cfg.grade > 0.05 {
        3.0
    } else {
        8.0
    };

    for _ in 0..50 {
        let f_air = 0.5 * cfg.rho_air * cda * v * v;
        let f_total = f_static + f_air;

        let f_v = v * f_total - power;
        // d/dv [v * (f_static + k v²)] = f_static + 3 k v²
        let df_v = f_static + 3.0 * f_air;

        if df_v.abs() < 1e-10 {
            v *= 1.1;
            continue;
        }

        let v_new = v - f_v / df_v;

        if (v_new - v).abs() < 1e-6 {
            v = v_new;
            break;
        }

        v = v_new.clamp(0.1, 50.0);
    }

    v.max(0.0)
}
