//! Per-tick race simulation of the rider against a field of ghosts.
//!
//! Every entity shares the same physics and drafting model. The rider's
//! power comes from trainer telemetry; each ghost rides at the constant
//! power of its profile.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::sensors::ftms::SimulationParams;
use crate::sensors::types::TelemetryFrame;
use crate::world::drafting::best_draft_factor;
use crate::world::ghosts::{GhostState, RacerProfile};
use crate::world::physics::{
    acceleration, effective_cda, integrate, Kinematics, PhysicsConfig, RunModifiers,
};
use crate::world::route::{Course, SurfaceType};

/// Ghosts further than this fraction of the course from the rider are
/// brought back.
pub const RESPAWN_DIVERGENCE_FRACTION: f64 = 0.75;

/// Where a respawned ghost lands, behind the rider.
pub const RESPAWN_BEHIND_M: f64 = 10.0;

/// Minimum respawn speed as a fraction of the rider's speed.
pub const RESPAWN_SPEED_FRACTION: f64 = 0.9;

/// What the rider's power does when telemetry stops arriving.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PowerHoldPolicy {
    /// Keep the last reported power indefinitely
    HoldLast,
    /// Treat power as zero once no reading arrived for `timeout_s`
    DecayAfter { timeout_s: f64 },
}

impl Default for PowerHoldPolicy {
    fn default() -> Self {
        PowerHoldPolicy::DecayAfter { timeout_s: 3.0 }
    }
}

/// Something that happened during a tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RaceEvent {
    /// First ghost across the line. Emitted once per race.
    FirstFinisher { ghost_id: u32, time_s: f64 },
    GhostFinished { ghost_id: u32, time_s: f64 },
    RiderFinished { time_s: f64, position: usize },
    GhostRespawned { ghost_id: u32, from_m: f64, to_m: f64 },
}

/// The human rider.
#[derive(Debug, Clone)]
pub struct RiderState {
    pub kinematics: Kinematics,
    /// Grade and crr track the course under the rider
    pub physics: PhysicsConfig,
    pub modifiers: RunModifiers,
    /// Drafting factor used in the latest tick
    pub draft_factor: f64,
    pub finished_at: Option<f64>,
    power_w: f64,
    /// Seconds since the last frame carrying power; `None` before the first
    power_age_s: Option<f64>,
    cadence_rpm: Option<f64>,
    surface: SurfaceType,
}

impl RiderState {
    fn new(physics: PhysicsConfig) -> Self {
        Self {
            kinematics: Kinematics::default(),
            physics,
            modifiers: RunModifiers::default(),
            draft_factor: 0.0,
            finished_at: None,
            power_w: 0.0,
            power_age_s: None,
            cadence_rpm: None,
            surface: SurfaceType::default(),
        }
    }

    pub fn distance_m(&self) -> f64 {
        self.kinematics.distance_m
    }

    pub fn velocity_ms(&self) -> f64 {
        self.kinematics.velocity_ms
    }

    /// Power the physics uses under `policy`.
    pub fn effective_power(&self, policy: PowerHoldPolicy) -> f64 {
        match (policy, self.power_age_s) {
            (_, None) => 0.0,
            (PowerHoldPolicy::HoldLast, Some(_)) => self.power_w,
            (PowerHoldPolicy::DecayAfter { timeout_s }, Some(age)) => {
                if age > timeout_s {
                    0.0
                } else {
                    self.power_w
                }
            }
        }
    }

    /// Modifiers with this tick's draft folded into drag reduction.
    pub fn drafting_modifiers(&self) -> RunModifiers {
        self.modifiers.with_extra_drag_reduction(self.draft_factor)
    }
}

/// Read-only view of the rider for presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiderSnapshot {
    pub distance_m: f64,
    pub velocity_ms: f64,
    pub power_w: f64,
    pub cadence_rpm: Option<f64>,
    pub grade: f64,
    pub surface: SurfaceType,
    pub draft_factor: f64,
    pub finished_at: Option<f64>,
}

/// Read-only view of one ghost for presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GhostSnapshot {
    pub id: u32,
    pub name: String,
    pub distance_m: f64,
    pub velocity_ms: f64,
    /// Same value the physics used this tick
    pub draft_factor: f64,
    pub finished_at: Option<f64>,
    pub primary_color: [u8; 3],
}

/// Whole-race view for presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceSnapshot {
    pub elapsed_s: f64,
    pub course_length_m: f64,
    pub rider: RiderSnapshot,
    pub ghosts: Vec<GhostSnapshot>,
    /// 1-based place of the rider in the field
    pub rider_position: usize,
}

/// Rider against ghosts on one course.
pub struct Race {
    course: Arc<dyn Course>,
    rider: RiderState,
    ghosts: Vec<GhostState>,
    power_hold: PowerHoldPolicy,
    elapsed_s: f64,
    first_finisher: Option<u32>,
}

impl Race {
    /// Race with every ghost on the start line at standstill.
    pub fn new(course: Arc<dyn Course>, rider: PhysicsConfig, field: Vec<RacerProfile>) -> Self {
        let ghosts = field
            .into_iter()
            .map(|profile| GhostState::new(profile, 0.0, 0.0))
            .collect();
        Self::with_ghosts(course, rider, ghosts)
    }

    /// Race with ghosts already placed.
    pub fn with_ghosts(course: Arc<dyn Course>, rider: PhysicsConfig, ghosts: Vec<GhostState>) -> Self {
        let mut race = Self {
            course,
            rider: RiderState::new(rider),
            ghosts,
            power_hold: PowerHoldPolicy::default(),
            elapsed_s: 0.0,
            first_finisher: None,
        };
        race.resample_rider();
        race
    }

    pub fn with_modifiers(mut self, modifiers: RunModifiers) -> Self {
        self.rider.modifiers = modifiers;
        self
    }

    pub fn with_power_hold(mut self, policy: PowerHoldPolicy) -> Self {
        self.power_hold = policy;
        self
    }

    /// Start the rider somewhere other than standstill on the line.
    pub fn with_rider_start(mut self, kinematics: Kinematics) -> Self {
        self.rider.kinematics = Kinematics {
            distance_m: kinematics.distance_m.max(0.0),
            velocity_ms: kinematics.velocity_ms.max(0.0),
        };
        self.resample_rider();
        self
    }

    pub fn rider(&self) -> &RiderState {
        &self.rider
    }

    pub fn ghosts(&self) -> &[GhostState] {
        &self.ghosts
    }

    pub fn elapsed_s(&self) -> f64 {
        self.elapsed_s
    }

    pub fn course_length_m(&self) -> f64 {
        self.course.length_m()
    }

    pub fn is_rider_finished(&self) -> bool {
        self.rider.finished_at.is_some()
    }

    /// Take in one telemetry frame. Frames without power leave the held
    /// power and its age untouched.
    pub fn ingest(&mut self, frame: &TelemetryFrame) {
        if let Some(power) = frame.power_w {
            // Negative readings are treated as not pedalling
            self.rider.power_w = f64::from(power.max(0));
            self.rider.power_age_s = Some(0.0);
        }
        if frame.cadence_rpm.is_some() {
            self.rider.cadence_rpm = frame.cadence_rpm;
        }
    }

    /// Advance the race by `dt` seconds. Non-positive or non-finite `dt`
    /// is ignored.
    pub fn tick(&mut self, dt: f64) -> Vec<RaceEvent> {
        let mut events = Vec::new();
        if !(dt.is_finite() && dt > 0.0) {
            return events;
        }

        let start_s = self.elapsed_s;
        let length = self.course.length_m();

        let mut crossings = self.finish_ghosts_past_line(start_s, length);

        // Positions at the start of the tick feed every draft calculation
        let rider_start = self.rider.distance_m();
        let ghost_starts: Vec<(u32, f64, bool)> = self
            .ghosts
            .iter()
            .map(|g| (g.id(), g.distance_m(), g.is_finished()))
            .collect();

        self.step_rider(dt, &ghost_starts);
        self.respawn_stragglers(length, &mut events);
        crossings.extend(self.step_ghosts(dt, start_s, rider_start, &ghost_starts, length));
        crossings.sort_by(|a, b| a.1.total_cmp(&b.1));

        self.elapsed_s = start_s + dt;

        for (ghost_id, time_s) in crossings {
            if self.first_finisher.is_none() {
                self.first_finisher = Some(ghost_id);
                tracing::info!("Ghost {} wins at {:.1}s", ghost_id, time_s);
                events.push(RaceEvent::FirstFinisher { ghost_id, time_s });
            }
            events.push(RaceEvent::GhostFinished { ghost_id, time_s });
        }

        if self.rider.finished_at.is_none() {
            if let Some(time_s) = crossing_time(rider_start, self.rider.distance_m(), length, start_s, dt) {
                self.rider.finished_at = Some(time_s);
                let position = self.rider_position();
                tracing::info!("Rider finished in {:.1}s, position {}", time_s, position);
                events.push(RaceEvent::RiderFinished { time_s, position });
            }
        }

        if let Some(age) = self.rider.power_age_s.as_mut() {
            *age += dt;
        }

        events
    }

    fn step_rider(&mut self, dt: f64, ghost_starts: &[(u32, f64, bool)]) {
        let own = self.rider.distance_m();
        self.rider.draft_factor = best_draft_factor(
            own,
            ghost_starts
                .iter()
                .filter(|(_, _, finished)| !finished)
                .map(|(_, distance, _)| *distance),
        );

        self.resample_rider();

        let power = self.rider.effective_power(self.power_hold);
        let modifiers = self.rider.drafting_modifiers();
        let accel = acceleration(power, self.rider.velocity_ms(), &self.rider.physics, &modifiers);
        integrate(&mut self.rider.kinematics, accel, dt);
    }

    fn resample_rider(&mut self) {
        let sample = self.course.sample(self.rider.distance_m());
        self.rider.physics.grade = sample.grade;
        self.rider.physics.crr = sample.surface.crr();
        self.rider.surface = sample.surface;
    }

    /// Ghosts that drifted too far from the rider (either way) are placed
    /// just behind them, and short of the finish. Finished ghosts stay put.
    fn respawn_stragglers(&mut self, length: f64, events: &mut Vec<RaceEvent>) {
        if length <= 0.0 {
            return;
        }

        let limit = RESPAWN_DIVERGENCE_FRACTION * length;
        let rider_distance = self.rider.distance_m();
        let rider_velocity = self.rider.velocity_ms();

        for ghost in self.ghosts.iter_mut().filter(|g| !g.is_finished()) {
            let from_m = ghost.distance_m();
            if (from_m - rider_distance).abs() <= limit {
                continue;
            }

            // Never land on or past the line, where no crossing could be seen
            let to_m = (rider_distance - RESPAWN_BEHIND_M)
                .min(length - RESPAWN_BEHIND_M)
                .max(0.0);
            ghost.kinematics = Kinematics {
                distance_m: to_m,
                velocity_ms: ghost.velocity_ms().max(RESPAWN_SPEED_FRACTION * rider_velocity),
            };

            tracing::debug!("Respawned ghost {} from {:.0} m to {:.0} m", ghost.id(), from_m, to_m);
            events.push(RaceEvent::GhostRespawned {
                ghost_id: ghost.id(),
                from_m,
                to_m,
            });
        }
    }

    /// Ghosts placed on or past the line before they ever moved finish at
    /// the start of the tick.
    fn finish_ghosts_past_line(&mut self, start_s: f64, length: f64) -> Vec<(u32, f64)> {
        if length <= 0.0 {
            return Vec::new();
        }

        self.ghosts
            .iter_mut()
            .filter(|g| !g.is_finished() && g.distance_m() >= length)
            .map(|ghost| {
                ghost.finished_at = Some(start_s);
                ghost.kinematics.distance_m = length;
                (ghost.id(), start_s)
            })
            .collect()
    }

    /// Move every unfinished ghost, drafting off the tick-start positions.
    /// Returns this tick's finish crossings.
    fn step_ghosts(
        &mut self,
        dt: f64,
        start_s: f64,
        rider_start: f64,
        ghost_starts: &[(u32, f64, bool)],
        length: f64,
    ) -> Vec<(u32, f64)> {
        let mut crossings = Vec::new();

        for ghost in self.ghosts.iter_mut().filter(|g| !g.is_finished()) {
            let id = ghost.id();
            let own = ghost.distance_m();

            let others = ghost_starts
                .iter()
                .filter(|(other, _, finished)| *other != id && !finished)
                .map(|(_, distance, _)| *distance)
                .chain(std::iter::once(rider_start));
            ghost.draft_factor = best_draft_factor(own, others);

            let sample = self.course.sample(own);
            ghost.physics.grade = sample.grade;
            ghost.physics.crr = sample.surface.crr();

            let modifiers = RunModifiers::default().with_extra_drag_reduction(ghost.draft_factor);
            let accel = acceleration(ghost.profile().power_w, ghost.velocity_ms(), &ghost.physics, &modifiers);
            integrate(&mut ghost.kinematics, accel, dt);

            if let Some(time_s) = crossing_time(own, ghost.distance_m(), length, start_s, dt) {
                ghost.finished_at = Some(time_s);
                ghost.kinematics.distance_m = length;
                crossings.push((id, time_s));
            }
        }

        crossings
    }

    /// 1-based place of the rider: finishers by time, then the rest by
    /// distance.
    pub fn rider_position(&self) -> usize {
        let rider = &self.rider;
        let ahead = self
            .ghosts
            .iter()
            .filter(|g| match (g.finished_at, rider.finished_at) {
                (Some(ghost_t), Some(rider_t)) => ghost_t < rider_t,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => g.distance_m() > rider.distance_m(),
            })
            .count();
        ahead + 1
    }

    /// Parameters to send to a controllable trainer for the rider's
    /// current situation. Wind resistance includes drafting and modifiers.
    pub fn rider_sim_params(&self) -> SimulationParams {
        let physics = &self.rider.physics;
        let cda = effective_cda(physics, &self.rider.drafting_modifiers());
        SimulationParams {
            wind_speed_ms: 0.0,
            grade: physics.grade,
            crr: physics.crr * self.rider.modifiers.crr_mult,
            cwa: 0.5 * physics.rho_air * cda,
        }
    }

    pub fn snapshot(&self) -> RaceSnapshot {
        let rider = &self.rider;
        RaceSnapshot {
            elapsed_s: self.elapsed_s,
            course_length_m: self.course.length_m(),
            rider: RiderSnapshot {
                distance_m: rider.distance_m(),
                velocity_ms: rider.velocity_ms(),
                power_w: rider.effective_power(self.power_hold),
                cadence_rpm: rider.cadence_rpm,
                grade: rider.physics.grade,
                surface: rider.surface,
                draft_factor: rider.draft_factor,
                finished_at: rider.finished_at,
            },
            ghosts: self
                .ghosts
                .iter()
                .map(|g| GhostSnapshot {
                    id: g.id(),
                    name: g.profile().name.clone(),
                    distance_m: g.distance_m(),
                    velocity_ms: g.velocity_ms(),
                    draft_factor: g.draft_factor,
                    finished_at: g.finished_at,
                    primary_color: g.profile().primary_color,
                })
                .collect(),
            rider_position: self.rider_position(),
        }
    }
}

/// Time at which a move from `before` to `after` crossed `line`, linearly
/// interpolated within the tick. Starting on or past the line counts as
/// crossing at the start of the tick.
fn crossing_time(before: f64, after: f64, line: f64, start_s: f64, dt: f64) -> Option<f64> {
    if line <= 0.0 || after < line {
        return None;
    }
    if before >= line {
        return Some(start_s);
    }
    let fraction = if after > before {
        ((line - before) / (after - before)).clamp(0.0, 1.0)
    } else {
        1.0
    };
    Some(start_s + fraction * dt)
}
