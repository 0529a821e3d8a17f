//! Ride session: wires a trainer channel to the race loop.
//!
//! Built once from configuration and passed around explicitly. Telemetry
//! reaches the race through a queue drained at tick boundaries, so the
//! transport tasks never touch race state.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::racing::{Race, RaceEvent, RaceSnapshot, ResistanceSync};
use crate::sensors::channel::{telemetry_queue, TrainerChannel};
use crate::sensors::hardware::{HardwareTrainer, HeartRateMonitor};
use crate::sensors::synthetic::SyntheticTrainer;
use crate::sensors::transport::BtleTransport;
use crate::sensors::types::TrainerError;
use crate::storage::config::{AppConfig, TrainerBackend};
use crate::world::ghosts::GhostRoster;
use crate::world::route::Course;

/// How often the running race is logged.
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Outcome of a ride.
#[derive(Debug, Clone)]
pub struct RaceSummary {
    pub snapshot: RaceSnapshot,
    pub events: Vec<RaceEvent>,
    /// Last heart rate seen, if a strap was connected
    pub heart_rate_bpm: Option<u16>,
}

/// Everything a ride needs, built at startup.
pub struct Session {
    config: AppConfig,
    trainer: Box<dyn TrainerChannel>,
    heart_rate: Option<HeartRateMonitor<BtleTransport>>,
}

impl Session {
    /// Session over an already constructed trainer channel.
    pub fn new(config: AppConfig, trainer: Box<dyn TrainerChannel>) -> Self {
        Self {
            config,
            trainer,
            heart_rate: None,
        }
    }

    /// Session with the trainer backend chosen by `config`.
    pub fn from_config(config: AppConfig) -> Self {
        let settings = &config.trainer;
        let trainer: Box<dyn TrainerChannel> = match settings.backend {
            TrainerBackend::Synthetic => Box::new(SyntheticTrainer::new(
                settings.synthetic_values(),
                settings.synthetic_interval(),
            )),
            TrainerBackend::Hardware => Box::new(HardwareTrainer::ble(
                settings.transport_config(),
                settings.hardware_config(),
            )),
        };

        let heart_rate = settings
            .heart_rate
            .then(|| HeartRateMonitor::ble(settings.transport_config()));

        Self {
            heart_rate,
            ..Self::new(config, trainer)
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn trainer(&self) -> &dyn TrainerChannel {
        self.trainer.as_ref()
    }

    pub fn trainer_mut(&mut self) -> &mut dyn TrainerChannel {
        self.trainer.as_mut()
    }

    /// Raw trainer exchanges, when the backend keeps them.
    pub fn debug_log(&self) -> Option<String> {
        self.trainer.debug_log().map(|log| log.download_debug_log())
    }

    /// Race the configured ghost field on `course` until the rider finishes
    /// or `limit` of race time has passed.
    pub async fn run(
        &mut self,
        course: Arc<dyn Course>,
        limit: Duration,
    ) -> Result<RaceSummary, TrainerError> {
        let race_settings = self.config.race.clone();
        let roster = GhostRoster::new(
            self.config.rider.ftp,
            race_settings.difficulty,
            race_settings.seed,
        );
        let field = roster.generate(race_settings.ghost_count);

        let mut race = Race::new(course, self.config.rider.physics_config(), field)
            .with_power_hold(race_settings.power_hold);
        let mut sync = ResistanceSync::new(race_settings.resistance);

        let telemetry = telemetry_queue(self.trainer.as_mut());
        self.trainer.connect().await?;
        tracing::info!("{} ready: {}", self.trainer.name(), self.trainer.status());

        let bpm = Arc::new(AtomicU16::new(0));
        self.connect_heart_rate(bpm.clone()).await;

        tracing::info!(
            "Race start: {:.0} m against {} ghosts ({:?})",
            race.course_length_m(),
            race.ghosts().len(),
            race_settings.difficulty
        );

        let mut events = Vec::new();
        let mut ticker = tokio::time::interval(race_settings.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        let mut last_tick = Instant::now();
        let mut last_progress = Duration::ZERO;

        while race.elapsed_s() < limit.as_secs_f64() && !race.is_rider_finished() {
            ticker.tick().await;
            let now = Instant::now();
            let dt = now.duration_since(last_tick).as_secs_f64();
            last_tick = now;

            for frame in telemetry.try_iter() {
                race.ingest(&frame);
            }

            for event in race.tick(dt) {
                log_event(&event);
                events.push(event);
            }

            self.push_resistance(&race, &mut sync).await;

            let elapsed = Duration::from_secs_f64(race.elapsed_s());
            if elapsed >= last_progress + PROGRESS_LOG_INTERVAL {
                last_progress = elapsed;
                log_progress(&race.snapshot(), bpm.load(Ordering::Relaxed));
            }
        }

        self.shutdown().await;

        let heart_rate_bpm = match bpm.load(Ordering::Relaxed) {
            0 => None,
            value => Some(value),
        };

        Ok(RaceSummary {
            snapshot: race.snapshot(),
            events,
            heart_rate_bpm,
        })
    }

    async fn connect_heart_rate(&mut self, bpm: Arc<AtomicU16>) {
        let Some(monitor) = self.heart_rate.as_mut() else {
            return;
        };

        monitor.on_bpm(Box::new(move |value| bpm.store(value, Ordering::Relaxed)));
        if let Err(e) = monitor.connect().await {
            // Riding without heart rate is fine
            tracing::warn!("Continuing without heart rate: {}", e);
        }
    }

    async fn push_resistance(&self, race: &Race, sync: &mut ResistanceSync) {
        let Some(control) = self.trainer.resistance_control() else {
            return;
        };
        if !control.has_control() {
            return;
        }

        if let Some(params) = sync.update(race.rider_sim_params()) {
            if let Err(e) = control
                .set_simulation_params(params.grade, params.crr, params.cwa)
                .await
            {
                tracing::debug!("Resending simulation params next tick: {}", e);
                sync.reset();
            }
        }
    }

    /// Disconnect every device. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        self.trainer.disconnect().await;
        if let Some(monitor) = self.heart_rate.as_mut() {
            monitor.disconnect().await;
        }
    }
}

fn log_event(event: &RaceEvent) {
    match event {
        RaceEvent::GhostRespawned { .. } => tracing::debug!("{:?}", event),
        _ => tracing::info!("{:?}", event),
    }
}

fn log_progress(snapshot: &RaceSnapshot, bpm: u16) {
    let rider = &snapshot.rider;
    tracing::info!(
        "t={:.0}s pos {}/{} {:.0}/{:.0} m {:.1} km/h {:.0} W grade {:.1}% draft {:.0}%{}",
        snapshot.elapsed_s,
        snapshot.rider_position,
        snapshot.ghosts.len() + 1,
        rider.distance_m,
        snapshot.course_length_m,
        rider.velocity_ms * 3.6,
        rider.power_w,
        rider.grade * 100.0,
        rider.draft_factor * 100.0,
        if bpm > 0 {
            format!(" {} bpm", bpm)
        } else {
            String::new()
        }
    );
}
