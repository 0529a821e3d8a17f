//! Unit tests for the multi-agent race loop.

use std::sync::Arc;

use ghostride::racing::race::{
    PowerHoldPolicy, Race, RaceEvent, RESPAWN_BEHIND_M, RESPAWN_SPEED_FRACTION,
};
use ghostride::sensors::types::TelemetryFrame;
use ghostride::world::ghosts::{GhostState, RacerProfile};
use ghostride::world::drafting::{draft_factor, MAX_DISTANCE};
use ghostride::world::physics::{effective_cda, Kinematics, PhysicsConfig};
use ghostride::world::route::{Course, CourseSegment, SegmentedCourse, SurfaceType};

fn profile(id: u32, power_w: f64) -> RacerProfile {
    RacerProfile {
        id,
        name: format!("Ghost {}", id),
        flavor: "test".to_string(),
        power_w,
        mass_kg: 80.0,
        cda: 0.30,
        crr: 0.004,
        primary_color: [200, 50, 50],
        secondary_color: [255, 255, 255],
    }
}

fn flat(length: f64) -> Arc<dyn Course> {
    Arc::new(SegmentedCourse::flat(length).unwrap())
}

fn power(watts: i16) -> TelemetryFrame {
    TelemetryFrame {
        power_w: Some(watts),
        ..Default::default()
    }
}

fn respawns(events: &[RaceEvent]) -> Vec<(u32, f64, f64)> {
    events
        .iter()
        .filter_map(|e| match e {
            RaceEvent::GhostRespawned { ghost_id, from_m, to_m } => Some((*ghost_id, *from_m, *to_m)),
            _ => None,
        })
        .collect()
}

/// A ghost exactly 30m ahead leaves the drag area untouched; one just
/// inside reduces it by the drafting factor for that gap.
#[test]
fn test_rider_draft_at_thirty_meters() {
    let cda = PhysicsConfig::default().cda;

    let at_edge = vec![GhostState::new(profile(0, 0.0), 100.0 + MAX_DISTANCE, 0.0)];
    let mut race = Race::with_ghosts(flat(2000.0), PhysicsConfig::default(), at_edge)
        .with_rider_start(Kinematics { distance_m: 100.0, velocity_ms: 5.0 });
    race.tick(0.1);
    let rider = race.rider();
    assert_eq!(rider.draft_factor, 0.0);
    assert_eq!(effective_cda(&rider.physics, &rider.drafting_modifiers()), cda);

    let ahead = 100.0 + MAX_DISTANCE - 1e-6;
    let inside = vec![GhostState::new(profile(0, 0.0), ahead, 0.0)];
    let mut race = Race::with_ghosts(flat(2000.0), PhysicsConfig::default(), inside)
        .with_rider_start(Kinematics { distance_m: 100.0, velocity_ms: 5.0 });
    race.tick(0.1);
    let rider = race.rider();
    let factor = draft_factor(ahead - 100.0);
    assert!(factor > 0.0);
    assert_eq!(rider.draft_factor, factor);

    let drafted = effective_cda(&rider.physics, &rider.drafting_modifiers());
    assert!((drafted - cda * (1.0 - factor)).abs() < 1e-12);
    assert!(drafted < cda);
}

#[test]
fn test_snapshot_draft_matches_physics() {
    let ghosts = vec![
        GhostState::new(profile(0, 250.0), 105.0, 9.0),
        GhostState::new(profile(1, 250.0), 100.0, 9.0),
    ];
    let mut race = Race::with_ghosts(flat(5000.0), PhysicsConfig::default(), ghosts)
        .with_rider_start(Kinematics { distance_m: 90.0, velocity_ms: 9.0 });
    race.tick(0.1);

    let snapshot = race.snapshot();
    assert_eq!(snapshot.rider.draft_factor, race.rider().draft_factor);
    for (view, ghost) in snapshot.ghosts.iter().zip(race.ghosts()) {
        assert_eq!(view.draft_factor, ghost.draft_factor);
    }
    // Ghost 1 sits 5m behind ghost 0, the leader has nobody to follow
    assert!(snapshot.ghosts[1].draft_factor > 0.0);
    assert_eq!(snapshot.ghosts[0].draft_factor, 0.0);
}

#[test]
fn test_far_ahead_ghost_respawns_behind_rider() {
    let ghosts = vec![GhostState::new(profile(3, 200.0), 900.0, 4.0)];
    let mut race = Race::with_ghosts(flat(1000.0), PhysicsConfig::default(), ghosts)
        .with_rider_start(Kinematics { distance_m: 100.0, velocity_ms: 10.0 });

    let events = race.tick(0.1);
    let moved = respawns(&events);
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].0, 3);
    assert_eq!(moved[0].1, 900.0);

    let ghost = &race.ghosts()[0];
    let rider = race.rider();
    assert!(ghost.distance_m() < rider.distance_m());
    assert!(rider.distance_m() - ghost.distance_m() <= RESPAWN_BEHIND_M + 1.0);
    assert!(ghost.velocity_ms() >= RESPAWN_SPEED_FRACTION * 10.0 * 0.95);
}

#[test]
fn test_far_behind_ghost_respawns_near_rider() {
    let ghosts = vec![GhostState::new(profile(1, 200.0), 50.0, 2.0)];
    let mut race = Race::with_ghosts(flat(1000.0), PhysicsConfig::default(), ghosts)
        .with_rider_start(Kinematics { distance_m: 850.0, velocity_ms: 12.0 });

    let events = race.tick(0.1);
    let moved = respawns(&events);
    assert_eq!(moved.len(), 1);
    assert!(moved[0].2 > 800.0);
    assert!(race.ghosts()[0].distance_m() > 800.0);
}

#[test]
fn test_close_ghost_is_left_alone() {
    let ghosts = vec![GhostState::new(profile(1, 200.0), 700.0, 8.0)];
    let mut race = Race::with_ghosts(flat(1000.0), PhysicsConfig::default(), ghosts)
        .with_rider_start(Kinematics { distance_m: 0.0, velocity_ms: 0.0 });

    // 700m apart is inside 75% of the course
    assert!(respawns(&race.tick(0.1)).is_empty());
}

#[test]
fn test_finished_ghost_is_not_respawned() {
    let mut done = GhostState::new(profile(2, 200.0), 1000.0, 9.0);
    done.finished_at = Some(95.0);
    let mut race = Race::with_ghosts(flat(1000.0), PhysicsConfig::default(), vec![done])
        .with_rider_start(Kinematics { distance_m: 10.0, velocity_ms: 5.0 });

    for _ in 0..10 {
        assert!(respawns(&race.tick(0.1)).is_empty());
    }
    assert_eq!(race.ghosts()[0].distance_m(), 1000.0);
}

#[test]
fn test_rider_moves_on_telemetry_power() {
    let mut race = Race::new(flat(5000.0), PhysicsConfig::default(), vec![]);
    race.ingest(&power(250));
    for _ in 0..50 {
        race.ingest(&power(250));
        race.tick(0.1);
    }
    assert!(race.rider().velocity_ms() > 0.0);
    assert!(race.rider().distance_m() > 0.0);
}

#[test]
fn test_rider_coasts_to_stop_after_telemetry_loss() {
    let mut race = Race::new(flat(50_000.0), PhysicsConfig::default(), vec![])
        .with_power_hold(PowerHoldPolicy::DecayAfter { timeout_s: 2.0 });
    for _ in 0..300 {
        race.ingest(&power(300));
        race.tick(0.1);
    }
    let cruising = race.rider().velocity_ms();

    for _ in 0..600 {
        race.tick(0.1);
    }
    assert!(race.rider().velocity_ms() < cruising * 0.5);
}

#[test]
fn test_rider_finish_reports_position() {
    let ghosts = vec![
        GhostState::new(profile(0, 400.0), 190.0, 12.0),
        GhostState::new(profile(1, 0.0), 0.0, 0.0),
    ];
    let mut race = Race::with_ghosts(flat(200.0), PhysicsConfig::default(), ghosts)
        .with_power_hold(PowerHoldPolicy::HoldLast)
        .with_rider_start(Kinematics { distance_m: 150.0, velocity_ms: 10.0 });
    race.ingest(&power(300));

    let mut rider_finish = None;
    for _ in 0..200 {
        for event in race.tick(0.1) {
            if let RaceEvent::RiderFinished { time_s, position } = event {
                rider_finish = Some((time_s, position));
            }
        }
        if race.is_rider_finished() {
            break;
        }
    }

    let (time_s, position) = rider_finish.expect("rider should finish");
    assert_eq!(position, 2);
    assert!(time_s > 0.0 && time_s <= race.elapsed_s());
    assert!(race.ghosts()[0].finished_at.unwrap() < time_s);
}

#[test]
fn test_course_surface_sets_rolling_resistance() {
    let course = SegmentedCourse::new(vec![
        CourseSegment { length_m: 50.0, grade: 0.0, surface: SurfaceType::Asphalt },
        CourseSegment { length_m: 500.0, grade: 0.04, surface: SurfaceType::Cobblestone },
    ])
    .unwrap();
    let mut race = Race::new(Arc::new(course), PhysicsConfig::default(), vec![])
        .with_rider_start(Kinematics { distance_m: 60.0, velocity_ms: 5.0 });
    race.tick(0.1);

    let params = race.rider_sim_params();
    assert_eq!(params.grade, 0.04);
    assert_eq!(params.crr, SurfaceType::Cobblestone.crr());
    assert_eq!(race.snapshot().rider.surface, SurfaceType::Cobblestone);
}

#[test]
fn test_ghost_respawned_behind_finished_rider_still_finishes() {
    let ghosts = vec![GhostState::new(profile(4, 200.0), 200.0, 4.0)];
    let mut race = Race::with_ghosts(flat(1000.0), PhysicsConfig::default(), ghosts)
        .with_rider_start(Kinematics { distance_m: 1020.0, velocity_ms: 10.0 });

    let mut respawned = Vec::new();
    let mut finishes = 0;
    for _ in 0..600 {
        let events = race.tick(0.1);
        respawned.extend(respawns(&events));
        finishes += events
            .iter()
            .filter(|e| matches!(e, RaceEvent::GhostFinished { ghost_id: 4, .. }))
            .count();
    }

    assert_eq!(respawned.len(), 1);
    assert!(respawned[0].2 < 1000.0);
    assert_eq!(finishes, 1);

    let ghost = &race.ghosts()[0];
    assert!(ghost.finished_at.is_some());
    assert_eq!(ghost.distance_m(), 1000.0);
}

#[test]
fn test_ghost_placed_past_line_finishes_on_first_tick() {
    let ghosts = vec![
        GhostState::new(profile(0, 250.0), 1005.0, 9.0),
        GhostState::new(profile(1, 250.0), 990.0, 9.0),
    ];
    let mut race = Race::with_ghosts(flat(1000.0), PhysicsConfig::default(), ghosts)
        .with_rider_start(Kinematics { distance_m: 900.0, velocity_ms: 9.0 });

    let events = race.tick(0.1);
    assert_eq!(
        events.first(),
        Some(&RaceEvent::FirstFinisher { ghost_id: 0, time_s: 0.0 })
    );
    assert!(respawns(&events).is_empty());

    let placed = &race.ghosts()[0];
    assert_eq!(placed.finished_at, Some(0.0));
    assert_eq!(placed.distance_m(), 1000.0);

    // Frozen afterwards
    race.tick(0.1);
    assert_eq!(race.ghosts()[0].distance_m(), 1000.0);
}

#[test]
fn test_ghost_drafts_from_tick_start_positions() {
    // Ghost 1 is far behind and gets respawned this tick; ghost 0 drafts
    // the rider's tick-start position, not the respawned ghost
    let ghosts = vec![
        GhostState::new(profile(0, 200.0), 880.0, 9.0),
        GhostState::new(profile(1, 200.0), 10.0, 3.0),
    ];
    let mut race = Race::with_ghosts(flat(1000.0), PhysicsConfig::default(), ghosts)
        .with_rider_start(Kinematics { distance_m: 890.0, velocity_ms: 9.0 });

    let events = race.tick(0.1);
    assert_eq!(respawns(&events).len(), 1);
    assert_eq!(race.ghosts()[0].draft_factor, draft_factor(10.0));
}
