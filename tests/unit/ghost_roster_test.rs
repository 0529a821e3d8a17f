//! Unit tests for ghost roster generation.

use ghostride::world::ghosts::{GhostDifficulty, GhostRoster, GhostState, JerseyPalette};

/// Test difficulty multipliers are ordered
#[test]
fn test_difficulty_ordering() {
    let levels = [
        GhostDifficulty::Easy,
        GhostDifficulty::Medium,
        GhostDifficulty::MatchUser,
        GhostDifficulty::Hard,
        GhostDifficulty::VeryHard,
    ];

    for pair in levels.windows(2) {
        assert!(pair[0].ftp_multiplier() < pair[1].ftp_multiplier());
    }
    assert_eq!(GhostDifficulty::MatchUser.ftp_multiplier(), 1.0);
}

#[test]
fn test_roster_powers_follow_difficulty() {
    let easy = GhostRoster::new(250, GhostDifficulty::Easy, 7).generate(6);
    let hard = GhostRoster::new(250, GhostDifficulty::VeryHard, 7).generate(6);

    let mean = |v: &[ghostride::world::ghosts::RacerProfile]| {
        v.iter().map(|p| p.power_w).sum::<f64>() / v.len() as f64
    };
    assert!(mean(&easy) < mean(&hard));
}

#[test]
fn test_roster_uses_palette_colors() {
    let field = GhostRoster::new(200, GhostDifficulty::Medium, 3).generate(10);

    for (i, profile) in field.iter().enumerate() {
        let palette = JerseyPalette::for_index(i);
        assert_eq!(profile.primary_color, palette.primary);
        assert_eq!(profile.secondary_color, palette.secondary);
        assert!(profile.name.contains(palette.team));
    }
}

#[test]
fn test_different_seeds_differ() {
    let a = GhostRoster::new(200, GhostDifficulty::Medium, 1).generate(4);
    let b = GhostRoster::new(200, GhostDifficulty::Medium, 2).generate(4);
    assert_ne!(a, b);
}

#[test]
fn test_ghost_state_seeds_physics_from_profile() {
    let profile = GhostRoster::new(200, GhostDifficulty::Medium, 5).generate(1).remove(0);
    let ghost = GhostState::new(profile.clone(), 25.0, -3.0);

    assert_eq!(ghost.physics.mass_kg, profile.mass_kg);
    assert_eq!(ghost.physics.cda, profile.cda);
    assert_eq!(ghost.distance_m(), 25.0);
    assert_eq!(ghost.velocity_ms(), 0.0);
    assert!(!ghost.is_finished());
}
