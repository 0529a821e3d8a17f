//! Ghost roster generation for a race encounter.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{GhostDifficulty, RacerProfile};
use crate::world::physics::{BIKE_MASS, DEFAULT_CRR};

/// Jersey palette for a ghost
#[derive(Debug, Clone)]
pub struct JerseyPalette {
    pub team: &'static str,
    pub primary: [u8; 3],
    pub secondary: [u8; 3],
}

const PALETTES: [JerseyPalette; 8] = [
    JerseyPalette { team: "Team Blue", primary: [0, 100, 200], secondary: [255, 255, 255] },
    JerseyPalette { team: "Team Red", primary: [200, 50, 50], secondary: [255, 255, 255] },
    JerseyPalette { team: "Team Green", primary: [50, 150, 50], secondary: [255, 255, 0] },
    JerseyPalette { team: "Team Yellow", primary: [255, 200, 0], secondary: [0, 0, 0] },
    JerseyPalette { team: "Team Orange", primary: [255, 130, 0], secondary: [0, 0, 0] },
    JerseyPalette { team: "Team Purple", primary: [100, 50, 150], secondary: [255, 255, 255] },
    JerseyPalette { team: "Team Pink", primary: [255, 100, 150], secondary: [0, 0, 0] },
    JerseyPalette { team: "Team Black", primary: [30, 30, 30], secondary: [255, 0, 0] },
];

const NAMES: [&str; 8] = [
    "Marta", "Joris", "Ilse", "Teodor", "Nadia", "Rune", "Petra", "Casimir",
];

const FLAVORS: [&str; 6] = [
    "Sits on wheels and sprints late",
    "Climbs like the road owes them money",
    "Time-trial specialist, hates company",
    "Never skips a group ride",
    "Rode here from the next valley",
    "Pacing off a very old power meter",
];

impl JerseyPalette {
    /// Palette for a roster slot
    pub fn for_index(index: usize) -> &'static JerseyPalette {
        &PALETTES[index % PALETTES.len()]
    }
}

/// Creates the ghosts for one encounter.
///
/// Generation is deterministic for a given seed so a race can be replayed.
#[derive(Debug, Clone)]
pub struct GhostRoster {
    /// Rider's FTP for difficulty calculation
    rider_ftp: u16,
    difficulty: GhostDifficulty,
    seed: u64,
}

impl GhostRoster {
    pub fn new(rider_ftp: u16, difficulty: GhostDifficulty, seed: u64) -> Self {
        Self {
            rider_ftp,
            difficulty,
            seed,
        }
    }

    /// Calculate target power for this difficulty
    pub fn target_power(&self) -> f64 {
        self.rider_ftp as f64 * self.difficulty.ftp_multiplier()
    }

    /// Generate `count` ghost profiles.
    pub fn generate(&self, count: usize) -> Vec<RacerProfile> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let target_power = self.target_power();

        (0..count)
            .map(|i| {
                let palette = JerseyPalette::for_index(i);
                // ±10% around the difficulty target
                let power_w = target_power * rng.gen_range(0.9..=1.1);
                let mass_kg = rng.gen_range(58.0..=85.0) + BIKE_MASS;
                let cda = rng.gen_range(0.28..=0.36);

                RacerProfile {
                    id: i as u32,
                    name: format!("{} ({})", NAMES[i % NAMES.len()], palette.team),
                    flavor: FLAVORS[rng.gen_range(0..FLAVORS.len())].to_string(),
                    power_w,
                    mass_kg,
                    cda,
                    crr: DEFAULT_CRR,
                    primary_color: palette.primary,
                    secondary_color: palette.secondary,
                }
            })
            .collect()
    }
}
