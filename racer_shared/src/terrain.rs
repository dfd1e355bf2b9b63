//! Procedural terrain.
//!
//! The track is a 1D height profile: one integer sample per horizontal unit.
//! Server and client generate it from the same seed, so both sides agree on
//! the ground without shipping it on every update.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Track generation seed - same seed = same track.
pub const TERRAIN_SEED: u64 = 12345;
/// Number of samples in the profile.
pub const TERRAIN_LENGTH: usize = 8000;
pub const TERRAIN_FREQUENCY: f64 = 0.01;
pub const TERRAIN_AMPLITUDE: f64 = 120.0;
/// Maximum per-sample jitter, in either direction.
pub const TERRAIN_VARIANCE: i32 = 6;
pub const TERRAIN_BASE_HEIGHT: f64 = 380.0;

/// Generation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainParams {
    pub seed: u64,
    pub length: usize,
    pub frequency: f64,
    pub amplitude: f64,
    pub variance: i32,
    pub base_height: f64,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            seed: TERRAIN_SEED,
            length: TERRAIN_LENGTH,
            frequency: TERRAIN_FREQUENCY,
            amplitude: TERRAIN_AMPLITUDE,
            variance: TERRAIN_VARIANCE,
            base_height: TERRAIN_BASE_HEIGHT,
        }
    }
}

impl TerrainParams {
    pub fn generate(&self) -> TerrainProfile {
        generate(
            self.seed,
            self.length,
            self.frequency,
            self.amplitude,
            self.variance,
            self.base_height,
        )
    }

    /// The smooth curve a sample oscillates around, before jitter.
    pub fn baseline(&self, x: i32) -> f64 {
        self.base_height + self.amplitude * (f64::from(x) * self.frequency).sin()
    }
}

/// Generates a height profile.
///
/// A single RNG stream is seeded once and drawn in order of `x`, so the whole
/// profile is a function of `seed` and the shape parameters alone. ChaCha8 is
/// a fixed algorithm, so hosts built against different `rand` releases still
/// agree on the track.
pub fn generate(
    seed: u64,
    length: usize,
    frequency: f64,
    amplitude: f64,
    variance: i32,
    base_height: f64,
) -> TerrainProfile {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let variance = variance.abs();
    let points = (0..length)
        .map(|i| {
            let x = i as i32;
            let jitter = rng.gen_range(-variance..=variance);
            let y = base_height + amplitude * (f64::from(x) * frequency).sin() + f64::from(jitter);
            // `as` truncates toward zero.
            (x, y as i32)
        })
        .collect();
    TerrainProfile { points }
}

/// Ground contact information at a horizontal position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    /// Interpolated ground height (y grows downward).
    pub height: f64,
    /// Slope of the covering segment, in degrees.
    pub angle_deg: f64,
}

/// Ordered `(x, y)` samples describing the ground surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct TerrainProfile {
    points: Vec<(i32, i32)>,
}

impl TerrainProfile {
    pub fn from_points(points: Vec<(i32, i32)>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(i32, i32)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Largest horizontal position with a full segment to its right.
    pub fn max_x(&self) -> f64 {
        self.points.len().saturating_sub(2) as f64
    }

    /// Clamps `x` into the range covered by segments.
    pub fn clamp_x(&self, x: f64) -> f64 {
        x.clamp(0.0, self.max_x())
    }

    /// Raw sample height at an index, if it exists.
    pub fn height_at_index(&self, index: usize) -> Option<i32> {
        self.points.get(index).map(|&(_, y)| y)
    }

    /// Interpolated surface at `x`. Returns `None` for profiles with fewer
    /// than two points.
    pub fn surface_at(&self, x: f64) -> Option<Surface> {
        if self.points.len() < 2 {
            return None;
        }
        let x = self.clamp_x(x);
        let i = (x.floor() as usize).min(self.points.len() - 2);
        let (x0, y0) = self.points[i];
        let (x1, y1) = self.points[i + 1];

        let dx = f64::from(x1 - x0);
        let dy = f64::from(y1 - y0);
        let t = if dx == 0.0 {
            0.0
        } else {
            (x - f64::from(x0)) / dx
        };

        Some(Surface {
            height: f64::from(y0) + dy * t,
            angle_deg: dy.atan2(dx).to_degrees(),
        })
    }
}
