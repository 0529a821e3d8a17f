//! Course collaborator interface.
//!
//! Route generation lives outside this crate. The simulation only asks a
//! [`Course`] for the grade and surface under a given distance and maps the
//! surface to a rolling-resistance coefficient through a fixed table.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Road surface types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceType {
    #[default]
    Asphalt,
    Concrete,
    Cobblestone,
    Gravel,
    Dirt,
}

impl SurfaceType {
    /// Rolling-resistance coefficient for this surface.
    pub fn crr(&self) -> f64 {
        match self {
            SurfaceType::Asphalt => 0.004,
            SurfaceType::Concrete => 0.005,
            SurfaceType::Cobblestone => 0.008,
            SurfaceType::Gravel => 0.012,
            SurfaceType::Dirt => 0.018,
        }
    }
}

impl std::fmt::Display for SurfaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceType::Asphalt => write!(f, "Asphalt"),
            SurfaceType::Concrete => write!(f, "Concrete"),
            SurfaceType::Cobblestone => write!(f, "Cobblestone"),
            SurfaceType::Gravel => write!(f, "Gravel"),
            SurfaceType::Dirt => write!(f, "Dirt"),
        }
    }
}

/// What the road looks like at one point of the course.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CourseSample {
    /// Signed grade as rise/run
    pub grade: f64,
    pub surface: SurfaceType,
}

/// Anything that can describe the road under a distance.
pub trait Course: Send + Sync {
    /// Total length in meters; also the finish distance.
    fn length_m(&self) -> f64;

    /// Grade and surface at `distance_m`. Distances outside the course are
    /// clamped to its ends.
    fn sample(&self, distance_m: f64) -> CourseSample;
}

/// One constant-grade stretch of a [`SegmentedCourse`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CourseSegment {
    pub length_m: f64,
    pub grade: f64,
    #[serde(default)]
    pub surface: SurfaceType,
}

/// A course built from consecutive segments.
#[derive(Debug, Clone)]
pub struct SegmentedCourse {
    segments: Vec<CourseSegment>,
    /// Cumulative end distance of each segment
    ends: Vec<f64>,
}

/// Errors building a course.
#[derive(Debug, Error, PartialEq)]
pub enum CourseError {
    #[error("Course has no segments")]
    Empty,

    #[error("Segment {index} has invalid length {length}")]
    InvalidLength { index: usize, length: f64 },
}

impl SegmentedCourse {
    /// Build a course from its segments.
    pub fn new(segments: Vec<CourseSegment>) -> Result<Self, CourseError> {
        if segments.is_empty() {
            return Err(CourseError::Empty);
        }

        if let Some((index, segment)) = segments
            .iter()
            .enumerate()
            .find(|(_, s)| !(s.length_m.is_finite() && s.length_m > 0.0))
        {
            return Err(CourseError::InvalidLength {
                index,
                length: segment.length_m,
            });
        }

        Ok(Self::from_valid(segments))
    }

    fn from_valid(segments: Vec<CourseSegment>) -> Self {
        let ends = segments
            .iter()
            .scan(0.0, |total, segment| {
                *total += segment.length_m;
                Some(*total)
            })
            .collect();

        Self { segments, ends }
    }

    /// A single flat asphalt segment.
    pub fn flat(length_m: f64) -> Result<Self, CourseError> {
        Self::new(vec![CourseSegment {
            length_m,
            grade: 0.0,
            surface: SurfaceType::Asphalt,
        }])
    }

    /// Rolling demo course used by the CLI.
    pub fn demo() -> Self {
        let segments = vec![
            CourseSegment { length_m: 800.0, grade: 0.0, surface: SurfaceType::Asphalt },
            CourseSegment { length_m: 600.0, grade: 0.04, surface: SurfaceType::Asphalt },
            CourseSegment { length_m: 400.0, grade: 0.07, surface: SurfaceType::Concrete },
            CourseSegment { length_m: 700.0, grade: -0.05, surface: SurfaceType::Asphalt },
            CourseSegment { length_m: 500.0, grade: 0.01, surface: SurfaceType::Gravel },
            CourseSegment { length_m: 1000.0, grade: 0.0, surface: SurfaceType::Asphalt },
        ];
        Self::from_valid(segments)
    }

    pub fn segments(&self) -> &[CourseSegment] {
        &self.segments
    }

    fn segment_at(&self, distance_m: f64) -> &CourseSegment {
        let index = self.ends.partition_point(|&end| end <= distance_m);
        &self.segments[index.min(self.segments.len() - 1)]
    }
}

impl Course for SegmentedCourse {
    fn length_m(&self) -> f64 {
        self.ends.last().copied().unwrap_or(0.0)
    }

    fn sample(&self, distance_m: f64) -> CourseSample {
        let distance = if distance_m.is_nan() { 0.0 } else { distance_m.max(0.0) };
        let segment = self.segment_at(distance);
        CourseSample {
            grade: segment.grade,
            surface: segment.surface,
        }
    }
}
