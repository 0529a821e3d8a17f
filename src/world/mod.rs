//! Simulated world: course, physics, drafting and the ghost field.
//!
//! Nothing here knows about trainers or presentation. The race loop feeds
//! power in and reads kinematic state out.

pub mod drafting;
pub mod ghosts;
pub mod physics;
pub mod route;

pub use drafting::{best_draft_factor, draft_factor};
pub use ghosts::{GhostDifficulty, GhostRoster, GhostState, RacerProfile};
pub use physics::{acceleration, integrate, Kinematics, PhysicsConfig, RunModifiers};
pub use route::{Course, CourseSample, CourseSegment, SegmentedCourse, SurfaceType};
