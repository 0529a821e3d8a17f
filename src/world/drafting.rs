//! Aerodynamic drafting model.
//!
//! Maps the longitudinal gap to the rider in front onto a drag-area
//! reduction for the trailing rider. Physics and any visual consumer must
//! both go through [`draft_factor`] so they never disagree.

/// Gap (meters) at or beyond which drafting gives no benefit.
pub const MAX_DISTANCE: f64 = 30.0;

/// Drag reduction when directly on the wheel in front.
pub const MAX_REDUCTION: f64 = 0.50;

/// Drag reduction just inside [`MAX_DISTANCE`].
pub const MIN_REDUCTION: f64 = 0.01;

/// Drag-reduction fraction for a rider `gap_m` meters behind another.
///
/// Returns 0 when the other rider is level or behind (`gap_m <= 0`) or too far
/// ahead (`gap_m >= MAX_DISTANCE`). Inside the window the benefit falls
/// linearly from [`MAX_REDUCTION`] to [`MIN_REDUCTION`].
pub fn draft_factor(gap_m: f64) -> f64 {
    // NaN fails both comparisons below, so reject it first
    if gap_m.is_nan() || gap_m <= 0.0 || gap_m >= MAX_DISTANCE {
        return 0.0;
    }

    MIN_REDUCTION + (MAX_REDUCTION - MIN_REDUCTION) * (1.0 - gap_m / MAX_DISTANCE)
}

/// Best draft available to an entity at `own_distance` among `others`.
///
/// Only entities ahead contribute; the result is the maximum factor, not a sum.
pub fn best_draft_factor<I>(own_distance: f64, others: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    others
        .into_iter()
        .map(|other| draft_factor(other - own_distance))
        .fold(0.0, f64::max)
}
