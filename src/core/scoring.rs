use crate::models::ScoringWeights;

/// Everything the compatibility score depends on for one reciprocal pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreInputs {
    /// Offered and wanted skill share a category
    pub same_category: bool,
    /// Reciprocal interests beyond the single (offered, wanted) pair
    pub extra_overlap: usize,
    /// Candidate rating, 0-5 stars
    pub candidate_rating: f64,
    pub completed_swaps: u32,
}

/// Calculate a compatibility score (0-100) for a reciprocal pair
///
/// Scoring formula:
/// score = floor
///     + category_bonus                      # both skills in the same category
///     + min(extra_overlap * overlap_bonus, overlap_cap)
///     + rating_bonus * rating / 5           # rounded down
///     + swaps_bonus * min(swaps, saturation) / saturation
///
/// Every term is non-decreasing in its input, so more shared interest or
/// a better track record never lowers the score.
pub fn calculate_compatibility(inputs: &ScoreInputs, weights: &ScoringWeights) -> u8 {
    let category = if inputs.same_category {
        weights.category_bonus as u32
    } else {
        0
    };

    let total = weights.floor as u32
        + category
        + overlap_points(inputs.extra_overlap, weights)
        + rating_points(inputs.candidate_rating, weights)
        + swaps_points(inputs.completed_swaps, weights);

    total.min(100) as u8
}

/// Points for shared interests beyond the matched pair, capped
#[inline]
fn overlap_points(extra_overlap: usize, weights: &ScoringWeights) -> u32 {
    let raw = (extra_overlap as u64).saturating_mul(weights.overlap_bonus as u64);
    raw.min(weights.overlap_cap as u64) as u32
}

/// Points for candidate rating, linear over 0-5 stars
#[inline]
fn rating_points(rating: f64, weights: &ScoringWeights) -> u32 {
    if !rating.is_finite() {
        return 0;
    }
    let stars = rating.clamp(0.0, 5.0);
    (weights.rating_bonus as f64 * stars / 5.0).floor() as u32
}

/// Points for completed swaps, saturating at `swaps_saturation`
#[inline]
fn swaps_points(completed_swaps: u32, weights: &ScoringWeights) -> u32 {
    if weights.swaps_saturation == 0 {
        return if completed_swaps > 0 { weights.swaps_bonus as u32 } else { 0 };
    }
    let capped = completed_swaps.min(weights.swaps_saturation) as u64;
    (weights.swaps_bonus as u64 * capped / weights.swaps_saturation as u64) as u32
}

/// Presentation label for a score
pub fn compatibility_label(score: u8) -> &'static str {
    match score {
        90..=u8::MAX => "Perfect Match",
        80..=89 => "Great Match",
        _ => "Good Match",
    }
}
