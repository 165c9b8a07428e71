// Core algorithm exports
pub mod collector;
pub mod error;
pub mod matcher;
pub mod ranker;
pub mod reciprocity;
pub mod scoring;

pub use collector::{collect_candidates, distinct_candidates, CandidateOffer};
pub use error::MatchError;
pub use matcher::{Matcher, MatchResult};
pub use ranker::rank;
pub use reciprocity::{filter_reciprocal, reciprocal_overlap, ReciprocalCandidate};
pub use scoring::{calculate_compatibility, compatibility_label, ScoreInputs};
