//! SkillSwap Match - match discovery service for the SkillSwap marketplace
//!
//! Finds users whose offered skills satisfy what a user wants and who, in
//! turn, want something that user offers. Matches are scored, deduplicated
//! per candidate and ranked.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{MatchError, MatchResult, Matcher};
pub use models::{Direction, FindMatchesRequest, FindMatchesResponse, MatchCandidate, MatchListing, ScoringWeights};
pub use services::{InMemoryLedger, LedgerError, SkillLedger, SkillRegistry};
