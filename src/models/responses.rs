use serde::{Deserialize, Serialize};
use crate::models::domain::{MatchListing, Skill, SkillDeclaration, SwapRequest, UserId};

/// Response for find matches endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindMatchesResponse {
    pub matches: Vec<MatchListing>,
    pub stats: MatchStats,
    /// Set when the user has not declared any skills yet
    pub onboarding: bool,
    pub total_candidates: usize,
    pub skipped_references: usize,
}

/// Summary figures shown above the match list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchStats {
    pub total: usize,
    pub average_compatibility: u8,
    pub perfect_matches: usize,
}

impl MatchStats {
    pub fn from_matches(matches: &[MatchListing]) -> Self {
        if matches.is_empty() {
            return Self::default();
        }

        let sum: u32 = matches
            .iter()
            .map(|m| m.candidate.compatibility_score as u32)
            .sum();
        let average = (sum as f64 / matches.len() as f64).round() as u8;

        Self {
            total: matches.len(),
            average_compatibility: average,
            perfect_matches: matches
                .iter()
                .filter(|m| m.candidate.compatibility_score >= 90)
                .count(),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
    #[serde(default)]
    pub retryable: bool,
}

/// Declare skill response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclareSkillResponse {
    pub declaration: SkillDeclaration,
}

/// Remove skill response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveSkillResponse {
    pub removed: bool,
}

/// Swap request response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRequestResponse {
    pub request: SwapRequest,
}

/// A user's declared skills, grouped by direction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSkillsResponse {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub offered: Vec<Skill>,
    pub wanted: Vec<Skill>,
}
