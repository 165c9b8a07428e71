use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Profile identifier (the auth user id of the hosted backend)
pub type UserId = String;

/// Skill identifier (primary key of the `skills` table)
pub type SkillId = String;

/// Which side of a trade a declaration sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The user can teach or provide the skill
    Offer,
    /// The user wants to learn or receive the skill
    Want,
}

impl Direction {
    /// Value stored in the `user_skills.type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Offer => "offer",
            Direction::Want => "want",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "offer" | "offered" => Ok(Direction::Offer),
            "want" | "wanted" => Ok(Direction::Want),
            other => Err(format!("unknown skill direction: {}", other)),
        }
    }
}

/// Canonical skill record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: SkillId,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Skill {
    /// Dedup key for this skill's name, see [`normalize_skill_name`]
    pub fn canonical_name(&self) -> String {
        normalize_skill_name(&self.name)
    }
}

/// Normalize a skill name into its dedup key
///
/// "  Python   Programming " and "python programming" resolve to the same key.
pub fn normalize_skill_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Trim a user-supplied skill name for display and storage
pub fn tidy_skill_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A user's declaration that they offer or want a skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDeclaration {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    #[serde(rename = "skillId")]
    pub skill_id: SkillId,
    pub direction: Direction,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A single "user X offers skill Y" row from the ledger
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SkillOffer {
    pub user_id: UserId,
    pub skill_id: SkillId,
}

/// Display-safe projection of a profile, never carries the email column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicProfile {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(rename = "completedSwaps", alias = "completed_swaps", default)]
    pub completed_swaps: Option<i32>,
}

impl PublicProfile {
    /// Rating clamped to the 0-5 star range, defaulting to 0
    pub fn rating(&self) -> f64 {
        self.rating
            .filter(|r| r.is_finite())
            .unwrap_or(0.0)
            .clamp(0.0, 5.0)
    }

    /// Completed swaps, treating missing or negative counts as 0
    pub fn completed_swaps(&self) -> u32 {
        self.completed_swaps.unwrap_or(0).max(0) as u32
    }
}

/// A mutually compatible trade between two users
///
/// `offered_skill_id` is offered by the offering user and wanted by the
/// requesting user; `wanted_skill_id` is the reverse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCandidate {
    #[serde(rename = "userId")]
    pub offering_user_id: UserId,
    #[serde(rename = "requestingUserId")]
    pub requesting_user_id: UserId,
    #[serde(rename = "offeredSkillId")]
    pub offered_skill_id: SkillId,
    #[serde(rename = "wantedSkillId")]
    pub wanted_skill_id: SkillId,
    #[serde(rename = "compatibility")]
    pub compatibility_score: u8,
}

/// Ranked match enriched for presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchListing {
    pub id: String,
    #[serde(flatten)]
    pub candidate: MatchCandidate,
    pub name: String,
    pub bio: String,
    pub rating: f64,
    #[serde(rename = "completedSwaps")]
    pub completed_swaps: u32,
    #[serde(rename = "skillOffered")]
    pub skill_offered: String,
    #[serde(rename = "skillWanted")]
    pub skill_wanted: String,
    pub label: String,
}

/// A user's declared skills, split by direction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSkills {
    pub offered: Vec<Skill>,
    pub wanted: Vec<Skill>,
}

/// Status of a swap request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl SwapRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapRequestStatus::Pending => "pending",
            SwapRequestStatus::Accepted => "accepted",
            SwapRequestStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for SwapRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SwapRequestStatus::Pending),
            "accepted" => Ok(SwapRequestStatus::Accepted),
            "rejected" => Ok(SwapRequestStatus::Rejected),
            other => Err(format!("unknown swap request status: {}", other)),
        }
    }
}

/// Proposal to exchange skills with a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub id: String,
    #[serde(rename = "requesterId")]
    pub requester_id: UserId,
    #[serde(rename = "receiverId")]
    pub receiver_id: UserId,
    #[serde(rename = "offeredSkillId")]
    pub offered_skill_id: SkillId,
    #[serde(rename = "requestedSkillId")]
    pub requested_skill_id: SkillId,
    pub status: SwapRequestStatus,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Fields needed to create a swap request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSwapRequest {
    pub requester_id: UserId,
    pub receiver_id: UserId,
    pub offered_skill_id: SkillId,
    pub requested_skill_id: SkillId,
}

/// Fields needed to declare a skill by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeclaration {
    pub user_id: UserId,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub direction: Direction,
    pub level: Option<String>,
}

/// Compatibility scoring weights, all in score points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub floor: u8,
    pub category_bonus: u8,
    pub overlap_bonus: u8,
    pub overlap_cap: u8,
    pub rating_bonus: u8,
    pub swaps_bonus: u8,
    pub swaps_saturation: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            floor: 80,
            category_bonus: 5,
            overlap_bonus: 2,
            overlap_cap: 6,
            rating_bonus: 5,
            swaps_bonus: 5,
            swaps_saturation: 20,
        }
    }
}
