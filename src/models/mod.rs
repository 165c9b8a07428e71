// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    normalize_skill_name, tidy_skill_name, Direction, MatchCandidate, MatchListing, NewDeclaration,
    NewSwapRequest, PublicProfile, ScoringWeights, Skill, SkillDeclaration, SkillId, SkillOffer,
    SwapRequest, SwapRequestStatus, UserId, UserSkills,
};
pub use requests::{CreateSwapRequestRequest, DeclareSkillRequest, FindMatchesRequest, RemoveSkillRequest};
pub use responses::{
    DeclareSkillResponse, ErrorResponse, FindMatchesResponse, HealthResponse, MatchStats,
    RemoveSkillResponse, SwapRequestResponse, UserSkillsResponse,
};
