use thiserror::Error;
use crate::models::{SkillId, UserId};
use crate::services::LedgerError;

/// Errors surfaced by the matching engine
#[derive(Debug, Error)]
pub enum MatchError {
    /// The user has neither offered nor wanted skills; callers should
    /// show onboarding instead of an empty match list
    #[error("user {user_id} has not declared any skills")]
    NoDeclaredSkills { user_id: UserId },

    /// A ledger read failed; the caller decides whether to retry
    #[error("skill ledger unavailable: {0}")]
    LedgerUnavailable(#[from] LedgerError),

    /// A declaration points at a skill id missing from the skills table
    #[error("user {user_id} declares unknown skill {skill_id}")]
    InconsistentSkillReference { user_id: UserId, skill_id: SkillId },
}

impl MatchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            MatchError::LedgerUnavailable(e) => e.is_retryable(),
            _ => false,
        }
    }
}
