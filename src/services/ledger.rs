//! Ports to the hosted skill ledger
//!
//! The matching engine only reads through [`SkillLedger`]; the HTTP layer
//! writes through [`SkillRegistry`]. Each backend implements both.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use crate::models::{
    Direction, NewDeclaration, NewSwapRequest, PublicProfile, Skill, SkillDeclaration, SkillId,
    SkillOffer, SwapRequest, UserSkills,
};

/// Errors that can occur when talking to a ledger backend
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl LedgerError {
    /// Whether the failure is a backend fault the caller may retry
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Request(_) => true,
            LedgerError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::Protocol(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
                    | sqlx::Error::Database(_)
            ),
            LedgerError::Api { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }
}

/// Classify a PostgreSQL SQLSTATE that blames the caller's input
///
/// Class 22 (data exception) and class 23 (integrity constraint) are the
/// request's fault; a unique violation is a conflict. Both backends see the
/// same codes, PostgREST passes them through in its error body.
pub fn rejected_by_database(code: &str, message: impl Into<String>) -> Option<LedgerError> {
    match code {
        "23505" => Some(LedgerError::Conflict(message.into())),
        c if c.starts_with("22") || c.starts_with("23") => Some(LedgerError::InvalidInput(message.into())),
        _ => None,
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let rejected = db
                .code()
                .and_then(|code| rejected_by_database(&code, db.message()));
            if let Some(rejected) = rejected {
                return rejected;
            }
        }
        LedgerError::Database(err)
    }
}

/// Read operations the matching engine needs
#[async_trait]
pub trait SkillLedger: Send + Sync {
    /// Skill ids a user has declared in one direction
    async fn skills_by_user_and_direction(
        &self,
        user_id: &str,
        direction: Direction,
    ) -> Result<BTreeSet<SkillId>, LedgerError>;

    /// Offer rows for any of `skill_ids`, excluding one user's own rows
    async fn offerers_of_skills(
        &self,
        skill_ids: &BTreeSet<SkillId>,
        excluding_user_id: &str,
    ) -> Result<Vec<SkillOffer>, LedgerError>;

    /// Skill records for the given ids; unknown ids are simply absent
    async fn skills_by_ids(&self, skill_ids: &BTreeSet<SkillId>) -> Result<Vec<Skill>, LedgerError>;

    /// Display-safe profile fields, `None` when the profile does not exist
    async fn public_profile_summary(&self, user_id: &str) -> Result<Option<PublicProfile>, LedgerError>;
}

/// Write operations behind the skill and swap request endpoints
#[async_trait]
pub trait SkillRegistry: Send + Sync {
    /// Resolve (or lazily create) the skill by name and declare it for the user
    async fn declare_skill(&self, declaration: NewDeclaration) -> Result<SkillDeclaration, LedgerError>;

    /// Delete one declaration, returning whether anything was removed
    async fn remove_declaration(
        &self,
        user_id: &str,
        skill_id: &str,
        direction: Direction,
    ) -> Result<bool, LedgerError>;

    /// Insert a pending swap request
    async fn create_swap_request(&self, request: NewSwapRequest) -> Result<SwapRequest, LedgerError>;

    async fn health_check(&self) -> Result<bool, LedgerError>;
}

/// Check that both sides of a proposed swap are currently declared
///
/// The requester must offer `offered_skill_id` and the receiver must
/// offer `requested_skill_id`.
pub async fn verify_swap_request<L: SkillLedger + ?Sized>(
    ledger: &L,
    request: &NewSwapRequest,
) -> Result<(), LedgerError> {
    if request.requester_id == request.receiver_id {
        return Err(LedgerError::InvalidInput(
            "cannot request a swap with yourself".to_string(),
        ));
    }

    let (requester_offers, receiver_offers) = futures::try_join!(
        ledger.skills_by_user_and_direction(&request.requester_id, Direction::Offer),
        ledger.skills_by_user_and_direction(&request.receiver_id, Direction::Offer),
    )?;

    if !requester_offers.contains(&request.offered_skill_id) {
        return Err(LedgerError::InvalidInput(format!(
            "user {} does not offer skill {}",
            request.requester_id, request.offered_skill_id
        )));
    }
    if !receiver_offers.contains(&request.requested_skill_id) {
        return Err(LedgerError::InvalidInput(format!(
            "user {} does not offer skill {}",
            request.receiver_id, request.requested_skill_id
        )));
    }

    Ok(())
}

/// A user's offered and wanted skills with their records, ordered by name
///
/// Declarations whose skill row is missing are left out.
pub async fn list_user_skills<L: SkillLedger + ?Sized>(
    ledger: &L,
    user_id: &str,
) -> Result<UserSkills, LedgerError> {
    let (offered, wanted) = futures::try_join!(
        ledger.skills_by_user_and_direction(user_id, Direction::Offer),
        ledger.skills_by_user_and_direction(user_id, Direction::Want),
    )?;

    let ids: BTreeSet<SkillId> = offered.union(&wanted).cloned().collect();
    let skills: BTreeMap<SkillId, Skill> = ledger
        .skills_by_ids(&ids)
        .await?
        .into_iter()
        .map(|skill| (skill.id.clone(), skill))
        .collect();

    let resolve = |ids: &BTreeSet<SkillId>| {
        let mut resolved: Vec<Skill> = ids
            .iter()
            .filter_map(|id| {
                let skill = skills.get(id).cloned();
                if skill.is_none() {
                    tracing::warn!("User {} declares unknown skill {}", user_id, id);
                }
                skill
            })
            .collect();
        resolved.sort_by(|a, b| {
            a.canonical_name()
                .cmp(&b.canonical_name())
                .then_with(|| a.id.cmp(&b.id))
        });
        resolved
    };

    Ok(UserSkills {
        offered: resolve(&offered),
        wanted: resolve(&wanted),
    })
}
