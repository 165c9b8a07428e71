use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use crate::models::{
    normalize_skill_name, tidy_skill_name, Direction, NewDeclaration, NewSwapRequest, PublicProfile,
    Skill, SkillDeclaration, SkillId, SkillOffer, SwapRequest, SwapRequestStatus, UserId,
};
use crate::services::ledger::{verify_swap_request, LedgerError, SkillLedger, SkillRegistry};

type DeclarationKey = (UserId, SkillId, Direction);

#[derive(Debug, Default)]
struct LedgerState {
    skills: BTreeMap<SkillId, Skill>,
    declarations: BTreeMap<DeclarationKey, SkillDeclaration>,
    profiles: BTreeMap<UserId, PublicProfile>,
    swap_requests: Vec<SwapRequest>,
}

/// In-process ledger with the same semantics as the hosted tables
///
/// Used by tests, benchmarks and local runs without a backend.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
    unavailable: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read fail as if the backend were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Api {
                status: 503,
                message: "ledger unavailable".to_string(),
            });
        }
        Ok(())
    }

    /// Insert or replace a skill record
    pub async fn insert_skill(&self, skill: Skill) {
        self.state.write().await.skills.insert(skill.id.clone(), skill);
    }

    /// Insert or replace a profile
    pub async fn insert_profile(&self, profile: PublicProfile) {
        self.state.write().await.profiles.insert(profile.id.clone(), profile);
    }

    /// Record a declaration by skill id without resolving the skill
    ///
    /// The skill does not have to exist, which lets callers reproduce
    /// dangling references.
    pub async fn declare(&self, user_id: &str, skill_id: &str, direction: Direction) {
        let declaration = SkillDeclaration {
            user_id: user_id.to_string(),
            skill_id: skill_id.to_string(),
            direction,
            level: None,
            created_at: Some(chrono::Utc::now()),
        };
        self.state.write().await.declarations.insert(
            (user_id.to_string(), skill_id.to_string(), direction),
            declaration,
        );
    }

    /// Swap requests created so far, oldest first
    pub async fn swap_requests(&self) -> Vec<SwapRequest> {
        self.state.read().await.swap_requests.clone()
    }

    /// Look up a skill by case-insensitive name
    pub async fn find_skill_by_name(&self, name: &str) -> Option<Skill> {
        let key = normalize_skill_name(name);
        self.state
            .read()
            .await
            .skills
            .values()
            .find(|s| s.canonical_name() == key)
            .cloned()
    }
}

#[async_trait]
impl SkillLedger for InMemoryLedger {
    async fn skills_by_user_and_direction(
        &self,
        user_id: &str,
        direction: Direction,
    ) -> Result<BTreeSet<SkillId>, LedgerError> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .declarations
            .keys()
            .filter(|(user, _, dir)| user == user_id && *dir == direction)
            .map(|(_, skill, _)| skill.clone())
            .collect())
    }

    async fn offerers_of_skills(
        &self,
        skill_ids: &BTreeSet<SkillId>,
        excluding_user_id: &str,
    ) -> Result<Vec<SkillOffer>, LedgerError> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .declarations
            .keys()
            .filter(|(user, skill, dir)| {
                *dir == Direction::Offer && user != excluding_user_id && skill_ids.contains(skill)
            })
            .map(|(user, skill, _)| SkillOffer {
                user_id: user.clone(),
                skill_id: skill.clone(),
            })
            .collect())
    }

    async fn skills_by_ids(&self, skill_ids: &BTreeSet<SkillId>) -> Result<Vec<Skill>, LedgerError> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(skill_ids
            .iter()
            .filter_map(|id| state.skills.get(id).cloned())
            .collect())
    }

    async fn public_profile_summary(&self, user_id: &str) -> Result<Option<PublicProfile>, LedgerError> {
        self.check_available()?;
        Ok(self.state.read().await.profiles.get(user_id).cloned())
    }
}

#[async_trait]
impl SkillRegistry for InMemoryLedger {
    async fn declare_skill(&self, declaration: NewDeclaration) -> Result<SkillDeclaration, LedgerError> {
        self.check_available()?;
        let name = tidy_skill_name(&declaration.name);
        if name.is_empty() {
            return Err(LedgerError::InvalidInput("skill name is empty".to_string()));
        }
        let key = normalize_skill_name(&name);

        let mut state = self.state.write().await;

        let existing = state
            .skills
            .values()
            .find(|s| s.canonical_name() == key)
            .map(|s| s.id.clone());

        let skill_id = match existing {
            Some(id) => id,
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                state.skills.insert(
                    id.clone(),
                    Skill {
                        id: id.clone(),
                        name,
                        category: declaration.category.trim().to_string(),
                        description: declaration.description.clone(),
                    },
                );
                tracing::debug!("Created skill {} ({})", id, key);
                id
            }
        };

        let map_key = (declaration.user_id.clone(), skill_id.clone(), declaration.direction);
        if state.declarations.contains_key(&map_key) {
            return Err(LedgerError::Conflict(format!(
                "user {} already declared skill {} as {}",
                declaration.user_id, skill_id, declaration.direction
            )));
        }

        let record = SkillDeclaration {
            user_id: declaration.user_id,
            skill_id,
            direction: declaration.direction,
            level: declaration.level,
            created_at: Some(chrono::Utc::now()),
        };
        state.declarations.insert(map_key, record.clone());

        Ok(record)
    }

    async fn remove_declaration(
        &self,
        user_id: &str,
        skill_id: &str,
        direction: Direction,
    ) -> Result<bool, LedgerError> {
        self.check_available()?;
        let key = (user_id.to_string(), skill_id.to_string(), direction);
        Ok(self.state.write().await.declarations.remove(&key).is_some())
    }

    async fn create_swap_request(&self, request: NewSwapRequest) -> Result<SwapRequest, LedgerError> {
        self.check_available()?;
        verify_swap_request(self, &request).await?;

        let record = SwapRequest {
            id: uuid::Uuid::new_v4().to_string(),
            requester_id: request.requester_id,
            receiver_id: request.receiver_id,
            offered_skill_id: request.offered_skill_id,
            requested_skill_id: request.requested_skill_id,
            status: SwapRequestStatus::Pending,
            created_at: Some(chrono::Utc::now()),
        };
        self.state.write().await.swap_requests.push(record.clone());

        Ok(record)
    }

    async fn health_check(&self) -> Result<bool, LedgerError> {
        Ok(!self.unavailable.load(Ordering::SeqCst))
    }
}
