use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{BTreeMap, BTreeSet};
use crate::core::{
    collector::{collect_candidates, distinct_candidates, CandidateOffer},
    error::MatchError,
    ranker::rank,
    reciprocity::{filter_reciprocal, reciprocal_overlap},
    scoring::{calculate_compatibility, compatibility_label, ScoreInputs},
};
use crate::models::{
    Direction, MatchCandidate, MatchListing, PublicProfile, ScoringWeights, Skill, SkillId, UserId,
};
use crate::services::{LedgerError, SkillLedger};

const DEFAULT_MAX_CONCURRENT_READS: usize = 16;

/// Result of the matching process
#[derive(Debug, Default)]
pub struct MatchResult {
    pub matches: Vec<MatchListing>,
    /// Distinct users offering at least one wanted skill
    pub total_candidates: usize,
    /// Declarations skipped because their skill record is missing
    pub skipped_references: usize,
}

/// Main matching orchestrator - implements the match discovery pipeline
///
/// # Pipeline Stages
/// 1. Candidate collection (who offers what I want)
/// 2. Reciprocity filtering (who wants what I offer)
/// 3. Compatibility scoring
/// 4. Deduplication and ranking
///
/// Every call reads fresh ledger state and keeps nothing between calls.
#[derive(Debug, Clone)]
pub struct Matcher {
    weights: ScoringWeights,
    max_concurrent_reads: usize,
}

impl Matcher {
    pub fn new(weights: ScoringWeights, max_concurrent_reads: usize) -> Self {
        Self {
            weights,
            max_concurrent_reads: max_concurrent_reads.max(1),
        }
    }

    pub fn with_default_weights() -> Self {
        Self::new(ScoringWeights::default(), DEFAULT_MAX_CONCURRENT_READS)
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Find reciprocal matches for a user
    ///
    /// # Arguments
    /// * `ledger` - Source of skill declarations and profiles
    /// * `user_id` - The requesting user
    /// * `limit` - Maximum number of matches to return
    ///
    /// # Returns
    /// Ranked matches, or `NoDeclaredSkills` when the user has declared
    /// nothing at all. A user missing either side gets an empty result.
    pub async fn find_matches(
        &self,
        ledger: &dyn SkillLedger,
        user_id: &str,
        limit: usize,
    ) -> Result<MatchResult, MatchError> {
        let (mut wanted, mut offered) = futures::try_join!(
            ledger.skills_by_user_and_direction(user_id, Direction::Want),
            ledger.skills_by_user_and_direction(user_id, Direction::Offer),
        )?;

        if wanted.is_empty() && offered.is_empty() {
            return Err(MatchError::NoDeclaredSkills {
                user_id: user_id.to_string(),
            });
        }
        if wanted.is_empty() || offered.is_empty() {
            tracing::debug!(
                "User {} wants {} and offers {} skills, reciprocity impossible",
                user_id,
                wanted.len(),
                offered.len()
            );
            return Ok(MatchResult::default());
        }

        // Every skill in a reciprocal pair comes from one of these two sets
        let referenced: BTreeSet<SkillId> = wanted.union(&offered).cloned().collect();
        let skills: BTreeMap<SkillId, Skill> = ledger
            .skills_by_ids(&referenced)
            .await?
            .into_iter()
            .map(|skill| (skill.id.clone(), skill))
            .collect();

        let skipped_references = drop_unknown_skills(user_id, &mut wanted, &skills)
            + drop_unknown_skills(user_id, &mut offered, &skills);

        if wanted.is_empty() || offered.is_empty() {
            return Ok(MatchResult {
                skipped_references,
                ..MatchResult::default()
            });
        }

        // Stage 1: candidate collection
        let offers = ledger.offerers_of_skills(&wanted, user_id).await?;
        let candidates = collect_candidates(user_id, &wanted, offers);
        let candidate_ids = distinct_candidates(&candidates);
        let total_candidates = candidate_ids.len();

        tracing::debug!(
            "Collected {} offers from {} candidates for {}",
            candidates.len(),
            total_candidates,
            user_id
        );

        if candidates.is_empty() {
            return Ok(MatchResult {
                total_candidates,
                skipped_references,
                ..MatchResult::default()
            });
        }

        // Stage 2: reciprocity, judged only once every wanted set has arrived
        let wanted_by_candidate = self.fetch_wanted_sets(ledger, &candidate_ids).await?;
        let reciprocal = filter_reciprocal(user_id, &offered, &candidates, &wanted_by_candidate);

        let survivors: BTreeSet<UserId> = reciprocal
            .iter()
            .map(|pair| pair.candidate_user_id.clone())
            .collect();
        let profiles = self.fetch_profiles(ledger, &survivors).await?;

        // Stage 3: scoring
        let offers_per_candidate = count_offers(&candidates);
        let scored = reciprocal.iter().filter_map(|pair| {
            let profile = profiles.get(&pair.candidate_user_id)?;
            let offered_skill = skills.get(&pair.offered_skill_id)?;
            let wanted_skill = skills.get(&pair.wanted_skill_id)?;

            let gives = offers_per_candidate
                .get(pair.candidate_user_id.as_str())
                .copied()
                .unwrap_or(0);
            let takes = wanted_by_candidate
                .get(&pair.candidate_user_id)
                .map(|wants| reciprocal_overlap(&offered, wants).count())
                .unwrap_or(0);

            let inputs = ScoreInputs {
                same_category: same_category(offered_skill, wanted_skill),
                extra_overlap: (gives + takes).saturating_sub(2),
                candidate_rating: profile.rating(),
                completed_swaps: profile.completed_swaps(),
            };

            Some(MatchCandidate {
                offering_user_id: pair.candidate_user_id.clone(),
                requesting_user_id: user_id.to_string(),
                offered_skill_id: pair.offered_skill_id.clone(),
                wanted_skill_id: pair.wanted_skill_id.clone(),
                compatibility_score: calculate_compatibility(&inputs, &self.weights),
            })
        });

        // Stage 4: dedup and rank
        let mut ranked = rank(scored);
        ranked.truncate(limit);

        let matches: Vec<MatchListing> = ranked
            .into_iter()
            .filter_map(|candidate| present(candidate, &skills, &profiles))
            .collect();

        Ok(MatchResult {
            matches,
            total_candidates,
            skipped_references,
        })
    }

    /// Fan out one wanted-set read per candidate and join them
    async fn fetch_wanted_sets(
        &self,
        ledger: &dyn SkillLedger,
        candidate_ids: &BTreeSet<UserId>,
    ) -> Result<BTreeMap<UserId, BTreeSet<SkillId>>, LedgerError> {
        stream::iter(candidate_ids.iter())
            .map(|id| async move {
                let wants = ledger
                    .skills_by_user_and_direction(id, Direction::Want)
                    .await?;
                Ok::<_, LedgerError>((id.clone(), wants))
            })
            .buffer_unordered(self.max_concurrent_reads)
            .try_collect()
            .await
    }

    /// Fan out profile reads for surviving candidates
    ///
    /// Candidates without a profile row are dropped, like the UI does.
    async fn fetch_profiles(
        &self,
        ledger: &dyn SkillLedger,
        candidate_ids: &BTreeSet<UserId>,
    ) -> Result<BTreeMap<UserId, PublicProfile>, LedgerError> {
        let fetched: Vec<(UserId, Option<PublicProfile>)> = stream::iter(candidate_ids.iter())
            .map(|id| async move {
                let profile = ledger.public_profile_summary(id).await?;
                Ok::<_, LedgerError>((id.clone(), profile))
            })
            .buffer_unordered(self.max_concurrent_reads)
            .try_collect()
            .await?;

        Ok(fetched
            .into_iter()
            .filter_map(|(id, profile)| match profile {
                Some(profile) => Some((id, profile)),
                None => {
                    tracing::warn!("Candidate {} has no profile, skipping", id);
                    None
                }
            })
            .collect())
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_default_weights()
    }
}

/// Remove skill ids with no skill record, returning how many were removed
fn drop_unknown_skills(
    user_id: &str,
    skill_ids: &mut BTreeSet<SkillId>,
    skills: &BTreeMap<SkillId, Skill>,
) -> usize {
    let before = skill_ids.len();
    skill_ids.retain(|skill_id| {
        let known = skills.contains_key(skill_id);
        if !known {
            let warning = MatchError::InconsistentSkillReference {
                user_id: user_id.to_string(),
                skill_id: skill_id.clone(),
            };
            tracing::warn!("Skipping declaration: {}", warning);
        }
        known
    });
    before - skill_ids.len()
}

fn count_offers(candidates: &[CandidateOffer]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for c in candidates {
        *counts.entry(c.candidate_user_id.as_str()).or_insert(0) += 1;
    }
    counts
}

#[inline]
fn same_category(a: &Skill, b: &Skill) -> bool {
    a.category.trim().eq_ignore_ascii_case(b.category.trim())
}

/// Attach display fields to a ranked candidate
fn present(
    candidate: MatchCandidate,
    skills: &BTreeMap<SkillId, Skill>,
    profiles: &BTreeMap<UserId, PublicProfile>,
) -> Option<MatchListing> {
    let profile = profiles.get(&candidate.offering_user_id)?;
    let offered = skills.get(&candidate.offered_skill_id)?;
    let wanted = skills.get(&candidate.wanted_skill_id)?;

    let name = if profile.name.trim().is_empty() {
        "Unknown User".to_string()
    } else {
        profile.name.clone()
    };

    Some(MatchListing {
        id: format!("{}-{}", candidate.offering_user_id, candidate.offered_skill_id),
        name,
        bio: profile.bio.clone().unwrap_or_default(),
        rating: profile.rating(),
        completed_swaps: profile.completed_swaps(),
        skill_offered: offered.name.clone(),
        skill_wanted: wanted.name.clone(),
        label: compatibility_label(candidate.compatibility_score).to_string(),
        candidate,
    })
}
