use std::collections::{BTreeMap, BTreeSet};
use crate::core::collector::CandidateOffer;
use crate::models::{SkillId, UserId};

/// A candidate offer paired with one skill the candidate wants back
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReciprocalCandidate {
    pub candidate_user_id: UserId,
    pub offered_skill_id: SkillId,
    pub wanted_skill_id: SkillId,
}

/// Skills `candidate_wants` has in common with what the requesting user offers
#[inline]
pub fn reciprocal_overlap<'a>(
    offered_skill_ids: &'a BTreeSet<SkillId>,
    candidate_wants: &'a BTreeSet<SkillId>,
) -> impl Iterator<Item = &'a SkillId> {
    candidate_wants.intersection(offered_skill_ids)
}

/// Keep only candidates who want something the requesting user offers
///
/// This is Stage 2 of the matching pipeline. Each surviving row carries
/// the lexicographically smallest skill id from the intersection of the
/// candidate's wanted set and `offered_skill_ids`, so repeated runs over
/// the same ledger state agree. Candidates missing from
/// `wanted_by_candidate` are treated as wanting nothing.
pub fn filter_reciprocal(
    user_id: &str,
    offered_skill_ids: &BTreeSet<SkillId>,
    candidates: &[CandidateOffer],
    wanted_by_candidate: &BTreeMap<UserId, BTreeSet<SkillId>>,
) -> Vec<ReciprocalCandidate> {
    if offered_skill_ids.is_empty() {
        return Vec::new();
    }

    candidates
        .iter()
        .filter(|c| c.candidate_user_id != user_id)
        .filter_map(|c| {
            let wants = wanted_by_candidate.get(&c.candidate_user_id)?;
            // BTreeSet iterates in order, so the first shared skill is the smallest
            let representative = reciprocal_overlap(offered_skill_ids, wants).next()?;

            Some(ReciprocalCandidate {
                candidate_user_id: c.candidate_user_id.clone(),
                offered_skill_id: c.offered_skill_id.clone(),
                wanted_skill_id: representative.clone(),
            })
        })
        .collect()
}
