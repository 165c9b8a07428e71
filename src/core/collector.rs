use std::collections::BTreeSet;
use crate::models::{SkillId, SkillOffer, UserId};

/// Another user offering one of the skills the requesting user wants
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CandidateOffer {
    pub candidate_user_id: UserId,
    pub offered_skill_id: SkillId,
}

/// Collect candidates offering at least one wanted skill
///
/// This is Stage 1 of the matching pipeline. `offers` is the raw offer
/// listing from the ledger; it is narrowed to the wanted skills and the
/// requesting user's own rows are dropped. A candidate appears once per
/// wanted skill they offer. Output is ordered by candidate, then skill.
pub fn collect_candidates(
    user_id: &str,
    wanted_skill_ids: &BTreeSet<SkillId>,
    offers: impl IntoIterator<Item = SkillOffer>,
) -> Vec<CandidateOffer> {
    if wanted_skill_ids.is_empty() {
        return Vec::new();
    }

    let rows: BTreeSet<CandidateOffer> = offers
        .into_iter()
        .filter(|offer| offer.user_id != user_id)
        .filter(|offer| wanted_skill_ids.contains(&offer.skill_id))
        .map(|offer| CandidateOffer {
            candidate_user_id: offer.user_id,
            offered_skill_id: offer.skill_id,
        })
        .collect();

    rows.into_iter().collect()
}

/// Distinct candidate user ids in a collected listing
pub fn distinct_candidates(candidates: &[CandidateOffer]) -> BTreeSet<UserId> {
    candidates
        .iter()
        .map(|c| c.candidate_user_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(user: &str, skill: &str) -> SkillOffer {
        SkillOffer {
            user_id: user.to_string(),
            skill_id: skill.to_string(),
        }
    }

    fn set(items: &[&str]) -> BTreeSet<SkillId> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_wanted_set_collects_nothing() {
        let result = collect_candidates("me", &BTreeSet::new(), vec![offer("a", "spanish")]);
        assert!(result.is_empty());
    }

    #[test]
    fn test_self_rows_excluded() {
        let wanted = set(&["spanish"]);
        let result = collect_candidates(
            "me",
            &wanted,
            vec![offer("me", "spanish"), offer("a", "spanish")],
        );

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].candidate_user_id, "a");
    }

    #[test]
    fn test_only_wanted_skills_kept() {
        let wanted = set(&["spanish", "french"]);
        let result = collect_candidates(
            "me",
            &wanted,
            vec![
                offer("c", "french"),
                offer("c", "spanish"),
                offer("b", "piano"),
                offer("c", "spanish"),
            ],
        );

        assert_eq!(
            result,
            vec![
                CandidateOffer { candidate_user_id: "c".into(), offered_skill_id: "french".into() },
                CandidateOffer { candidate_user_id: "c".into(), offered_skill_id: "spanish".into() },
            ]
        );
        assert_eq!(distinct_candidates(&result).len(), 1);
    }
}
