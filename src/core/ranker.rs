use std::cmp::Ordering;
use std::collections::BTreeMap;
use crate::models::{MatchCandidate, UserId};

/// Deduplicate and order scored candidates
///
/// This is the final stage of the matching pipeline. Each offering user
/// keeps only their best pair (highest score, then smallest
/// `(offered_skill_id, wanted_skill_id)`). The result is sorted by score
/// descending and then by user id ascending.
pub fn rank(scored: impl IntoIterator<Item = MatchCandidate>) -> Vec<MatchCandidate> {
    let mut best: BTreeMap<UserId, MatchCandidate> = BTreeMap::new();

    for candidate in scored {
        match best.get(&candidate.offering_user_id) {
            Some(current) if !beats(&candidate, current) => {}
            _ => {
                best.insert(candidate.offering_user_id.clone(), candidate);
            }
        }
    }

    let mut ranked: Vec<MatchCandidate> = best.into_values().collect();
    ranked.sort_by(|a, b| {
        b.compatibility_score
            .cmp(&a.compatibility_score)
            .then_with(|| a.offering_user_id.cmp(&b.offering_user_id))
    });
    ranked
}

/// Whether `challenger` should replace `current` for the same user
#[inline]
fn beats(challenger: &MatchCandidate, current: &MatchCandidate) -> bool {
    match challenger.compatibility_score.cmp(&current.compatibility_score) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => {
            (&challenger.offered_skill_id, &challenger.wanted_skill_id)
                < (&current.offered_skill_id, &current.wanted_skill_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(user: &str, offered: &str, wanted: &str, score: u8) -> MatchCandidate {
        MatchCandidate {
            offering_user_id: user.to_string(),
            requesting_user_id: "me".to_string(),
            offered_skill_id: offered.to_string(),
            wanted_skill_id: wanted.to_string(),
            compatibility_score: score,
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(rank(Vec::new()).is_empty());
    }

    #[test]
    fn test_keeps_best_pair_per_user() {
        let ranked = rank(vec![
            scored("c", "spanish", "guitar", 82),
            scored("c", "french", "guitar", 87),
            scored("a", "spanish", "guitar", 85),
        ]);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].offering_user_id, "c");
        assert_eq!(ranked[0].offered_skill_id, "french");
        assert_eq!(ranked[1].offering_user_id, "a");
    }

    #[test]
    fn test_equal_scores_pick_smallest_pair() {
        let ranked = rank(vec![
            scored("c", "spanish", "guitar", 85),
            scored("c", "french", "guitar", 85),
        ]);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].offered_skill_id, "french");
    }

    #[test]
    fn test_ties_ordered_by_user_id() {
        let ranked = rank(vec![
            scored("zed", "spanish", "guitar", 90),
            scored("amy", "spanish", "guitar", 90),
            scored("bob", "spanish", "guitar", 95),
        ]);

        let order: Vec<&str> = ranked.iter().map(|m| m.offering_user_id.as_str()).collect();
        assert_eq!(order, vec!["bob", "amy", "zed"]);
    }
}
