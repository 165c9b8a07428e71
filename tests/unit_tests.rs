// Unit tests for SkillSwap Match

use skillswap_match::core::{
    calculate_compatibility, collect_candidates, compatibility_label, distinct_candidates,
    filter_reciprocal, rank, ScoreInputs,
};
use skillswap_match::models::{MatchCandidate, ScoringWeights, SkillOffer};
use std::collections::{BTreeMap, BTreeSet};

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn offer(user: &str, skill: &str) -> SkillOffer {
    SkillOffer {
        user_id: user.to_string(),
        skill_id: skill.to_string(),
    }
}

fn candidate(user: &str, offered: &str, wanted: &str, score: u8) -> MatchCandidate {
    MatchCandidate {
        offering_user_id: user.to_string(),
        requesting_user_id: "me".to_string(),
        offered_skill_id: offered.to_string(),
        wanted_skill_id: wanted.to_string(),
        compatibility_score: score,
    }
}

fn inputs(rating: f64, swaps: u32) -> ScoreInputs {
    ScoreInputs {
        same_category: false,
        extra_overlap: 0,
        candidate_rating: rating,
        completed_swaps: swaps,
    }
}

#[test]
fn test_collector_empty_wanted_set() {
    let offers = vec![offer("a", "spanish")];
    assert!(collect_candidates("me", &BTreeSet::new(), offers).is_empty());
}

#[test]
fn test_collector_drops_self_and_unwanted() {
    let offers = vec![
        offer("me", "spanish"),
        offer("a", "spanish"),
        offer("a", "spanish"),
        offer("b", "cooking"),
    ];
    let collected = collect_candidates("me", &set(&["spanish"]), offers);

    assert_eq!(collected.len(), 1);
    assert_eq!(collected[0].candidate_user_id, "a");
    assert_eq!(distinct_candidates(&collected), set(&["a"]));
}

#[test]
fn test_reciprocity_requires_candidate_want() {
    let collected = collect_candidates(
        "me",
        &set(&["spanish"]),
        vec![offer("a", "spanish"), offer("b", "spanish")],
    );

    let mut wanted_by = BTreeMap::new();
    wanted_by.insert("a".to_string(), set(&["guitar"]));
    wanted_by.insert("b".to_string(), set(&["piano"]));

    let pairs = filter_reciprocal("me", &set(&["guitar"]), &collected, &wanted_by);

    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].candidate_user_id, "a");
    assert_eq!(pairs[0].offered_skill_id, "spanish");
    assert_eq!(pairs[0].wanted_skill_id, "guitar");
}

#[test]
fn test_reciprocity_with_empty_offered_set() {
    let collected = collect_candidates("me", &set(&["spanish"]), vec![offer("a", "spanish")]);
    let mut wanted_by = BTreeMap::new();
    wanted_by.insert("a".to_string(), set(&["guitar"]));

    assert!(filter_reciprocal("me", &BTreeSet::new(), &collected, &wanted_by).is_empty());
}

#[test]
fn test_score_bounds() {
    let weights = ScoringWeights::default();

    let lowest = calculate_compatibility(&inputs(0.0, 0), &weights);
    assert_eq!(lowest, weights.floor);

    let highest = calculate_compatibility(
        &ScoreInputs {
            same_category: true,
            extra_overlap: 50,
            candidate_rating: 5.0,
            completed_swaps: 1_000,
        },
        &weights,
    );
    assert!(highest <= 100);
    assert_eq!(highest, 100);
}

#[test]
fn test_score_monotonic_in_reputation() {
    let weights = ScoringWeights::default();
    let mut previous = 0;

    for step in 0..=50 {
        let rating = step as f64 / 10.0;
        let score = calculate_compatibility(&inputs(rating, step), &weights);
        assert!(score >= previous, "score dropped at step {}", step);
        previous = score;
    }
}

#[test]
fn test_score_overlap_is_capped() {
    let weights = ScoringWeights::default();
    let at_cap = ScoreInputs { extra_overlap: 3, ..inputs(0.0, 0) };
    let beyond = ScoreInputs { extra_overlap: 30, ..inputs(0.0, 0) };

    assert_eq!(
        calculate_compatibility(&at_cap, &weights),
        calculate_compatibility(&beyond, &weights)
    );
}

#[test]
fn test_labels() {
    assert_eq!(compatibility_label(100), "Perfect Match");
    assert_eq!(compatibility_label(90), "Perfect Match");
    assert_eq!(compatibility_label(85), "Great Match");
    assert_eq!(compatibility_label(42), "Good Match");
}

#[test]
fn test_rank_dedups_and_orders() {
    let ranked = rank(vec![
        candidate("b", "spanish", "guitar", 85),
        candidate("a", "french", "guitar", 85),
        candidate("a", "spanish", "guitar", 92),
        candidate("c", "spanish", "guitar", 81),
    ]);

    let order: Vec<(&str, u8)> = ranked
        .iter()
        .map(|m| (m.offering_user_id.as_str(), m.compatibility_score))
        .collect();
    assert_eq!(order, vec![("a", 92), ("b", 85), ("c", 81)]);
}

#[test]
fn test_rank_tie_prefers_smallest_skill_pair() {
    let ranked = rank(vec![
        candidate("a", "spanish", "guitar", 88),
        candidate("a", "french", "guitar", 88),
    ]);

    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].offered_skill_id, "french");
}

#[test]
fn test_rank_empty() {
    assert!(rank(Vec::new()).is_empty());
}
