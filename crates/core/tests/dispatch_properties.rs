use medbot_core::{
    dispatch, rank_candidates, DispatchOutcome, IntentCatalog, IntentEntry, ScoredCandidate,
    FALLBACK_RESPONSE,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn sample_catalog() -> IntentCatalog {
    IntentCatalog::from_entries(vec![
        IntentEntry::new(
            "fever",
            vec!["Take rest.".to_string(), "Stay hydrated.".to_string()],
        ),
        IntentEntry::new("cough", vec!["Try warm honey water.".to_string()])
            .with_aliases(vec!["cold".to_string()]),
        IntentEntry::new("flu", vec!["Get a flu test.".to_string()])
            .with_aliases(vec!["cold".to_string()]),
        IntentEntry::new("headache", vec!["Lie down in a dark room.".to_string()]),
    ])
    .expect("valid catalog")
}

fn score_vector(len: usize) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(0.0f32..=1.0, len)
}

proptest! {
    #[test]
    fn ranked_candidates_are_sorted_and_stable(scores in score_vector(5)) {
        let catalog = sample_catalog();
        let labels = catalog.tag_order().to_vec();
        prop_assert_eq!(labels.len(), 5);

        let ranked = rank_candidates(&labels, &scores, 0.25).unwrap();

        for pair in ranked.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
            if pair[0].score == pair[1].score {
                let first = labels.iter().position(|l| *l == pair[0].tag).unwrap();
                let second = labels.iter().position(|l| *l == pair[1].tag).unwrap();
                prop_assert!(first < second);
            }
        }
        for candidate in &ranked {
            prop_assert!(candidate.score > 0.25);
        }
        let expected = scores.iter().filter(|s| **s > 0.25).count();
        prop_assert_eq!(ranked.len(), expected);
    }

    #[test]
    fn scores_at_or_below_threshold_fall_back(
        scores in prop::collection::vec(0.0f32..=0.25, 5),
        seed in any::<u64>(),
    ) {
        let catalog = sample_catalog();
        let ranked = rank_candidates(catalog.tag_order(), &scores, 0.25).unwrap();
        prop_assert!(ranked.is_empty());

        let result = dispatch(&catalog, &ranked, &mut StdRng::seed_from_u64(seed));
        prop_assert_eq!(result.response, FALLBACK_RESPONSE);
        prop_assert_eq!(result.outcome, DispatchOutcome::NoConfidentIntent);
    }

    #[test]
    fn responses_come_from_the_matching_pool(
        scores in score_vector(5),
        seed in any::<u64>(),
    ) {
        let catalog = sample_catalog();
        let ranked = rank_candidates(catalog.tag_order(), &scores, 0.25).unwrap();
        let result = dispatch(&catalog, &ranked, &mut StdRng::seed_from_u64(seed));

        match ranked.first() {
            Some(top) => {
                let pool = catalog.lookup(&top.tag);
                prop_assert!(pool.contains(&result.response.as_str()));
            }
            None => prop_assert_eq!(result.response, FALLBACK_RESPONSE),
        }
    }

    #[test]
    fn seeded_dispatch_is_repeatable(seed in any::<u64>()) {
        let catalog = sample_catalog();
        let candidates = vec![ScoredCandidate { tag: "cold".to_string(), score: 0.7 }];

        let first = dispatch(&catalog, &candidates, &mut StdRng::seed_from_u64(seed));
        let second = dispatch(&catalog, &candidates, &mut StdRng::seed_from_u64(seed));
        prop_assert_eq!(first, second);
    }
}

#[test]
fn fever_example_only_returns_fever_responses() {
    let catalog = sample_catalog();
    let mut scores = vec![0.0; catalog.tag_order().len()];
    let fever = catalog
        .tag_order()
        .iter()
        .position(|label| label == "fever")
        .unwrap();
    scores[fever] = 0.9;

    let ranked = rank_candidates(catalog.tag_order(), &scores, 0.25).unwrap();
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..100 {
        let result = dispatch(&catalog, &ranked, &mut rng);
        assert!(
            result.response == "Take rest." || result.response == "Stay hydrated.",
            "unexpected response {}",
            result.response
        );
    }
}

#[test]
fn catalog_loads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("intents.json");
    std::fs::write(
        &path,
        r#"{"intents": [{"tag": "fever", "qtype": ["temperature"], "responses": ["Take rest."]}]}"#,
    )
    .unwrap();

    let catalog = IntentCatalog::from_path(&path).unwrap();
    assert_eq!(catalog.tag_order(), &["fever", "temperature"]);
    assert_eq!(catalog.lookup("temperature"), vec!["Take rest."]);
}
