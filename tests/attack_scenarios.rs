mod common;

use affect_attack::attack::{AttackParams, AttackStrategy, NO_ATTACK_FOUND, attack_sentence};
use affect_attack::emotion::Emotion;
use affect_attack::error::AttackError;
use affect_attack::attack::AttackServices;
use affect_attack::lexicon::{AffectTable, Lexicon};
use affect_attack::profiler::{EmotionProfiler, NrcAffectSource};
use common::{FixedSimilarity, ScriptedEmbeddings, ScriptedGrammar, services};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;

#[tokio::test]
async fn emotional_text_swaps_the_most_tagged_word() {
    let grammar = Arc::new(ScriptedGrammar::default());
    let services = services(grammar.clone(), 0.9);
    let mut rng = StdRng::seed_from_u64(1);

    let record = attack_sentence(
        "i love this coffee shop",
        &services,
        &AttackParams::default(),
        &mut rng,
    )
    .await
    .unwrap();

    assert_eq!(record.strategy, AttackStrategy::Emotional);
    // "adore" keeps joy/trust and is rejected; "hate" moves the profile.
    assert_eq!(record.text_new(), "i hate this coffee shop");
    let sub = record.substitution.as_ref().unwrap();
    assert_eq!((sub.target.as_str(), sub.replacement.as_str()), ("love", "hate"));
    assert_eq!(record.candidates_tried, 2);

    let before = record.original_frequencies.unwrap();
    let after = record.new_frequencies.unwrap();
    assert_eq!(before.get(Emotion::Joy), 0.5);
    assert_eq!(after.get(Emotion::Anger), 0.5);
    assert_ne!(before, after);
    assert_eq!(
        record.original_dominant.emotions(),
        &[Emotion::Joy, Emotion::Trust]
    );
    assert_eq!(
        record.new_dominant.unwrap().emotions(),
        &[Emotion::Anger, Emotion::Disgust]
    );
    // Two grammar checks per candidate.
    assert_eq!(grammar.calls(), 4);
}

#[tokio::test]
async fn exhausted_search_yields_the_sentinel() {
    let services = services(Arc::new(ScriptedGrammar::default()), 0.5);
    let mut rng = StdRng::seed_from_u64(1);

    let record = attack_sentence(
        "i love this coffee shop",
        &services,
        &AttackParams::default(),
        &mut rng,
    )
    .await
    .unwrap();

    assert!(!record.attack_found());
    assert_eq!(record.text_new(), NO_ATTACK_FOUND);
    assert_eq!(record.text_new(), "No adversarial attack found.");
    assert!(record.new_frequencies.is_none());
    assert!(record.new_dominant.is_none());
    assert!(record.original_frequencies.is_some());
    assert_eq!(record.candidates_tried, 3);
}

#[tokio::test]
async fn emotionless_text_uses_the_shuffled_token_walk() {
    let services = services(Arc::new(ScriptedGrammar::default()), 0.9);

    for seed in 0..8 {
        let mut rng = StdRng::seed_from_u64(seed);
        let record = attack_sentence(
            "the weather is mild today",
            &services,
            &AttackParams::default(),
            &mut rng,
        )
        .await
        .unwrap();

        assert_eq!(record.strategy, AttackStrategy::NonEmotional);
        assert!(record.original_frequencies.is_none());
        assert!(record.original_dominant.is_empty());
        let sub = record.substitution.as_ref().unwrap();
        match sub.target.as_str() {
            "weather" => assert_eq!(record.text_new(), "the storm is mild today"),
            "mild" => assert_eq!(record.text_new(), "the weather is gentle today"),
            other => panic!("unexpected target {other}"),
        }
        assert!(record.new_frequencies.is_some());
    }
}

#[tokio::test]
async fn seeded_search_order_is_reproducible() {
    let services = services(Arc::new(ScriptedGrammar::default()), 0.9);
    let run = |seed| {
        let services = services.clone();
        async move {
            let mut rng = StdRng::seed_from_u64(seed);
            attack_sentence(
                "the weather is mild today",
                &services,
                &AttackParams::default(),
                &mut rng,
            )
            .await
            .unwrap()
        }
    };
    assert_eq!(run(42).await, run(42).await);
}

#[tokio::test]
async fn unknown_words_are_skipped_not_failed() {
    let services = services(Arc::new(ScriptedGrammar::default()), 0.9);
    let mut rng = StdRng::seed_from_u64(3);

    // Neither "hate" nor "quiet" has neighbours in the scripted space.
    let record = attack_sentence("quiet hate", &services, &AttackParams::default(), &mut rng)
        .await
        .unwrap();
    assert_eq!(record.strategy, AttackStrategy::Emotional);
    assert!(!record.attack_found());
    assert_eq!(record.candidates_tried, 0);
}

#[tokio::test]
async fn grammar_outage_aborts_instead_of_reporting_no_attack() {
    let grammar = Arc::new(ScriptedGrammar::default().failing_on("love"));
    let services = services(grammar, 0.9);
    let mut rng = StdRng::seed_from_u64(1);

    let err = attack_sentence(
        "i love this coffee shop",
        &services,
        &AttackParams::default(),
        &mut rng,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AttackError::Grammar { .. }));
    assert!(err.is_service_failure());
}

#[tokio::test]
async fn sentence_threshold_is_respected() {
    let services = services(Arc::new(ScriptedGrammar::default()), 0.85);
    let mut rng = StdRng::seed_from_u64(1);
    let strict = AttackParams {
        sentence_similarity: 0.9,
        ..AttackParams::default()
    };
    let record = attack_sentence("i love this coffee shop", &services, &strict, &mut rng)
        .await
        .unwrap();
    assert!(!record.attack_found());

    let lenient = AttackParams {
        sentence_similarity: 0.85,
        ..AttackParams::default()
    };
    let record = attack_sentence("i love this coffee shop", &services, &lenient, &mut rng)
        .await
        .unwrap();
    assert!(record.attack_found());
}

#[tokio::test]
async fn decomposed_accents_are_attacked_like_composed_ones() {
    let raw = "fianc\u{e9}\tjoy\t1\nfianc\u{e9}\ttrust\t1\nrival\tanger\t1\n";
    let table = Arc::new(AffectTable::from_reader(raw.as_bytes()).unwrap());
    let services = AttackServices {
        lexicon: Arc::new(Lexicon::from_table(&table)),
        profiler: EmotionProfiler::new(Arc::new(NrcAffectSource::new(table))),
        embeddings: Arc::new(ScriptedEmbeddings::new(vec![(
            "fianc\u{e9}",
            vec![("rival", 0.8)],
        )])),
        grammar: Arc::new(ScriptedGrammar::default()),
        similarity: Arc::new(FixedSimilarity(0.9)),
    };

    for input in ["my fianc\u{e9} loved it", "my fiance\u{301} loved it"] {
        let mut rng = StdRng::seed_from_u64(1);
        let record = attack_sentence(input, &services, &AttackParams::default(), &mut rng)
            .await
            .unwrap();
        assert_eq!(record.strategy, AttackStrategy::Emotional);
        assert_eq!(record.candidates_tried, 1);
        assert_eq!(record.text_new(), "my rival loved it");
        assert_eq!(record.original_text, "my fianc\u{e9} loved it");
    }
}
