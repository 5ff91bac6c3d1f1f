mod common;

use affect_attack::config::RepairStrategy;
use affect_attack::gate::{AcceptanceGate, Rejection};
use common::{FixedSimilarity, ScriptedGrammar, issue, profiler};

#[tokio::test]
async fn unchanged_issue_count_means_no_repair() {
    let grammar = ScriptedGrammar::default()
        .with_issues("he go to school", vec![issue("AGR", "agreement", 3, 2, "goes")])
        .with_issues("he go to college", vec![issue("AGR", "agreement", 3, 2, "goes")]);
    let similarity = FixedSimilarity(0.95);
    let (_, profiler) = profiler();

    for strategy in [RepairStrategy::Multiset, RepairStrategy::Positional] {
        let gate = AcceptanceGate::new(&grammar, &similarity, &profiler, 0.8, strategy);
        let decision = gate.evaluate("he go to school", "he go to college").await.unwrap();
        assert_eq!(decision.repaired_text, "he go to college");
        // Neither sentence carries emotion, so the profile cannot move.
        assert!(!decision.accepted);
        assert_eq!(decision.rejection, Some(Rejection::UnchangedEmotion));
    }
}

#[tokio::test]
async fn only_introduced_issues_are_repaired() {
    let grammar = ScriptedGrammar::default()
        .with_issues("he go to hate", vec![issue("AGR", "agreement", 3, 2, "goes")])
        .with_issues(
            "he go to an love",
            vec![
                issue("AGR", "agreement", 3, 2, "goes"),
                issue("ART", "article", 9, 2, "a"),
            ],
        );
    let similarity = FixedSimilarity(0.95);
    let (_, profiler) = profiler();
    let gate = AcceptanceGate::new(&grammar, &similarity, &profiler, 0.8, RepairStrategy::Multiset);

    let decision = gate.evaluate("he go to hate", "he go to an love").await.unwrap();
    assert_eq!(decision.repaired_text, "he go to a love");
    assert!(decision.accepted);
}

#[tokio::test]
async fn repair_that_restores_the_original_is_rejected() {
    let grammar = ScriptedGrammar::default().with_issues(
        "i hate thiss",
        vec![issue("SPELL", "typo", 7, 5, "this")],
    );
    let similarity = FixedSimilarity(1.0);
    let (_, profiler) = profiler();
    let gate = AcceptanceGate::new(&grammar, &similarity, &profiler, 0.8, RepairStrategy::Multiset);

    let decision = gate.evaluate("i hate this", "i hate thiss").await.unwrap();
    assert_eq!(decision.repaired_text, "i hate this");
    assert_eq!(decision.rejection, Some(Rejection::RepairReverted));
}

#[tokio::test]
async fn dissimilar_candidates_are_rejected() {
    let grammar = ScriptedGrammar::default();
    let similarity = FixedSimilarity(0.6);
    let (_, profiler) = profiler();
    let gate = AcceptanceGate::new(&grammar, &similarity, &profiler, 0.8, RepairStrategy::Multiset);

    let decision = gate.evaluate("i love it", "i hate it").await.unwrap();
    assert!(!decision.accepted);
    assert_eq!(
        decision.rejection,
        Some(Rejection::DissimilarSentence { score: 0.6 })
    );
}

#[tokio::test]
async fn gate_is_idempotent() {
    let grammar = ScriptedGrammar::default().with_issues(
        "i hate an coffee",
        vec![issue("ART", "article", 7, 2, "a")],
    );
    let similarity = FixedSimilarity(0.9);
    let (_, profiler) = profiler();
    let gate = AcceptanceGate::new(&grammar, &similarity, &profiler, 0.8, RepairStrategy::Positional);

    let first = gate.evaluate("i love a coffee", "i hate an coffee").await.unwrap();
    let second = gate.evaluate("i love a coffee", "i hate an coffee").await.unwrap();
    assert_eq!(first, second);
    assert!(first.accepted);
    assert_eq!(first.repaired_text, "i hate a coffee");
}
