//! End-to-end session scenarios against a scripted question source.

use std::sync::Arc;

use tokio_test::assert_ok;

use quizflow::testing::{well_formed_raw, MockOutcome, MockQuestionSource, RecordingStatsSink};
use quizflow::{
    validate, EngineConfig, PracticeSession, Question, TimingConfig, TopicParams,
};

fn params() -> TopicParams {
    TopicParams::Academic {
        college: "engineering".to_string(),
        department: "cse".to_string(),
        semester: "3".to_string(),
        subject: "dbms".to_string(),
        unit: "unit-2".to_string(),
    }
}

fn instant_cfg() -> EngineConfig {
    EngineConfig {
        timing: TimingConfig::instant(),
        ..EngineConfig::default()
    }
}

fn seed_batch(n: usize) -> Vec<Question> {
    let raw = (0..n).map(|i| well_formed_raw(&format!("seed-q{i}"))).collect();
    let questions = validate(raw, 1, false);
    assert_eq!(questions.len(), n);
    questions
}

#[tokio::test]
async fn happy_path_three_correct_of_ten() {
    let source = MockQuestionSource::new();
    let stats = RecordingStatsSink::new();
    let mut session = PracticeSession::start(
        Arc::new(source.clone()),
        params(),
        instant_cfg(),
        Some(seed_batch(10)),
        Some(Arc::new(stats.clone())),
    )
    .await
    .unwrap();

    // The mock's correct answer is always "a".
    for i in 0..10 {
        let choice = if i < 3 { "a" } else { "b" };
        let outcome = session.select_answer(choice).unwrap();
        assert_eq!(outcome.is_correct, i < 3);
        if i < 9 {
            session.advance().await.unwrap();
        }
    }

    let summary = session.end_session();
    assert_eq!(summary.total_questions, 10);
    assert_eq!(summary.correct_answers, 3);
    assert_eq!(summary.total_xp, 6);
    assert_eq!(summary.batches_completed, 1);
    assert_eq!(summary.events.len(), 10);
    assert!(summary
        .events
        .iter()
        .enumerate()
        .all(|(i, e)| e.question_index == i as u64));

    tokio::task::yield_now().await;
    assert_eq!(stats.total(), 6);
}

#[tokio::test]
async fn adaptive_trigger_sends_performance_payload() {
    let source = MockQuestionSource::new();
    let mut session = PracticeSession::start(
        Arc::new(source.clone()),
        params(),
        instant_cfg(),
        Some(seed_batch(10)),
        None,
    )
    .await
    .unwrap();

    // 8 mixed answers: 5 correct, 3 wrong. The cadence point at 8 forces a
    // fresh preload that must carry the digest.
    for i in 0..8 {
        session.select_answer(if i % 3 == 0 { "b" } else { "a" }).unwrap();
        session.advance().await.unwrap();
    }
    source.wait_for_calls(2).await;

    let adaptive = source
        .recorded_requests()
        .into_iter()
        .find(|r| r.is_adaptive())
        .expect("a preload request should include the performance digest");
    let digest = adaptive.performance.unwrap();
    assert!(digest.overall_accuracy > 0.0);
    assert!(!digest.by_topic.is_empty());

    // The engine also surfaces the one-shot adaptive notice.
    assert!(session.view().adaptive_notice);
    assert!(!session.view().adaptive_notice);
}

#[tokio::test]
async fn stuck_preload_recovers_without_user_intervention() {
    let source = MockQuestionSource::new()
        .with_outcome(MockOutcome::Fail)
        .with_batches(10);
    let mut session = PracticeSession::start(
        Arc::new(source.clone()),
        params(),
        instant_cfg(),
        Some(seed_batch(3)),
        None,
    )
    .await
    .unwrap();

    for _ in 0..3 {
        session.select_answer("a").unwrap();
        assert_ok!(session.advance().await);
    }

    // The failed first attempt was retried and the swap completed: we are
    // on batch 2 at position 0 with a fresh question.
    let view = session.view();
    assert_eq!(view.batch_number, 2);
    assert_eq!(view.position, 0);
    assert!(!view.waiting_for_batch);
    assert!(view.question.is_some());
    assert!(source.calls() >= 2);
}

#[tokio::test]
async fn questions_from_adaptive_batches_are_tagged() {
    let source = MockQuestionSource::new();
    let mut session = PracticeSession::start(
        Arc::new(source.clone()),
        params(),
        instant_cfg(),
        Some(seed_batch(10)),
        None,
    )
    .await
    .unwrap();

    // Answer the whole seed batch; by the cadence point the log holds ≥ 7
    // events, so the refreshed preload is adaptive.
    for _ in 0..10 {
        session.select_answer("a").unwrap();
        session.advance().await.unwrap();
    }

    let question = session.current_question().unwrap();
    assert_eq!(question.batch_number, 2);
    assert!(question.is_adaptive);
}

#[tokio::test]
async fn dispose_drops_pending_preload_completion() {
    let source = MockQuestionSource::new()
        .with_outcome(MockOutcome::HoldUntilReleased)
        .with_batches(10);
    let mut session = PracticeSession::start(
        Arc::new(source.clone()),
        params(),
        instant_cfg(),
        Some(seed_batch(10)),
        None,
    )
    .await
    .unwrap();

    // 7 answers; the trigger-index preload is parked inside the source.
    for _ in 0..7 {
        session.select_answer("a").unwrap();
        session.advance().await.unwrap();
    }
    source.wait_for_calls(1).await;

    session.dispose();
    source.release();
    tokio::task::yield_now().await;

    let summary = session.end_session();
    assert_eq!(summary.total_questions, 7);
    assert!(session.current_question().is_none());
    assert!(session.select_answer("a").is_none());
}

#[tokio::test]
async fn batch_numbers_stay_contiguous_across_swaps() {
    let source = MockQuestionSource::new().with_batches(2);
    let mut session = PracticeSession::start(
        Arc::new(source.clone()),
        params(),
        instant_cfg(),
        Some(seed_batch(2)),
        None,
    )
    .await
    .unwrap();

    let mut seen = Vec::new();
    for _ in 0..8 {
        let q = session.current_question().unwrap();
        seen.push(q.batch_number);
        session.select_answer("a").unwrap();
        session.advance().await.unwrap();
    }

    // 2-question batches: numbers go 1,1,2,2,3,3,4,4.
    let expected: Vec<u32> = (1..=4).flat_map(|n| [n, n]).collect();
    assert_eq!(seen, expected);
}
