//! Rolling performance analysis.
//!
//! Reduces the tail of the answer-event log into a [`PerformanceDigest`]
//! that steers adaptive question generation. Pure and deterministic: same
//! window in, same digest out. Below the unlock threshold (7 events in the
//! whole session) no digest exists at all.
//!
//! Two caller profiles are in use and their constants intentionally differ:
//! the session-level check looks at the last 10 events with an 80% strong
//! cutoff, the preload path at the last 15 with 85%. Both are preserved as
//! distinct presets rather than unified.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::events::AnswerEvent;
use crate::question::Difficulty;

/// Events required in the session before any digest is computed.
pub const ADAPTIVE_UNLOCK_EVENTS: usize = 7;

/// Topics below this accuracy are weak, in every profile.
const WEAK_TOPIC_CUTOFF: f64 = 60.0;

/// Window size and thresholds for one analyzer call site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerProfile {
    /// Analysis window: the last `min(len, window)` events.
    pub window: usize,
    /// Accuracy at or above which a topic counts as strong.
    pub strong_threshold: f64,
    /// Overall accuracy above which Hard is recommended.
    pub hard_cutoff: f64,
    /// Overall accuracy above which Medium is recommended.
    pub medium_cutoff: f64,
}

impl AnalyzerProfile {
    /// Profile used by the in-session adaptive check.
    pub const SESSION: AnalyzerProfile = AnalyzerProfile {
        window: 10,
        strong_threshold: 80.0,
        hard_cutoff: 80.0,
        medium_cutoff: 60.0,
    };

    /// Profile used when building the digest for a batch preload.
    pub const PRELOAD: AnalyzerProfile = AnalyzerProfile {
        window: 15,
        strong_threshold: 85.0,
        hard_cutoff: 85.0,
        medium_cutoff: 65.0,
    };
}

/// Accuracy and timing aggregates for one topic or difficulty bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BucketStats {
    pub count: usize,
    pub correct: usize,
    /// correct / count × 100.
    pub accuracy: f64,
    pub average_time_seconds: f64,
}

/// Derived summary of recent performance. Recomputed on demand, never
/// persisted; rides inside adaptive generation requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceDigest {
    /// 0–100 over the analysis window.
    pub overall_accuracy: f64,
    pub average_time_seconds: f64,
    /// Accuracy < 60, ordered worst-first.
    pub weak_topics: Vec<String>,
    /// Accuracy ≥ profile threshold, ordered best-first.
    pub strong_topics: Vec<String>,
    pub recommended_difficulty: Difficulty,
    pub by_topic: BTreeMap<String, BucketStats>,
    pub by_difficulty: BTreeMap<Difficulty, BucketStats>,
}

/// Reduce the event log to a digest, or `None` below the unlock threshold.
///
/// Only the last `min(events.len(), profile.window)` events are considered;
/// the threshold check is against the whole session, not the window.
pub fn analyze(events: &[AnswerEvent], profile: &AnalyzerProfile) -> Option<PerformanceDigest> {
    if events.len() < ADAPTIVE_UNLOCK_EVENTS {
        return None;
    }

    let start = events.len().saturating_sub(profile.window);
    let window = &events[start..];
    let window_len = window.len();

    let correct = window.iter().filter(|e| e.is_correct).count();
    let overall_accuracy = correct as f64 / window_len as f64 * 100.0;
    let average_time_seconds =
        window.iter().map(|e| e.time_spent_seconds as f64).sum::<f64>() / window_len as f64;

    let mut by_topic: BTreeMap<String, BucketStats> = BTreeMap::new();
    let mut by_difficulty: BTreeMap<Difficulty, BucketStats> = BTreeMap::new();
    for event in window {
        accumulate(by_topic.entry(event.topic.clone()).or_default(), event);
        accumulate(by_difficulty.entry(event.difficulty).or_default(), event);
    }
    for stats in by_topic.values_mut() {
        finalize(stats);
    }
    for stats in by_difficulty.values_mut() {
        finalize(stats);
    }

    let mut weak_topics: Vec<(String, f64)> = by_topic
        .iter()
        .filter(|(_, s)| s.accuracy < WEAK_TOPIC_CUTOFF)
        .map(|(t, s)| (t.clone(), s.accuracy))
        .collect();
    weak_topics.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut strong_topics: Vec<(String, f64)> = by_topic
        .iter()
        .filter(|(_, s)| s.accuracy >= profile.strong_threshold)
        .map(|(t, s)| (t.clone(), s.accuracy))
        .collect();
    strong_topics.sort_by(|a, b| b.1.total_cmp(&a.1));

    let recommended_difficulty = if overall_accuracy > profile.hard_cutoff {
        Difficulty::Hard
    } else if overall_accuracy > profile.medium_cutoff {
        Difficulty::Medium
    } else {
        Difficulty::Easy
    };

    Some(PerformanceDigest {
        overall_accuracy,
        average_time_seconds,
        weak_topics: weak_topics.into_iter().map(|(t, _)| t).collect(),
        strong_topics: strong_topics.into_iter().map(|(t, _)| t).collect(),
        recommended_difficulty,
        by_topic,
        by_difficulty,
    })
}

fn accumulate(stats: &mut BucketStats, event: &AnswerEvent) {
    stats.count += 1;
    if event.is_correct {
        stats.correct += 1;
    }
    // average_time_seconds carries the running sum until finalize.
    stats.average_time_seconds += event.time_spent_seconds as f64;
}

fn finalize(stats: &mut BucketStats) {
    stats.accuracy = stats.correct as f64 / stats.count as f64 * 100.0;
    stats.average_time_seconds /= stats.count as f64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(topic: &str, difficulty: Difficulty, correct: bool, secs: u64) -> AnswerEvent {
        AnswerEvent {
            question_index: 0,
            topic: topic.to_string(),
            difficulty,
            is_correct: correct,
            time_spent_seconds: secs,
            selected_answer: correct.then(|| "x".to_string()),
            correct_answer: "x".to_string(),
            timestamp: Utc::now(),
            skipped: !correct && secs == 0,
            batch_index: 1,
        }
    }

    fn mixed(n: usize, correct_every: usize) -> Vec<AnswerEvent> {
        (0..n)
            .map(|i| event("General", Difficulty::Medium, i % correct_every == 0, 4))
            .collect()
    }

    #[test]
    fn below_threshold_yields_none() {
        for n in 0..ADAPTIVE_UNLOCK_EVENTS {
            assert!(analyze(&mixed(n, 2), &AnalyzerProfile::SESSION).is_none());
        }
    }

    #[test]
    fn overall_accuracy_is_exact_over_window() {
        // 10 events in window, 6 correct.
        let mut events = Vec::new();
        for i in 0..10 {
            events.push(event("General", Difficulty::Medium, i < 6, 5));
        }
        let digest = analyze(&events, &AnalyzerProfile::SESSION).unwrap();
        assert_eq!(digest.overall_accuracy, 60.0);
        assert_eq!(digest.average_time_seconds, 5.0);
    }

    #[test]
    fn window_takes_only_the_tail() {
        // 20 events: first 10 all wrong, last 10 all correct. SESSION looks
        // at the tail only.
        let mut events: Vec<AnswerEvent> =
            (0..10).map(|_| event("General", Difficulty::Easy, false, 3)).collect();
        events.extend((0..10).map(|_| event("General", Difficulty::Easy, true, 3)));
        let digest = analyze(&events, &AnalyzerProfile::SESSION).unwrap();
        assert_eq!(digest.overall_accuracy, 100.0);

        // PRELOAD sees 15: 5 wrong + 10 correct.
        let digest = analyze(&events, &AnalyzerProfile::PRELOAD).unwrap();
        assert!((digest.overall_accuracy - 10.0 / 15.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn weak_and_strong_partition_is_disjoint() {
        let mut events = Vec::new();
        // Algorithms: 1/4 correct → weak. Databases: 4/4 → strong.
        // Networking: 3/4 = 75% → neither.
        for i in 0..4 {
            events.push(event("Algorithms", Difficulty::Medium, i == 0, 6));
            events.push(event("Databases", Difficulty::Easy, true, 2));
            events.push(event("Networking", Difficulty::Hard, i != 0, 8));
        }
        let digest = analyze(&events, &AnalyzerProfile::PRELOAD).unwrap();
        assert!(digest.weak_topics.iter().any(|t| t == "Algorithms"));
        assert!(digest.strong_topics.iter().any(|t| t == "Databases"));
        for topic in &digest.weak_topics {
            assert!(!digest.strong_topics.contains(topic));
        }
        assert!(!digest.weak_topics.contains(&"Networking".to_string()));
        assert!(!digest.strong_topics.contains(&"Networking".to_string()));
    }

    #[test]
    fn weak_topics_sorted_worst_first() {
        let mut events = Vec::new();
        // A: 0/3, B: 1/3 — both weak, A first.
        for i in 0..3 {
            events.push(event("B", Difficulty::Medium, i == 0, 4));
            events.push(event("A", Difficulty::Medium, false, 4));
            events.push(event("C", Difficulty::Medium, true, 4));
        }
        let digest = analyze(&events, &AnalyzerProfile::PRELOAD).unwrap();
        assert_eq!(digest.weak_topics, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn recommended_difficulty_respects_profile_cutoffs() {
        // 11 events, only the first wrong: the SESSION window (last 10) is
        // all correct → Hard.
        let mut events = Vec::new();
        for i in 0..11 {
            events.push(event("General", Difficulty::Medium, i != 0, 4));
        }
        let session = analyze(&events, &AnalyzerProfile::SESSION).unwrap();
        assert_eq!(session.recommended_difficulty, Difficulty::Hard);

        // 7 events, 5 correct = 71.4%: Medium in both profiles.
        let mut seven = Vec::new();
        for i in 0..7 {
            seven.push(event("General", Difficulty::Medium, i < 5, 4));
        }
        let s = analyze(&seven, &AnalyzerProfile::SESSION).unwrap();
        assert_eq!(s.recommended_difficulty, Difficulty::Medium);

        // 7 events, 4 correct = 57.1% → Easy in both profiles.
        let mut low = Vec::new();
        for i in 0..7 {
            low.push(event("General", Difficulty::Medium, i < 4, 4));
        }
        assert_eq!(
            analyze(&low, &AnalyzerProfile::SESSION).unwrap().recommended_difficulty,
            Difficulty::Easy
        );
        assert_eq!(
            analyze(&low, &AnalyzerProfile::PRELOAD).unwrap().recommended_difficulty,
            Difficulty::Easy
        );
    }

    #[test]
    fn per_difficulty_buckets_aggregate() {
        let mut events = Vec::new();
        for _ in 0..4 {
            events.push(event("General", Difficulty::Easy, true, 2));
        }
        for _ in 0..4 {
            events.push(event("General", Difficulty::Hard, false, 10));
        }
        let digest = analyze(&events, &AnalyzerProfile::PRELOAD).unwrap();
        let easy = &digest.by_difficulty[&Difficulty::Easy];
        assert_eq!(easy.accuracy, 100.0);
        assert_eq!(easy.average_time_seconds, 2.0);
        let hard = &digest.by_difficulty[&Difficulty::Hard];
        assert_eq!(hard.accuracy, 0.0);
        assert_eq!(hard.average_time_seconds, 10.0);
    }

    #[test]
    fn deterministic_for_same_window() {
        let events = mixed(12, 3);
        let a = analyze(&events, &AnalyzerProfile::SESSION).unwrap();
        let b = analyze(&events, &AnalyzerProfile::SESSION).unwrap();
        assert_eq!(a, b);
    }
}
