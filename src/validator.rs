//! Question validation.
//!
//! The question source returns model-generated output; individual items can
//! be arbitrarily malformed. Validation is a total, order-preserving filter:
//! invalid items are dropped, never repaired, and nothing here can fail.

use std::collections::HashSet;

use tracing::debug;

use crate::question::{infer_topic, Question, RawQuestion};

pub const REQUIRED_OPTION_COUNT: usize = 4;

/// Filter a raw generation response down to well-formed questions.
///
/// An item is kept iff it has a non-empty prompt, exactly 4 distinct
/// options, a correct answer that is one of the options, an explanation,
/// and a difficulty. Relative order is preserved. `batch_number` and
/// `is_adaptive` tag every accepted question.
pub fn validate(raw: Vec<RawQuestion>, batch_number: u32, is_adaptive: bool) -> Vec<Question> {
    let total = raw.len();
    let questions: Vec<Question> = raw
        .into_iter()
        .filter_map(|item| to_question(item, batch_number, is_adaptive))
        .collect();

    if questions.len() < total {
        debug!(
            batch_number,
            kept = questions.len(),
            dropped = total - questions.len(),
            "dropped malformed questions from generation response"
        );
    }
    questions
}

fn to_question(raw: RawQuestion, batch_number: u32, is_adaptive: bool) -> Option<Question> {
    let text = raw.text.filter(|t| !t.trim().is_empty())?;
    let options = raw.options?;
    let correct_answer = raw.correct_answer?;
    let explanation = raw.explanation?;
    let difficulty = raw.difficulty?;

    if options.len() != REQUIRED_OPTION_COUNT {
        return None;
    }
    let distinct: HashSet<&str> = options.iter().map(String::as_str).collect();
    if distinct.len() != REQUIRED_OPTION_COUNT {
        return None;
    }
    if !options.contains(&correct_answer) {
        return None;
    }

    let topic = raw.topic.unwrap_or_else(|| infer_topic(&text));

    Some(Question {
        text,
        options,
        correct_answer,
        explanation,
        difficulty,
        hint: raw.hint,
        topic,
        is_adaptive,
        batch_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::Difficulty;

    fn well_formed(text: &str) -> RawQuestion {
        RawQuestion {
            text: Some(text.to_string()),
            options: Some(vec![
                "a".to_string(),
                "b".to_string(),
                "c".to_string(),
                "d".to_string(),
            ]),
            correct_answer: Some("b".to_string()),
            explanation: Some("because".to_string()),
            difficulty: Some(Difficulty::Medium),
            hint: None,
            topic: Some("Algorithms".to_string()),
        }
    }

    #[test]
    fn keeps_well_formed_drops_malformed_preserving_order() {
        let mut bad_options = well_formed("q2");
        bad_options.options = Some(vec!["a".into(), "b".into(), "c".into()]);
        let mut bad_answer = well_formed("q4");
        bad_answer.correct_answer = Some("z".to_string());

        let input = vec![
            well_formed("q1"),
            bad_options,
            well_formed("q3"),
            bad_answer,
            well_formed("q5"),
        ];
        let out = validate(input, 1, false);
        let texts: Vec<&str> = out.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, vec!["q1", "q3", "q5"]);
    }

    #[test]
    fn missing_field_is_invalid_not_an_error() {
        let mut missing = well_formed("q");
        missing.explanation = None;
        assert!(validate(vec![missing], 1, false).is_empty());
    }

    #[test]
    fn duplicate_options_are_invalid() {
        let mut dup = well_formed("q");
        dup.options = Some(vec!["a".into(), "a".into(), "c".into(), "d".into()]);
        assert!(validate(vec![dup], 1, false).is_empty());
    }

    #[test]
    fn five_options_are_invalid() {
        let mut five = well_formed("q");
        five.options = Some(vec![
            "a".into(),
            "b".into(),
            "c".into(),
            "d".into(),
            "e".into(),
        ]);
        assert!(validate(vec![five], 1, false).is_empty());
    }

    #[test]
    fn tags_batch_number_and_adaptive_flag() {
        let out = validate(vec![well_formed("q")], 7, true);
        assert_eq!(out[0].batch_number, 7);
        assert!(out[0].is_adaptive);
    }

    #[test]
    fn infers_topic_when_absent() {
        let mut untagged = well_formed("Which sort is stable?");
        untagged.topic = None;
        let out = validate(vec![untagged], 1, false);
        assert_eq!(out[0].topic, "Algorithms");
    }

    #[test]
    fn empty_prompt_is_invalid() {
        let blank = well_formed("  ");
        assert!(validate(vec![blank], 1, false).is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_raw() -> impl Strategy<Value = RawQuestion> {
            let field = proptest::option::of("[a-z]{0,8}".prop_map(String::from));
            (
                field.clone(),
                proptest::option::of(proptest::collection::vec(
                    "[a-d]{1,2}".prop_map(String::from),
                    0..6,
                )),
                field.clone(),
                field,
                proptest::option::of(prop_oneof![
                    Just(Difficulty::Easy),
                    Just(Difficulty::Medium),
                    Just(Difficulty::Hard),
                ]),
            )
                .prop_map(
                    |(text, options, correct_answer, explanation, difficulty)| RawQuestion {
                        text,
                        options,
                        correct_answer,
                        explanation,
                        difficulty,
                        hint: None,
                        topic: None,
                    },
                )
        }

        proptest! {
            // Total on arbitrary garbage, and output is an order-preserving
            // subsequence of the input.
            #[test]
            fn validate_never_panics_and_preserves_order(
                raws in proptest::collection::vec(arb_raw(), 0..20)
            ) {
                let out = validate(raws.clone(), 1, false);
                prop_assert!(out.len() <= raws.len());

                let input_texts: Vec<String> =
                    raws.iter().filter_map(|r| r.text.clone()).collect();
                let mut cursor = 0;
                for q in &out {
                    let found = input_texts[cursor..]
                        .iter()
                        .position(|t| *t == q.text);
                    prop_assert!(found.is_some());
                    cursor += found.unwrap() + 1;
                }
            }
        }
    }
}
