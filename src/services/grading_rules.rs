//! Correctness rules for each question type.
//!
//! Everything here is pure: the same question snapshot and submission always
//! grade the same way.

use std::collections::BTreeSet;

use serde_json::Value;
use thiserror::Error;

use crate::db::models::AnswerOption;
use crate::db::types::QuestionType;

/// A submitted value, interpreted through the type of the question it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SubmittedAnswer {
    /// One option id (`true_false`, `single_choice`).
    Choice(String),
    /// A set of option ids (`multiple_choice`).
    Choices(Vec<String>),
    /// Free text (`fill_blank`).
    Text(String),
}

impl SubmittedAnswer {
    /// Returns `None` for absent values and shapes that do not fit the type.
    pub(crate) fn resolve(question_type: QuestionType, raw: Option<&Value>) -> Option<Self> {
        let raw = raw?;
        match question_type {
            QuestionType::TrueFalse | QuestionType::SingleChoice => {
                scalar_text(raw).filter(|value| !value.trim().is_empty()).map(Self::Choice)
            }
            QuestionType::MultipleChoice => {
                let items = raw.as_array()?;
                items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .map(Self::Choices)
            }
            QuestionType::FillBlank => {
                scalar_text(raw).filter(|value| !value.trim().is_empty()).map(Self::Text)
            }
        }
    }
}

fn scalar_text(raw: &Value) -> Option<String> {
    match raw {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GradeOutcome {
    pub(crate) is_correct: bool,
    pub(crate) points_awarded: f64,
}

impl GradeOutcome {
    fn incorrect() -> Self {
        Self { is_correct: false, points_awarded: 0.0 }
    }
}

pub(crate) fn grade(
    question_type: QuestionType,
    options: &[AnswerOption],
    points: f64,
    submitted: Option<&SubmittedAnswer>,
) -> GradeOutcome {
    let Some(submitted) = submitted else {
        return GradeOutcome::incorrect();
    };

    let is_correct = match (question_type, submitted) {
        (QuestionType::TrueFalse | QuestionType::SingleChoice, SubmittedAnswer::Choice(id)) => {
            let wanted = normalize(id);
            options.iter().any(|option| option.is_correct && normalize(&option.id) == wanted)
        }
        (QuestionType::MultipleChoice, SubmittedAnswer::Choices(ids)) => {
            let expected: BTreeSet<String> = options
                .iter()
                .filter(|option| option.is_correct)
                .map(|option| normalize(&option.id))
                .collect();
            let provided: BTreeSet<String> = ids.iter().map(|id| normalize(id)).collect();
            // Repeated ids make the answer incorrect.
            !expected.is_empty() && provided.len() == ids.len() && expected == provided
        }
        (QuestionType::FillBlank, SubmittedAnswer::Text(text)) => {
            let wanted = normalize(text);
            options.iter().any(|option| option.is_correct && normalize(&option.text) == wanted)
        }
        _ => false,
    };

    if is_correct {
        GradeOutcome { is_correct: true, points_awarded: points }
    } else {
        GradeOutcome::incorrect()
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum AnswerConfigError {
    #[error("{question_type} requires {expected} answer options, got {actual}")]
    OptionCount { question_type: &'static str, expected: &'static str, actual: usize },
    #[error("{question_type} requires {expected} correct options, got {actual}")]
    CorrectCount { question_type: &'static str, expected: &'static str, actual: usize },
    #[error("answer option text must not be empty")]
    EmptyOptionText,
    #[error("answer option ids must be unique")]
    DuplicateOptionId,
}

/// Checks that the options' count and correctness distribution fit the type.
pub(crate) fn check_answer_configuration(
    question_type: QuestionType,
    options: &[AnswerOption],
) -> Result<(), AnswerConfigError> {
    if options.iter().any(|option| option.text.trim().is_empty()) {
        return Err(AnswerConfigError::EmptyOptionText);
    }

    let unique_ids: BTreeSet<String> = options.iter().map(|option| normalize(&option.id)).collect();
    if unique_ids.len() != options.len() {
        return Err(AnswerConfigError::DuplicateOptionId);
    }

    let total = options.len();
    let correct = options.iter().filter(|option| option.is_correct).count();
    let name = question_type.as_str();

    let (count_ok, count_rule, correct_ok, correct_rule) = match question_type {
        QuestionType::TrueFalse => (total == 2, "exactly 2", correct == 1, "exactly 1"),
        QuestionType::SingleChoice => {
            ((2..=6).contains(&total), "2 to 6", correct == 1, "exactly 1")
        }
        QuestionType::MultipleChoice => {
            ((2..=6).contains(&total), "2 to 6", correct >= 1, "at least 1")
        }
        QuestionType::FillBlank => (total >= 1, "at least 1", correct == total, "all"),
    };

    if !count_ok {
        return Err(AnswerConfigError::OptionCount {
            question_type: name,
            expected: count_rule,
            actual: total,
        });
    }
    if !correct_ok {
        return Err(AnswerConfigError::CorrectCount {
            question_type: name,
            expected: correct_rule,
            actual: correct,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn option(id: &str, text: &str, is_correct: bool) -> AnswerOption {
        AnswerOption { id: id.to_string(), text: text.to_string(), is_correct, explanation: None }
    }

    fn grade_raw(question_type: QuestionType, options: &[AnswerOption], raw: Option<Value>) -> bool {
        let submitted = SubmittedAnswer::resolve(question_type, raw.as_ref());
        grade(question_type, options, 5.0, submitted.as_ref()).is_correct
    }

    #[test]
    fn true_false_matches_option_id_case_insensitively() {
        let options = [option("T1", "True", true), option("F1", "False", false)];

        assert!(grade_raw(QuestionType::TrueFalse, &options, Some(json!("t1"))));
        assert!(grade_raw(QuestionType::TrueFalse, &options, Some(json!(" T1 "))));
        assert!(!grade_raw(QuestionType::TrueFalse, &options, Some(json!("F1"))));
        assert!(!grade_raw(QuestionType::TrueFalse, &options, Some(Value::Null)));
        assert!(!grade_raw(QuestionType::TrueFalse, &options, None));
    }

    #[test]
    fn single_choice_rejects_wrong_shapes() {
        let options = [option("opt1", "A", true), option("opt2", "B", false)];

        assert!(grade_raw(QuestionType::SingleChoice, &options, Some(json!("OPT1"))));
        assert!(!grade_raw(QuestionType::SingleChoice, &options, Some(json!(["opt1"]))));
        assert!(!grade_raw(QuestionType::SingleChoice, &options, Some(json!({"id": "opt1"}))));
        assert!(!grade_raw(QuestionType::SingleChoice, &options, Some(json!(""))));
    }

    #[test]
    fn multiple_choice_requires_exact_set() {
        let options = [option("A", "a", true), option("B", "b", true), option("C", "c", false)];
        let check = |raw: Value| grade_raw(QuestionType::MultipleChoice, &options, Some(raw));

        assert!(check(json!(["A", "B"])));
        assert!(check(json!(["b", "a"])));
        assert!(!check(json!(["A"])));
        assert!(!check(json!(["A", "B", "C"])));
        assert!(!check(json!([])));
        assert!(!check(json!("A")));
        assert!(!check(json!(["A", 2])));
    }

    #[test]
    fn multiple_choice_with_repeated_ids_is_incorrect() {
        let options = [option("A", "a", true), option("B", "b", true), option("C", "c", false)];
        let check = |raw: Value| grade_raw(QuestionType::MultipleChoice, &options, Some(raw));

        assert!(!check(json!(["A", "A", "B"])));
        assert!(!check(json!(["A", "a", "B"])));
        assert!(check(json!(["A", "B"])));
    }

    #[test]
    fn fill_blank_matches_any_correct_text() {
        let options = [option("o1", "Paris", true), option("o2", "Paris, France", true)];

        assert!(grade_raw(QuestionType::FillBlank, &options, Some(json!("paris"))));
        assert!(grade_raw(QuestionType::FillBlank, &options, Some(json!("PARIS, FRANCE"))));
        assert!(!grade_raw(QuestionType::FillBlank, &options, Some(json!("london"))));
        assert!(!grade_raw(QuestionType::FillBlank, &options, Some(json!("o1"))));
    }

    #[test]
    fn numeric_submissions_are_compared_as_text() {
        let options = [option("o1", "42", true)];
        assert!(grade_raw(QuestionType::FillBlank, &options, Some(json!(42))));
    }

    #[test]
    fn mismatched_variant_is_incorrect() {
        let options = [option("A", "a", true), option("B", "b", false)];
        let submitted = SubmittedAnswer::Text("A".to_string());
        let outcome = grade(QuestionType::SingleChoice, &options, 3.0, Some(&submitted));
        assert_eq!(outcome, GradeOutcome { is_correct: false, points_awarded: 0.0 });
    }

    #[test]
    fn grading_is_deterministic() {
        let options = [option("A", "a", true), option("B", "b", true), option("C", "c", false)];
        let submitted = SubmittedAnswer::Choices(vec!["B".to_string(), "A".to_string()]);
        let first = grade(QuestionType::MultipleChoice, &options, 4.0, Some(&submitted));
        for _ in 0..10 {
            assert_eq!(grade(QuestionType::MultipleChoice, &options, 4.0, Some(&submitted)), first);
        }
        assert_eq!(first.points_awarded, 4.0);
    }

    #[test]
    fn answer_configuration_rules_per_type() {
        let tf_ok = [option("t", "True", true), option("f", "False", false)];
        assert!(check_answer_configuration(QuestionType::TrueFalse, &tf_ok).is_ok());

        let tf_three = [option("a", "a", true), option("b", "b", false), option("c", "c", false)];
        assert!(matches!(
            check_answer_configuration(QuestionType::TrueFalse, &tf_three),
            Err(AnswerConfigError::OptionCount { actual: 3, .. })
        ));

        let single_two_correct = [option("a", "a", true), option("b", "b", true)];
        assert!(matches!(
            check_answer_configuration(QuestionType::SingleChoice, &single_two_correct),
            Err(AnswerConfigError::CorrectCount { actual: 2, .. })
        ));

        let multi_none_correct = [option("a", "a", false), option("b", "b", false)];
        assert!(check_answer_configuration(QuestionType::MultipleChoice, &multi_none_correct)
            .is_err());

        let seven: Vec<_> = (0..7).map(|i| option(&i.to_string(), "x", i == 0)).collect();
        assert!(check_answer_configuration(QuestionType::MultipleChoice, &seven).is_err());

        let blank_ok = [option("a", "Paris", true)];
        assert!(check_answer_configuration(QuestionType::FillBlank, &blank_ok).is_ok());
        let blank_wrong = [option("a", "Paris", true), option("b", "Rome", false)];
        assert!(check_answer_configuration(QuestionType::FillBlank, &blank_wrong).is_err());
        assert!(check_answer_configuration(QuestionType::FillBlank, &[]).is_err());
    }

    #[test]
    fn answer_configuration_rejects_duplicate_ids_and_blank_text() {
        let duplicate = [option("a", "x", true), option("A", "y", false)];
        assert_eq!(
            check_answer_configuration(QuestionType::SingleChoice, &duplicate),
            Err(AnswerConfigError::DuplicateOptionId)
        );

        let blank = [option("a", " ", true), option("b", "y", false)];
        assert_eq!(
            check_answer_configuration(QuestionType::SingleChoice, &blank),
            Err(AnswerConfigError::EmptyOptionText)
        );
    }
}
