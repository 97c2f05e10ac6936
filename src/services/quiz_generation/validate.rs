//! Checks a generated question set against what was requested.

use super::{GeneratedQuestion, GenerationError, GenerationParams};
use crate::services::quiz_catalog::{prepare_questions, AnswerDraft, QuestionDraft, QuizDraft};

const POINTS_TOLERANCE: f64 = 1e-6;

/// Builds the quiz draft for `questions`, rejecting sets whose size, per-type
/// answer layout, or point total differ from the request.
pub(crate) fn check_generated(
    params: &GenerationParams,
    title: &str,
    questions: Vec<GeneratedQuestion>,
) -> Result<QuizDraft, GenerationError> {
    if questions.len() != params.total_questions as usize {
        return Err(GenerationError::QuestionCountMismatch {
            expected: params.total_questions,
            actual: questions.len(),
        });
    }

    if let Some((index, question)) = questions.iter().enumerate().find(|(_, question)| {
        !params.question_types.is_empty() && !params.question_types.contains(&question.question_type)
    }) {
        return Err(GenerationError::InvalidQuestions(format!(
            "question {index}: type {} was not requested",
            question.question_type.as_str()
        )));
    }

    let drafts: Vec<QuestionDraft> = questions.into_iter().map(into_question_draft).collect();
    let (_, actual) = prepare_questions(drafts.clone())
        .map_err(|err| GenerationError::InvalidQuestions(err.to_string()))?;

    if (actual - params.total_points).abs() > POINTS_TOLERANCE {
        return Err(GenerationError::PointsMismatch { expected: params.total_points, actual });
    }

    Ok(QuizDraft {
        title: title.to_string(),
        description: params.description.clone(),
        difficulty: None,
        passing_score: params.passing_score,
        max_attempts: params.max_attempts,
        questions: drafts,
    })
}

fn into_question_draft(question: GeneratedQuestion) -> QuestionDraft {
    QuestionDraft {
        title: question.title,
        content: question.content.filter(|content| !content.trim().is_empty()),
        question_type: question.question_type,
        difficulty: question.difficulty,
        points: question.points,
        explanation: question.explanation,
        answers: question
            .answers
            .into_iter()
            .map(|answer| AnswerDraft {
                id: None,
                text: answer.text,
                is_correct: answer.is_correct,
                explanation: answer.explanation,
            })
            .collect(),
    }
}
