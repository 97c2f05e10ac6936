use serde_json::{json, Value};

use super::provider::ModelPrompt;
use super::GenerationParams;
use crate::db::types::QuestionType;

const SYSTEM_PROMPT: &str = "You are an experienced teacher who writes assessment quizzes. \
Write clear, unambiguous questions with exactly one defensible answer key. \
Reply with JSON only, following the provided schema exactly.";

pub(crate) fn build_prompt(params: &GenerationParams) -> ModelPrompt {
    let types = if params.question_types.is_empty() {
        all_question_types()
    } else {
        params.question_types.clone()
    };
    let type_list = types.iter().map(|kind| kind.as_str()).collect::<Vec<_>>().join(", ");

    let mut user = format!(
        "Create a quiz about \"{topic}\".\n\
         Requirements:\n\
         - Exactly {total} questions: {easy} easy, {medium} medium, {hard} hard.\n\
         - Allowed question types: {type_list}.\n\
         - The points of all questions MUST sum to exactly {points}. Do not round the total.\n\
         - true_false: exactly 2 answers, exactly one with isCorrect=true.\n\
         - single_choice: 2 to 6 answers, exactly one with isCorrect=true.\n\
         - multiple_choice: 2 to 6 answers, at least one with isCorrect=true.\n\
         - fill_blank: every answer is an accepted spelling and has isCorrect=true.\n\
         - Every answer has a short explanation.\n",
        topic = params.topic.trim(),
        total = params.total_questions,
        easy = params.difficulty.easy,
        medium = params.difficulty.medium,
        hard = params.difficulty.hard,
        points = format_total(params.total_points),
    );
    if let Some(language) = params.language.as_deref().filter(|value| !value.trim().is_empty()) {
        user.push_str(&format!("- Write all text in {}.\n", language.trim()));
    }
    if let Some(notes) = params.notes.as_deref().filter(|value| !value.trim().is_empty()) {
        user.push_str(&format!("Additional instructions: {}\n", notes.trim()));
    }
    user.push_str(
        "Return an object {\"questions\": [...]} where every question has the fields \
         title, difficulty, content, type, answers[{text, isCorrect, explanation}], points.",
    );

    ModelPrompt { system: SYSTEM_PROMPT.to_string(), user, schema: response_schema(&types) }
}

fn all_question_types() -> Vec<QuestionType> {
    vec![
        QuestionType::TrueFalse,
        QuestionType::SingleChoice,
        QuestionType::MultipleChoice,
        QuestionType::FillBlank,
    ]
}

fn format_total(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

/// Strict structured-output schema; the root must be an object.
pub(crate) fn response_schema(types: &[QuestionType]) -> Value {
    let type_names: Vec<&str> = types.iter().map(|kind| kind.as_str()).collect();
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["questions"],
        "properties": {
            "questions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["title", "difficulty", "content", "type", "answers", "points"],
                    "properties": {
                        "title": {"type": "string"},
                        "difficulty": {"type": "string", "enum": ["easy", "medium", "hard"]},
                        "content": {"type": "string"},
                        "type": {"type": "string", "enum": type_names},
                        "points": {"type": "number"},
                        "answers": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "additionalProperties": false,
                                "required": ["text", "isCorrect", "explanation"],
                                "properties": {
                                    "text": {"type": "string"},
                                    "isCorrect": {"type": "boolean"},
                                    "explanation": {"type": "string"}
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}
