//! Best-effort cleanup of model output into parseable JSON.

use serde_json::Value;

use super::{GeneratedQuestion, GenerationError};

/// Parses `raw`, repairing markdown fences, surrounding prose, bare object keys
/// and trailing commas when the text is not valid JSON as-is.
pub(crate) fn repair_json(raw: &str) -> Result<Value, GenerationError> {
    let unfenced = strip_fences(raw);
    if let Ok(value) = serde_json::from_str::<Value>(unfenced) {
        return Ok(value);
    }

    let extracted = extract_outermost(unfenced).ok_or_else(|| {
        GenerationError::Parse("response does not contain a JSON object or array".to_string())
    })?;
    if let Ok(value) = serde_json::from_str::<Value>(extracted) {
        return Ok(value);
    }

    let repaired = normalize_syntax(extracted);
    serde_json::from_str::<Value>(&repaired).map_err(|err| GenerationError::Parse(err.to_string()))
}

/// Accepts either a bare array of questions or an object wrapping it under `questions`.
pub(crate) fn parse_generated_questions(
    raw: &str,
) -> Result<Vec<GeneratedQuestion>, GenerationError> {
    let value = repair_json(raw)?;
    let items = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map.remove("questions").ok_or_else(|| {
            GenerationError::Parse("response object has no `questions` field".to_string())
        })?,
        _ => return Err(GenerationError::Parse("response is not a question list".to_string())),
    };

    serde_json::from_value(items).map_err(|err| GenerationError::Parse(err.to_string()))
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };

    let after_open = &trimmed[start + 3..];
    // Language tag runs to the end of the opening fence line.
    let body = match after_open.find('\n') {
        Some(newline) => &after_open[newline + 1..],
        None => after_open,
    };
    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

fn extract_outermost(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let closer = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}

fn normalize_syntax(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    let mut last_significant: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
                last_significant = Some('"');
            }
            i += 1;
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
                i += 1;
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(ch);
                    last_significant = Some(',');
                }
                i += 1;
            }
            c if is_key_start(c) && matches!(last_significant, Some('{') | Some(',')) => {
                let begin = i;
                while i < chars.len() && is_key_char(chars[i]) {
                    i += 1;
                }
                let word: String = chars[begin..i].iter().collect();
                let next = chars[i..].iter().find(|c| !c.is_whitespace());
                if next == Some(&':') {
                    out.push('"');
                    out.push_str(&word);
                    out.push('"');
                } else {
                    out.push_str(&word);
                }
                last_significant = Some('w');
            }
            c => {
                out.push(c);
                if !c.is_whitespace() {
                    last_significant = Some(c);
                }
                i += 1;
            }
        }
    }

    out
}

fn is_key_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

fn is_key_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' || ch == '-'
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_response_with_bare_keys_matches_clean_json() {
        let raw = "Here you go:\n```json\n[\n  {title: \"2+2\", difficulty: \"easy\", type: \"single_choice\", points: 5,\n   answers: [{text: \"4\", isCorrect: true}, {text: \"5\", isCorrect: false,},],},\n]\n```\nGood luck!";
        let clean = json!([{
            "title": "2+2",
            "difficulty": "easy",
            "type": "single_choice",
            "points": 5,
            "answers": [{"text": "4", "isCorrect": true}, {"text": "5", "isCorrect": false}]
        }]);

        assert_eq!(repair_json(raw).unwrap(), clean);
    }

    #[test]
    fn valid_json_is_returned_untouched() {
        let raw = r#"{"questions": [], "note": "a, }"}"#;
        assert_eq!(repair_json(raw).unwrap(), json!({"questions": [], "note": "a, }"}));
    }

    #[test]
    fn fence_without_language_tag() {
        let raw = "```\n{\"a\": 1}\n```";
        assert_eq!(repair_json(raw).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn string_contents_are_not_rewritten() {
        let raw = "{note: \"keep {x: 1,} and \\\"quotes\\\"\", flag: true, list: [true, false,]}";
        assert_eq!(
            repair_json(raw).unwrap(),
            json!({"note": "keep {x: 1,} and \"quotes\"", "flag": true, "list": [true, false]})
        );
    }

    #[test]
    fn prose_only_is_a_parse_error() {
        assert!(matches!(repair_json("I cannot help with that."), Err(GenerationError::Parse(_))));
        assert!(matches!(repair_json("{broken: [}"), Err(GenerationError::Parse(_))));
    }

    #[test]
    fn questions_are_read_from_array_or_wrapper_object() {
        let question = json!({
            "title": "Capital of France",
            "difficulty": "easy",
            "content": "Fill in the blank",
            "type": "fill_blank",
            "answers": [{"text": "Paris", "isCorrect": true, "explanation": "It is."}],
            "points": 2
        });

        let from_array = parse_generated_questions(&json!([question.clone()]).to_string()).unwrap();
        let from_object =
            parse_generated_questions(&json!({"questions": [question]}).to_string()).unwrap();

        assert_eq!(from_array, from_object);
        assert_eq!(from_array[0].answers[0].text, "Paris");
        assert!(from_array[0].answers[0].is_correct);

        assert!(matches!(
            parse_generated_questions(r#"{"items": []}"#),
            Err(GenerationError::Parse(_))
        ));
    }
}
