//! Conversion of raw participant input into typed answers.

use crate::answers::{AnswerValue, format_number};
use crate::error::RuntimeInputError;
use crate::load::on_step_grid;
use crate::sequence::ResolvedQuestion;
use crate::spec::{ANNOYANCE_LABELS, QuestionKind};

/// Parses raw input for a question.
///
/// `Ok(None)` means the input clears the answer (empty text, empty
/// selection). Errors leave the caller's state untouched.
pub fn parse_answer(
    question: &ResolvedQuestion,
    raw: &str,
) -> Result<Option<AnswerValue>, RuntimeInputError> {
    let trimmed = raw.trim();
    match &question.kind {
        QuestionKind::Text => Err(RuntimeInputError::NotAnswerable {
            id: question.id.clone(),
        }),
        QuestionKind::FreeText => Ok((!trimmed.is_empty()).then(|| AnswerValue::Text(raw.to_string()))),
        QuestionKind::FreeNumber => {
            if trimmed.is_empty() {
                return Ok(None);
            }
            if !trimmed.chars().all(|c| c.is_ascii_digit()) {
                return Err(RuntimeInputError::NotANumber {
                    value: trimmed.to_string(),
                });
            }
            Ok(Some(AnswerValue::Text(trimmed.to_string())))
        }
        QuestionKind::MultipleChoice {
            choices,
            multi: false,
        }
        | QuestionKind::Spinner { choices } => {
            if trimmed.is_empty() {
                return Ok(None);
            }
            ensure_choice(question, choices, trimmed)?;
            Ok(Some(AnswerValue::Text(trimmed.to_string())))
        }
        QuestionKind::MultipleChoice {
            choices,
            multi: true,
        } => parse_selection(question, choices, trimmed),
        QuestionKind::Annoyance { .. } => {
            if trimmed.is_empty() {
                return Ok(None);
            }
            if !ANNOYANCE_LABELS.contains(&trimmed) {
                return Err(RuntimeInputError::NotAChoice {
                    id: question.id.clone(),
                    value: trimmed.to_string(),
                });
            }
            Ok(Some(AnswerValue::Text(trimmed.to_string())))
        }
        QuestionKind::IntegerScale { min, max, .. } => {
            let value: i64 = trimmed.parse().map_err(|_| RuntimeInputError::NotANumber {
                value: trimmed.to_string(),
            })?;
            if value < *min || value > *max {
                return Err(RuntimeInputError::OutOfRange {
                    value: value.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
            }
            Ok(Some(AnswerValue::Integer(value)))
        }
        QuestionKind::Slider { min, max, step, .. } => {
            let value = trimmed
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| RuntimeInputError::NotANumber {
                    value: trimmed.to_string(),
                })?;
            if value < *min || value > *max {
                return Err(RuntimeInputError::OutOfRange {
                    value: format_number(value),
                    min: format_number(*min),
                    max: format_number(*max),
                });
            }
            if !on_step_grid(value, *min, *step) {
                return Err(RuntimeInputError::OffStep {
                    value: format_number(value),
                    step: format_number(*step),
                });
            }
            // Snap to the grid so float noise never reaches the output.
            let snapped = min + ((value - min) / step).round() * step;
            Ok(Some(AnswerValue::Number((snapped * 1e9).round() / 1e9)))
        }
    }
}

fn ensure_choice(
    question: &ResolvedQuestion,
    choices: &[String],
    value: &str,
) -> Result<(), RuntimeInputError> {
    if choices.iter().any(|choice| choice == value) {
        Ok(())
    } else {
        Err(RuntimeInputError::NotAChoice {
            id: question.id.clone(),
            value: value.to_string(),
        })
    }
}

/// Multi-select input is `;`-separated; the result follows choice order.
fn parse_selection(
    question: &ResolvedQuestion,
    choices: &[String],
    raw: &str,
) -> Result<Option<AnswerValue>, RuntimeInputError> {
    let mut selected: Vec<&str> = Vec::new();
    for item in raw.split(';').map(str::trim).filter(|item| !item.is_empty()) {
        ensure_choice(question, choices, item)?;
        if selected.contains(&item) {
            return Err(RuntimeInputError::DuplicateChoice {
                value: item.to_string(),
            });
        }
        selected.push(item);
    }
    if selected.is_empty() {
        return Ok(None);
    }
    let ordered = choices
        .iter()
        .filter(|choice| selected.contains(&choice.as_str()))
        .cloned()
        .collect();
    Ok(Some(AnswerValue::Choices(ordered)))
}
