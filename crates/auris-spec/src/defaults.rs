//! Built-in demographic and hearing-history battery merged into questionnaires
//! that set `default = yes`.

use std::collections::BTreeSet;

use crate::error::ConfigError;
use crate::spec::{QuestionKind, QuestionSpec, QuestionnaireSpec};

/// Highest page used by the built-in battery; user questions go after it.
pub const DEFAULT_PAGES: i64 = 2;

fn choice(options: &[&str]) -> QuestionKind {
    QuestionKind::MultipleChoice {
        choices: options.iter().map(|option| option.to_string()).collect(),
        multi: false,
    }
}

pub fn default_questions() -> Vec<QuestionSpec> {
    vec![
        QuestionSpec::new("age", Some("What is your age?"), QuestionKind::FreeNumber).on_screen(1),
        QuestionSpec::new(
            "gender",
            Some("What is your gender?"),
            choice(&["Female", "Male", "Non-binary", "Prefer not to say"]),
        )
        .on_screen(1),
        QuestionSpec::new(
            "hearing",
            Some("Do you have any known hearing problems?"),
            choice(&["Yes", "No"]),
        )
        .on_screen(2),
        QuestionSpec::new(
            "hearingdetail",
            Some("Please describe your hearing problems."),
            QuestionKind::FreeText,
        )
        .on_screen(2)
        .with_unlock("hearing", "Yes"),
        QuestionSpec::new(
            "tinnitus",
            Some("Do you experience tinnitus (ringing in the ears)?"),
            choice(&["Yes", "No", "Sometimes"]),
        )
        .on_screen(2),
        QuestionSpec::new(
            "noise",
            Some("How often are you exposed to loud noise?"),
            QuestionKind::Spinner {
                choices: ["Never", "Yearly", "Monthly", "Weekly", "Daily"]
                    .iter()
                    .map(|option| option.to_string())
                    .collect(),
            },
        )
        .on_screen(2),
    ]
}

/// Puts the built-in battery ahead of the user questions.
///
/// The merged questionnaire is split manually: user questions must name a
/// `manual screen` after the pages taken by the battery, and must not reuse
/// one of its question names.
pub fn merge_default_questions(
    questionnaire: &mut QuestionnaireSpec,
    section: &str,
) -> Result<(), ConfigError> {
    let builtin = default_questions();
    let reserved: BTreeSet<&str> = builtin.iter().map(|q| q.name.as_str()).collect();

    for question in &questionnaire.questions {
        if reserved.contains(question.name.as_str()) {
            return Err(ConfigError::invalid(
                section,
                format!(
                    "question '{}' collides with a default questionnaire question",
                    question.name
                ),
            ));
        }
        match question.manual_screen {
            None => {
                return Err(ConfigError::invalid(
                    section,
                    format!(
                        "question '{}' needs a 'manual screen' when default questions are enabled",
                        question.name
                    ),
                ));
            }
            Some(screen) if screen <= DEFAULT_PAGES => {
                return Err(ConfigError::invalid(
                    section,
                    format!(
                        "question '{}' uses manual screen {} which is taken by the default questions (1..={})",
                        question.name, screen, DEFAULT_PAGES
                    ),
                ));
            }
            Some(_) => {}
        }
    }

    let user = std::mem::take(&mut questionnaire.questions);
    questionnaire.questions = builtin;
    questionnaire.questions.extend(user);
    questionnaire.manual_split = true;
    Ok(())
}
