//! Builds an [`ExperimentSpec`] from a parsed description.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::{self, Section};
use crate::defaults::merge_default_questions;
use crate::error::ConfigError;
use crate::spec::{
    AudioSpec, BreakPolicy, DEFAULT_BREAK_TEXT, DEFAULT_GOODBYE, DEFAULT_WELCOME, ExperimentSpec,
    PartSpec, PidMode, QuestionKind, QuestionSpec, QuestionnaireSpec, ScaleNotes, TimedText,
    UnlockRule,
};

/// Longest intro or break countdown, one day.
const MAX_TIMED_SECONDS: f64 = 86_400.0;
const TOP_LEVEL_KEYS: &[&str] = &["pid mode", "welcome", "goodbye", "randomise", "demo", "override"];
const MAX_AUDIO_QUESTIONS: usize = 2;
const STEP_TOLERANCE: f64 = 1e-9;

/// Reads an experiment description from disk.
///
/// Sample files are resolved against a directory named after the file stem,
/// next to the description (`listening.palila` -> `listening/`).
pub fn load_experiment(path: &Path) -> Result<ExperimentSpec, ConfigError> {
    let text = fs::read_to_string(path).map_err(|err| ConfigError::Read {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "experiment".to_string());
    let audio_root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
        .join(&name);
    parse_experiment(&text, &name, audio_root)
}

/// Parses and validates a description held in memory.
pub fn parse_experiment(
    text: &str,
    name: &str,
    audio_root: PathBuf,
) -> Result<ExperimentSpec, ConfigError> {
    let root = config::parse(text)?;
    let spec = experiment_from_section(&root, name, audio_root)?;
    info!(
        experiment = %spec.name,
        parts = spec.parts.len(),
        main_questions = spec.questionnaire.questions.len(),
        "experiment description loaded"
    );
    Ok(spec)
}

fn experiment_from_section(
    root: &Section,
    name: &str,
    audio_root: PathBuf,
) -> Result<ExperimentSpec, ConfigError> {
    if root.sections().is_empty() {
        return Err(ConfigError::invalid(root.label(), "experiment is empty"));
    }

    for key in root.keys() {
        if !TOP_LEVEL_KEYS.contains(&key) {
            warn!(key, "ignoring unknown top-level key");
        }
    }

    let pid_mode = match root.text("pid mode")?.as_deref() {
        None | Some("auto") => PidMode::Auto,
        Some("input") => PidMode::Input,
        Some(other) => {
            return Err(ConfigError::InvalidValue {
                section: root.label().to_string(),
                key: "pid mode".into(),
                value: other.to_string(),
                expected: "auto or input",
            });
        }
    };

    let override_gating = root.flag("override", false)?;
    if override_gating {
        warn!("override is set: continue gating is disabled on every screen");
    }

    let mut questionnaire = QuestionnaireSpec::default();
    let mut parts = Vec::new();
    for section in root.sections() {
        if section.name == "questionnaire" {
            questionnaire = load_questionnaire(section, true)?;
        } else if let Some(part_name) = section.name.strip_prefix("part ") {
            parts.push(load_part(section, part_name.trim())?);
        } else {
            return Err(ConfigError::invalid(
                &section.path,
                "unknown section; expected [questionnaire] or [part <name>]",
            ));
        }
    }

    if parts.is_empty() {
        return Err(ConfigError::invalid(
            root.label(),
            "experiment does not contain any parts",
        ));
    }

    Ok(ExperimentSpec {
        name: name.to_string(),
        audio_root,
        pid_mode,
        welcome: root.prose("welcome").unwrap_or_else(|| DEFAULT_WELCOME.to_string()),
        goodbye: root.prose("goodbye").unwrap_or_else(|| DEFAULT_GOODBYE.to_string()),
        randomise: root.flag("randomise", false)?,
        demo: root.flag("demo", false)?,
        override_gating,
        questionnaire,
        parts,
    })
}

fn load_part(section: &Section, name: &str) -> Result<PartSpec, ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::invalid(&section.path, "part has no name"));
    }
    if section.sections().is_empty() {
        return Err(ConfigError::invalid(&section.path, "empty experiment part"));
    }

    let mut intro = None;
    let mut breaks = None;
    let mut shared_questions = None;
    let mut questionnaire = QuestionnaireSpec::default();
    let mut audios = Vec::new();

    for child in section.sections() {
        match child.name.as_str() {
            "intro" => intro = Some(load_timed_text(child, None)?),
            "breaks" => breaks = Some(load_breaks(child)?),
            "questions" => shared_questions = Some(load_audio_questions(child)?),
            "questionnaire" => questionnaire = load_questionnaire(child, false)?,
            other => match other.strip_prefix("audio ") {
                Some(audio_name) if !audio_name.trim().is_empty() => {
                    audios.push(load_audio(child, audio_name.trim())?);
                }
                _ => {
                    return Err(ConfigError::invalid(
                        &child.path,
                        "unknown section; expected intro, breaks, questions, questionnaire or audio <name>",
                    ));
                }
            },
        }
    }

    if audios.is_empty() {
        return Err(ConfigError::invalid(
            &section.path,
            "part does not contain any audio screens",
        ));
    }

    let randomise = section.flag("randomise", false)?;

    if let Some(shared) = shared_questions {
        for audio in &mut audios {
            if !audio.questions.is_empty() || audio.unlock.is_some() {
                return Err(ConfigError::invalid(
                    &section.path,
                    format!(
                        "audio '{}' declares its own questions or unlock while the part overrides them with [[questions]]",
                        audio.name
                    ),
                ));
            }
            audio.questions = shared.clone();
        }
    }

    if randomise && let Some(audio) = audios.iter().find(|audio| audio.unlock.is_some()) {
        return Err(ConfigError::invalid(
            &section.path,
            format!(
                "audio '{}' is unlocked by another screen, which is not allowed in a randomised part",
                audio.name
            ),
        ));
    }

    Ok(PartSpec {
        name: name.to_string(),
        randomise,
        intro,
        breaks,
        audios,
        questionnaire,
    })
}

fn load_timed_text(section: &Section, default_text: Option<&str>) -> Result<TimedText, ConfigError> {
    let text = match (section.prose("text"), default_text) {
        (Some(text), _) => text,
        (None, Some(default)) => default.to_string(),
        (None, None) => return Err(ConfigError::missing(section.label(), "text")),
    };
    let seconds = section.require_float("time")?;
    if !(0.0..=MAX_TIMED_SECONDS).contains(&seconds) {
        return Err(ConfigError::InvalidValue {
            section: section.label().to_string(),
            key: "time".into(),
            value: seconds.to_string(),
            expected: "between 0 and 86400 seconds",
        });
    }
    Ok(TimedText { text, seconds })
}

fn load_breaks(section: &Section) -> Result<BreakPolicy, ConfigError> {
    let interval = section.require_int("interval")?;
    let timed = load_timed_text(section, Some(DEFAULT_BREAK_TEXT))?;
    Ok(BreakPolicy {
        interval,
        seconds: timed.seconds,
        text: timed.text,
    })
}

fn load_audio(section: &Section, name: &str) -> Result<AudioSpec, ConfigError> {
    let mut filenames = vec![section.require_text("filename")?];
    if let Some(second) = section.text("filename_2")? {
        filenames.push(second);
    }

    let max_replays = positive(section, "max replays")?;
    let repeat = positive(section, "repeat")?;
    // Layout hint only.
    section.flag("filler", true)?;

    let unlock = load_unlock(section)?;
    let questions = load_audio_questions(section)?;

    Ok(AudioSpec {
        name: name.to_string(),
        filenames,
        max_replays,
        repeat,
        unlock,
        questions,
    })
}

fn positive(section: &Section, key: &str) -> Result<u32, ConfigError> {
    match section.int(key)? {
        None => Ok(1),
        Some(value) if value >= 1 => u32::try_from(value).map_err(|_| ConfigError::InvalidValue {
            section: section.label().to_string(),
            key: key.to_string(),
            value: value.to_string(),
            expected: "a positive integer",
        }),
        Some(value) => Err(ConfigError::InvalidValue {
            section: section.label().to_string(),
            key: key.to_string(),
            value: value.to_string(),
            expected: "a positive integer",
        }),
    }
}

/// Question subsections of an audio section or a part's `[[questions]]` block.
fn load_audio_questions(section: &Section) -> Result<Vec<QuestionSpec>, ConfigError> {
    let mut questions = Vec::new();
    for child in section.sections() {
        let Some(name) = child.name.strip_prefix("question ") else {
            return Err(ConfigError::invalid(
                &child.path,
                "unknown section; expected question <name>",
            ));
        };
        questions.push(load_question(child, name.trim())?);
    }
    if questions.len() > MAX_AUDIO_QUESTIONS {
        return Err(ConfigError::invalid(
            &section.path,
            format!(
                "an audio screen holds at most {} questions, found {}",
                MAX_AUDIO_QUESTIONS,
                questions.len()
            ),
        ));
    }
    apply_deprecated_dependants(section, &mut questions)?;
    Ok(questions)
}

fn load_questionnaire(section: &Section, main: bool) -> Result<QuestionnaireSpec, ConfigError> {
    let manual_split = section.flag("manual split", false)?;
    let default = section.flag("default", main)?;
    let id = section.text("id")?;

    let mut questions = Vec::new();
    for child in section.sections() {
        let Some(name) = child.name.strip_prefix("question ") else {
            return Err(ConfigError::invalid(
                &child.path,
                "unknown section; expected question <name>",
            ));
        };
        let question = load_question(child, name.trim())?;
        if question.kind.is_audio_only() {
            return Err(ConfigError::invalid(
                &child.path,
                format!("{} questions are only allowed on audio screens", question.kind.label()),
            ));
        }
        if question.id.is_some() {
            warn!(
                section = %child.path,
                "the 'id' option of questionnaire questions is deprecated; the section name is the id"
            );
        }
        if manual_split && question.manual_screen.is_none() {
            return Err(ConfigError::missing(&child.path, "manual screen"));
        }
        questions.push(question);
    }
    apply_deprecated_dependants(section, &mut questions)?;

    let mut questionnaire = QuestionnaireSpec {
        id,
        default,
        manual_split,
        questions,
    };
    if default {
        merge_default_questions(&mut questionnaire, section.label())?;
    }
    Ok(questionnaire)
}

fn load_unlock(section: &Section) -> Result<Option<UnlockRule>, ConfigError> {
    let Some(reference) = section.text("unlocked by")? else {
        if section.contains_key("unlock condition") {
            return Err(ConfigError::missing(section.label(), "unlocked by"));
        }
        return Ok(None);
    };
    let condition = section
        .prose("unlock condition")
        .ok_or_else(|| ConfigError::missing(section.label(), "unlock condition"))?;
    Ok(Some(UnlockRule::new(reference, &condition)))
}

fn load_question(section: &Section, name: &str) -> Result<QuestionSpec, ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::invalid(&section.path, "question has no name"));
    }
    let label = section.label();
    let kind_name = section.require_text("type")?;
    let kind = match kind_name.as_str() {
        "FreeNumber" => QuestionKind::FreeNumber,
        "FreeText" => QuestionKind::FreeText,
        "Text" => QuestionKind::Text,
        "MultipleChoice" => QuestionKind::MultipleChoice {
            choices: require_choices(section)?,
            multi: section.flag("multi", false)?,
        },
        "MultiMultipleChoice" => {
            warn!(
                section = %section.path,
                "MultiMultipleChoice is deprecated; use MultipleChoice with multi = yes"
            );
            QuestionKind::MultipleChoice {
                choices: require_choices(section)?,
                multi: true,
            }
        }
        "Spinner" => QuestionKind::Spinner {
            choices: require_choices(section)?,
        },
        "IntegerScale" => {
            let min = section.require_int("min")?;
            let max = section.require_int("max")?;
            if min >= max {
                return Err(ConfigError::invalid(
                    label,
                    format!("min ({min}) must be smaller than max ({max})"),
                ));
            }
            QuestionKind::IntegerScale {
                min,
                max,
                notes: load_notes(section),
            }
        }
        "Slider" => load_slider(section)?,
        "Annoyance" => QuestionKind::Annoyance {
            notes: load_notes(section),
        },
        other => {
            return Err(ConfigError::InvalidValue {
                section: label.to_string(),
                key: "type".into(),
                value: other.to_string(),
                expected: "one of FreeNumber, FreeText, MultipleChoice, Spinner, Text, IntegerScale, Slider, Annoyance",
            });
        }
    };

    let prompt = section.prose("text");
    if prompt.is_none() && !kind.prompt_optional() {
        return Err(ConfigError::missing(label, "text"));
    }

    let manual_screen = section.int("manual screen")?;

    Ok(QuestionSpec {
        name: name.to_string(),
        id: section.text("id")?,
        prompt,
        kind,
        manual_screen,
        unlock: load_unlock(section)?,
    })
}

fn require_choices(section: &Section) -> Result<Vec<String>, ConfigError> {
    let choices: Vec<String> = section
        .list("choices")
        .ok_or_else(|| ConfigError::missing(section.label(), "choices"))?
        .into_iter()
        .filter(|choice| !choice.is_empty())
        .collect();
    if choices.is_empty() {
        return Err(ConfigError::invalid(
            section.label(),
            "choices must contain at least one option",
        ));
    }
    Ok(choices)
}

fn load_notes(section: &Section) -> ScaleNotes {
    ScaleNotes {
        left: section.prose("left note"),
        right: section.prose("right note"),
    }
}

fn load_slider(section: &Section) -> Result<QuestionKind, ConfigError> {
    let label = section.label();
    let min = section.require_float("min")?;
    let max = section.require_float("max")?;
    let step = section.require_float("step")?;
    if min >= max {
        return Err(ConfigError::invalid(
            label,
            format!("min ({min}) must be smaller than max ({max})"),
        ));
    }
    if step <= 0.0 {
        return Err(ConfigError::invalid(label, "step must be positive"));
    }
    let initial = section.float("initial")?;
    if let Some(initial) = initial {
        if initial < min || initial > max {
            return Err(ConfigError::invalid(
                label,
                format!("initial value {initial} outside the range [{min}, {max}]"),
            ));
        }
        if !on_step_grid(initial, min, step) {
            return Err(ConfigError::invalid(
                label,
                format!("initial value {initial} is not compatible with step size {step}"),
            ));
        }
    }
    Ok(QuestionKind::Slider {
        min,
        max,
        step,
        initial,
        notes: load_notes(section),
    })
}

pub(crate) fn on_step_grid(value: f64, min: f64, step: f64) -> bool {
    let steps = (value - min) / step;
    (steps - steps.round()).abs() < STEP_TOLERANCE
}

/// Translates `dependant` / `dependant condition` on an unlocking question
/// into an unlock rule on the question it names.
fn apply_deprecated_dependants(
    section: &Section,
    questions: &mut [QuestionSpec],
) -> Result<(), ConfigError> {
    for child in section.sections() {
        let Some(target) = child.text("dependant")? else {
            continue;
        };
        warn!(
            section = %child.path,
            "'dependant' and 'dependant condition' are deprecated; use 'unlocked by' and 'unlock condition' on the unlocked question"
        );
        let condition = child
            .prose("dependant condition")
            .ok_or_else(|| ConfigError::missing(child.label(), "dependant condition"))?;
        let source = child
            .name
            .strip_prefix("question ")
            .unwrap_or(&child.name)
            .trim()
            .to_string();
        let target_name = crate::ids::pad(target.trim());
        let Some(question) = questions
            .iter_mut()
            .find(|question| crate::ids::pad(&question.name) == target_name)
        else {
            return Err(ConfigError::invalid(
                child.label(),
                format!("dependant question '{}' does not exist", target),
            ));
        };
        if question.unlock.is_some() {
            return Err(ConfigError::invalid(
                child.label(),
                format!(
                    "question '{}' is already unlocked by another question",
                    question.name
                ),
            ));
        }
        question.unlock = Some(UnlockRule::new(source, &condition));
    }
    Ok(())
}
