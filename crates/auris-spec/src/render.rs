use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::progress::Progress;
use crate::spec::{PidMode, QuestionKind};

/// Request to deliver `TimerExpired { token }` after `seconds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimerRequest {
    pub token: u64,
    pub seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SampleView {
    pub label: String,
    pub plays: u32,
    pub max_plays: u32,
    pub playing: bool,
    pub heard: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionView {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(flatten)]
    pub kind: QuestionKind,
    /// Rendered but disabled.
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum ViewBody {
    Welcome {
        text: String,
        pid_mode: PidMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        participant: Option<String>,
    },
    Timed {
        text: String,
        seconds: f64,
        elapsed: bool,
    },
    Audio {
        demo: bool,
        samples: Vec<SampleView>,
        questions: Vec<QuestionView>,
    },
    Questionnaire {
        page: usize,
        pages: usize,
        questions: Vec<QuestionView>,
    },
    End,
    Final {
        text: String,
    },
    Aborted,
}

/// Everything a presentation layer needs to draw the active screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScreenView {
    pub name: String,
    #[serde(flatten)]
    pub body: ViewBody,
    pub can_continue: bool,
    pub can_go_back: bool,
    pub can_return: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer: Option<TimerRequest>,
}

/// JSON schema of [`ScreenView`] for presentation-layer implementers.
pub fn screen_view_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(ScreenView)).unwrap_or_default()
}

/// Render the view as human-friendly text.
pub fn render_text(view: &ScreenView) -> String {
    let mut lines = Vec::new();
    let mut header = format!("== {} ==", view.name);
    if let Some(progress) = &view.progress {
        header.push_str(&format!(
            " [{}/{} audio screens]",
            progress.completed, progress.total
        ));
    }
    lines.push(header);

    match &view.body {
        ViewBody::Welcome {
            text,
            pid_mode,
            participant,
        } => {
            lines.push(text.clone());
            match (pid_mode, participant) {
                (PidMode::Auto, _) => {
                    lines.push("Your participant ID is set automatically.".to_string())
                }
                (PidMode::Input, Some(pid)) => lines.push(format!("Participant ID: {}", pid)),
                (PidMode::Input, None) => lines.push("Enter your participant ID: pid <id>".to_string()),
            }
        }
        ViewBody::Timed {
            text,
            seconds,
            elapsed,
        } => {
            lines.push(text.clone());
            if !elapsed {
                lines.push(format!("(continue unlocks after {} s)", seconds));
            }
        }
        ViewBody::Audio {
            demo,
            samples,
            questions,
        } => {
            if *demo {
                lines.push("Demo: try the controls, nothing is recorded.".to_string());
            }
            for sample in samples {
                let state = if sample.playing {
                    "playing"
                } else if sample.heard {
                    "heard"
                } else {
                    "not played"
                };
                lines.push(format!(
                    "  [{}] {} ({}/{} plays)",
                    sample.label, state, sample.plays, sample.max_plays
                ));
            }
            push_questions(&mut lines, questions);
        }
        ViewBody::Questionnaire {
            page,
            pages,
            questions,
        } => {
            lines.push(format!("Page {} of {}", page, pages));
            push_questions(&mut lines, questions);
        }
        ViewBody::End => {
            lines.push("You have reached the end of the experiment.".to_string());
            lines.push("continue: finish the experiment, return: back to the first questionnaire".to_string());
        }
        ViewBody::Final { text } => lines.push(text.clone()),
        ViewBody::Aborted => lines.push("The experiment was stopped.".to_string()),
    }

    let mut actions = Vec::new();
    if view.can_continue {
        actions.push("continue");
    }
    if view.can_go_back {
        actions.push("back");
    }
    if view.can_return {
        actions.push("return");
    }
    if !actions.is_empty() {
        lines.push(format!("Available: {}", actions.join(", ")));
    }
    lines.join("\n")
}

fn push_questions(lines: &mut Vec<String>, questions: &[QuestionView]) {
    for question in questions {
        let mut line = format!("  {} <{}>", question.id, kind_hint(&question.kind));
        if let Some(prompt) = &question.prompt {
            line.push(' ');
            line.push_str(&prompt.replace('\n', " "));
        }
        if question.locked {
            line.push_str(" (locked)");
        }
        if let Some(answer) = &question.answer {
            line.push_str(&format!(" = {}", answer));
        }
        lines.push(line);
    }
}

fn kind_hint(kind: &QuestionKind) -> String {
    match kind {
        QuestionKind::FreeNumber => "number".to_string(),
        QuestionKind::FreeText => "text".to_string(),
        QuestionKind::Text => "info".to_string(),
        QuestionKind::MultipleChoice { choices, multi } => {
            let separator = if *multi { " ; " } else { " | " };
            choices.join(separator)
        }
        QuestionKind::Spinner { choices } => choices.join(" | "),
        QuestionKind::IntegerScale { min, max, notes } => scale_hint(
            &format!("{}..{}", min, max),
            notes.left.as_deref(),
            notes.right.as_deref(),
        ),
        QuestionKind::Slider {
            min,
            max,
            step,
            notes,
            ..
        } => scale_hint(
            &format!("{}..{} step {}", min, max, step),
            notes.left.as_deref(),
            notes.right.as_deref(),
        ),
        QuestionKind::Annoyance { .. } => crate::spec::ANNOYANCE_LABELS.join(" | "),
    }
}

fn scale_hint(range: &str, left: Option<&str>, right: Option<&str>) -> String {
    match (left, right) {
        (None, None) => range.to_string(),
        (left, right) => format!(
            "{} ({} .. {})",
            range,
            left.unwrap_or_default().replace('\n', " "),
            right.unwrap_or_default().replace('\n', " ")
        ),
    }
}
