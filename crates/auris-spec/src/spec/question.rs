use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Labels of the five-point annoyance scale, in order.
pub const ANNOYANCE_LABELS: [&str; 5] = ["Not at all", "Slightly", "Moderately", "Very", "Extremely"];

/// Optional captions shown at the ends of a scale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScaleNotes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<String>,
}

/// Closed set of question kinds with their kind-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum QuestionKind {
    FreeNumber,
    FreeText,
    MultipleChoice {
        choices: Vec<String>,
        #[serde(default)]
        multi: bool,
    },
    Spinner {
        choices: Vec<String>,
    },
    /// Display-only text on an audio screen.
    Text,
    IntegerScale {
        min: i64,
        max: i64,
        #[serde(default)]
        notes: ScaleNotes,
    },
    Slider {
        min: f64,
        max: f64,
        step: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial: Option<f64>,
        #[serde(default)]
        notes: ScaleNotes,
    },
    Annoyance {
        #[serde(default)]
        notes: ScaleNotes,
    },
}

impl QuestionKind {
    pub fn label(&self) -> &'static str {
        match self {
            QuestionKind::FreeNumber => "FreeNumber",
            QuestionKind::FreeText => "FreeText",
            QuestionKind::MultipleChoice { .. } => "MultipleChoice",
            QuestionKind::Spinner { .. } => "Spinner",
            QuestionKind::Text => "Text",
            QuestionKind::IntegerScale { .. } => "IntegerScale",
            QuestionKind::Slider { .. } => "Slider",
            QuestionKind::Annoyance { .. } => "Annoyance",
        }
    }

    /// Whether the participant provides a value for this kind.
    pub fn is_answerable(&self) -> bool {
        !matches!(self, QuestionKind::Text)
    }

    /// Kinds that only make sense next to an audio sample.
    pub fn is_audio_only(&self) -> bool {
        matches!(self, QuestionKind::Text)
    }

    /// Kinds whose prompt text may be omitted.
    pub fn prompt_optional(&self) -> bool {
        matches!(
            self,
            QuestionKind::IntegerScale { .. }
                | QuestionKind::Slider { .. }
                | QuestionKind::Annoyance { .. }
        )
    }

}

/// Dependency of a question (or audio screen) on an earlier answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UnlockRule {
    /// Name or effective id of the referenced question.
    pub reference: String,
    /// Accepted answer strings; any one of them unlocks.
    pub accepted: Vec<String>,
}

impl UnlockRule {
    /// Splits a `;`-separated condition into its accepted values.
    pub fn new(reference: impl Into<String>, condition: &str) -> Self {
        Self {
            reference: reference.into(),
            accepted: condition.split(';').map(str::to_string).collect(),
        }
    }
}

/// Definition of a single question, audio-attached or in a questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionSpec {
    pub name: String,
    /// Explicit output id replacing the derived one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(flatten)]
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_screen: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock: Option<UnlockRule>,
}

impl QuestionSpec {
    pub fn new(name: impl Into<String>, prompt: Option<&str>, kind: QuestionKind) -> Self {
        Self {
            name: name.into(),
            id: None,
            prompt: prompt.map(str::to_string),
            kind,
            manual_screen: None,
            unlock: None,
        }
    }

    pub fn with_unlock(mut self, reference: &str, condition: &str) -> Self {
        self.unlock = Some(UnlockRule::new(reference, condition));
        self
    }

    pub fn on_screen(mut self, screen: i64) -> Self {
        self.manual_screen = Some(screen);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_splits_without_trimming() {
        let rule = UnlockRule::new("1", "Yes;Maybe; No");
        assert_eq!(rule.accepted, vec!["Yes", "Maybe", " No"]);
    }

    #[test]
    fn kind_serializes_with_type_tag() {
        let question = QuestionSpec::new(
            "1",
            Some("Pick"),
            QuestionKind::Spinner {
                choices: vec!["a".into()],
            },
        );
        let value = serde_json::to_value(&question).expect("json");
        assert_eq!(value["type"], "Spinner");
        assert_eq!(value["choices"][0], "a");
    }
}
