use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::question::{QuestionSpec, UnlockRule};

pub const DEFAULT_WELCOME: &str =
    "Welcome to this listening experiment.\nPlease enter your participant ID:";
pub const DEFAULT_GOODBYE: &str = "Thank you for your participation in this experiment!";
pub const DEFAULT_BREAK_TEXT: &str = "Please take some time to refocus during this break.";

/// How the participant id is obtained on the welcome screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PidMode {
    #[default]
    Auto,
    Input,
}

/// Text shown for a fixed time before continue unlocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimedText {
    pub text: String,
    pub seconds: f64,
}

/// Break placement inside a part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BreakPolicy {
    /// 0: end of part only. N > 0: every N audio screens and at the end.
    /// N < 0: every |N| audio screens, none at the end.
    pub interval: i64,
    pub seconds: f64,
    pub text: String,
}

impl BreakPolicy {
    pub fn break_after(&self, position: usize, total: usize) -> bool {
        let every = self.interval.unsigned_abs() as usize;
        every != 0 && position % every == 0 && position < total
    }

    pub fn break_at_end(&self) -> bool {
        self.interval >= 0
    }
}

/// One audio screen definition, before repetition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioSpec {
    pub name: String,
    /// One or two sample files, relative to the experiment directory.
    pub filenames: Vec<String>,
    pub max_replays: u32,
    pub repeat: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock: Option<UnlockRule>,
    pub questions: Vec<QuestionSpec>,
}

/// Questionnaire definition. Default questions are already merged in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionnaireSpec {
    /// Replaces the derived id scope of the questions when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub default: bool,
    pub manual_split: bool,
    pub questions: Vec<QuestionSpec>,
}

impl QuestionnaireSpec {
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PartSpec {
    pub name: String,
    pub randomise: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro: Option<TimedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breaks: Option<BreakPolicy>,
    pub audios: Vec<AudioSpec>,
    pub questionnaire: QuestionnaireSpec,
}

/// Root of a parsed experiment description. Immutable after loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExperimentSpec {
    pub name: String,
    /// Directory the sample filenames are resolved against.
    pub audio_root: PathBuf,
    pub pid_mode: PidMode,
    pub welcome: String,
    pub goodbye: String,
    pub randomise: bool,
    pub demo: bool,
    /// Continue gating is bypassed on every screen.
    pub override_gating: bool,
    pub questionnaire: QuestionnaireSpec,
    pub parts: Vec<PartSpec>,
}

impl ExperimentSpec {
    pub fn uses_randomness(&self) -> bool {
        self.randomise || self.parts.iter().any(|part| part.randomise)
    }

    pub fn audio_path(&self, filename: &str) -> PathBuf {
        self.audio_root.join(filename)
    }

    /// Every sample path referenced by the description, in definition order.
    pub fn sample_paths(&self) -> Vec<PathBuf> {
        self.parts
            .iter()
            .flat_map(|part| part.audios.iter())
            .flat_map(|audio| audio.filenames.iter())
            .map(|filename| self.audio_path(filename))
            .collect()
    }
}
