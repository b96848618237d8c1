pub mod experiment;
pub mod question;

pub use experiment::{
    AudioSpec, BreakPolicy, DEFAULT_BREAK_TEXT, DEFAULT_GOODBYE, DEFAULT_WELCOME, ExperimentSpec,
    PartSpec, PidMode, QuestionnaireSpec, TimedText,
};
pub use question::{ANNOYANCE_LABELS, QuestionKind, QuestionSpec, ScaleNotes, UnlockRule};
