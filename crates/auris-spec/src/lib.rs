#![allow(missing_docs)]

pub mod answers;
pub mod audio;
pub mod config;
pub mod defaults;
pub mod error;
pub mod frontend;
pub mod ids;
pub mod load;
pub mod output;
pub mod progress;
pub mod render;
pub mod sequence;
pub mod session;
pub mod spec;
pub mod unlock;
pub mod validate;

pub use answers::{AnswerStore, AnswerValue};
pub use audio::{AudioPlayer, PlaybackHandle};
pub use error::{
    AudioError, ConfigError, PersistenceError, RuntimeInputError, SequencingError, SessionError,
    StoreError,
};
pub use frontend::{Presenter, run_session};
pub use load::{load_experiment, parse_experiment};
pub use output::{CsvFileSink, ResponseSink, ResponseTable, persist_with_retry};
pub use progress::{Progress, ProgressTracker};
pub use render::{ScreenView, ViewBody, render_text, screen_view_schema};
pub use sequence::{
    AudioScreen, QuestionnairePage, ResolvedQuestion, Screen, ScreenKind, ScreenSequence,
    build_sequence,
};
pub use session::{Outcome, Session, Stage, UiEvent};
pub use spec::{ExperimentSpec, PartSpec, PidMode, QuestionKind, QuestionSpec};
pub use unlock::{AnswerLookup, ResolvedUnlock};
pub use validate::parse_answer;
