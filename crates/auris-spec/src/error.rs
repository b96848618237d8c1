use std::path::PathBuf;

use thiserror::Error;

/// Malformed, missing, or contradictory experiment description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {message}")]
    Read { path: PathBuf, message: String },
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("[{section}] missing required key '{key}'")]
    MissingKey { section: String, key: String },
    #[error("[{section}] {key} = '{value}': expected {expected}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        expected: &'static str,
    },
    #[error("[{section}] {message}")]
    Invalid { section: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(section: &str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            section: section.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        ConfigError::MissingKey {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

/// Raised while expanding a definition into its screen sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequencingError {
    #[error("duplicate question id '{id}' on screens '{first}' and '{second}'")]
    DuplicateId {
        id: String,
        first: String,
        second: String,
    },
    #[error(
        "question '{id}' is unlocked by '{reference}', which is not an earlier question in {scope}"
    )]
    UnresolvedUnlock {
        id: String,
        reference: String,
        scope: String,
    },
    #[error(
        "screen '{screen}' is unlocked by '{reference}', which is not a question on an earlier audio screen of {scope}"
    )]
    UnresolvedScreenUnlock {
        screen: String,
        reference: String,
        scope: String,
    },
}

/// Participant input that cannot be accepted. The screen stays active and nothing is mutated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeInputError {
    #[error("'{id}' is not a question on this screen")]
    UnknownQuestion { id: String },
    #[error("question '{id}' is locked")]
    Locked { id: String },
    #[error("question '{id}' does not take an answer")]
    NotAnswerable { id: String },
    #[error("'{value}' is not a whole number")]
    NotANumber { value: String },
    #[error("'{value}' is not one of the choices of '{id}'")]
    NotAChoice { id: String, value: String },
    #[error("'{value}' is selected more than once")]
    DuplicateChoice { value: String },
    #[error("{value} is outside [{min}, {max}]")]
    OutOfRange { value: String, min: String, max: String },
    #[error("{value} is not on the step grid of {step}")]
    OffStep { value: String, step: String },
    #[error("participant id must not be empty")]
    EmptyParticipantId,
    #[error("no screen accepts '{event}' right now")]
    Unexpected { event: &'static str },
}

/// Output file write failure. In-memory answers are kept for a retry or export.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to write responses to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("participant id is not set")]
    MissingParticipant,
}

/// Misuse of the answer store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("unknown answer id '{0}'")]
    UnknownId(String),
    #[error("answer '{0}' is finalized")]
    Finalized(String),
}

/// Failure reported by the audio collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    #[error("cannot play {path}: {message}")]
    Playback { path: PathBuf, message: String },
}

/// Errors surfaced while a session handles an event.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Input(#[from] RuntimeInputError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
