use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::AudioError;

/// Identifies one playback started by an [`AudioPlayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PlaybackHandle(pub u64);

/// Audio playback collaborator.
///
/// Completion is not reported through this trait: the presentation side
/// delivers it as a [`crate::session::UiEvent::PlaybackComplete`] event
/// carrying the handle returned by `play`.
pub trait AudioPlayer {
    fn play(&mut self, path: &Path) -> Result<PlaybackHandle, AudioError>;
    fn stop(&mut self, handle: PlaybackHandle);
}

impl<T: AudioPlayer + ?Sized> AudioPlayer for Box<T> {
    fn play(&mut self, path: &Path) -> Result<PlaybackHandle, AudioError> {
        (**self).play(path)
    }

    fn stop(&mut self, handle: PlaybackHandle) {
        (**self).stop(handle)
    }
}

/// Display label of a sample slot on a screen with `count` samples.
pub fn sample_label(index: usize, count: usize) -> &'static str {
    match (count, index) {
        (1, _) => "sample",
        (_, 0) => "left",
        _ => "right",
    }
}
