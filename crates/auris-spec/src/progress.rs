use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::sequence::ScreenSequence;

/// Audio screens of one part, in sequence order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PartProgress {
    pub part: String,
    pub audio_screens: usize,
}

/// Progress shown on a screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub parts: Vec<PartProgress>,
}

/// Precomputed audio-screen positions of a sequence.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    /// Audio screens before each screen index.
    before: Vec<usize>,
    total: usize,
    parts: Vec<PartProgress>,
}

impl ProgressTracker {
    pub fn new(sequence: &ScreenSequence) -> Self {
        let mut before = Vec::with_capacity(sequence.len());
        let mut parts: Vec<PartProgress> = Vec::new();
        let mut count = 0;
        for screen in &sequence.screens {
            before.push(count);
            if !screen.is_audio() {
                continue;
            }
            count += 1;
            let part = screen.part.clone().unwrap_or_default();
            match parts.last_mut() {
                Some(last) if last.part == part => last.audio_screens += 1,
                _ => parts.push(PartProgress {
                    part,
                    audio_screens: 1,
                }),
            }
        }
        Self {
            before,
            total: count,
            parts,
        }
    }

    /// Progress while `index` is the active screen.
    pub fn at(&self, index: usize) -> Progress {
        Progress {
            completed: self.before.get(index).copied().unwrap_or(self.total),
            total: self.total,
            parts: self.parts.clone(),
        }
    }

    pub fn complete(&self) -> Progress {
        Progress {
            completed: self.total,
            total: self.total,
            parts: self.parts.clone(),
        }
    }
}
