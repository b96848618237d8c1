//! Output identifiers and screen names.

/// Left-pads a name with zeros to a minimum width of two.
pub fn pad(name: &str) -> String {
    format!("{:0>2}", name)
}

/// Scope shared by every column of an audio screen instance: `01-02` or `01-02_03`.
pub fn audio_scope(part: &str, audio: &str, repetition: Option<u32>) -> String {
    match repetition {
        Some(index) => format!("{}-{}_{:02}", pad(part), pad(audio), index),
        None => format!("{}-{}", pad(part), pad(audio)),
    }
}

/// Scope of a questionnaire's questions: `main-questionnaire` or `01-questionnaire`.
pub fn questionnaire_scope(part: Option<&str>) -> String {
    match part {
        Some(part) => format!("{}-questionnaire", pad(part)),
        None => "main-questionnaire".to_string(),
    }
}

pub fn question_id(scope: &str, question: &str) -> String {
    format!("{}-{}", scope, pad(question))
}

/// Replay counter columns; only present when a sample may be played more than once.
pub fn replay_ids(scope: &str, samples: usize, max_replays: u32) -> Vec<String> {
    if max_replays <= 1 {
        return Vec::new();
    }
    if samples > 1 {
        vec![
            format!("{}-replays-left", scope),
            format!("{}-replays-right", scope),
        ]
    } else {
        vec![format!("{}-replays", scope)]
    }
}

pub fn audio_screen_name(part: &str, audio: &str, repetition: Option<u32>) -> String {
    match repetition {
        Some(index) => format!("part {}-audio {}_{:02}", part, audio, index),
        None => format!("part {}-audio {}", part, audio),
    }
}

pub fn questionnaire_page_name(part: Option<&str>, page: usize) -> String {
    match part {
        Some(part) => format!("part {}-questionnaire-{}", part, page),
        None => format!("main-questionnaire-{}", page),
    }
}

pub fn intro_name(part: &str) -> String {
    format!("part {}-intro", part)
}

pub fn break_name(part: &str, index: usize) -> String {
    format!("part {}-break {}", part, index)
}

pub const END_SCREEN: &str = "end";
pub const PARTICIPANT_COLUMN: &str = "participant";
pub const TIMER_COLUMN: &str = "timer";
