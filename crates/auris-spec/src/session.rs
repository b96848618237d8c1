//! Session state machine: stages, navigation, gating, playback and timers.

use std::collections::BTreeMap;
use std::path::PathBuf;

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::answers::{AnswerStore, AnswerValue};
use crate::audio::{AudioPlayer, PlaybackHandle, sample_label};
use crate::error::{PersistenceError, RuntimeInputError, SessionError};
use crate::output::{ResponseSink, ResponseTable, persist_with_retry};
use crate::progress::ProgressTracker;
use crate::render::{QuestionView, SampleView, ScreenView, TimerRequest, ViewBody};
use crate::sequence::{ResolvedQuestion, Screen, ScreenKind, ScreenSequence};
use crate::spec::{ExperimentSpec, PidMode, QuestionKind, ScaleNotes};
use crate::unlock::{AnswerLookup, is_unlocked};
use crate::validate::parse_answer;

/// Typed events reported by the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    AnswerChanged { id: String, value: String },
    ContinuePressed,
    BackPressed,
    /// Play sample `sample` (0 = left or only, 1 = right).
    ReplayPressed { sample: usize },
    PlaybackComplete { handle: PlaybackHandle },
    TimerExpired { token: u64 },
    ParticipantId(String),
    ReturnToQuestionnaire,
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Demo,
    Welcome,
    Screen(usize),
    Finished,
    Aborted,
}

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Updated,
    /// The event had no effect; the reason is shown to the participant.
    Ignored(&'static str),
    Navigated { to: String },
    Finished { path: PathBuf },
    Aborted { path: Option<PathBuf> },
}

/// Runtime state of the active screen.
#[derive(Debug, Default)]
struct ScreenState {
    plays: Vec<u32>,
    heard: Vec<bool>,
    playing: Option<(usize, PlaybackHandle)>,
    timer_token: u64,
    timer_elapsed: bool,
}

impl ScreenState {
    fn reset(&mut self, samples: usize, timed: bool) {
        self.plays = vec![0; samples];
        self.heard = vec![false; samples];
        self.playing = None;
        self.timer_token += 1;
        self.timer_elapsed = !timed;
    }

    fn all_heard(&self) -> bool {
        self.heard.iter().all(|heard| *heard)
    }
}

const DEMO_SCREEN: &str = "demo";
const WELCOME_SCREEN: &str = "welcome";
const FINAL_SCREEN: &str = "final";

/// Participant id from local time, `YYMMDD-HHMM`.
pub fn auto_participant_id() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format!(
        "{:02}{:02}{:02}-{:02}{:02}",
        now.year().rem_euclid(100),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute()
    )
}

fn demo_questions() -> Vec<ResolvedQuestion> {
    vec![
        ResolvedQuestion {
            id: "demo-01".into(),
            name: "1".into(),
            prompt: Some("How would you rate this sound?".into()),
            kind: QuestionKind::IntegerScale {
                min: 0,
                max: 7,
                notes: ScaleNotes {
                    left: Some("Very Bad".into()),
                    right: Some("Very Good".into()),
                },
            },
            unlock: None,
        },
        ResolvedQuestion {
            id: "demo-02".into(),
            name: "2".into(),
            prompt: Some("How loud was this sound?".into()),
            kind: QuestionKind::Slider {
                min: 0.0,
                max: 10.0,
                step: 0.5,
                initial: None,
                notes: ScaleNotes::default(),
            },
            unlock: None,
        },
    ]
}

/// Answers of the demo screen; never recorded.
#[derive(Debug, Default)]
struct DemoAnswers(BTreeMap<String, String>);

impl AnswerLookup for DemoAnswers {
    fn answer_text(&self, id: &str) -> Option<String> {
        self.0.get(id).cloned()
    }
}

/// One participant's run through an experiment.
pub struct Session<P: AudioPlayer> {
    spec: ExperimentSpec,
    sequence: ScreenSequence,
    store: AnswerStore,
    player: P,
    sink: Box<dyn ResponseSink>,
    progress: ProgressTracker,
    stage: Stage,
    state: ScreenState,
    demo_sample: Option<PathBuf>,
    demo_questions: Vec<ResolvedQuestion>,
    demo_answers: DemoAnswers,
    /// Set after a return from the end screen; the last main page leads back there.
    revisiting: bool,
}

impl<P: AudioPlayer> Session<P> {
    pub fn new(
        spec: ExperimentSpec,
        sequence: ScreenSequence,
        player: P,
        sink: Box<dyn ResponseSink>,
    ) -> Self {
        let mut store = AnswerStore::new(sequence.columns.clone());
        if spec.pid_mode == PidMode::Auto {
            store.set_participant(auto_participant_id());
        }
        let progress = ProgressTracker::new(&sequence);
        let stage = if spec.demo { Stage::Demo } else { Stage::Welcome };
        let mut session = Self {
            spec,
            sequence,
            store,
            player,
            sink,
            progress,
            stage,
            state: ScreenState::default(),
            demo_sample: None,
            demo_questions: demo_questions(),
            demo_answers: DemoAnswers::default(),
            revisiting: false,
        };
        session.reset_state();
        session
    }

    /// Sample played on the demo screen.
    pub fn with_demo_sample(mut self, path: impl Into<PathBuf>) -> Self {
        self.demo_sample = Some(path.into());
        self.reset_state();
        self
    }

    /// Presets the participant id, also in `input` mode.
    pub fn with_participant(mut self, participant: impl Into<String>) -> Self {
        self.store.set_participant(participant);
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn store(&self) -> &AnswerStore {
        &self.store
    }

    pub fn sequence(&self) -> &ScreenSequence {
        &self.sequence
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn is_done(&self) -> bool {
        matches!(self.stage, Stage::Finished | Stage::Aborted)
    }

    fn current_screen(&self) -> Option<&Screen> {
        match self.stage {
            Stage::Screen(index) => self.sequence.get(index),
            _ => None,
        }
    }

    pub fn current_name(&self) -> &str {
        match self.stage {
            Stage::Demo => DEMO_SCREEN,
            Stage::Welcome => WELCOME_SCREEN,
            Stage::Screen(_) => self
                .current_screen()
                .map(|screen| screen.name.as_str())
                .unwrap_or_default(),
            Stage::Finished | Stage::Aborted => FINAL_SCREEN,
        }
    }

    fn samples(&self) -> Vec<PathBuf> {
        match self.stage {
            Stage::Demo => self.demo_sample.iter().cloned().collect(),
            _ => match self.current_screen().map(|screen| &screen.kind) {
                Some(ScreenKind::Audio(audio)) => audio.samples.clone(),
                _ => Vec::new(),
            },
        }
    }

    fn reset_state(&mut self) {
        let timed = matches!(
            self.current_screen().map(|screen| &screen.kind),
            Some(ScreenKind::Intro(_) | ScreenKind::Break(_))
        );
        let samples = self.samples().len();
        self.state.reset(samples, timed);
    }

    fn questions(&self) -> &[ResolvedQuestion] {
        match self.stage {
            Stage::Demo => &self.demo_questions,
            _ => self
                .current_screen()
                .map(Screen::questions)
                .unwrap_or_default(),
        }
    }

    fn lookup(&self) -> &dyn AnswerLookup {
        match self.stage {
            Stage::Demo => &self.demo_answers,
            _ => &self.store,
        }
    }

    fn has_audio(&self) -> bool {
        matches!(self.stage, Stage::Demo)
            || matches!(
                self.current_screen().map(|screen| &screen.kind),
                Some(ScreenKind::Audio(_))
            )
    }

    fn question_locked(&self, question: &ResolvedQuestion) -> bool {
        (self.has_audio() && !self.state.all_heard()) || !is_unlocked(question, self.lookup())
    }

    fn is_answered(&self, question: &ResolvedQuestion) -> bool {
        self.lookup().answer_text(&question.id).is_some()
    }

    /// Whether continue would currently be accepted.
    pub fn can_continue(&self) -> bool {
        if self.state.playing.is_some() {
            return false;
        }
        match self.stage {
            Stage::Welcome => self.store.participant().is_some(),
            Stage::Finished | Stage::Aborted => false,
            Stage::Demo | Stage::Screen(_) if self.spec.override_gating => true,
            Stage::Demo | Stage::Screen(_) => {
                if !self.state.timer_elapsed {
                    return false;
                }
                if self.has_audio() && !self.state.all_heard() {
                    return false;
                }
                self.questions().iter().all(|question| {
                    !question.kind.is_answerable()
                        || self.question_locked(question)
                        || self.is_answered(question)
                })
            }
        }
    }

    fn can_go_back(&self) -> bool {
        matches!(
            self.current_screen().map(|screen| &screen.kind),
            Some(ScreenKind::Questionnaire(page)) if page.page > 1
        ) && self.state.playing.is_none()
    }

    fn can_return(&self) -> bool {
        matches!(
            self.current_screen().map(|screen| &screen.kind),
            Some(ScreenKind::End)
        ) && self.sequence.first_main_page().is_some()
    }

    /// Handles one participant or collaborator event.
    pub fn handle(&mut self, event: UiEvent) -> Result<Outcome, SessionError> {
        if self.is_done() {
            return Ok(Outcome::Ignored("the experiment is over"));
        }
        match event {
            UiEvent::AnswerChanged { id, value } => self.change_answer(&id, &value),
            UiEvent::ContinuePressed => self.continue_pressed(),
            UiEvent::BackPressed => self.back_pressed(),
            UiEvent::ReplayPressed { sample } => self.replay(sample),
            UiEvent::PlaybackComplete { handle } => Ok(self.playback_complete(handle)),
            UiEvent::TimerExpired { token } => Ok(self.timer_expired(token)),
            UiEvent::ParticipantId(participant) => self.set_participant(&participant),
            UiEvent::ReturnToQuestionnaire => self.return_to_questionnaire(),
            UiEvent::Abort => self.abort(),
        }
    }

    fn change_answer(&mut self, id: &str, raw: &str) -> Result<Outcome, SessionError> {
        let question = self
            .questions()
            .iter()
            .find(|question| question.id == id)
            .cloned()
            .ok_or_else(|| RuntimeInputError::UnknownQuestion { id: id.to_string() })?;
        if self.question_locked(&question) {
            return Err(RuntimeInputError::Locked { id: id.to_string() }.into());
        }
        let value = parse_answer(&question, raw)?;

        if self.stage == Stage::Demo {
            match value {
                Some(value) => self.demo_answers.0.insert(id.to_string(), value.to_cell()),
                None => self.demo_answers.0.remove(id),
            };
            return Ok(Outcome::Updated);
        }

        match value {
            Some(value) => {
                self.store.record_answer(id, value)?;
            }
            None => {
                self.store.clear_answer(id)?;
            }
        }
        Ok(Outcome::Updated)
    }

    fn set_participant(&mut self, participant: &str) -> Result<Outcome, SessionError> {
        if self.stage != Stage::Welcome || self.spec.pid_mode != PidMode::Input {
            return Err(RuntimeInputError::Unexpected {
                event: "participant id",
            }
            .into());
        }
        let participant = participant.trim();
        if participant.is_empty() {
            return Err(RuntimeInputError::EmptyParticipantId.into());
        }
        self.store.set_participant(participant);
        info!(participant, "participant id set");
        Ok(Outcome::Updated)
    }

    fn replay(&mut self, sample: usize) -> Result<Outcome, SessionError> {
        if !self.has_audio() {
            return Err(RuntimeInputError::Unexpected { event: "play" }.into());
        }
        let samples = self.samples();
        let Some(path) = samples.get(sample) else {
            return Err(RuntimeInputError::Unexpected { event: "play" }.into());
        };
        if self.state.playing.is_some() {
            return Ok(Outcome::Ignored("another sample is playing"));
        }
        let max_plays = self.max_plays();
        if self.state.plays[sample] >= max_plays {
            return Ok(Outcome::Ignored("no plays left for this sample"));
        }
        let handle = self.player.play(path)?;
        self.state.plays[sample] += 1;
        self.state.playing = Some((sample, handle));
        debug!(
            screen = self.current_name(),
            sample = sample_label(sample, samples.len()),
            play = self.state.plays[sample],
            "playback started"
        );
        Ok(Outcome::Updated)
    }

    fn max_plays(&self) -> u32 {
        match self.current_screen().map(|screen| &screen.kind) {
            Some(ScreenKind::Audio(audio)) => audio.max_replays,
            _ => 1,
        }
    }

    fn playback_complete(&mut self, handle: PlaybackHandle) -> Outcome {
        let Some((sample, playing)) = self.state.playing else {
            return Outcome::Ignored("no sample is playing");
        };
        if playing != handle {
            return Outcome::Ignored("stale playback completion");
        }
        self.state.playing = None;
        self.state.heard[sample] = true;

        let replay_id = match self.current_screen().map(|screen| &screen.kind) {
            Some(ScreenKind::Audio(audio)) => audio.replay_ids.get(sample).cloned(),
            _ => None,
        };
        if let Some(id) = replay_id
            && let Err(err) = self.store.record_replay(&id)
        {
            warn!(%err, "replay counter not updated");
        }
        Outcome::Updated
    }

    fn timer_expired(&mut self, token: u64) -> Outcome {
        if token != self.state.timer_token || self.state.timer_elapsed {
            return Outcome::Ignored("stale timer");
        }
        self.state.timer_elapsed = true;
        Outcome::Updated
    }

    fn continue_pressed(&mut self) -> Result<Outcome, SessionError> {
        if self.state.playing.is_some() {
            warn!(screen = self.current_name(), "continue ignored while audio is playing");
            return Ok(Outcome::Ignored("wait until the sample has finished playing"));
        }
        if !self.can_continue() {
            return Ok(Outcome::Ignored("complete this screen before continuing"));
        }

        match self.stage {
            Stage::Demo => {
                self.demo_answers.0.clear();
                self.stage = Stage::Welcome;
                self.reset_state();
                info!(screen = WELCOME_SCREEN, "entered screen");
                Ok(Outcome::Navigated {
                    to: WELCOME_SCREEN.to_string(),
                })
            }
            Stage::Welcome => {
                if self.sequence.first_main_page().is_none() {
                    self.store.start_timer();
                }
                Ok(self.enter_forward(0))
            }
            Stage::Screen(index) => {
                if matches!(self.sequence.get(index).map(|s| &s.kind), Some(ScreenKind::End)) {
                    return self.finish();
                }
                self.leave(index)?;
                let leaving_main = self
                    .sequence
                    .get(index)
                    .is_some_and(Screen::is_main_questionnaire);
                let next_is_main = self
                    .sequence
                    .get(index + 1)
                    .is_some_and(Screen::is_main_questionnaire);
                if leaving_main && !next_is_main {
                    self.store.start_timer();
                    if self.revisiting {
                        self.revisiting = false;
                        if let Some(end) = self.sequence.position(crate::ids::END_SCREEN) {
                            return Ok(self.enter(end));
                        }
                    }
                }
                Ok(self.enter_forward(index + 1))
            }
            Stage::Finished | Stage::Aborted => Ok(Outcome::Ignored("the experiment is over")),
        }
    }

    fn back_pressed(&mut self) -> Result<Outcome, SessionError> {
        if !self.can_go_back() {
            return Err(RuntimeInputError::Unexpected { event: "back" }.into());
        }
        let Stage::Screen(index) = self.stage else {
            return Err(RuntimeInputError::Unexpected { event: "back" }.into());
        };
        self.leave(index)?;
        Ok(self.enter(index - 1))
    }

    fn return_to_questionnaire(&mut self) -> Result<Outcome, SessionError> {
        if !self.can_return() {
            return Err(RuntimeInputError::Unexpected {
                event: "return to questionnaire",
            }
            .into());
        }
        let Some(first) = self.sequence.first_main_page() else {
            return Err(RuntimeInputError::Unexpected {
                event: "return to questionnaire",
            }
            .into());
        };
        self.revisiting = true;
        Ok(self.enter(first))
    }

    /// Finalizes the records of a screen being left. Locked answers are
    /// dropped and display-only questions are marked `n/a`.
    fn leave(&mut self, index: usize) -> Result<(), SessionError> {
        let Some(screen) = self.sequence.get(index) else {
            return Ok(());
        };
        let questions = screen.questions().to_vec();
        let columns = screen.column_ids();
        for question in &questions {
            if !question.kind.is_answerable() {
                self.store.record_answer(&question.id, AnswerValue::NotApplicable)?;
            } else if !is_unlocked(question, &self.store) {
                self.store.clear_answer(&question.id)?;
            }
        }
        for id in &columns {
            self.store.finalize(id)?;
        }
        Ok(())
    }

    /// Enters `index`, skipping audio screens whose unlock is unmet.
    fn enter_forward(&mut self, mut index: usize) -> Outcome {
        while let Some(screen) = self.sequence.get(index) {
            match &screen.kind {
                ScreenKind::Audio(audio)
                    if audio
                        .unlock
                        .as_ref()
                        .is_some_and(|unlock| !unlock.is_met(&self.store)) =>
                {
                    info!(screen = %screen.name, "screen skipped, unlock condition not met");
                    index += 1;
                }
                _ => break,
            }
        }
        self.enter(index)
    }

    fn enter(&mut self, index: usize) -> Outcome {
        self.stage = Stage::Screen(index);
        self.reset_state();
        let columns = self
            .sequence
            .get(index)
            .map(Screen::column_ids)
            .unwrap_or_default();
        for id in &columns {
            if let Err(err) = self.store.reopen(id) {
                warn!(%err, "cannot reopen answer record");
            }
        }
        let name = self.current_name().to_string();
        info!(screen = %name, "entered screen");
        Outcome::Navigated { to: name }
    }

    fn finish(&mut self) -> Result<Outcome, SessionError> {
        self.store.stop_timer();
        self.stage = Stage::Finished;
        info!("experiment finished");
        let path = self.persist()?;
        Ok(Outcome::Finished { path })
    }

    fn abort(&mut self) -> Result<Outcome, SessionError> {
        if let Some((_, handle)) = self.state.playing.take() {
            self.player.stop(handle);
        }
        self.stage = Stage::Aborted;
        warn!(screen = self.current_name(), "experiment aborted");
        if self.store.participant().is_none() {
            return Ok(Outcome::Aborted { path: None });
        }
        let path = self.persist()?;
        Ok(Outcome::Aborted { path: Some(path) })
    }

    /// Writes the finalized answers through the session's sink.
    pub fn persist(&mut self) -> Result<PathBuf, PersistenceError> {
        let table = ResponseTable::from_store(&self.store)?;
        persist_with_retry(self.sink.as_mut(), &table)
    }

    /// Writes the finalized answers through another sink, e.g. after the
    /// session's own sink failed.
    pub fn export(&self, sink: &mut dyn ResponseSink) -> Result<PathBuf, PersistenceError> {
        let table = ResponseTable::from_store(&self.store)?;
        persist_with_retry(sink, &table)
    }

    /// Describes the active screen for the presentation layer.
    pub fn view(&self) -> ScreenView {
        let body = match self.stage {
            Stage::Demo => ViewBody::Audio {
                demo: true,
                samples: self.sample_views(),
                questions: self.question_views(),
            },
            Stage::Welcome => ViewBody::Welcome {
                text: self.spec.welcome.clone(),
                pid_mode: self.spec.pid_mode,
                participant: self.store.participant().map(str::to_string),
            },
            Stage::Finished => ViewBody::Final {
                text: self.spec.goodbye.clone(),
            },
            Stage::Aborted => ViewBody::Aborted,
            Stage::Screen(_) => match self.current_screen().map(|screen| &screen.kind) {
                Some(ScreenKind::Intro(timed) | ScreenKind::Break(timed)) => ViewBody::Timed {
                    text: timed.text.clone(),
                    seconds: timed.seconds,
                    elapsed: self.state.timer_elapsed,
                },
                Some(ScreenKind::Audio(_)) => ViewBody::Audio {
                    demo: false,
                    samples: self.sample_views(),
                    questions: self.question_views(),
                },
                Some(ScreenKind::Questionnaire(page)) => ViewBody::Questionnaire {
                    page: page.page,
                    pages: page.pages,
                    questions: self.question_views(),
                },
                Some(ScreenKind::End) | None => ViewBody::End,
            },
        };

        let progress = match self.stage {
            Stage::Screen(index) => Some(self.progress.at(index)),
            Stage::Finished => Some(self.progress.complete()),
            _ => None,
        };
        let timer = match &body {
            ViewBody::Timed { seconds, elapsed: false, .. } => Some(TimerRequest {
                token: self.state.timer_token,
                seconds: *seconds,
            }),
            _ => None,
        };

        ScreenView {
            name: self.current_name().to_string(),
            body,
            can_continue: self.can_continue(),
            can_go_back: self.can_go_back(),
            can_return: self.can_return(),
            progress,
            timer,
        }
    }

    fn sample_views(&self) -> Vec<SampleView> {
        let count = self.state.plays.len();
        let max_plays = self.max_plays();
        (0..count)
            .map(|index| SampleView {
                label: sample_label(index, count).to_string(),
                plays: self.state.plays[index],
                max_plays,
                playing: self.state.playing.is_some_and(|(playing, _)| playing == index),
                heard: self.state.heard[index],
            })
            .collect()
    }

    fn question_views(&self) -> Vec<QuestionView> {
        self.questions()
            .iter()
            .map(|question| QuestionView {
                id: question.id.clone(),
                prompt: question.prompt.clone(),
                kind: question.kind.clone(),
                locked: self.question_locked(question),
                answer: self.lookup().answer_text(&question.id),
            })
            .collect()
    }
}
