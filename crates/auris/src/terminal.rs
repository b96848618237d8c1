//! Line-oriented presenter and a simulated audio player for terminal sessions.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use auris_spec::{
    AudioError, AudioPlayer, PlaybackHandle, Presenter, ScreenView, UiEvent, render_text,
};
use tracing::{info, warn};

pub const HELP: &str = "commands:
  play [left|right]     play a sample
  answer <id> <value>   answer a question (empty value clears it; multi-select: a;b)
  pid <id>              set the participant id
  continue | back | return
  wait                  let the playing sample or the screen timer finish
  quit                  stop the experiment, keeping finalized answers";

/// Playbacks started by [`SimulatedPlayer`] that have not finished yet.
#[derive(Debug, Clone, Default)]
pub struct PlaybackQueue(Rc<RefCell<Vec<(PlaybackHandle, PathBuf)>>>);

impl PlaybackQueue {
    fn start(&self, handle: PlaybackHandle, path: PathBuf) {
        self.0.borrow_mut().push((handle, path));
    }

    fn stop(&self, handle: PlaybackHandle) {
        self.0.borrow_mut().retain(|(playing, _)| *playing != handle);
    }

    fn finish_all(&self) -> Vec<(PlaybackHandle, PathBuf)> {
        self.0.borrow_mut().drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

/// Stands in for an audio device: a playback lasts until the participant types `wait`.
#[derive(Debug, Default)]
pub struct SimulatedPlayer {
    next: u64,
    queue: PlaybackQueue,
}

impl SimulatedPlayer {
    pub fn new(queue: PlaybackQueue) -> Self {
        Self { next: 0, queue }
    }
}

impl AudioPlayer for SimulatedPlayer {
    fn play(&mut self, path: &Path) -> Result<PlaybackHandle, AudioError> {
        if !path.is_file() {
            return Err(AudioError::Playback {
                path: path.to_path_buf(),
                message: "file not found".into(),
            });
        }
        self.next += 1;
        let handle = PlaybackHandle(self.next);
        info!(path = %path.display(), handle = handle.0, "simulated playback started");
        self.queue.start(handle, path.to_path_buf());
        Ok(handle)
    }

    fn stop(&mut self, handle: PlaybackHandle) {
        self.queue.stop(handle);
    }
}

/// `None` when the countdown does not fit in an `Instant`.
fn deadline_after(seconds: f64) -> Option<Instant> {
    let length = Duration::try_from_secs_f64(seconds.max(0.0)).ok()?;
    Instant::now().checked_add(length)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Event(UiEvent),
    Wait,
    Help,
    Nothing,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map(|(word, rest)| (word, rest.trim()))
        .unwrap_or((line, ""));
    let command = match word {
        "" => Command::Nothing,
        "play" | "p" => {
            let sample = match rest {
                "" | "left" | "1" => 0,
                "right" | "2" => 1,
                other => return Err(format!("unknown sample '{other}', use left or right")),
            };
            Command::Event(UiEvent::ReplayPressed { sample })
        }
        "answer" | "a" => {
            let (id, value) = rest
                .split_once(char::is_whitespace)
                .map(|(id, value)| (id, value.trim()))
                .unwrap_or((rest, ""));
            if id.is_empty() {
                return Err("usage: answer <id> <value>".into());
            }
            Command::Event(UiEvent::AnswerChanged {
                id: id.to_string(),
                value: value.to_string(),
            })
        }
        "pid" => Command::Event(UiEvent::ParticipantId(rest.to_string())),
        "continue" | "c" => Command::Event(UiEvent::ContinuePressed),
        "back" | "b" => Command::Event(UiEvent::BackPressed),
        "return" => Command::Event(UiEvent::ReturnToQuestionnaire),
        "quit" | "q" => Command::Event(UiEvent::Abort),
        "wait" | "w" => Command::Wait,
        "help" | "?" => Command::Help,
        other => return Err(format!("unknown command '{other}', type help")),
    };
    Ok(command)
}

/// Renders screen views as text and turns typed commands into events.
pub struct TerminalPresenter<R, W> {
    input: R,
    output: W,
    playback: PlaybackQueue,
    skip_timers: bool,
    pending: VecDeque<UiEvent>,
    /// Running screen timer; a `None` deadline never expires on its own.
    timer: Option<(u64, Option<Instant>)>,
}

impl<R: BufRead, W: Write> TerminalPresenter<R, W> {
    pub fn new(input: R, output: W, playback: PlaybackQueue, skip_timers: bool) -> Self {
        Self {
            input,
            output,
            playback,
            skip_timers,
            pending: VecDeque::new(),
            timer: None,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn write_line(&mut self, text: &str) {
        if let Err(err) = writeln!(self.output, "{text}") {
            warn!(%err, "cannot write to the terminal");
        }
    }

    fn prompt(&mut self) {
        let written = write!(self.output, "> ").and_then(|_| self.output.flush());
        if let Err(err) = written {
            warn!(%err, "cannot write to the terminal");
        }
    }

    fn wait(&mut self) {
        let finished = self.playback.finish_all();
        if !finished.is_empty() {
            for (handle, path) in finished {
                self.write_line(&format!("finished playing {}", path.display()));
                self.pending.push_back(UiEvent::PlaybackComplete { handle });
            }
            return;
        }
        if let Some((token, deadline)) = self.timer.take() {
            if let Some(deadline) = deadline {
                thread::sleep(deadline.saturating_duration_since(Instant::now()));
            }
            self.pending.push_back(UiEvent::TimerExpired { token });
            return;
        }
        self.write_line("nothing to wait for");
    }
}

impl<R: BufRead, W: Write> Presenter for TerminalPresenter<R, W> {
    fn render(&mut self, view: &ScreenView) {
        self.timer = match (&view.timer, self.timer) {
            (Some(request), Some((token, deadline))) if request.token == token => {
                Some((token, deadline))
            }
            (Some(request), _) => Some((request.token, deadline_after(request.seconds))),
            (None, _) => None,
        };
        if self.skip_timers
            && let Some((token, _)) = self.timer.take()
        {
            self.pending.push_back(UiEvent::TimerExpired { token });
        }
        self.write_line("");
        self.write_line(&render_text(view));
    }

    fn next_event(&mut self) -> Option<UiEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if let Some((token, Some(deadline))) = self.timer
                && Instant::now() >= deadline
            {
                self.timer = None;
                return Some(UiEvent::TimerExpired { token });
            }

            self.prompt();
            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => {
                    warn!(%err, "cannot read from the terminal");
                    return None;
                }
            }
            match parse_command(&line) {
                Ok(Command::Event(event)) => return Some(event),
                Ok(Command::Wait) => self.wait(),
                Ok(Command::Help) => self.write_line(HELP),
                Ok(Command::Nothing) => {}
                Err(message) => self.write_line(&message),
            }
        }
    }

    fn notify(&mut self, message: &str) {
        self.write_line(&format!("! {message}"));
    }
}
