use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use auris_spec::{
    AudioError, AudioPlayer, ExperimentSpec, Outcome, PersistenceError, PlaybackHandle,
    Presenter, ResponseSink, ResponseTable, RuntimeInputError, ScreenView, Session, SessionError,
    Stage, UiEvent, ViewBody, build_sequence, parse_experiment, run_session,
};

#[derive(Default)]
struct ScriptedPlayer {
    next: u64,
    played: Vec<PathBuf>,
    stopped: Vec<PlaybackHandle>,
}

impl AudioPlayer for ScriptedPlayer {
    fn play(&mut self, path: &Path) -> Result<PlaybackHandle, AudioError> {
        self.next += 1;
        self.played.push(path.to_path_buf());
        Ok(PlaybackHandle(self.next))
    }

    fn stop(&mut self, handle: PlaybackHandle) {
        self.stopped.push(handle);
    }
}

#[derive(Clone, Default)]
struct MemorySink {
    tables: Rc<RefCell<Vec<ResponseTable>>>,
}

impl ResponseSink for MemorySink {
    fn persist(&mut self, table: &ResponseTable) -> Result<PathBuf, PersistenceError> {
        self.tables.borrow_mut().push(table.clone());
        Ok(PathBuf::from(format!("memory/{}.csv", table.participant())))
    }
}

const GLASSES: &str = "pid mode = input
[questionnaire]
default = no
[[question 1]]
type = MultipleChoice
text = Do you wear glasses?
choices = Yes, No
[[question 2]]
type = FreeText
text = Which kind?
unlocked by = 1
unlock condition = Yes
[part 1]
[[audio 1]]
filename = a.wav
max replays = 2
[[[question 1]]]
type = Slider
text = How loud?
min = 0
max = 10
step = 0.5
[[audio 2]]
filename = b.wav
[[[question 1]]]
type = Text
text = Just listen.
";

fn load(text: &str) -> ExperimentSpec {
    parse_experiment(text, "listening", PathBuf::from("listening")).expect("valid description")
}

fn session(text: &str) -> (Session<ScriptedPlayer>, MemorySink) {
    let spec = load(text);
    let sequence = build_sequence(&spec, None).expect("sequence");
    let sink = MemorySink::default();
    let session = Session::new(
        spec,
        sequence,
        ScriptedPlayer::default(),
        Box::new(sink.clone()),
    );
    (session, sink)
}

fn send(session: &mut Session<ScriptedPlayer>, event: UiEvent) -> Outcome {
    session.handle(event).expect("event accepted")
}

fn answer(session: &mut Session<ScriptedPlayer>, id: &str, value: &str) -> Outcome {
    send(
        session,
        UiEvent::AnswerChanged {
            id: id.into(),
            value: value.into(),
        },
    )
}

fn listen(session: &mut Session<ScriptedPlayer>, sample: usize) {
    send(session, UiEvent::ReplayPressed { sample });
    let handle = PlaybackHandle(session.player().next);
    send(session, UiEvent::PlaybackComplete { handle });
}

fn proceed(session: &mut Session<ScriptedPlayer>) -> String {
    match send(session, UiEvent::ContinuePressed) {
        Outcome::Navigated { to } => to,
        other => panic!("expected navigation, got {other:?}"),
    }
}

fn cell(table: &ResponseTable, column: &str) -> String {
    let index = table
        .header
        .iter()
        .position(|name| name == column)
        .expect("column present");
    table.row[index].clone()
}

#[test]
fn completes_experiment_and_writes_row() {
    let (mut session, sink) = session(GLASSES);
    assert_eq!(session.stage(), Stage::Welcome);
    assert!(!session.can_continue());

    send(&mut session, UiEvent::ParticipantId(" P01 ".into()));
    assert_eq!(proceed(&mut session), "main-questionnaire-1");
    assert!(!session.can_continue());

    answer(&mut session, "main-questionnaire-01", "Yes");
    assert!(!session.can_continue());
    answer(&mut session, "main-questionnaire-02", "contacts");
    assert!(session.can_continue());
    assert_eq!(proceed(&mut session), "part 1-audio 1");

    listen(&mut session, 0);
    answer(&mut session, "01-01-01", "7.5");
    assert_eq!(proceed(&mut session), "part 1-audio 2");

    assert!(!session.can_continue());
    listen(&mut session, 0);
    assert_eq!(proceed(&mut session), "end");

    let outcome = send(&mut session, UiEvent::ContinuePressed);
    assert_eq!(
        outcome,
        Outcome::Finished {
            path: PathBuf::from("memory/P01.csv")
        }
    );
    assert!(session.is_done());

    let tables = sink.tables.borrow();
    assert_eq!(tables.len(), 1);
    let table = &tables[0];
    assert_eq!(
        table.header,
        vec![
            "participant",
            "main-questionnaire-01",
            "main-questionnaire-02",
            "01-01-replays",
            "01-01-01",
            "01-02-01",
            "timer",
        ]
    );
    assert_eq!(&table.row[..6], &["P01", "Yes", "contacts", "1", "7.5", "n/a"]);
    assert!(!cell(table, "timer").is_empty());
}

#[test]
fn locked_question_rejects_answers() {
    let (mut session, _sink) = session(GLASSES);
    send(&mut session, UiEvent::ParticipantId("P02".into()));
    proceed(&mut session);

    let err = session
        .handle(UiEvent::AnswerChanged {
            id: "main-questionnaire-02".into(),
            value: "contacts".into(),
        })
        .expect_err("locked");
    assert!(matches!(
        err,
        SessionError::Input(RuntimeInputError::Locked { .. })
    ));

    answer(&mut session, "main-questionnaire-01", "No");
    assert!(session.can_continue());
}

#[test]
fn relocked_answer_is_dropped_on_leave() {
    let (mut session, sink) = session(GLASSES);
    send(&mut session, UiEvent::ParticipantId("P03".into()));
    proceed(&mut session);
    answer(&mut session, "main-questionnaire-01", "Yes");
    answer(&mut session, "main-questionnaire-02", "contacts");
    answer(&mut session, "main-questionnaire-01", "No");
    proceed(&mut session);

    assert_eq!(session.store().get_answer("main-questionnaire-02"), None);
    send(&mut session, UiEvent::Abort);
    let tables = sink.tables.borrow();
    assert_eq!(cell(&tables[0], "main-questionnaire-02"), "");
    assert_eq!(cell(&tables[0], "main-questionnaire-01"), "No");
}

#[test]
fn audio_questions_wait_for_playback() {
    let (mut session, _sink) = session(GLASSES);
    send(&mut session, UiEvent::ParticipantId("P04".into()));
    proceed(&mut session);
    answer(&mut session, "main-questionnaire-01", "No");
    proceed(&mut session);

    let err = session
        .handle(UiEvent::AnswerChanged {
            id: "01-01-01".into(),
            value: "3".into(),
        })
        .expect_err("not heard yet");
    assert!(matches!(
        err,
        SessionError::Input(RuntimeInputError::Locked { .. })
    ));

    send(&mut session, UiEvent::ReplayPressed { sample: 0 });
    assert!(matches!(
        send(&mut session, UiEvent::ContinuePressed),
        Outcome::Ignored(_)
    ));
    assert!(matches!(
        send(&mut session, UiEvent::PlaybackComplete {
            handle: PlaybackHandle(99)
        }),
        Outcome::Ignored(_)
    ));
    send(&mut session, UiEvent::PlaybackComplete {
        handle: PlaybackHandle(1),
    });
    assert_eq!(session.store().replay_count("01-01-replays"), 1);
    assert_eq!(
        session.player().played,
        vec![PathBuf::from("listening").join("a.wav")]
    );

    answer(&mut session, "01-01-01", "4");
    assert!(session.can_continue());
}

#[test]
fn replays_are_capped() {
    let (mut session, _sink) = session(GLASSES);
    send(&mut session, UiEvent::ParticipantId("P05".into()));
    proceed(&mut session);
    answer(&mut session, "main-questionnaire-01", "No");
    proceed(&mut session);

    listen(&mut session, 0);
    listen(&mut session, 0);
    assert!(matches!(
        send(&mut session, UiEvent::ReplayPressed { sample: 0 }),
        Outcome::Ignored(_)
    ));
    assert_eq!(session.store().replay_count("01-01-replays"), 2);
    assert_eq!(session.player().played.len(), 2);
}

#[test]
fn off_grid_slider_value_is_rejected() {
    let (mut session, _sink) = session(GLASSES);
    send(&mut session, UiEvent::ParticipantId("P06".into()));
    proceed(&mut session);
    answer(&mut session, "main-questionnaire-01", "No");
    proceed(&mut session);
    listen(&mut session, 0);

    let err = session
        .handle(UiEvent::AnswerChanged {
            id: "01-01-01".into(),
            value: "7.3".into(),
        })
        .expect_err("off grid");
    assert!(matches!(
        err,
        SessionError::Input(RuntimeInputError::OffStep { .. })
    ));
    assert!(!session.can_continue());
}

#[test]
fn return_from_end_overwrites_main_answers() {
    let (mut session, sink) = session(GLASSES);
    send(&mut session, UiEvent::ParticipantId("P07".into()));
    proceed(&mut session);
    answer(&mut session, "main-questionnaire-01", "No");
    proceed(&mut session);
    listen(&mut session, 0);
    answer(&mut session, "01-01-01", "2");
    proceed(&mut session);
    listen(&mut session, 0);
    assert_eq!(proceed(&mut session), "end");
    assert!(session.view().can_return);

    assert_eq!(
        send(&mut session, UiEvent::ReturnToQuestionnaire),
        Outcome::Navigated {
            to: "main-questionnaire-1".into()
        }
    );
    answer(&mut session, "main-questionnaire-01", "Yes");
    answer(&mut session, "main-questionnaire-02", "glasses");
    assert_eq!(proceed(&mut session), "end");
    send(&mut session, UiEvent::ContinuePressed);

    let tables = sink.tables.borrow();
    let table = &tables[0];
    assert_eq!(cell(table, "main-questionnaire-01"), "Yes");
    assert_eq!(cell(table, "main-questionnaire-02"), "glasses");
    assert_eq!(cell(table, "01-01-01"), "2.0");
}

#[test]
fn unmet_screen_unlock_skips_audio() {
    let text = "[part 1]
[[audio 1]]
filename = a.wav
[[[question 1]]]
type = MultipleChoice
text = Again?
choices = Yes, No
[[audio 2]]
filename = b.wav
unlocked by = 01-01-01
unlock condition = Yes
[[[question 1]]]
type = Annoyance
";
    let (mut session, sink) = session(text);
    proceed(&mut session);
    listen(&mut session, 0);
    answer(&mut session, "01-01-01", "No");
    assert_eq!(proceed(&mut session), "end");
    send(&mut session, UiEvent::ContinuePressed);

    let tables = sink.tables.borrow();
    assert_eq!(cell(&tables[0], "01-02-01"), "");

    let (mut session, _sink) = session_with_yes(text);
    assert_eq!(proceed(&mut session), "part 1-audio 2");
}

fn session_with_yes(text: &str) -> (Session<ScriptedPlayer>, MemorySink) {
    let (mut session, sink) = session(text);
    proceed(&mut session);
    listen(&mut session, 0);
    answer(&mut session, "01-01-01", "Yes");
    (session, sink)
}

#[test]
fn break_waits_for_its_timer() {
    let text = "[part 1]
[[breaks]]
interval = 0
time = 30
[[audio 1]]
filename = a.wav
";
    let (mut session, _sink) = session(text);
    proceed(&mut session);
    listen(&mut session, 0);
    assert_eq!(proceed(&mut session), "part 1-break 1");

    let view = session.view();
    let timer = view.timer.clone().expect("timer requested");
    assert_eq!(timer.seconds, 30.0);
    assert!(!view.can_continue);
    assert!(matches!(view.body, ViewBody::Timed { elapsed: false, .. }));

    assert!(matches!(
        send(&mut session, UiEvent::TimerExpired {
            token: timer.token + 1
        }),
        Outcome::Ignored(_)
    ));
    send(&mut session, UiEvent::TimerExpired { token: timer.token });
    assert!(session.can_continue());
    assert!(session.view().timer.is_none());
    assert_eq!(proceed(&mut session), "end");
}

#[test]
fn override_skips_gating_but_not_participant() {
    let text = "pid mode = input\noverride = yes\n[part 1]\n[[audio 1]]\nfilename = a.wav\n[[[question 1]]]\ntype = Annoyance\n";
    let (mut session, _sink) = session(text);
    assert!(!session.can_continue());
    send(&mut session, UiEvent::ParticipantId("P08".into()));
    proceed(&mut session);
    assert!(session.can_continue());
    assert_eq!(proceed(&mut session), "end");
}

#[test]
fn back_stays_inside_questionnaire() {
    let mut text = String::from("[questionnaire]\ndefault = no\n");
    for index in 1..=8 {
        text.push_str(&format!(
            "[[question {index}]]\ntype = FreeText\ntext = Q{index}\n"
        ));
    }
    text.push_str("[part 1]\n[[audio 1]]\nfilename = a.wav\n");
    let (mut session, _sink) = session(&text);
    assert_eq!(proceed(&mut session), "main-questionnaire-1");
    assert!(!session.view().can_go_back);
    assert!(session.handle(UiEvent::BackPressed).is_err());

    for index in 1..=7 {
        answer(&mut session, &format!("main-questionnaire-{index:02}"), "x");
    }
    assert_eq!(proceed(&mut session), "main-questionnaire-2");
    assert!(session.view().can_go_back);
    assert_eq!(
        send(&mut session, UiEvent::BackPressed),
        Outcome::Navigated {
            to: "main-questionnaire-1".into()
        }
    );
    answer(&mut session, "main-questionnaire-01", "changed");
    assert_eq!(
        session
            .store()
            .get_answer("main-questionnaire-01")
            .map(|value| value.to_cell()),
        Some("changed".to_string())
    );
}

#[test]
fn abort_flushes_finalized_answers() {
    let (mut session, sink) = session(GLASSES);
    send(&mut session, UiEvent::ParticipantId("P09".into()));
    proceed(&mut session);
    answer(&mut session, "main-questionnaire-01", "No");
    proceed(&mut session);
    send(&mut session, UiEvent::ReplayPressed { sample: 0 });

    let outcome = send(&mut session, UiEvent::Abort);
    assert_eq!(
        outcome,
        Outcome::Aborted {
            path: Some(PathBuf::from("memory/P09.csv"))
        }
    );
    assert_eq!(session.player().stopped, vec![PlaybackHandle(1)]);
    assert_eq!(session.stage(), Stage::Aborted);

    let tables = sink.tables.borrow();
    let table = &tables[0];
    assert_eq!(cell(table, "main-questionnaire-01"), "No");
    assert_eq!(cell(table, "01-01-replays"), "");
    assert_eq!(cell(table, "01-01-01"), "");
}

#[test]
fn abort_during_revisit_keeps_earlier_answers() {
    let (mut session, sink) = session(GLASSES);
    send(&mut session, UiEvent::ParticipantId("P10".into()));
    proceed(&mut session);
    answer(&mut session, "main-questionnaire-01", "No");
    proceed(&mut session);
    listen(&mut session, 0);
    answer(&mut session, "01-01-01", "2");
    proceed(&mut session);
    listen(&mut session, 0);
    assert_eq!(proceed(&mut session), "end");

    send(&mut session, UiEvent::ReturnToQuestionnaire);
    answer(&mut session, "main-questionnaire-01", "Yes");
    send(&mut session, UiEvent::Abort);

    let tables = sink.tables.borrow();
    let table = &tables[0];
    assert_eq!(cell(table, "main-questionnaire-01"), "No");
    assert_eq!(cell(table, "01-01-01"), "2.0");
}

#[test]
fn abort_before_participant_writes_nothing() {
    let (mut session, sink) = session(GLASSES);
    assert_eq!(
        send(&mut session, UiEvent::Abort),
        Outcome::Aborted { path: None }
    );
    assert!(sink.tables.borrow().is_empty());
    assert!(matches!(
        send(&mut session, UiEvent::ContinuePressed),
        Outcome::Ignored(_)
    ));
}

#[test]
fn auto_pid_and_demo_screen() {
    let text = "demo = yes\n[part 1]\n[[audio 1]]\nfilename = a.wav\n";
    let spec = load(text);
    let sequence = build_sequence(&spec, None).expect("sequence");
    let mut session = Session::new(
        spec,
        sequence,
        ScriptedPlayer::default(),
        Box::new(MemorySink::default()),
    )
    .with_demo_sample("demo.wav");

    assert_eq!(session.stage(), Stage::Demo);
    assert!(session.store().participant().is_some());
    assert!(matches!(
        session.handle(UiEvent::ParticipantId("x".into())),
        Err(SessionError::Input(RuntimeInputError::Unexpected { .. }))
    ));

    listen(&mut session, 0);
    answer(&mut session, "demo-01", "5");
    assert!(!session.can_continue());
    answer(&mut session, "demo-02", "2.5");
    assert_eq!(proceed(&mut session), "welcome");
    assert!(session.can_continue());
    assert_eq!(proceed(&mut session), "part 1-audio 1");
}

struct ScriptedPresenter {
    events: Vec<UiEvent>,
    rendered: Vec<String>,
    notices: Vec<String>,
}

impl Presenter for ScriptedPresenter {
    fn render(&mut self, view: &ScreenView) {
        self.rendered.push(view.name.clone());
    }

    fn next_event(&mut self) -> Option<UiEvent> {
        if self.events.is_empty() {
            None
        } else {
            Some(self.events.remove(0))
        }
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}

#[test]
fn run_session_reports_rejections_and_aborts_on_closed_input() {
    let (mut session, sink) = session(GLASSES);
    let mut presenter = ScriptedPresenter {
        events: vec![
            UiEvent::ContinuePressed,
            UiEvent::ParticipantId("P10".into()),
            UiEvent::ContinuePressed,
            UiEvent::AnswerChanged {
                id: "main-questionnaire-01".into(),
                value: "Maybe".into(),
            },
        ],
        rendered: Vec::new(),
        notices: Vec::new(),
    };

    let outcome = run_session(&mut session, &mut presenter).expect("run");
    assert!(matches!(outcome, Outcome::Aborted { path: Some(_) }));
    assert_eq!(presenter.notices.len(), 2);
    assert_eq!(
        presenter.rendered.first().map(String::as_str),
        Some("welcome")
    );
    assert!(
        presenter
            .rendered
            .iter()
            .any(|name| name == "main-questionnaire-1")
    );
    assert_eq!(presenter.rendered.last().map(String::as_str), Some("final"));
    assert_eq!(sink.tables.borrow().len(), 1);
}
