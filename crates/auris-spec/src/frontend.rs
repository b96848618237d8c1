use tracing::warn;

use crate::audio::AudioPlayer;
use crate::error::SessionError;
use crate::render::ScreenView;
use crate::session::{Outcome, Session, UiEvent};

/// Presentation collaborator: draws screen views and reports typed events.
pub trait Presenter {
    fn render(&mut self, view: &ScreenView);
    /// Next participant or collaborator event; `None` when input is closed.
    fn next_event(&mut self) -> Option<UiEvent>;
    /// Short message for the participant, e.g. a rejected input.
    fn notify(&mut self, message: &str);
}

/// Drives a session until it finishes or is aborted.
///
/// Rejected input is reported through the presenter and the screen stays
/// active. Closed input aborts the session, flushing finalized answers.
pub fn run_session<P: AudioPlayer>(
    session: &mut Session<P>,
    presenter: &mut dyn Presenter,
) -> Result<Outcome, SessionError> {
    let mut last_view = None;
    loop {
        let view = session.view();
        if last_view.as_ref() != Some(&view) {
            presenter.render(&view);
            last_view = Some(view);
        }

        let event = presenter.next_event().unwrap_or(UiEvent::Abort);
        match session.handle(event) {
            Ok(outcome @ (Outcome::Finished { .. } | Outcome::Aborted { .. })) => {
                presenter.render(&session.view());
                return Ok(outcome);
            }
            Ok(Outcome::Ignored(reason)) => presenter.notify(reason),
            Ok(Outcome::Updated | Outcome::Navigated { .. }) => {}
            Err(SessionError::Input(err)) => presenter.notify(&err.to_string()),
            Err(SessionError::Audio(err)) => {
                warn!(%err, "audio playback failed");
                presenter.notify(&err.to_string());
            }
            Err(err) => return Err(err),
        }
    }
}
