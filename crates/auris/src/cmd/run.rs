use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use auris_spec::{CsvFileSink, Outcome, Session, SessionError, run_session};
use clap::Args;
use tracing::{error, info};

use super::load_and_sequence;
use crate::settings::Settings;
use crate::terminal::{HELP, PlaybackQueue, SimulatedPlayer, TerminalPresenter};

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Experiment description (`<name>.palila`)
    #[arg(value_name = "EXPERIMENT")]
    pub experiment: PathBuf,
    /// Seed for randomised orders; drawn at random when omitted
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,
    /// Preset participant id
    #[arg(long, value_name = "ID")]
    pub pid: Option<String>,
    /// Directory for response files
    #[arg(long = "out", value_name = "DIR")]
    pub out: Option<PathBuf>,
    /// Let intro and break timers elapse immediately
    #[arg(long = "skip-timers", default_value_t = false)]
    pub skip_timers: bool,
}

pub fn run(args: RunArgs, settings: &Settings) -> Result<()> {
    let (spec, sequence) = load_and_sequence(&args.experiment, args.seed.or(settings.seed))?;
    if let Some(seed) = sequence.seed {
        info!(seed, "session order seed");
    }
    let output_dir = settings.output_dir(args.out);

    let playback = PlaybackQueue::default();
    let player = SimulatedPlayer::new(playback.clone());
    let sink = CsvFileSink::new(&output_dir);
    let mut session = Session::new(spec, sequence, player, Box::new(sink));
    if let Some(sample) = &settings.demo_sample {
        session = session.with_demo_sample(sample);
    }
    if let Some(pid) = args.pid {
        session = session.with_participant(pid);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    writeln!(stdout, "{HELP}")?;
    let mut presenter = TerminalPresenter::new(
        stdin.lock(),
        stdout,
        playback,
        args.skip_timers || settings.skip_timers,
    );

    match run_session(&mut session, &mut presenter) {
        Ok(Outcome::Finished { path }) => {
            println!("responses written to {}", path.display());
            Ok(())
        }
        Ok(Outcome::Aborted { path: Some(path) }) => {
            println!("experiment stopped; answers so far written to {}", path.display());
            Ok(())
        }
        Ok(Outcome::Aborted { path: None }) => {
            println!("experiment stopped before a participant id was set; nothing written");
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(SessionError::Persistence(err)) => {
            error!(%err, dir = %output_dir.display(), "cannot write responses");
            let fallback = env::temp_dir().join("auris-recovered");
            let path = session
                .export(&mut CsvFileSink::new(&fallback))
                .with_context(|| format!("responses could not be saved ({err})"))?;
            println!("responses saved to {} instead", path.display());
            Ok(())
        }
        Err(err) => Err(err).context("session failed"),
    }
}
