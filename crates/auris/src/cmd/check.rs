use std::path::PathBuf;

use anyhow::{Result, bail};
use auris_spec::ScreenKind;
use clap::Args;

use super::load_and_sequence;

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Experiment description (`<name>.palila`)
    #[arg(value_name = "EXPERIMENT")]
    pub experiment: PathBuf,
}

pub fn run(args: &CheckArgs) -> Result<()> {
    let (spec, sequence) = load_and_sequence(&args.experiment, Some(0))?;

    let missing: Vec<PathBuf> = spec
        .sample_paths()
        .into_iter()
        .filter(|path| !path.is_file())
        .collect();
    for path in &missing {
        eprintln!("missing audio file: {}", path.display());
    }
    if !missing.is_empty() {
        bail!(
            "{}: {} audio file(s) missing under {}",
            args.experiment.display(),
            missing.len(),
            spec.audio_root.display()
        );
    }

    let breaks = sequence
        .screens
        .iter()
        .filter(|screen| matches!(screen.kind, ScreenKind::Break(_)))
        .count();
    println!(
        "{}: ok ({} part(s), {} screen(s), {} audio screen(s), {} break(s), {} column(s))",
        spec.name,
        spec.parts.len(),
        sequence.len(),
        sequence.audio_screen_count(),
        breaks,
        sequence.columns.len()
    );
    if spec.uses_randomness() {
        println!("screen order is randomised per session");
    }
    Ok(())
}
