pub mod check;
pub mod columns;
pub mod plan;
pub mod run;
pub mod schema;

use std::path::Path;

use anyhow::{Context, Result};
use auris_spec::{ExperimentSpec, ScreenSequence, build_sequence, load_experiment};

/// Loads a description and expands it, with the file name in every error.
pub(crate) fn load_and_sequence(
    path: &Path,
    seed: Option<u64>,
) -> Result<(ExperimentSpec, ScreenSequence)> {
    let spec = load_experiment(path)
        .with_context(|| format!("invalid experiment description {}", path.display()))?;
    let sequence = build_sequence(&spec, seed)
        .with_context(|| format!("cannot build the screen sequence of {}", path.display()))?;
    Ok((spec, sequence))
}
