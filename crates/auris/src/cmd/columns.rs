use std::path::PathBuf;

use anyhow::Result;
use auris_spec::ids::{PARTICIPANT_COLUMN, TIMER_COLUMN};
use clap::Args;

use super::load_and_sequence;

#[derive(Args, Debug, Clone)]
pub struct ColumnsArgs {
    /// Experiment description (`<name>.palila`)
    #[arg(value_name = "EXPERIMENT")]
    pub experiment: PathBuf,
}

/// Prints the header of the response file; it does not depend on the seed.
pub fn run(args: &ColumnsArgs) -> Result<()> {
    let (_, sequence) = load_and_sequence(&args.experiment, Some(0))?;
    println!("{PARTICIPANT_COLUMN}");
    for column in &sequence.columns {
        println!("{column}");
    }
    println!("{TIMER_COLUMN}");
    Ok(())
}
