use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::cmd::{
    self, check::CheckArgs, columns::ColumnsArgs, plan::PlanArgs, run::RunArgs, schema::SchemaArgs,
};
use crate::logging;
use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(
    name = "auris",
    about = "Runner for configuration-driven listening experiments",
    version,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Log filter directive, e.g. `info` or `auris_spec=debug`
    #[arg(long = "log", value_name = "FILTER", global = true)]
    log: Option<String>,

    /// Runner settings file; `./auris.toml` is used when present
    #[arg(long = "settings", value_name = "auris.toml", global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate an experiment description and its audio files
    Check(CheckArgs),
    /// Print the expanded screen sequence
    Plan(PlanArgs),
    /// Print the output column set
    Columns(ColumnsArgs),
    /// Print the JSON schema of screen descriptions
    Schema(SchemaArgs),
    /// Run a session in the terminal
    Run(RunArgs),
}

pub fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.settings.as_deref())?;
    logging::init(cli.log.as_deref().or(settings.log.as_deref()));

    match cli.command {
        Commands::Check(args) => cmd::check::run(&args),
        Commands::Plan(args) => cmd::plan::run(&args, &settings),
        Commands::Columns(args) => cmd::columns::run(&args),
        Commands::Schema(args) => cmd::schema::run(&args),
        Commands::Run(args) => cmd::run::run(args, &settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_subcommand() {
        let cli = Cli::try_parse_from([
            "auris",
            "--log",
            "debug",
            "run",
            "loudness.palila",
            "--seed",
            "7",
            "--pid",
            "P01",
            "--out",
            "results",
            "--skip-timers",
        ])
        .expect("expected CLI to parse");
        assert_eq!(cli.log.as_deref(), Some("debug"));
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.experiment, PathBuf::from("loudness.palila"));
                assert_eq!(args.seed, Some(7));
                assert_eq!(args.pid.as_deref(), Some("P01"));
                assert_eq!(args.out, Some(PathBuf::from("results")));
                assert!(args.skip_timers);
            }
            _ => panic!("expected run args"),
        }
    }

    #[test]
    fn parses_plan_with_global_settings_after_subcommand() {
        let cli = Cli::try_parse_from([
            "auris",
            "plan",
            "loudness.palila",
            "--json",
            "--settings",
            "lab.toml",
        ])
        .expect("expected CLI to parse");
        assert_eq!(cli.settings, Some(PathBuf::from("lab.toml")));
        match cli.command {
            Commands::Plan(args) => {
                assert!(args.json);
                assert_eq!(args.seed, None);
            }
            _ => panic!("expected plan args"),
        }
    }

    #[test]
    fn check_requires_experiment() {
        assert!(Cli::try_parse_from(["auris", "check"]).is_err());
    }

    #[test]
    fn schema_takes_no_experiment() {
        let cli = Cli::try_parse_from(["auris", "schema"]).expect("expected CLI to parse");
        assert!(matches!(cli.command, Commands::Schema(_)));
    }
}
