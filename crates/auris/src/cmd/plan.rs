use std::path::PathBuf;

use anyhow::Result;
use auris_spec::{Screen, ScreenKind, ScreenSequence};
use clap::Args;

use super::load_and_sequence;
use crate::settings::Settings;

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Experiment description (`<name>.palila`)
    #[arg(value_name = "EXPERIMENT")]
    pub experiment: PathBuf,
    /// Seed for randomised orders; drawn at random when omitted
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,
    /// Emit the sequence as JSON
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,
}

pub fn run(args: &PlanArgs, settings: &Settings) -> Result<()> {
    let (spec, sequence) = load_and_sequence(&args.experiment, args.seed.or(settings.seed))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&sequence)?);
    } else {
        println!("{}", plan_text(&spec.name, &sequence));
    }
    Ok(())
}

pub fn plan_text(name: &str, sequence: &ScreenSequence) -> String {
    let mut lines = vec![match sequence.seed {
        Some(seed) => format!("{name} (seed {seed})"),
        None => name.to_string(),
    }];
    for (index, screen) in sequence.screens.iter().enumerate() {
        lines.push(format!("{:>3}  {}", index + 1, describe(screen)));
    }
    lines.join("\n")
}

fn describe(screen: &Screen) -> String {
    let detail = match &screen.kind {
        ScreenKind::Intro(timed) | ScreenKind::Break(timed) => format!("{} s", timed.seconds),
        ScreenKind::Audio(audio) => {
            let files: Vec<String> = audio
                .samples
                .iter()
                .map(|path| path.display().to_string())
                .collect();
            let mut detail = files.join(" + ");
            if audio.max_replays > 1 {
                detail.push_str(&format!(", {} plays", audio.max_replays));
            }
            if let Some(unlock) = &audio.unlock {
                detail.push_str(&format!(
                    ", shown if {} in {}",
                    unlock.id,
                    unlock.accepted.join("|")
                ));
            }
            detail
        }
        ScreenKind::Questionnaire(page) => format!("page {}/{}", page.page, page.pages),
        ScreenKind::End => String::new(),
    };
    let columns = screen.column_ids();
    let mut line = screen.name.clone();
    if !detail.is_empty() {
        line.push_str(&format!(" ({detail})"));
    }
    if !columns.is_empty() {
        line.push_str(&format!(": {}", columns.join(", ")));
    }
    line
}
