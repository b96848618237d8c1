use std::collections::HashSet;
use std::path::PathBuf;

use auris_spec::{ScreenKind, build_sequence, parse_experiment};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct AudioShape {
    questions: usize,
    repeat: u32,
    max_replays: u32,
}

#[derive(Debug, Clone)]
struct PartShape {
    randomise: bool,
    interval: Option<i64>,
    audios: Vec<AudioShape>,
}

fn audio_shape() -> impl Strategy<Value = AudioShape> {
    (0usize..=2, 1u32..=3, 1u32..=3).prop_map(|(questions, repeat, max_replays)| AudioShape {
        questions,
        repeat,
        max_replays,
    })
}

fn part_shape() -> impl Strategy<Value = PartShape> {
    (
        any::<bool>(),
        proptest::option::of(-3i64..=3),
        proptest::collection::vec(audio_shape(), 1..6),
    )
        .prop_map(|(randomise, interval, audios)| PartShape {
            randomise,
            interval,
            audios,
        })
}

fn describe(randomise: bool, parts: &[PartShape]) -> String {
    let mut text = format!(
        "randomise = {}\n[questionnaire]\n",
        if randomise { "yes" } else { "no" }
    );
    for (p, part) in parts.iter().enumerate() {
        text.push_str(&format!("[part {}]\n", p + 1));
        if part.randomise {
            text.push_str("randomise = yes\n");
        }
        if let Some(interval) = part.interval {
            text.push_str(&format!("[[breaks]]\ninterval = {interval}\ntime = 1\n"));
        }
        for (a, audio) in part.audios.iter().enumerate() {
            text.push_str(&format!(
                "[[audio {}]]\nfilename = {}-{}.wav\nrepeat = {}\nmax replays = {}\n",
                a + 1,
                p + 1,
                a + 1,
                audio.repeat,
                audio.max_replays
            ));
            for q in 0..audio.questions {
                text.push_str(&format!("[[[question {}]]]\ntype = Annoyance\n", q + 1));
            }
        }
        text.push_str("[[questionnaire]]\n[[[question 1]]]\ntype = FreeText\ntext = Notes\n");
    }
    text
}

fn expected_breaks(part: &PartShape) -> usize {
    let total: usize = part.audios.iter().map(|audio| audio.repeat as usize).sum();
    match part.interval {
        None => 0,
        Some(0) => 1,
        Some(interval) => {
            let every = interval.unsigned_abs() as usize;
            let inner = (1..total).filter(|position| position % every == 0).count();
            inner + usize::from(interval > 0)
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn columns_are_unique_and_screens_complete(
        randomise in any::<bool>(),
        parts in proptest::collection::vec(part_shape(), 1..4),
        seed in any::<u64>(),
    ) {
        let text = describe(randomise, &parts);
        let spec = parse_experiment(&text, "prop", PathBuf::from("prop")).expect("valid description");
        let sequence = build_sequence(&spec, Some(seed)).expect("sequence");

        let unique: HashSet<&String> = sequence.columns.iter().collect();
        prop_assert_eq!(unique.len(), sequence.columns.len());

        let audio_screens: usize = parts
            .iter()
            .flat_map(|part| part.audios.iter())
            .map(|audio| audio.repeat as usize)
            .sum();
        prop_assert_eq!(sequence.audio_screen_count(), audio_screens);

        for (p, part) in parts.iter().enumerate() {
            let name = (p + 1).to_string();
            let breaks = sequence
                .screens
                .iter()
                .filter(|screen| screen.part.as_deref() == Some(name.as_str()))
                .filter(|screen| matches!(screen.kind, ScreenKind::Break(_)))
                .count();
            prop_assert_eq!(breaks, expected_breaks(part));
        }

        prop_assert!(matches!(
            sequence.screens.last().map(|screen| &screen.kind),
            Some(ScreenKind::End)
        ));
    }

    #[test]
    fn parts_stay_contiguous(
        parts in proptest::collection::vec(part_shape(), 1..4),
        seed in any::<u64>(),
    ) {
        let text = describe(true, &parts);
        let spec = parse_experiment(&text, "prop", PathBuf::from("prop")).expect("valid description");
        let sequence = build_sequence(&spec, Some(seed)).expect("sequence");

        let mut seen: Vec<&str> = Vec::new();
        for screen in &sequence.screens {
            let Some(part) = screen.part.as_deref() else { continue };
            if seen.last() != Some(&part) {
                prop_assert!(!seen.contains(&part), "part {} split up", part);
                seen.push(part);
            }
        }
        prop_assert_eq!(seen.len(), parts.len());
    }
}
