//! Expansion of an experiment into its ordered screen list.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SequencingError;
use crate::ids::{
    END_SCREEN, PARTICIPANT_COLUMN, TIMER_COLUMN, audio_scope, audio_screen_name, break_name,
    intro_name, pad, question_id, questionnaire_page_name, questionnaire_scope, replay_ids,
};
use crate::spec::{
    AudioSpec, ExperimentSpec, PartSpec, QuestionKind, QuestionSpec, QuestionnaireSpec, TimedText,
    UnlockRule,
};
use crate::unlock::ResolvedUnlock;

/// Automatic pagination fills questionnaire pages up to this many questions.
pub const QUESTIONS_PER_PAGE: usize = 7;

/// A question with its effective id and resolved unlock dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResolvedQuestion {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(flatten)]
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock: Option<ResolvedUnlock>,
}

/// One audio screen instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioScreen {
    pub scope: String,
    pub samples: Vec<PathBuf>,
    pub max_replays: u32,
    /// Replay counter columns, one per sample, or empty.
    pub replay_ids: Vec<String>,
    pub questions: Vec<ResolvedQuestion>,
    /// Screen is skipped when this dependency is unmet on arrival.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock: Option<ResolvedUnlock>,
}

/// One page of a questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionnairePage {
    /// Owning part, `None` for the main questionnaire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<String>,
    /// 1-based page number.
    pub page: usize,
    pub pages: usize,
    pub questions: Vec<ResolvedQuestion>,
}

impl QuestionnairePage {
    pub fn is_main(&self) -> bool {
        self.part.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScreenKind {
    Intro(TimedText),
    Break(TimedText),
    Audio(AudioScreen),
    Questionnaire(QuestionnairePage),
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Screen {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<String>,
    #[serde(flatten)]
    pub kind: ScreenKind,
}

impl Screen {
    pub fn questions(&self) -> &[ResolvedQuestion] {
        match &self.kind {
            ScreenKind::Audio(audio) => &audio.questions,
            ScreenKind::Questionnaire(page) => &page.questions,
            _ => &[],
        }
    }

    /// Output columns owned by this screen, in column order.
    pub fn column_ids(&self) -> Vec<String> {
        let mut ids = match &self.kind {
            ScreenKind::Audio(audio) => audio.replay_ids.clone(),
            _ => Vec::new(),
        };
        ids.extend(self.questions().iter().map(|question| question.id.clone()));
        ids
    }

    pub fn is_audio(&self) -> bool {
        matches!(self.kind, ScreenKind::Audio(_))
    }

    pub fn is_main_questionnaire(&self) -> bool {
        matches!(&self.kind, ScreenKind::Questionnaire(page) if page.is_main())
    }
}

/// The fully expanded, ordered screen list of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScreenSequence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub screens: Vec<Screen>,
    pub columns: Vec<String>,
}

impl ScreenSequence {
    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Screen> {
        self.screens.get(index)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.screens.iter().position(|screen| screen.name == name)
    }

    pub fn first_main_page(&self) -> Option<usize> {
        self.screens
            .iter()
            .position(Screen::is_main_questionnaire)
    }

    pub fn audio_screen_count(&self) -> usize {
        self.screens.iter().filter(|screen| screen.is_audio()).count()
    }

    pub fn question(&self, id: &str) -> Option<&ResolvedQuestion> {
        self.screens
            .iter()
            .flat_map(|screen| screen.questions())
            .find(|question| question.id == id)
    }
}

/// Expands an experiment into its screen sequence.
///
/// The seed is only consumed by randomised experiments or parts. When none is
/// given for such an experiment, one is drawn and kept in the sequence.
pub fn build_sequence(
    spec: &ExperimentSpec,
    seed: Option<u64>,
) -> Result<ScreenSequence, SequencingError> {
    let seed = match seed {
        Some(seed) => Some(seed),
        None if spec.uses_randomness() => {
            let seed = rand::random::<u64>();
            info!(seed, "no seed supplied for randomised experiment, drew one");
            Some(seed)
        }
        None => None,
    };
    let mut rng = StdRng::seed_from_u64(seed.unwrap_or_default());

    let mut screens = Vec::new();
    push_questionnaire(&mut screens, &spec.questionnaire, None)?;

    let mut parts: Vec<&PartSpec> = spec.parts.iter().collect();
    if spec.randomise {
        parts.shuffle(&mut rng);
    }
    for part in parts {
        push_part(&mut screens, spec, part, &mut rng)?;
    }

    screens.push(Screen {
        name: END_SCREEN.to_string(),
        part: None,
        kind: ScreenKind::End,
    });

    let columns = collect_columns(&screens)?;
    info!(
        screens = screens.len(),
        columns = columns.len(),
        seed = ?seed,
        "screen sequence built"
    );
    Ok(ScreenSequence {
        seed,
        screens,
        columns,
    })
}

fn push_part(
    screens: &mut Vec<Screen>,
    spec: &ExperimentSpec,
    part: &PartSpec,
    rng: &mut StdRng,
) -> Result<(), SequencingError> {
    let part_name = Some(part.name.clone());

    if let Some(intro) = &part.intro {
        screens.push(Screen {
            name: intro_name(&part.name),
            part: part_name.clone(),
            kind: ScreenKind::Intro(intro.clone()),
        });
    }

    let mut audios: Vec<&AudioSpec> = part.audios.iter().collect();
    if part.randomise {
        audios.shuffle(rng);
        debug!(
            part = %part.name,
            order = ?audios.iter().map(|audio| audio.name.as_str()).collect::<Vec<_>>(),
            "shuffled audio screens"
        );
    }

    let mut instances = Vec::new();
    for audio in audios {
        if audio.repeat > 1 {
            for repetition in 1..=audio.repeat {
                instances.push(expand_audio(spec, part, audio, Some(repetition))?);
            }
        } else {
            instances.push(expand_audio(spec, part, audio, None)?);
        }
    }

    let total = instances.len();
    let mut breaks = 0;
    let mut earlier_ids: Vec<String> = Vec::new();
    for (index, (name, mut audio, rule)) in instances.into_iter().enumerate() {
        if let Some(rule) = rule {
            audio.unlock = Some(resolve_screen_unlock(&name, &part.name, &rule, &earlier_ids)?);
        }
        earlier_ids.extend(audio.questions.iter().map(|question| question.id.clone()));
        screens.push(Screen {
            name,
            part: part_name.clone(),
            kind: ScreenKind::Audio(audio),
        });

        if let Some(policy) = &part.breaks
            && policy.break_after(index + 1, total)
        {
            breaks += 1;
            screens.push(break_screen(part, policy.text.clone(), policy.seconds, breaks));
        }
    }

    push_questionnaire(screens, &part.questionnaire, Some(&part.name))?;

    if let Some(policy) = &part.breaks
        && policy.break_at_end()
    {
        breaks += 1;
        screens.push(break_screen(part, policy.text.clone(), policy.seconds, breaks));
    }
    Ok(())
}

fn break_screen(part: &PartSpec, text: String, seconds: f64, index: usize) -> Screen {
    Screen {
        name: break_name(&part.name, index),
        part: Some(part.name.clone()),
        kind: ScreenKind::Break(TimedText { text, seconds }),
    }
}

fn expand_audio(
    spec: &ExperimentSpec,
    part: &PartSpec,
    audio: &AudioSpec,
    repetition: Option<u32>,
) -> Result<(String, AudioScreen, Option<UnlockRule>), SequencingError> {
    let name = audio_screen_name(&part.name, &audio.name, repetition);
    let scope = audio_scope(&part.name, &audio.name, repetition);

    let mut questions: Vec<ResolvedQuestion> = Vec::with_capacity(audio.questions.len());
    for question in &audio.questions {
        let resolved = resolve_question(question, &scope, &questions, &name)?;
        questions.push(resolved);
    }

    let screen = AudioScreen {
        replay_ids: replay_ids(&scope, audio.filenames.len(), audio.max_replays),
        scope,
        samples: audio
            .filenames
            .iter()
            .map(|filename| spec.audio_path(filename))
            .collect(),
        max_replays: audio.max_replays,
        questions,
        unlock: None,
    };
    Ok((name, screen, audio.unlock.clone()))
}

fn push_questionnaire(
    screens: &mut Vec<Screen>,
    questionnaire: &QuestionnaireSpec,
    part: Option<&str>,
) -> Result<(), SequencingError> {
    if questionnaire.is_empty() {
        return Ok(());
    }

    let scope = questionnaire
        .id
        .clone()
        .unwrap_or_else(|| questionnaire_scope(part));
    let scope_label = match part {
        Some(part) => format!("the questionnaire of part {}", part),
        None => "the main questionnaire".to_string(),
    };

    let pages = paginate(questionnaire);
    let total = pages.len();
    let mut resolved: Vec<ResolvedQuestion> = Vec::new();
    for (index, page) in pages.into_iter().enumerate() {
        let first = resolved.len();
        for question in page {
            let question = resolve_question(question, &scope, &resolved, &scope_label)?;
            resolved.push(question);
        }
        screens.push(Screen {
            name: questionnaire_page_name(part, index + 1),
            part: part.map(str::to_string),
            kind: ScreenKind::Questionnaire(QuestionnairePage {
                part: part.map(str::to_string),
                page: index + 1,
                pages: total,
                questions: resolved[first..].to_vec(),
            }),
        });
    }
    Ok(())
}

/// Pages in traversal order. Manual split orders pages by their screen index.
fn paginate(questionnaire: &QuestionnaireSpec) -> Vec<Vec<&QuestionSpec>> {
    if questionnaire.manual_split {
        let mut pages: BTreeMap<i64, Vec<&QuestionSpec>> = BTreeMap::new();
        for question in &questionnaire.questions {
            pages
                .entry(question.manual_screen.unwrap_or_default())
                .or_default()
                .push(question);
        }
        pages.into_values().collect()
    } else {
        questionnaire
            .questions
            .chunks(QUESTIONS_PER_PAGE)
            .map(|chunk| chunk.iter().collect())
            .collect()
    }
}

fn resolve_question(
    question: &QuestionSpec,
    scope: &str,
    earlier: &[ResolvedQuestion],
    scope_label: &str,
) -> Result<ResolvedQuestion, SequencingError> {
    let id = question
        .id
        .clone()
        .unwrap_or_else(|| question_id(scope, &question.name));

    let unlock = match &question.unlock {
        None => None,
        Some(rule) => {
            let reference = pad(&rule.reference);
            let target = earlier
                .iter()
                .find(|candidate| pad(&candidate.name) == reference || candidate.id == rule.reference)
                .ok_or_else(|| SequencingError::UnresolvedUnlock {
                    id: id.clone(),
                    reference: rule.reference.clone(),
                    scope: scope_label.to_string(),
                })?;
            Some(ResolvedUnlock {
                id: target.id.clone(),
                accepted: rule.accepted.clone(),
            })
        }
    };

    Ok(ResolvedQuestion {
        id,
        name: question.name.clone(),
        prompt: question.prompt.clone(),
        kind: question.kind.clone(),
        unlock,
    })
}

fn resolve_screen_unlock(
    screen: &str,
    part: &str,
    rule: &UnlockRule,
    earlier_ids: &[String],
) -> Result<ResolvedUnlock, SequencingError> {
    if earlier_ids.iter().any(|id| *id == rule.reference) {
        Ok(ResolvedUnlock {
            id: rule.reference.clone(),
            accepted: rule.accepted.clone(),
        })
    } else {
        Err(SequencingError::UnresolvedScreenUnlock {
            screen: screen.to_string(),
            reference: rule.reference.clone(),
            scope: format!("part {}", part),
        })
    }
}

fn collect_columns(screens: &[Screen]) -> Result<Vec<String>, SequencingError> {
    let mut owners: HashMap<String, String> = HashMap::from([
        (PARTICIPANT_COLUMN.to_string(), "output".to_string()),
        (TIMER_COLUMN.to_string(), "output".to_string()),
    ]);
    let mut columns = Vec::new();
    for screen in screens {
        for id in screen.column_ids() {
            if let Some(first) = owners.get(&id) {
                return Err(SequencingError::DuplicateId {
                    id,
                    first: first.clone(),
                    second: screen.name.clone(),
                });
            }
            owners.insert(id.clone(), screen.name.clone());
            columns.push(id);
        }
    }
    Ok(columns)
}
