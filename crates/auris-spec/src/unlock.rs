use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::sequence::ResolvedQuestion;

/// Read access to current answers in their flattened string form.
pub trait AnswerLookup {
    fn answer_text(&self, id: &str) -> Option<String>;
}

impl AnswerLookup for BTreeMap<String, String> {
    fn answer_text(&self, id: &str) -> Option<String> {
        self.get(id).cloned()
    }
}

/// Unlock dependency with the reference resolved to an effective id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResolvedUnlock {
    pub id: String,
    pub accepted: Vec<String>,
}

impl ResolvedUnlock {
    /// Exact, case-sensitive match of the referenced answer against the accepted values.
    /// An unanswered reference keeps the dependent locked.
    pub fn is_met(&self, answers: &dyn AnswerLookup) -> bool {
        answers
            .answer_text(&self.id)
            .is_some_and(|answer| self.accepted.iter().any(|accepted| *accepted == answer))
    }
}

pub fn is_unlocked(question: &ResolvedQuestion, answers: &dyn AnswerLookup) -> bool {
    question
        .unlock
        .as_ref()
        .is_none_or(|unlock| unlock.is_met(answers))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(accepted: &[&str]) -> ResolvedUnlock {
        ResolvedUnlock {
            id: "q1".into(),
            accepted: accepted.iter().map(|value| value.to_string()).collect(),
        }
    }

    fn answers(value: Option<&str>) -> BTreeMap<String, String> {
        value
            .map(|value| BTreeMap::from([("q1".to_string(), value.to_string())]))
            .unwrap_or_default()
    }

    #[test]
    fn locked_while_unanswered() {
        assert!(!rule(&["Yes"]).is_met(&answers(None)));
    }

    #[test]
    fn exact_match_only() {
        let unlock = rule(&["Yes", "Maybe"]);
        assert!(unlock.is_met(&answers(Some("Yes"))));
        assert!(unlock.is_met(&answers(Some("Maybe"))));
        assert!(!unlock.is_met(&answers(Some("yes"))));
        assert!(!unlock.is_met(&answers(Some("Yes "))));
        assert!(!unlock.is_met(&answers(Some("Yes;Maybe"))));
    }
}
