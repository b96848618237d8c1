use std::collections::HashMap;
use std::time::{Duration, Instant};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::unlock::AnswerLookup;

/// Typed answer value; flattened to a string for output and unlock checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Text(String),
    Integer(i64),
    Number(f64),
    /// Multi-select answer, in choice order.
    Choices(Vec<String>),
    Count(u32),
    NotApplicable,
}

impl AnswerValue {
    pub fn to_cell(&self) -> String {
        match self {
            AnswerValue::Text(text) => text.clone(),
            AnswerValue::Integer(value) => value.to_string(),
            AnswerValue::Number(value) => format_number(*value),
            AnswerValue::Choices(choices) => choices.join(";"),
            AnswerValue::Count(count) => count.to_string(),
            AnswerValue::NotApplicable => "n/a".to_string(),
        }
    }
}

/// Whole numbers keep one decimal (`5.0`); others use the shortest form.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct AnswerRecord {
    value: Option<AnswerValue>,
    finalized: bool,
    /// Value at the last finalize; survives a reopen.
    committed: Option<AnswerValue>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Timer {
    started: Option<Instant>,
    stopped: Option<Instant>,
}

/// Answers of one session, keyed by effective id.
///
/// Every column of the sequence has a record from the start. Records are
/// finalized when their screen is left and re-opened when it is revisited;
/// a revisit overwrites, it never appends.
#[derive(Debug, Clone)]
pub struct AnswerStore {
    columns: Vec<String>,
    records: HashMap<String, AnswerRecord>,
    participant: Option<String>,
    timer: Timer,
}

impl AnswerStore {
    pub fn new(columns: Vec<String>) -> Self {
        let records = columns
            .iter()
            .map(|id| (id.clone(), AnswerRecord::default()))
            .collect();
        Self {
            columns,
            records,
            participant: None,
            timer: Timer::default(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn record_mut(&mut self, id: &str) -> Result<&mut AnswerRecord, StoreError> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownId(id.to_string()))?;
        if record.finalized {
            return Err(StoreError::Finalized(id.to_string()));
        }
        Ok(record)
    }

    /// Replaces the current value, returning the previous one.
    pub fn record_answer(
        &mut self,
        id: &str,
        value: AnswerValue,
    ) -> Result<Option<AnswerValue>, StoreError> {
        let record = self.record_mut(id)?;
        debug!(id, value = %value.to_cell(), "answer recorded");
        Ok(record.value.replace(value))
    }

    pub fn clear_answer(&mut self, id: &str) -> Result<Option<AnswerValue>, StoreError> {
        let record = self.record_mut(id)?;
        Ok(record.value.take())
    }

    pub fn get_answer(&self, id: &str) -> Option<&AnswerValue> {
        self.records.get(id).and_then(|record| record.value.as_ref())
    }

    /// Adds one play to a replay counter and returns the new count.
    pub fn record_replay(&mut self, id: &str) -> Result<u32, StoreError> {
        let record = self.record_mut(id)?;
        let count = match record.value {
            Some(AnswerValue::Count(count)) => count + 1,
            _ => 1,
        };
        record.value = Some(AnswerValue::Count(count));
        Ok(count)
    }

    pub fn replay_count(&self, id: &str) -> u32 {
        match self.get_answer(id) {
            Some(AnswerValue::Count(count)) => *count,
            _ => 0,
        }
    }

    pub fn finalize(&mut self, id: &str) -> Result<(), StoreError> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownId(id.to_string()))?;
        record.finalized = true;
        record.committed = record.value.clone();
        Ok(())
    }

    /// Makes a finalized record editable again for a revisit.
    pub fn reopen(&mut self, id: &str) -> Result<(), StoreError> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownId(id.to_string()))?;
        record.finalized = false;
        Ok(())
    }

    pub fn is_finalized(&self, id: &str) -> bool {
        self.records.get(id).is_some_and(|record| record.finalized)
    }

    /// Cells of the output row in column order. A reopened record keeps the
    /// value it was last finalized with; a never-finalized one is empty.
    pub fn finalized_cells(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|id| {
                let value = self.records.get(id).and_then(|record| {
                    if record.finalized {
                        record.value.as_ref()
                    } else {
                        record.committed.as_ref()
                    }
                });
                value.map(AnswerValue::to_cell).unwrap_or_default()
            })
            .collect()
    }

    pub fn set_participant(&mut self, participant: impl Into<String>) {
        self.participant = Some(participant.into());
    }

    pub fn participant(&self) -> Option<&str> {
        self.participant.as_deref()
    }

    /// Starts the completion timer once; later calls are ignored.
    pub fn start_timer(&mut self) {
        if self.timer.started.is_none() {
            info!("completion timer started");
            self.timer.started = Some(Instant::now());
        }
    }

    pub fn stop_timer(&mut self) {
        if self.timer.started.is_some() && self.timer.stopped.is_none() {
            self.timer.stopped = Some(Instant::now());
            info!(
                seconds = self.elapsed_time().map(|elapsed| elapsed.as_secs_f64()),
                "completion timer stopped"
            );
        }
    }

    /// Time between timer start and stop, or until now while running.
    pub fn elapsed_time(&self) -> Option<Duration> {
        let started = self.timer.started?;
        let end = self.timer.stopped.unwrap_or_else(Instant::now);
        Some(end.saturating_duration_since(started))
    }

    /// Current values of every answered record, for inspection and export.
    pub fn snapshot(&self) -> Vec<(String, AnswerValue)> {
        self.columns
            .iter()
            .filter_map(|id| self.get_answer(id).map(|value| (id.clone(), value.clone())))
            .collect()
    }
}

impl AnswerLookup for AnswerStore {
    fn answer_text(&self, id: &str) -> Option<String> {
        self.get_answer(id).map(AnswerValue::to_cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_flatten_values() {
        assert_eq!(AnswerValue::Number(5.0).to_cell(), "5.0");
        assert_eq!(AnswerValue::Number(7.25).to_cell(), "7.25");
        assert_eq!(
            AnswerValue::Choices(vec!["a".into(), "b".into()]).to_cell(),
            "a;b"
        );
        assert_eq!(AnswerValue::NotApplicable.to_cell(), "n/a");
    }

    #[test]
    fn replays_count_up() {
        let mut store = AnswerStore::new(vec!["01-01-replays".into()]);
        assert_eq!(store.replay_count("01-01-replays"), 0);
        store.record_replay("01-01-replays").expect("replay");
        assert_eq!(store.record_replay("01-01-replays"), Ok(2));
    }

    #[test]
    fn reopened_record_exports_last_finalized_value() {
        let mut store = AnswerStore::new(vec!["q1".into(), "q2".into()]);
        store.record_answer("q1", AnswerValue::Text("No".into())).expect("record");
        store.record_answer("q2", AnswerValue::Text("draft".into())).expect("record");
        store.finalize("q1").expect("finalize");
        assert_eq!(store.finalized_cells(), vec!["No".to_string(), String::new()]);

        store.reopen("q1").expect("reopen");
        store.record_answer("q1", AnswerValue::Text("Yes".into())).expect("edit");
        assert_eq!(store.finalized_cells()[0], "No");
        store.finalize("q1").expect("finalize again");
        assert_eq!(store.finalized_cells()[0], "Yes");
    }

    #[test]
    fn timer_runs_between_start_and_stop() {
        let mut store = AnswerStore::new(vec![]);
        assert!(store.elapsed_time().is_none());
        store.start_timer();
        store.stop_timer();
        let first = store.elapsed_time().expect("elapsed");
        store.stop_timer();
        assert_eq!(store.elapsed_time(), Some(first));
    }
}
