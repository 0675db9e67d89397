//! Real-time playback of a [`TrialScript`].

use std::time::Duration;

use serde_json::{Map, Value};

use super::script::{CursorStream, TrialOutcome, TrialScript};
use crate::client::{ArrayPayload, TrialStreamer};
use crate::domain::{RowSelection, TrialRow};

/// Pause before the first phase.
pub const INITIAL_WAIT: Duration = Duration::from_secs(1);

/// Door opening at the start of the effort phase.
const CURSOR_START: f32 = 0.05;

/// Destination of a played script.
pub trait TrialSink {
    /// Sends a control event.
    fn send_event(&self, event: &str, payload: Map<String, Value>);

    /// Sends an array.
    fn send_array(&self, name: &str, array: &ArrayPayload, trial: i64, meta: Option<Value>);
}

impl TrialSink for TrialStreamer {
    fn send_event(&self, event: &str, payload: Map<String, Value>) {
        Self::send_event(self, event, payload);
    }

    fn send_array(&self, name: &str, array: &ArrayPayload, trial: i64, meta: Option<Value>) {
        Self::send_array(self, name, array, trial, meta);
    }
}

/// Plays `script` as trial `trial`: waits [`INITIAL_WAIT`], sends each
/// phase event and holds it, then sends the `trial_record` summary.
pub async fn run_script<S: TrialSink + ?Sized>(sink: &S, script: &TrialScript, trial: i64) {
    tracing::info!(condition = %script.condition, trial, "waiting before trial start");
    tokio::time::sleep(INITIAL_WAIT).await;

    for step in &script.steps {
        tracing::info!(event = step.event, hold_ms = step.hold.as_millis(), "phase");
        let mut payload = step.payload.clone();
        payload.insert("trial".to_string(), Value::from(trial));
        sink.send_event(step.event, payload);

        match &step.cursor {
            Some(cursor) => stream_cursor(sink, cursor, step.hold, trial).await,
            None => tokio::time::sleep(step.hold).await,
        }
    }

    let record = trial_record(&script.outcome, trial);
    sink.send_event("trial_record", record);
    tracing::info!(condition = %script.condition, trial, "end of the trial");
}

/// Streams synthetic door-opening samples for `hold`, one frame per
/// chunk period.
async fn stream_cursor<S: TrialSink + ?Sized>(
    sink: &S,
    cursor: &CursorStream,
    hold: Duration,
    trial: i64,
) {
    let period = cursor.chunk_period();
    let total_samples = (hold.as_secs_f64() * cursor.rate_hz).round() as usize;
    let frames = total_samples / cursor.chunk.max(1);
    let meta = cursor.meta();

    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    for frame in 0..frames {
        interval.tick().await;
        let first = frame * cursor.chunk;
        let samples: Vec<f32> = (first..first + cursor.chunk)
            .map(|i| {
                let progress = (i + 1) as f32 / total_samples.max(1) as f32;
                CURSOR_START + (1.0 - CURSOR_START) * progress
            })
            .collect();
        sink.send_array(
            cursor.name,
            &ArrayPayload::vector(&samples),
            trial,
            Some(meta.clone()),
        );
    }

    let streamed = period * u32::try_from(frames).unwrap_or(u32::MAX);
    if let Some(rest) = hold.checked_sub(streamed) {
        tokio::time::sleep(rest).await;
    }
}

/// Summary row for the closing `trial_record`.
fn trial_record(outcome: &TrialOutcome, trial: i64) -> Map<String, Value> {
    TrialRow::new()
        .with("trial", trial)
        .with("Acceptance", outcome.acceptance)
        .with("success", outcome.success)
        .with("reward", outcome.reward)
        .with("effort", outcome.effort)
        .with("DecisionTime", outcome.decision_time.unwrap_or(f64::NAN))
        .with("ReactionTimeEP", outcome.reaction_time_ep.unwrap_or(f64::NAN))
        .payload(&RowSelection::default())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::scenario::Condition;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Event(String, Map<String, Value>),
        Array(String, Vec<usize>, i64),
    }

    #[derive(Debug, Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(tokio::time::Instant, Sent)>>,
    }

    impl RecordingSink {
        fn push(&self, sent: Sent) {
            if let Ok(mut v) = self.sent.lock() {
                v.push((tokio::time::Instant::now(), sent));
            }
        }

        fn take(&self) -> Vec<(tokio::time::Instant, Sent)> {
            self.sent.lock().map(|mut v| std::mem::take(&mut *v)).unwrap_or_default()
        }
    }

    impl TrialSink for RecordingSink {
        fn send_event(&self, event: &str, payload: Map<String, Value>) {
            self.push(Sent::Event(event.to_string(), payload));
        }

        fn send_array(&self, name: &str, array: &ArrayPayload, trial: i64, _meta: Option<Value>) {
            self.push(Sent::Array(name.to_string(), array.shape().to_vec(), trial));
        }
    }

    fn assert_close(actual: Duration, expected: Duration) {
        let diff = actual.abs_diff(expected);
        assert!(diff < Duration::from_millis(20), "{actual:?} vs {expected:?}");
    }

    fn build(condition: Condition) -> TrialScript {
        TrialScript::build(condition, &mut StdRng::seed_from_u64(3))
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_script_timing() {
        let sink = RecordingSink::default();
        let script = build(Condition::DecisionTimeout);
        let start = tokio::time::Instant::now();

        run_script(&sink, &script, 7).await;

        let sent = sink.take();
        let events: Vec<&str> = sent
            .iter()
            .filter_map(|(_, s)| match s {
                Sent::Event(name, _) => Some(name.as_str()),
                Sent::Array(..) => None,
            })
            .collect();
        assert_eq!(events, vec!["PrepDM", "DMphase", "ITI", "trial_record"]);

        let Some((first_at, _)) = sent.first() else {
            panic!("events were sent");
        };
        assert_close(*first_at - start, INITIAL_WAIT);
        assert_close(start.elapsed(), INITIAL_WAIT + script.total_hold());
    }

    #[tokio::test(start_paused = true)]
    async fn every_event_carries_trial() {
        let sink = RecordingSink::default();
        run_script(&sink, &build(Condition::DecisionNoEffort), 12).await;
        for (_, sent) in sink.take() {
            let Sent::Event(_, payload) = sent else {
                panic!("no arrays in this condition");
            };
            assert_eq!(payload.get("trial"), Some(&json!(12)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn effort_phase_streams_chunks() {
        let sink = RecordingSink::default();
        let script = build(Condition::DecisionEffort);
        let start = tokio::time::Instant::now();
        run_script(&sink, &script, 1).await;

        let sent = sink.take();
        let arrays: Vec<&Sent> = sent
            .iter()
            .map(|(_, s)| s)
            .filter(|s| matches!(s, Sent::Array(..)))
            .collect();
        // 3 s at 50 Hz in chunks of 10
        assert_eq!(arrays.len(), 15);
        assert!(arrays.iter().all(|a| **a
            == Sent::Array("cursor_trace".to_string(), vec![10], 1)));
        assert_close(start.elapsed(), INITIAL_WAIT + script.total_hold());
    }

    #[tokio::test(start_paused = true)]
    async fn trial_record_summarizes_outcome() {
        let sink = RecordingSink::default();
        run_script(&sink, &build(Condition::DecisionEffortAnticipation), 2).await;

        let sent = sink.take();
        let Some((_, Sent::Event(name, record))) = sent.last() else {
            panic!("trial_record is sent last");
        };
        assert_eq!(name, "trial_record");
        assert_eq!(record.get("Acceptance"), Some(&json!(1)));
        assert_eq!(record.get("success"), Some(&json!(0)));
        assert_eq!(record.get("ReactionTimeEP"), Some(&Value::Null));
        assert_eq!(record.get("DecisionTime"), Some(&json!(2.0)));
    }
}
