//! Phase sequences for the four conditions.

use std::fmt;
use std::time::Duration;

use rand::Rng;
use serde_json::{Map, Value, json};

/// Upper bound of the offer (decision) phase.
pub const DM_PHASE_MAX_SECS: u64 = 4;

/// When the simulated participant answers, for conditions with a decision.
pub const DECISION_AT_SECS: u64 = 2;

/// Decision and effort feedback display time.
pub const FEEDBACK_SECS: u64 = 1;

/// Inter-trial interval.
pub const ITI_SECS: u64 = 2;

/// Duration of the effort production phase.
pub const EP_PHASE_SECS: u64 = 3;

/// Effort level (door opening left to the participant) when effort is
/// required: the door starts 5% open.
pub const EFFORT_REQUIRED: f64 = 0.95;

/// Reward level on the 1..=4 scale.
pub const REWARD_LEVEL: i64 = 1;

/// Range preparation phase durations are drawn from, in seconds.
const PREP_RANGE: std::ops::Range<f64> = 1.0..1.4;

/// Experimental condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Condition {
    /// No decision before the offer times out.
    #[value(name = "dm-timeout")]
    DecisionTimeout,
    /// Decision made, no effort required.
    #[value(name = "dmade-noep")]
    DecisionNoEffort,
    /// Decision made, effort required and exerted successfully.
    #[value(name = "dmade-ep")]
    DecisionEffort,
    /// Decision made, effort required but anticipated, leading to failure.
    #[value(name = "dmade-ep-anticipation")]
    DecisionEffortAnticipation,
}

impl Condition {
    /// Every condition, in protocol order.
    pub const ALL: [Self; 4] = [
        Self::DecisionTimeout,
        Self::DecisionNoEffort,
        Self::DecisionEffort,
        Self::DecisionEffortAnticipation,
    ];

    /// Short label used in logs and file names.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::DecisionTimeout => "DMTimeout",
            Self::DecisionNoEffort => "DMade_NOEP",
            Self::DecisionEffort => "DMade_EP",
            Self::DecisionEffortAnticipation => "DMade_EP_anticipation",
        }
    }

    const fn effort_level(self) -> f64 {
        match self {
            Self::DecisionNoEffort => 0.0,
            _ => EFFORT_REQUIRED,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Binary samples streamed while a step is held.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorStream {
    /// Array name on the server.
    pub name: &'static str,
    /// Sampling rate in Hz.
    pub rate_hz: f64,
    /// Samples per array frame.
    pub chunk: usize,
    /// Label stored in the array metadata.
    pub label: &'static str,
}

impl Default for CursorStream {
    fn default() -> Self {
        Self {
            name: "cursor_trace",
            rate_hz: 50.0,
            chunk: 10,
            label: "Ypos",
        }
    }
}

impl CursorStream {
    /// Time covered by one array frame.
    #[must_use]
    pub fn chunk_period(&self) -> Duration {
        Duration::from_secs_f64(self.chunk as f64 / self.rate_hz)
    }

    /// Metadata sent with each frame.
    #[must_use]
    pub fn meta(&self) -> Value {
        json!({ "fs": self.rate_hz, "label": self.label })
    }
}

/// One phase: an event sent at its start, then a hold.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialStep {
    /// Event name.
    pub event: &'static str,
    /// Event payload (without `trial`, added by the runner).
    pub payload: Map<String, Value>,
    /// How long the phase lasts.
    pub hold: Duration,
    /// Samples streamed during the hold.
    pub cursor: Option<CursorStream>,
}

impl TrialStep {
    fn new(event: &'static str, payload: Value, hold: Duration) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            event,
            payload,
            hold,
            cursor: None,
        }
    }

    fn streaming(mut self, cursor: CursorStream) -> Self {
        self.cursor = Some(cursor);
        self
    }
}

/// What the trial amounts to, sent as the closing `trial_record`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialOutcome {
    /// 1 accepted, 0 rejected, `None` when no decision was made.
    pub acceptance: Option<i64>,
    /// 1 success, 0 failure, `None` when no effort was required.
    pub success: Option<i64>,
    /// Reward level offered.
    pub reward: i64,
    /// Effort level offered.
    pub effort: f64,
    /// Seconds from offer to decision.
    pub decision_time: Option<f64>,
    /// Seconds from effort cue to movement.
    pub reaction_time_ep: Option<f64>,
}

/// Ordered phases of one trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialScript {
    /// Condition the script plays.
    pub condition: Condition,
    /// Phases in order.
    pub steps: Vec<TrialStep>,
    /// Summary sent after the last phase.
    pub outcome: TrialOutcome,
}

impl TrialScript {
    /// Builds the script for `condition`, drawing preparation durations
    /// from `rng`.
    pub fn build<R: Rng + ?Sized>(condition: Condition, rng: &mut R) -> Self {
        let effort = condition.effort_level();
        let mut steps = Vec::new();

        let prep_dm = draw_prep(rng);
        steps.push(TrialStep::new(
            "PrepDM",
            json!({ "dur_PrepDM": prep_dm }),
            secs(prep_dm),
        ));

        let dm_hold = if condition == Condition::DecisionTimeout {
            DM_PHASE_MAX_SECS
        } else {
            DECISION_AT_SECS
        };
        steps.push(TrialStep::new(
            "DMphase",
            json!({
                "dur_DMphase": DM_PHASE_MAX_SECS,
                "Effort": effort,
                "Reward": REWARD_LEVEL,
            }),
            Duration::from_secs(dm_hold),
        ));

        if condition != Condition::DecisionTimeout {
            steps.push(TrialStep::new(
                "DecisionFeedback",
                json!({ "DMFeedback": 1, "dur_DecisionFeedback": FEEDBACK_SECS }),
                Duration::from_secs(FEEDBACK_SECS),
            ));
        }

        let mut success = None;
        if matches!(
            condition,
            Condition::DecisionEffort | Condition::DecisionEffortAnticipation
        ) {
            let prep_ep = draw_prep(rng);
            steps.push(TrialStep::new(
                "PrepEP",
                json!({ "dur_PrepEP": prep_ep }),
                secs(prep_ep),
            ));

            if condition == Condition::DecisionEffort {
                steps.push(
                    TrialStep::new(
                        "EPphase",
                        json!({ "dur_EPphase": EP_PHASE_SECS, "Effort": effort }),
                        Duration::from_secs(EP_PHASE_SECS),
                    )
                    .streaming(CursorStream::default()),
                );
            }

            let prep_feedback = draw_prep(rng);
            steps.push(TrialStep::new(
                "PrepEPFeedback",
                json!({ "dur_PrepEPFeedback": prep_feedback }),
                secs(prep_feedback),
            ));

            // 1 success, 0 failure, -1 anticipation
            let ep_feedback: i64 = if condition == Condition::DecisionEffort {
                1
            } else {
                -1
            };
            steps.push(TrialStep::new(
                "EPFeedback",
                json!({ "EPFeedback": ep_feedback, "dur_EPFeedback": FEEDBACK_SECS }),
                Duration::from_secs(FEEDBACK_SECS),
            ));
            success = Some(i64::from(ep_feedback == 1));
        }

        steps.push(TrialStep::new(
            "ITI",
            json!({ "DurITI": ITI_SECS }),
            Duration::from_secs(ITI_SECS),
        ));

        let decided = condition != Condition::DecisionTimeout;
        Self {
            condition,
            steps,
            outcome: TrialOutcome {
                acceptance: decided.then_some(1),
                success,
                reward: REWARD_LEVEL,
                effort,
                decision_time: decided.then_some(DECISION_AT_SECS as f64),
                reaction_time_ep: None,
            },
        }
    }

    /// Event names in order.
    #[must_use]
    pub fn events(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.event).collect()
    }

    /// Sum of all phase holds.
    #[must_use]
    pub fn total_hold(&self) -> Duration {
        self.steps.iter().map(|s| s.hold).sum()
    }
}

/// Draws a preparation duration rounded to 10 ms.
fn draw_prep<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    round2(rng.random_range(PREP_RANGE))
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Whole milliseconds, matching the 10 ms rounding of the payload.
fn secs(x: f64) -> Duration {
    Duration::from_millis((x.max(0.0) * 1000.0).round() as u64)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn script(condition: Condition) -> TrialScript {
        let mut rng = StdRng::seed_from_u64(7);
        TrialScript::build(condition, &mut rng)
    }

    #[test]
    fn timeout_holds_full_offer() {
        let s = script(Condition::DecisionTimeout);
        assert_eq!(s.events(), vec!["PrepDM", "DMphase", "ITI"]);
        let dm = s.steps.iter().find(|st| st.event == "DMphase");
        assert_eq!(dm.map(|st| st.hold), Some(Duration::from_secs(4)));
        assert_eq!(s.outcome.acceptance, None);
        assert_eq!(s.outcome.decision_time, None);
    }

    #[test]
    fn no_effort_condition() {
        let s = script(Condition::DecisionNoEffort);
        assert_eq!(s.events(), vec!["PrepDM", "DMphase", "DecisionFeedback", "ITI"]);
        let dm = s.steps.iter().find(|st| st.event == "DMphase");
        assert_eq!(
            dm.and_then(|st| st.payload.get("Effort")),
            Some(&json!(0.0))
        );
        assert_eq!(dm.map(|st| st.hold), Some(Duration::from_secs(2)));
        assert_eq!(s.outcome.success, None);
    }

    #[test]
    fn effort_condition_streams_cursor() {
        let s = script(Condition::DecisionEffort);
        assert_eq!(
            s.events(),
            vec![
                "PrepDM",
                "DMphase",
                "DecisionFeedback",
                "PrepEP",
                "EPphase",
                "PrepEPFeedback",
                "EPFeedback",
                "ITI"
            ]
        );
        let ep = s.steps.iter().find(|st| st.event == "EPphase");
        assert!(ep.is_some_and(|st| st.cursor.is_some()));
        let fb = s.steps.iter().find(|st| st.event == "EPFeedback");
        assert_eq!(fb.and_then(|st| st.payload.get("EPFeedback")), Some(&json!(1)));
        assert_eq!(s.outcome.success, Some(1));
    }

    #[test]
    fn anticipation_condition_fails() {
        let s = script(Condition::DecisionEffortAnticipation);
        assert_eq!(
            s.events(),
            vec![
                "PrepDM",
                "DMphase",
                "DecisionFeedback",
                "PrepEP",
                "PrepEPFeedback",
                "EPFeedback",
                "ITI"
            ]
        );
        let fb = s.steps.iter().find(|st| st.event == "EPFeedback");
        assert_eq!(fb.and_then(|st| st.payload.get("EPFeedback")), Some(&json!(-1)));
        assert_eq!(s.outcome.success, Some(0));
        assert!(s.steps.iter().all(|st| st.cursor.is_none()));
    }

    #[test]
    fn prep_durations_are_bounded_and_rounded() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let s = TrialScript::build(Condition::DecisionEffort, &mut rng);
            for step in s.steps.iter().filter(|st| st.event.starts_with("Prep")) {
                let Some(dur) = step.payload.values().next().and_then(Value::as_f64) else {
                    panic!("prep payload holds its duration");
                };
                assert!((1.0..=1.4).contains(&dur), "{dur}");
                assert!((dur * 100.0 - (dur * 100.0).round()).abs() < 1e-9);
                assert!((step.hold.as_secs_f64() - dur).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn same_seed_same_script() {
        for condition in Condition::ALL {
            assert_eq!(script(condition), script(condition));
        }
    }

    #[test]
    fn cursor_chunk_period() {
        let c = CursorStream::default();
        assert_eq!(c.chunk_period(), Duration::from_millis(200));
    }
}
