//! Tick loop: feeds queued start signals to the engine and collects results.

use std::io::Write;
use std::thread;

use opusbench_core::{DecodeSummary, SessionFailure, StartSignal};
use opusbench_decode::{BenchEngine, BenchEvent, SessionState};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::host::TerminalHost;

/// How one session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionResult {
    Finished(DecodeSummary),
    Failed(SessionFailure),
}

impl SessionResult {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Finished(summary) => json!(summary),
            Self::Failed(failure) => json!({
                "store_kind": failure.store_kind,
                "error": failure.error.to_string(),
                "code": failure.error.code(),
                "samples_decoded": failure.samples_decoded,
                "decode_secs": failure.decode_time.as_secs_f64(),
            }),
        }
    }
}

/// Results of a whole run, in the order the sessions ran.
#[derive(Debug, Default)]
pub struct Outcome {
    pub results: Vec<SessionResult>,
}

impl Outcome {
    pub fn sessions(&self) -> usize {
        self.results.len()
    }

    pub fn summaries(&self) -> impl Iterator<Item = &DecodeSummary> {
        self.results.iter().filter_map(|result| match result {
            SessionResult::Finished(summary) => Some(summary),
            SessionResult::Failed(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &SessionFailure> {
        self.results.iter().filter_map(|result| match result {
            SessionResult::Failed(failure) => Some(failure),
            SessionResult::Finished(_) => None,
        })
    }

    /// One JSON object per session.
    pub fn json_lines(&self) -> Vec<String> {
        self.results
            .iter()
            .map(|result| result.to_json().to_string())
            .collect()
    }

    fn record(&mut self, event: BenchEvent) {
        match event {
            BenchEvent::Finished(summary) => self.results.push(SessionResult::Finished(summary)),
            BenchEvent::Failed(failure) => self.results.push(SessionResult::Failed(failure)),
            BenchEvent::StartRejected(signal) => warn!("Start signal {:?} was rejected", signal),
            BenchEvent::Aborted { samples_decoded } => {
                warn!("Session aborted after {samples_decoded} samples");
            }
            BenchEvent::Loaded { .. } | BenchEvent::StateChanged(_) => {}
        }
    }
}

const fn at_rest(state: &SessionState) -> bool {
    matches!(state, SessionState::Idle | SessionState::Failed(_))
}

/// Run every signal in `schedule` to completion, one session at a time.
///
/// Signals are pulled lazily and only while the engine is at rest, so none
/// are rejected. Between ticks the loop sleeps for the interval the engine
/// last asked for.
pub fn run<W: Write>(
    engine: &mut BenchEngine,
    host: &mut TerminalHost<W>,
    schedule: impl IntoIterator<Item = StartSignal>,
) -> Outcome {
    let mut queue = schedule.into_iter().peekable();
    let mut outcome = Outcome::default();
    let mut ticks = 0u64;

    engine.start(host);
    loop {
        let resting = at_rest(engine.state());
        if resting && queue.peek().is_none() {
            break;
        }

        let signal = if resting { queue.next() } else { None };
        engine.tick(signal, host);
        ticks += 1;

        for event in engine.drain_events() {
            outcome.record(event);
        }

        if let Some(interval) = host.tick_rate().interval() {
            thread::sleep(interval);
        }
    }

    debug!("Run finished after {ticks} ticks");
    info!(
        "{} sessions: {} finished, {} failed",
        outcome.sessions(),
        outcome.summaries().count(),
        outcome.failures().count()
    );
    outcome
}
