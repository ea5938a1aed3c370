//! Tick-driven benchmark engine: Idle → Loading → Decoding → Reporting → Idle.
//!
//! The caller owns the loop and calls [`BenchEngine::tick`] once per frame.
//! Every tick does at most one bounded piece of work (open a session, decode
//! one slice, or show a report) and returns.

use std::path::PathBuf;

use crossbeam_channel::{unbounded, Receiver, Sender};
use opusbench_core::{DecodeSummary, SessionFailure, StartSignal, StoreKind, TickRate};
use tracing::{debug, error, info, trace, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::decoder::DecoderBackend;
use crate::session::{DecodeSession, SliceResult, DEFAULT_SCRATCH_FRAMES};
use crate::store::{BackingStore, StorageProvider};

/// Text shown while waiting for a start signal.
pub const INSTRUCTIONS: &str = "Press A to load from memory, B to stream from file.";

/// Vertical spacing between text lines.
const LINE_HEIGHT: i32 = 20;

/// Row of the instructions footer.
const FOOTER_Y: i32 = 220;

/// Display side of the host device.
pub trait Host {
    fn clear(&mut self);

    /// Draw a line of text with its top-left corner at (`x`, `y`).
    fn draw_text(&mut self, text: &str, x: i32, y: i32);

    /// Ask the host to call `tick` at `rate` from now on.
    fn set_tick_rate(&mut self, rate: TickRate);
}

/// Current phase of the engine. Exactly one is active.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// Waiting for a start signal.
    #[default]
    Idle,
    /// A session has been requested; the store opens on the next tick.
    Loading(StoreKind),
    /// Decoding one slice per tick.
    Decoding,
    /// The stream finished; the summary is shown on the next tick.
    Reporting(DecodeSummary),
    /// The session failed. Stays here until reset or a new start signal.
    Failed(SessionFailure),
}

impl SessionState {
    /// True while a session holds resources or is about to.
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Loading(_) | Self::Decoding)
    }
}

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum BenchEvent {
    /// The engine entered a new state.
    StateChanged(SessionState),
    /// A decoder opened.
    Loaded {
        store_kind: StoreKind,
        sample_rate: u32,
        channels: u16,
    },
    /// A session decoded to the end of its stream.
    Finished(DecodeSummary),
    /// A session failed.
    Failed(SessionFailure),
    /// A start signal arrived in Loading, Decoding or Reporting and was ignored.
    StartRejected(StartSignal),
    /// An active session was aborted.
    Aborted { samples_decoded: u64 },
}

/// What the engine decodes and how.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// File to benchmark, relative to the storage provider's root.
    pub path: PathBuf,
    /// Scratch buffer capacity in frames per channel.
    pub scratch_frames: usize,
    /// Tick rate outside the Decoding phase.
    pub idle_fps: u32,
}

impl EngineSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scratch_frames: DEFAULT_SCRATCH_FRAMES,
            idle_fps: 30,
        }
    }
}

/// The benchmark state machine.
pub struct BenchEngine {
    settings: EngineSettings,
    storage: Box<dyn StorageProvider>,
    backend: Box<dyn DecoderBackend>,
    clock: Box<dyn Clock>,
    state: SessionState,
    /// Present exactly while the state is Decoding.
    session: Option<DecodeSession>,
    event_tx: Sender<BenchEvent>,
    event_rx: Receiver<BenchEvent>,
}

impl BenchEngine {
    /// Create an engine timing decode calls with a monotonic clock.
    pub fn new(
        settings: EngineSettings,
        storage: Box<dyn StorageProvider>,
        backend: Box<dyn DecoderBackend>,
    ) -> Self {
        let (event_tx, event_rx) = unbounded();
        Self {
            settings,
            storage,
            backend,
            clock: Box::new(MonotonicClock::new()),
            state: SessionState::Idle,
            session: None,
            event_tx,
            event_rx,
        }
    }

    /// Replace the clock used to time decode calls.
    #[must_use]
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The live session, while decoding.
    pub const fn session(&self) -> Option<&DecodeSession> {
        self.session.as_ref()
    }

    /// Try to receive an event without blocking.
    pub fn try_recv_event(&self) -> Option<BenchEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Drain all pending events.
    pub fn drain_events(&self) -> Vec<BenchEvent> {
        self.event_rx.try_iter().collect()
    }

    /// A receiver for observers on other threads.
    pub fn subscribe(&self) -> Receiver<BenchEvent> {
        self.event_rx.clone()
    }

    /// Show the instructions and set the idle tick rate.
    pub fn start(&mut self, host: &mut dyn Host) {
        info!(
            "Benchmark engine ready for {}",
            self.settings.path.display()
        );
        host.clear();
        host.draw_text(INSTRUCTIONS, 0, 0);
        host.set_tick_rate(self.idle_rate());
    }

    /// Advance the state machine by one bounded step.
    pub fn tick(&mut self, signal: Option<StartSignal>, host: &mut dyn Host) {
        match &self.state {
            SessionState::Idle => {
                if let Some(signal) = signal {
                    self.begin(signal, host);
                }
            }
            SessionState::Failed(_) => {
                if let Some(signal) = signal {
                    self.set_state(SessionState::Idle);
                    self.begin(signal, host);
                }
            }
            SessionState::Loading(kind) => {
                let kind = *kind;
                self.reject(signal);
                self.load(kind, host);
            }
            SessionState::Decoding => {
                self.reject(signal);
                self.step(host);
            }
            SessionState::Reporting(_) => {
                self.reject(signal);
                self.report(host);
            }
        }
    }

    /// Release an active session and go back to Idle.
    ///
    /// Returns false if no session was active.
    pub fn abort(&mut self, host: &mut dyn Host) -> bool {
        if !self.state.is_active() {
            return false;
        }

        let samples_decoded = self
            .session
            .take()
            .map_or(0, |session| {
                let samples = session.total_samples_decoded();
                session.close();
                samples
            });
        warn!("Session aborted after {samples_decoded} samples");
        let _ = self
            .event_tx
            .send(BenchEvent::Aborted { samples_decoded });

        self.enter_idle(host);
        true
    }

    /// Leave the Failed state.
    pub fn reset(&mut self, host: &mut dyn Host) {
        if matches!(self.state, SessionState::Failed(_)) {
            self.enter_idle(host);
        }
    }

    fn idle_rate(&self) -> TickRate {
        TickRate::Fixed(self.settings.idle_fps)
    }

    fn enter_idle(&mut self, host: &mut dyn Host) {
        host.clear();
        host.draw_text(INSTRUCTIONS, 0, 0);
        host.set_tick_rate(self.idle_rate());
        self.set_state(SessionState::Idle);
    }

    fn reject(&self, signal: Option<StartSignal>) {
        if let Some(signal) = signal {
            warn!("Ignoring {:?} start signal in {:?}", signal, self.state);
            let _ = self.event_tx.send(BenchEvent::StartRejected(signal));
        }
    }

    fn begin(&mut self, signal: StartSignal, host: &mut dyn Host) {
        let kind = signal.store_kind();
        host.clear();
        let status = match kind {
            StoreKind::Memory => "Loading file into memory...",
            StoreKind::Stream => "Opening file for streaming...",
        };
        host.draw_text(status, 0, 0);
        self.set_state(SessionState::Loading(kind));
    }

    fn load(&mut self, kind: StoreKind, host: &mut dyn Host) {
        let path = &self.settings.path;
        debug!("Opening {} as {} store", path.display(), kind);

        let opened = BackingStore::open(kind, self.storage.as_ref(), path).and_then(|store| {
            DecodeSession::open(store, self.backend.as_ref(), self.settings.scratch_frames)
        });

        match opened {
            Ok(session) => {
                let sample_rate = session.sample_rate();
                let channels = session.channels();
                info!(
                    "Decoding {} from {}: {} Hz, {} channels",
                    path.display(),
                    kind,
                    sample_rate,
                    channels
                );
                host.draw_text(
                    &format!("Decoding {sample_rate} Hz, {channels} ch ({kind})..."),
                    0,
                    LINE_HEIGHT,
                );
                host.set_tick_rate(TickRate::Unbounded);

                self.session = Some(session);
                let _ = self.event_tx.send(BenchEvent::Loaded {
                    store_kind: kind,
                    sample_rate,
                    channels,
                });
                self.set_state(SessionState::Decoding);
            }
            Err(e) => self.fail(SessionFailure::at_open(e, kind), host),
        }
    }

    fn step(&mut self, host: &mut dyn Host) {
        let Some(session) = self.session.as_mut() else {
            error!("Decoding without a session");
            self.enter_idle(host);
            return;
        };

        match session.decode_slice(self.clock.as_mut()) {
            Ok(SliceResult::Progress(frames)) => {
                trace!("Slice decoded {} samples", frames);
            }
            Ok(SliceResult::Finished) => {
                let Some(session) = self.session.take() else {
                    return;
                };
                let summary = session.summary();
                session.close();

                info!(
                    "Decoded {} samples in {:.3}s ({:.2}x realtime, {})",
                    summary.samples_decoded,
                    summary.decode_secs,
                    summary.speed_ratio,
                    summary.store_kind
                );
                host.set_tick_rate(self.idle_rate());
                let _ = self.event_tx.send(BenchEvent::Finished(summary.clone()));
                self.set_state(SessionState::Reporting(summary));
            }
            Err(e) => {
                let Some(session) = self.session.take() else {
                    return;
                };
                let failure = session.failure(e);
                session.close();
                self.fail(failure, host);
            }
        }
    }

    fn report(&mut self, host: &mut dyn Host) {
        if let SessionState::Reporting(summary) = &self.state {
            host.clear();
            for (row, line) in (0..).zip(summary.lines()) {
                host.draw_text(&line, 0, row * LINE_HEIGHT);
            }
            host.draw_text(INSTRUCTIONS, 0, FOOTER_Y);
        }
        self.set_state(SessionState::Idle);
    }

    fn fail(&mut self, failure: SessionFailure, host: &mut dyn Host) {
        error!("Session failed: {failure}");
        host.clear();
        host.draw_text(&failure.error.to_string(), 0, 0);
        if failure.samples_decoded > 0 {
            host.draw_text(
                &format!("Decoded {} samples before the error.", failure.samples_decoded),
                0,
                LINE_HEIGHT,
            );
        }
        host.set_tick_rate(self.idle_rate());

        let _ = self.event_tx.send(BenchEvent::Failed(failure.clone()));
        self.set_state(SessionState::Failed(failure));
    }

    fn set_state(&mut self, new_state: SessionState) {
        if self.state != new_state {
            debug!("State changed: {:?} -> {:?}", self.state, new_state);
            self.state = new_state.clone();
            let _ = self.event_tx.send(BenchEvent::StateChanged(new_state));
        }
    }
}

impl Drop for BenchEngine {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("Releasing session on engine shutdown");
            session.close();
        }
    }
}
