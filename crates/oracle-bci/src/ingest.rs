//! Demultiplexes decoded packets onto the pipeline components.
//!
//! [`Ingestor`] is the listener's packet handler. Every call does O(1)
//! amortized work: one buffer append, one debouncer record, one atomic store
//! or one flag toggle. It never waits on the inference worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::bands::BandCell;
use crate::debounce::{Debouncer, DiscreteEvent, EventKind};
use crate::error::PipelineError;
use crate::motion::{MotionCell, MotionOverride};
use crate::protocol::{Inbound, Packet};
use crate::signal::Sample;
use crate::windower::{AppendOutcome, SampleWindower, WindowSink};

/// Whether the listener keeps running after a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Receiver of everything the listener reads off the socket.
pub trait PacketHandler: Send + 'static {
    /// Handle one decoded OSC message.
    fn handle(&mut self, inbound: Inbound) -> Flow;

    /// A datagram that was not valid OSC.
    fn reject(&mut self, _error: &PipelineError) {}
}

// ─── Diagnostics ────────────────────────────────────────────────────────

/// Ingestion counters since startup.
#[derive(Debug, Default)]
pub struct IngestStats {
    packets: AtomicU64,
    malformed: AtomicU64,
    unrouted: AtomicU64,
    samples: AtomicU64,
    samples_dropped: AtomicU64,
    windows_dispatched: AtomicU64,
    windows_rejected: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSnapshot {
    /// OSC messages received, including malformed ones.
    pub packets: u64,
    /// Messages on known topics with bad arity or types, plus undecodable datagrams.
    pub malformed: u64,
    /// Messages on unknown topics.
    pub unrouted: u64,
    /// EEG samples accepted while recording.
    pub samples: u64,
    /// Samples discarded by buffer overrun.
    pub samples_dropped: u64,
    pub windows_dispatched: u64,
    pub windows_rejected: u64,
}

impl IngestStats {
    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            packets: self.packets.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            unrouted: self.unrouted.load(Ordering::Relaxed),
            samples: self.samples.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            windows_dispatched: self.windows_dispatched.load(Ordering::Relaxed),
            windows_rejected: self.windows_rejected.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ─── Ingestor ───────────────────────────────────────────────────────────

/// Shared state the ingestor writes and the control facade reads.
#[derive(Debug, Clone, Default)]
pub struct IngestTargets {
    pub debouncer: Arc<Debouncer>,
    pub motion: Arc<MotionCell>,
    pub bands: Arc<BandCell>,
    pub stats: Arc<IngestStats>,
}

/// Packet handler that owns the sample windower.
pub struct Ingestor<S> {
    windower: SampleWindower<S>,
    motion: MotionOverride,
    targets: IngestTargets,
}

impl<S: WindowSink> Ingestor<S> {
    pub fn new(windower: SampleWindower<S>, motion: MotionOverride, targets: IngestTargets) -> Self {
        Self {
            windower,
            motion,
            targets,
        }
    }

    pub fn windower(&self) -> &SampleWindower<S> {
        &self.windower
    }

    fn route(&mut self, packet: Packet) -> Flow {
        match packet {
            Packet::Eeg(channels) => self.on_sample(Sample::new(channels)),
            Packet::Accelerometer(acceleration) => {
                self.targets.motion.store(self.motion.classify(acceleration));
            }
            Packet::Blink => self.on_event(EventKind::Blink),
            Packet::JawClench => self.on_event(EventKind::JawClench),
            Packet::BandPower(band, powers) => self.targets.bands.update(band, powers),
            Packet::SessionStart => {
                self.windower.recording().start();
                tracing::info!("Recording started");
            }
            Packet::SessionStop => {
                self.windower.recording().stop();
                tracing::info!(
                    windows = self.windower.dispatched(),
                    dropped = self.windower.dropped(),
                    "Recording stopped; closing listener"
                );
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn on_sample(&mut self, sample: Sample) {
        let stats = &self.targets.stats;
        match self.windower.append(sample) {
            AppendOutcome::Ignored => return,
            AppendOutcome::Buffered => {}
            AppendOutcome::Dispatched(_) => IngestStats::bump(&stats.windows_dispatched),
            AppendOutcome::Overrun => {
                tracing::trace!(buffered = self.windower.buffered(), "Buffer overrun");
            }
            AppendOutcome::Rejected => IngestStats::bump(&stats.windows_rejected),
        }
        IngestStats::bump(&stats.samples);
        stats
            .samples_dropped
            .store(self.windower.dropped(), Ordering::Relaxed);
    }

    fn on_event(&self, kind: EventKind) {
        let outcome = self.targets.debouncer.record(DiscreteEvent::now(kind));
        tracing::trace!(%kind, ?outcome, "Discrete event");
    }
}

impl<S: WindowSink + Send + 'static> PacketHandler for Ingestor<S> {
    fn handle(&mut self, inbound: Inbound) -> Flow {
        let stats = &self.targets.stats;
        IngestStats::bump(&stats.packets);
        match inbound {
            Inbound::Packet(packet) => self.route(packet),
            Inbound::Malformed { addr } => {
                IngestStats::bump(&stats.malformed);
                tracing::trace!(%addr, "Dropped malformed packet");
                Flow::Continue
            }
            Inbound::Unrouted { addr } => {
                IngestStats::bump(&stats.unrouted);
                tracing::trace!(%addr, "No handler for address");
                Flow::Continue
            }
        }
    }

    fn reject(&mut self, error: &PipelineError) {
        IngestStats::bump(&self.targets.stats.malformed);
        tracing::trace!(%error, "Dropped undecodable datagram");
    }
}
