//! # Sample Buffer & Windower
//!
//! Accumulates EEG samples while recording is active and cuts them into
//! fixed-length windows for the inference worker.
//!
//! ```text
//!   append ──▶ [ kept … | fresh … ]   fresh ≥ stride && sink ready?
//!                  │
//!                  ├─ yes ─▶ window = window_len samples ending `stride`
//!                  │         into the fresh tail ──▶ sink.submit
//!                  │         keep the `keep` samples before that end
//!                  │
//!                  └─ no, at capacity ─▶ drop the oldest sample (overrun)
//! ```
//!
//! Consecutive windows start exactly `stride` samples apart, so no range is
//! dispatched twice. At most one window is in flight: a window is only
//! sliced when the sink reports ready, and the sink flips to busy on a
//! successful submit. The windower is the only writer of its buffer;
//! `&mut self` makes extraction atomic with respect to `append`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::PipelineResult;
use crate::signal::{Sample, Window, WindowGeometry};

/// Receiver of extracted windows, normally the inference dispatcher.
pub trait WindowSink {
    /// Whether a new window would be accepted right now. Must not block.
    fn is_ready(&self) -> bool;

    /// Hand over one window. Must not block.
    fn submit(&self, window: Window) -> PipelineResult<()>;
}

/// Session recording toggle, flipped by the start/stop markers.
#[derive(Debug, Clone, Default)]
pub struct RecordingFlag(Arc<AtomicBool>);

impl RecordingFlag {
    pub fn start(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What one [`SampleWindower::append`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Recording is off; the sample was discarded.
    Ignored,
    /// The sample was buffered.
    Buffered,
    /// A window with this sequence number was handed to the sink.
    Dispatched(u64),
    /// The buffer was at capacity and the sink busy; the oldest sample was dropped.
    Overrun,
    /// The sink refused the window; the buffer was trimmed to capacity.
    Rejected,
}

/// Rolling sample buffer that emits overlapping windows.
pub struct SampleWindower<S> {
    buffer: VecDeque<Sample>,
    geometry: WindowGeometry,
    recording: RecordingFlag,
    sink: S,
    /// Samples at the tail of the buffer not yet covered by a dispatched window.
    fresh: usize,
    next_sequence: u64,
    dropped: u64,
}

impl<S: WindowSink> SampleWindower<S> {
    pub fn new(geometry: WindowGeometry, recording: RecordingFlag, sink: S) -> Self {
        Self {
            buffer: VecDeque::with_capacity(geometry.capacity() + 1),
            geometry,
            recording,
            sink,
            fresh: 0,
            next_sequence: 0,
            dropped: 0,
        }
    }

    /// Add one sample, extracting a window if enough new samples have accumulated.
    pub fn append(&mut self, sample: Sample) -> AppendOutcome {
        if !self.recording.is_active() {
            return AppendOutcome::Ignored;
        }

        let mut overrun = false;
        if self.buffer.len() >= self.geometry.capacity() && !self.sink.is_ready() {
            self.buffer.pop_front();
            self.dropped += 1;
            overrun = true;
        }
        self.buffer.push_back(sample);
        self.fresh = (self.fresh + 1).min(self.buffer.len());

        if !self.window_due() || !self.sink.is_ready() {
            return if overrun {
                AppendOutcome::Overrun
            } else {
                AppendOutcome::Buffered
            };
        }

        self.extract()
    }

    fn window_due(&self) -> bool {
        self.fresh >= self.geometry.stride() && self.buffer.len() >= self.geometry.window_len
    }

    fn extract(&mut self) -> AppendOutcome {
        let WindowGeometry {
            window_len, keep, ..
        } = self.geometry;
        let len = self.buffer.len();
        let end = (len - self.fresh + self.geometry.stride()).max(window_len);
        let sequence = self.next_sequence;
        let samples: Vec<Sample> = self.buffer.range(end - window_len..end).copied().collect();

        match self.sink.submit(Window::new(sequence, samples)) {
            Ok(()) => {
                self.next_sequence += 1;
                self.fresh = len - end;
                self.buffer.drain(..end - keep);
                tracing::debug!(sequence, kept = self.buffer.len(), "Window dispatched");
                AppendOutcome::Dispatched(sequence)
            }
            Err(err) => {
                let excess = len.saturating_sub(self.geometry.capacity());
                self.buffer.drain(..excess);
                self.fresh = self.fresh.min(self.buffer.len());
                self.dropped += excess as u64;
                tracing::warn!(sequence, error = %err, "Window rejected by inference worker");
                AppendOutcome::Rejected
            }
        }
    }

    /// Samples currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Samples discarded by overrun since startup.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Windows handed to the sink since startup.
    pub fn dispatched(&self) -> u64 {
        self.next_sequence
    }

    pub fn geometry(&self) -> WindowGeometry {
        self.geometry
    }

    pub fn recording(&self) -> &RecordingFlag {
        &self.recording
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use std::cell::{Cell, RefCell};

    /// Sink that accepts while `ready` is set and records what it got.
    #[derive(Default)]
    struct FakeSink {
        ready: Cell<bool>,
        busy_after_submit: bool,
        refuse: bool,
        windows: RefCell<Vec<Window>>,
    }

    impl FakeSink {
        fn ready() -> Self {
            Self {
                ready: Cell::new(true),
                ..Self::default()
            }
        }
    }

    impl WindowSink for &FakeSink {
        fn is_ready(&self) -> bool {
            self.ready.get()
        }

        fn submit(&self, window: Window) -> PipelineResult<()> {
            if self.refuse {
                return Err(PipelineError::WorkerBusy);
            }
            self.windows.borrow_mut().push(window);
            if self.busy_after_submit {
                self.ready.set(false);
            }
            Ok(())
        }
    }

    fn recording() -> RecordingFlag {
        let flag = RecordingFlag::default();
        flag.start();
        flag
    }

    #[allow(clippy::cast_precision_loss)]
    fn sample(i: usize) -> Sample {
        Sample::new([i as f32; 4])
    }

    #[test]
    fn test_ignored_until_recording() {
        let sink = FakeSink::ready();
        let geometry = WindowGeometry::new(4, 2, 4).unwrap();
        let mut windower = SampleWindower::new(geometry, RecordingFlag::default(), &sink);
        assert_eq!(windower.append(sample(0)), AppendOutcome::Ignored);
        assert_eq!(windower.buffered(), 0);

        windower.recording().start();
        assert_eq!(windower.append(sample(0)), AppendOutcome::Buffered);
        assert_eq!(windower.buffered(), 1);
    }

    #[test]
    fn test_exactly_one_window_leaves_keep_samples() {
        let sink = FakeSink::ready();
        let geometry = WindowGeometry::new(256, 230, 256).unwrap();
        let mut windower = SampleWindower::new(geometry, recording(), &sink);

        let outcomes: Vec<_> = (0..256).map(|i| windower.append(sample(i))).collect();
        let dispatched = outcomes
            .iter()
            .filter(|o| matches!(o, AppendOutcome::Dispatched(_)))
            .count();
        assert_eq!(dispatched, 1);
        assert_eq!(outcomes[255], AppendOutcome::Dispatched(0));
        assert_eq!(windower.buffered(), 230);

        let windows = sink.windows.borrow();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].len(), 256);
        assert_eq!(windows[0].samples()[0].channels[0], 0.0);
        assert_eq!(windows[0].samples()[255].channels[0], 255.0);
    }

    #[test]
    fn test_retained_samples_are_the_newest() {
        let sink = FakeSink::ready();
        let geometry = WindowGeometry::new(4, 2, 4).unwrap();
        let mut windower = SampleWindower::new(geometry, recording(), &sink);
        for i in 0..6 {
            windower.append(sample(i));
        }
        // Window 0 = 0..4, keep {2, 3}; then 4, 5 make window 1 = 2..6.
        let windows = sink.windows.borrow();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].sequence(), 1);
        let firsts: Vec<f32> = windows[1].channel(0).collect();
        assert_eq!(firsts, vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_no_overlap_keeps_whole_window() {
        let sink = FakeSink::ready();
        let geometry = WindowGeometry::new(4, 4, 4).unwrap();
        let mut windower = SampleWindower::new(geometry, recording(), &sink);
        for i in 0..4 {
            windower.append(sample(i));
        }
        assert_eq!(sink.windows.borrow().len(), 1);
        assert_eq!(windower.buffered(), 4);

        // The retained window is never sliced again; the next one is disjoint.
        let outcomes: Vec<_> = (4..8).map(|i| windower.append(sample(i))).collect();
        assert_eq!(outcomes[0], AppendOutcome::Buffered);
        assert_eq!(outcomes[3], AppendOutcome::Dispatched(1));
        let windows = sink.windows.borrow();
        assert_eq!(windows.len(), 2);
        let first: Vec<f32> = windows[0].channel(0).collect();
        let second: Vec<f32> = windows[1].channel(0).collect();
        assert_eq!(first, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(second, vec![4.0, 5.0, 6.0, 7.0]);
        assert_eq!(windower.buffered(), 4);
    }

    #[test]
    fn test_windows_never_repeat_a_range() {
        let sink = FakeSink::ready();
        let geometry = WindowGeometry::new(8, 6, 8).unwrap();
        let mut windower = SampleWindower::new(geometry, recording(), &sink);
        for i in 0..40 {
            windower.append(sample(i));
        }
        let windows = sink.windows.borrow();
        let starts: Vec<f32> = windows.iter().map(|w| w.samples()[0].channels[0]).collect();
        // First window at 8 samples, then one every stride (2) samples.
        assert_eq!(windows.len(), 17);
        assert!(starts.windows(2).all(|pair| pair[1] - pair[0] == 2.0));
    }

    #[test]
    fn test_busy_sink_never_gets_second_window() {
        let sink = FakeSink {
            busy_after_submit: true,
            ..FakeSink::ready()
        };
        let geometry = WindowGeometry::new(4, 2, 4).unwrap();
        let mut windower = SampleWindower::new(geometry, recording(), &sink);

        for i in 0..4 {
            windower.append(sample(i));
        }
        assert_eq!(sink.windows.borrow().len(), 1);

        // Sink stays busy: buffer fills to one window, then drops the oldest.
        let outcomes: Vec<_> = (4..10).map(|i| windower.append(sample(i))).collect();
        assert_eq!(sink.windows.borrow().len(), 1);
        assert_eq!(windower.buffered(), 4);
        assert_eq!(outcomes[0], AppendOutcome::Buffered);
        assert_eq!(outcomes[1], AppendOutcome::Buffered);
        assert_eq!(outcomes[2], AppendOutcome::Overrun);
        assert_eq!(windower.dropped(), 4);

        // Readiness returns: the next sample triggers extraction of the
        // oldest window of undispatched samples; its overlap tail and the
        // sample after it stay buffered.
        sink.ready.set(true);
        assert_eq!(windower.append(sample(10)), AppendOutcome::Dispatched(1));
        let windows = sink.windows.borrow();
        let firsts: Vec<f32> = windows[1].channel(0).collect();
        assert_eq!(firsts, vec![6.0, 7.0, 8.0, 9.0]);
        assert_eq!(windower.buffered(), 3);
    }

    #[test]
    fn test_rejected_window_bounds_buffer() {
        let sink = FakeSink {
            refuse: true,
            ..FakeSink::ready()
        };
        let geometry = WindowGeometry::new(4, 2, 4).unwrap();
        let mut windower = SampleWindower::new(geometry, recording(), &sink);
        for i in 0..4 {
            windower.append(sample(i));
        }
        assert_eq!(windower.append(sample(4)), AppendOutcome::Rejected);
        assert_eq!(windower.buffered(), 4);
        assert_eq!(windower.dispatched(), 0);
        assert!(sink.windows.borrow().is_empty());
    }
}
