//! # Inference Dispatcher
//!
//! Runs the classifier on a dedicated OS thread so a multi-hundred-millisecond
//! inference never shares a scheduler with the ingestion loop. Windows go in
//! through a bounded queue, predictions come out through an unbounded one, and
//! a single readiness flag enforces at most one window in flight.
//!
//! ```text
//!  ingestion thread                     oracle-inference thread
//!  ────────────────                     ───────────────────────
//!  WindowSubmitter::submit              loop {
//!    ready: true ─CAS─▶ false             blocking_recv(window)
//!    try_send(window) ─────────────▶      preprocess → classify
//!                                         send(prediction) ───────┐
//!                                         ready ◀─ true           │
//!                                       }                         │
//!  UI thread                                                      │
//!  ─────────                                                      │
//!  PredictionReceiver::poll ◀─────────────────────────────────────┘
//! ```
//!
//! The classifier is constructed on the worker thread by the loader passed to
//! [`InferenceDispatcher::spawn`]; `spawn` returns only after the loader
//! succeeded, so a missing or broken model fails startup before any window
//! is submitted.

pub mod model;
pub mod preprocess;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::{PipelineError, PipelineResult};
use crate::health::{Watchdog, WorkerHealth};
use crate::signal::Window;
use crate::windower::WindowSink;

pub use model::LinearModel;
pub use preprocess::{Epoch, Preprocessor};

/// Capacity of the window queue. Admission control keeps at most one window
/// queued; the second slot holds the shutdown command.
const WINDOW_QUEUE_CAPACITY: usize = 2;

const WORKER_THREAD_NAME: &str = "oracle-inference";

// ─── Results ────────────────────────────────────────────────────────────

/// Classifier decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Left => f.write_str("left"),
            Direction::Right => f.write_str("right"),
        }
    }
}

/// Raw two-class scores from a classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassScores {
    pub left: f32,
    pub right: f32,
}

impl ClassScores {
    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Softmax over `[left, right]` logits.
    pub fn softmax(logits: [f32; 2]) -> Self {
        let max = logits[0].max(logits[1]);
        let left = (logits[0] - max).exp();
        let right = (logits[1] - max).exp();
        let total = left + right;
        Self::new(left / total, right / total)
    }

    #[allow(clippy::cast_precision_loss)]
    fn mean(scores: &[ClassScores]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        let n = scores.len() as f32;
        let (left, right) = scores
            .iter()
            .fold((0.0, 0.0), |(l, r), s| (l + s.left, r + s.right));
        Some(Self::new(left / n, right / n))
    }
}

/// Direction plus the winning class score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionResult {
    pub direction: Direction,
    /// Larger of the two class scores, clamped to `[0, 1]`.
    pub confidence: f32,
}

impl PredictionResult {
    pub fn new(direction: Direction, confidence: f32) -> Self {
        Self {
            direction,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// The higher score wins; equal scores resolve to [`Direction::Right`].
    pub fn from_scores(scores: ClassScores) -> Self {
        if scores.left > scores.right {
            Self::new(Direction::Left, scores.left)
        } else {
            Self::new(Direction::Right, scores.right)
        }
    }
}

/// A trained two-class model. Called on the worker thread only.
pub trait Classifier {
    fn classify(&mut self, epoch: &Epoch) -> PipelineResult<ClassScores>;
}

// ─── Shared worker state ────────────────────────────────────────────────

enum WorkerCommand {
    Window(Window),
    Shutdown,
}

#[derive(Debug)]
struct WorkerShared {
    /// Idle and accepting a window. Written by both sides, CAS on submit.
    ready: AtomicBool,
    /// Cleared when the worker thread exits for any reason.
    alive: AtomicBool,
    /// Set by the pipeline on teardown.
    terminated: AtomicBool,
    watchdog: Watchdog,
    produced: AtomicU64,
}

impl WorkerShared {
    fn health(&self) -> WorkerHealth {
        if self.terminated.load(Ordering::Acquire) {
            return WorkerHealth::Terminated;
        }
        if !self.alive.load(Ordering::Acquire) {
            return WorkerHealth::Dead;
        }
        if self.ready.load(Ordering::Acquire) {
            return WorkerHealth::Ready;
        }
        match (self.watchdog.check(), self.watchdog.busy_for()) {
            (Some(elapsed), _) => WorkerHealth::Stalled { elapsed },
            (None, Some(elapsed)) => WorkerHealth::Busy { elapsed },
            // Claimed by a submit that has not marked the watchdog yet.
            (None, None) => WorkerHealth::Busy {
                elapsed: Duration::ZERO,
            },
        }
    }
}

/// Marks the worker dead when its thread exits, including by panic.
struct AliveGuard(Arc<WorkerShared>);

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.ready.store(false, Ordering::Release);
        self.0.alive.store(false, Ordering::Release);
        if self.0.terminated.load(Ordering::Acquire) {
            tracing::debug!("Inference worker stopped");
        } else {
            tracing::error!("Inference worker exited unexpectedly; no further windows will be accepted");
        }
    }
}

// ─── Handles ────────────────────────────────────────────────────────────

/// Ingestion-side handle: admission control and window submission.
#[derive(Clone)]
pub struct WindowSubmitter {
    tx: mpsc::Sender<WorkerCommand>,
    shared: Arc<WorkerShared>,
}

impl WindowSubmitter {
    /// Enqueue a window without blocking.
    ///
    /// # Errors
    /// - [`PipelineError::WorkerUnavailable`] once the worker is gone
    /// - [`PipelineError::WorkerStalled`] while the watchdog reports a stall
    /// - [`PipelineError::WorkerBusy`] while the previous window is in flight
    pub fn submit(&self, window: Window) -> PipelineResult<()> {
        let shared = &self.shared;
        if shared.terminated.load(Ordering::Acquire) || !shared.alive.load(Ordering::Acquire) {
            return Err(PipelineError::WorkerUnavailable);
        }
        if let Some(elapsed) = shared.watchdog.check() {
            return Err(PipelineError::WorkerStalled {
                seconds: elapsed.as_secs(),
            });
        }
        if shared
            .ready
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PipelineError::WorkerBusy);
        }

        shared.watchdog.mark_busy();
        let sequence = window.sequence();
        match self.tx.try_send(WorkerCommand::Window(window)) {
            Ok(()) => {
                tracing::trace!(sequence, "Window queued for inference");
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                shared.watchdog.mark_idle();
                shared.ready.store(true, Ordering::Release);
                Err(PipelineError::WorkerBusy)
            }
            Err(TrySendError::Closed(_)) => {
                shared.watchdog.mark_idle();
                Err(PipelineError::WorkerUnavailable)
            }
        }
    }

    /// Whether [`submit`](Self::submit) would currently be accepted.
    pub fn is_ready(&self) -> bool {
        let shared = &self.shared;
        shared.alive.load(Ordering::Acquire)
            && !shared.terminated.load(Ordering::Acquire)
            && shared.ready.load(Ordering::Acquire)
    }

    pub fn health(&self) -> WorkerHealth {
        self.shared.health()
    }
}

impl WindowSink for WindowSubmitter {
    fn is_ready(&self) -> bool {
        WindowSubmitter::is_ready(self)
    }

    fn submit(&self, window: Window) -> PipelineResult<()> {
        WindowSubmitter::submit(self, window)
    }
}

/// UI-side handle: non-blocking result polling.
pub struct PredictionReceiver {
    rx: mpsc::UnboundedReceiver<PredictionResult>,
    shared: Arc<WorkerShared>,
    delivered: u64,
}

impl PredictionReceiver {
    /// Newest unconsumed prediction, if any. Older unpolled predictions are
    /// discarded; each prediction is returned at most once.
    pub fn poll(&mut self) -> Option<PredictionResult> {
        let mut latest = None;
        while let Ok(prediction) = self.rx.try_recv() {
            latest = Some(prediction);
        }
        if latest.is_some() {
            self.delivered += 1;
        }
        latest
    }

    pub fn health(&self) -> WorkerHealth {
        self.shared.health()
    }

    /// Predictions produced by the worker since startup.
    pub fn produced(&self) -> u64 {
        self.shared.produced.load(Ordering::Relaxed)
    }

    /// Predictions returned by [`poll`](Self::poll) since startup.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

/// Owner of the worker thread. Dropping it terminates the worker.
pub struct WorkerHandle {
    tx: mpsc::Sender<WorkerCommand>,
    shared: Arc<WorkerShared>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Stop accepting windows and tell the worker to exit without draining.
    ///
    /// The thread is detached: an in-flight inference runs to completion in
    /// the background and its result is discarded.
    pub fn terminate(&mut self) {
        if self.shared.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.ready.store(false, Ordering::Release);
        let _ = self.tx.try_send(WorkerCommand::Shutdown);
        drop(self.thread.take());
        tracing::info!("Inference worker terminated");
    }

    pub fn health(&self) -> WorkerHealth {
        self.shared.health()
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}

// ─── Dispatcher ─────────────────────────────────────────────────────────

/// The inference worker and its three handles.
pub struct InferenceDispatcher {
    submitter: WindowSubmitter,
    receiver: PredictionReceiver,
    worker: WorkerHandle,
}

impl InferenceDispatcher {
    /// Start the worker thread and wait for the classifier to load.
    ///
    /// `loader` runs on the worker thread. Its error is returned from here
    /// unchanged, so startup sees [`PipelineError::ModelNotFound`] or
    /// [`PipelineError::ModelLoad`] directly.
    pub fn spawn<C, L>(loader: L, preprocessor: Preprocessor, watchdog: Watchdog) -> PipelineResult<Self>
    where
        C: Classifier,
        L: FnOnce() -> PipelineResult<C> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(WINDOW_QUEUE_CAPACITY);
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let (startup_tx, startup_rx) = std::sync::mpsc::channel::<PipelineResult<()>>();

        let shared = Arc::new(WorkerShared {
            ready: AtomicBool::new(false),
            alive: AtomicBool::new(true),
            terminated: AtomicBool::new(false),
            watchdog,
            produced: AtomicU64::new(0),
        });

        let thread = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name(WORKER_THREAD_NAME.into())
                .spawn(move || {
                    let guard = AliveGuard(shared);
                    let classifier = match loader() {
                        Ok(classifier) => classifier,
                        Err(err) => {
                            guard.0.terminated.store(true, Ordering::Release);
                            let _ = startup_tx.send(Err(err));
                            return;
                        }
                    };
                    guard.0.ready.store(true, Ordering::Release);
                    let _ = startup_tx.send(Ok(()));
                    run_worker(classifier, preprocessor, rx, &result_tx, &guard.0);
                })
                .map_err(|e| PipelineError::WorkerStartup {
                    reason: e.to_string(),
                })?
        };

        match startup_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let _ = thread.join();
                return Err(err);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(PipelineError::WorkerStartup {
                    reason: "worker exited while loading the model".into(),
                });
            }
        }

        tracing::info!(epoch_len = preprocessor.epoch_len(), "Inference worker ready");

        Ok(Self {
            submitter: WindowSubmitter {
                tx: tx.clone(),
                shared: Arc::clone(&shared),
            },
            receiver: PredictionReceiver {
                rx: result_rx,
                shared: Arc::clone(&shared),
                delivered: 0,
            },
            worker: WorkerHandle {
                tx,
                shared,
                thread: Some(thread),
            },
        })
    }

    pub fn submit(&self, window: Window) -> PipelineResult<()> {
        self.submitter.submit(window)
    }

    pub fn poll(&mut self) -> Option<PredictionResult> {
        self.receiver.poll()
    }

    pub fn is_ready(&self) -> bool {
        self.submitter.is_ready()
    }

    pub fn health(&self) -> WorkerHealth {
        self.worker.health()
    }

    /// A submitter clone for the ingestion side.
    pub fn submitter(&self) -> WindowSubmitter {
        self.submitter.clone()
    }

    /// Split into the ingestion, UI and lifecycle handles.
    pub fn into_parts(self) -> (WindowSubmitter, PredictionReceiver, WorkerHandle) {
        (self.submitter, self.receiver, self.worker)
    }

    pub fn shutdown(mut self) {
        self.worker.terminate();
    }
}

// ─── Worker loop ────────────────────────────────────────────────────────

fn run_worker<C: Classifier>(
    mut classifier: C,
    preprocessor: Preprocessor,
    mut rx: mpsc::Receiver<WorkerCommand>,
    results: &mpsc::UnboundedSender<PredictionResult>,
    shared: &WorkerShared,
) {
    while let Some(command) = rx.blocking_recv() {
        let window = match command {
            WorkerCommand::Window(window) => window,
            WorkerCommand::Shutdown => break,
        };

        let started = Instant::now();
        match classify_window(&mut classifier, &preprocessor, &window) {
            Ok(prediction) => {
                if shared.terminated.load(Ordering::Acquire) {
                    break;
                }
                tracing::debug!(
                    sequence = window.sequence(),
                    direction = %prediction.direction,
                    confidence = prediction.confidence,
                    elapsed_ms = started.elapsed().as_millis(),
                    "Prediction produced"
                );
                shared.produced.fetch_add(1, Ordering::Relaxed);
                let _ = results.send(prediction);
            }
            Err(err) => {
                tracing::warn!(sequence = window.sequence(), error = %err, "Inference failed; window discarded");
            }
        }

        shared.watchdog.mark_idle();
        shared.ready.store(true, Ordering::Release);
    }
}

/// Preprocess a window and average the per-epoch scores.
fn classify_window<C: Classifier>(
    classifier: &mut C,
    preprocessor: &Preprocessor,
    window: &Window,
) -> PipelineResult<PredictionResult> {
    let epochs = preprocessor.prepare(window)?;
    let scores = epochs
        .iter()
        .map(|epoch| classifier.classify(epoch))
        .collect::<PipelineResult<Vec<_>>>()?;
    let mean = ClassScores::mean(&scores).ok_or_else(|| PipelineError::Inference {
        reason: "window produced no epochs".into(),
    })?;
    Ok(PredictionResult::from_scores(mean))
}
