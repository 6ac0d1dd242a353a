//! # Pipeline Lifecycle
//!
//! Wires the components together in a fixed startup order:
//!
//! 1. validate the configuration and derive the window geometry
//! 2. start the inference worker and wait for the model to load
//! 3. bind the UDP socket
//! 4. start the listener thread
//!
//! Any failure in steps 1–3 aborts startup before a single packet is read.
//! Teardown stops the listener (joining its thread) and terminates the
//! worker without draining.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::control::{ControlFacade, ControlSnapshot};
use crate::debounce::Debouncer;
use crate::error::PipelineResult;
use crate::health::Watchdog;
use crate::inference::{Classifier, InferenceDispatcher, LinearModel, Preprocessor, WorkerHandle};
use crate::ingest::{IngestTargets, Ingestor};
use crate::listener::{Listener, ListenerHandle};
use crate::motion::MotionOverride;
use crate::signal::WindowGeometry;
use crate::windower::{RecordingFlag, SampleWindower};

/// A running session.
pub struct Pipeline {
    listener: ListenerHandle,
    worker: WorkerHandle,
    facade: ControlFacade,
    geometry: WindowGeometry,
}

impl Pipeline {
    /// Start a session with the JSON model at `config.inference.model_path`.
    ///
    /// Blocks until the model is loaded; call it from a blocking context.
    pub fn start(config: &PipelineConfig) -> PipelineResult<Self> {
        let path = config.inference.model_path.clone();
        Self::start_with(config, move || LinearModel::load(&path))
    }

    /// Start a session with a custom classifier loader, run on the worker thread.
    pub fn start_with<C, L>(config: &PipelineConfig, loader: L) -> PipelineResult<Self>
    where
        C: Classifier,
        L: FnOnce() -> PipelineResult<C> + Send + 'static,
    {
        config.validate()?;
        let geometry = WindowGeometry::from_config(&config.signal)?;

        let dispatcher = InferenceDispatcher::spawn(
            loader,
            Preprocessor::new(geometry.epoch_len),
            Watchdog::from_secs(config.inference.stall_timeout_secs),
        )?;
        let listener = Listener::bind(&config.listener)?;

        let (submitter, receiver, worker) = dispatcher.into_parts();
        let targets = IngestTargets {
            debouncer: Arc::new(Debouncer::from_config(&config.debounce)),
            ..IngestTargets::default()
        };
        let windower = SampleWindower::new(geometry, RecordingFlag::default(), submitter);
        let ingestor = Ingestor::new(
            windower,
            MotionOverride::from_config(&config.motion),
            targets.clone(),
        );
        let facade = ControlFacade::new(config.control.mode, receiver, targets);
        let listener = listener.spawn(ingestor)?;

        tracing::info!(
            addr = %listener.local_addr(),
            window_len = geometry.window_len,
            keep = geometry.keep,
            mode = %config.control.mode,
            "Pipeline started"
        );

        Ok(Self {
            listener,
            worker,
            facade,
            geometry,
        })
    }

    /// The UI's query surface.
    pub fn facade(&mut self) -> &mut ControlFacade {
        &mut self.facade
    }

    /// Shorthand for [`ControlFacade::poll_frame`].
    pub fn poll_frame(&mut self) -> ControlSnapshot {
        self.facade.poll_frame()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// `false` once the session stop marker arrived or the pipeline was stopped.
    pub fn is_listening(&self) -> bool {
        self.listener.is_running()
    }

    pub fn geometry(&self) -> WindowGeometry {
        self.geometry
    }

    /// Stop the listener and terminate the inference worker.
    pub fn shutdown(mut self) {
        self.listener.stop();
        self.worker.terminate();
        tracing::info!("Pipeline shut down");
    }
}
