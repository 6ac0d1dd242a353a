use std::time::Duration;

use colored::Colorize;
use tokio::time::MissedTickBehavior;

use oracle_bci::{Pipeline, PipelineConfig, PipelineError};

use crate::app::{Carousel, format_event, format_stats};

// ─── Run ────────────────────────────────────────────────────────────────

/// Start the pipeline and drive the carousel until the session stop marker
/// or Ctrl+C.
pub async fn cmd_run(config: PipelineConfig) -> Result<(), PipelineError> {
    let mode = config.control.mode;
    let frame_period = Duration::from_secs_f64(1.0 / f64::from(config.control.frame_rate_hz.max(1)));
    let model_path = config.inference.model_path.clone();

    println!("Loading model {}...", model_path.display().to_string().cyan());
    let started = tokio::task::spawn_blocking(move || Pipeline::start(&config))
        .await
        .map_err(|e| PipelineError::WorkerStartup {
            reason: e.to_string(),
        })?;
    let mut pipeline = match started {
        Ok(pipeline) => pipeline,
        Err(e) => {
            if matches!(e, PipelineError::ModelNotFound { .. }) {
                eprintln!(
                    "Run {} to write a template model.",
                    "oracle-bci init-model".cyan()
                );
            }
            return Err(e);
        }
    };

    println!(
        "{} Listening on {} ({} mode). Waiting for the start marker... (Ctrl+C to stop)",
        "Ready.".green(),
        pipeline.local_addr().to_string().cyan(),
        mode
    );

    let mut carousel = Carousel::default();
    println!("{}", carousel.render());

    let mut frames = tokio::time::interval(frame_period);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = frames.tick() => {
                let frame = pipeline.poll_frame();
                for event in carousel.apply(&frame, mode) {
                    tracing::debug!(?event, motion = %frame.motion, "Carousel event");
                    println!("{}", format_event(&carousel, &event, &frame));
                }
                if !pipeline.is_listening() {
                    println!("\n{}", "Session ended by stop marker.".yellow());
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n{}", "Session stopped.".yellow());
                break;
            }
        }
    }

    let stats = pipeline.facade().stats();
    if stats.worker.is_gone() {
        tracing::warn!(worker = %stats.worker, "Inference worker was not running at session end");
    }
    println!("{}", format_stats(&stats).dimmed());
    tokio::task::spawn_blocking(move || pipeline.shutdown())
        .await
        .map_err(|e| PipelineError::Io(std::io::Error::other(e)))?;
    Ok(())
}
