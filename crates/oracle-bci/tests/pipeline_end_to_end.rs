mod support;

use std::time::Duration;

use oracle_bci::bands::Band;
use oracle_bci::protocol::Suffixes;
use oracle_bci::{
    ClassScores, ControlMode, Direction, LinearModel, MotionState, Pipeline, PipelineError,
    WorkerHealth,
};
use rosc::OscType;

use support::mock_sensor::{
    GatedClassifier, MockSensor, StubClassifier, floats, lateral_samples, poll_until,
    start_pipeline_or_skip, temp_path, test_config,
};

fn left_stub() -> StubClassifier {
    StubClassifier(ClassScores::new(0.9, 0.1))
}

#[test]
fn one_window_yields_one_prediction() {
    let config = test_config();
    let Some(mut pipeline) =
        start_pipeline_or_skip("one_window_yields_one_prediction", &config, || Ok(left_stub()))
    else {
        return;
    };
    assert_eq!(pipeline.geometry().window_len, 256);
    assert_eq!(pipeline.geometry().keep, 256);

    let sensor = MockSensor::connect(pipeline.local_addr());
    sensor.start_recording();
    sensor.eeg_samples(&vec![[1.0, 2.0, 3.0, 4.0]; 256]);

    let prediction = poll_until(|| pipeline.facade().latest_prediction())
        .expect("timed out waiting for prediction");
    assert_eq!(prediction.direction, Direction::Left);
    assert!((prediction.confidence - 0.9).abs() < f32::EPSILON);
    assert!(pipeline.facade().latest_prediction().is_none());

    // Once the worker is idle, one more sample must not re-slice the
    // retained window.
    poll_until(|| (pipeline.facade().worker_health() == WorkerHealth::Ready).then_some(()))
        .expect("worker never became ready");
    sensor.eeg_samples(&[[1.0, 2.0, 3.0, 4.0]]);
    poll_until(|| (pipeline.facade().stats().ingest.samples == 257).then_some(()))
        .expect("extra sample not ingested");

    let stats = pipeline.facade().stats();
    assert_eq!(stats.ingest.windows_dispatched, 1);
    assert_eq!(stats.predictions_produced, 1);

    pipeline.shutdown();
}

#[test]
fn stop_marker_closes_listener() {
    let config = test_config();
    let Some(mut pipeline) =
        start_pipeline_or_skip("stop_marker_closes_listener", &config, || Ok(left_stub()))
    else {
        return;
    };
    assert!(pipeline.is_listening());

    let sensor = MockSensor::connect(pipeline.local_addr());
    sensor.start_recording();
    sensor.stop_recording();

    poll_until(|| (!pipeline.is_listening()).then_some(())).expect("listener still running");

    // Samples after the stop marker are never read.
    sensor.eeg_samples(&vec![[0.0; 4]; 256]);
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(pipeline.facade().stats().ingest.samples, 0);
    pipeline.shutdown();
}

#[test]
fn busy_worker_never_receives_second_window() {
    let config = test_config();
    let (release, gated) = GatedClassifier::new(ClassScores::new(0.3, 0.7));
    let Some(mut pipeline) =
        start_pipeline_or_skip("busy_worker_never_receives_second_window", &config, move || {
            Ok(gated)
        })
    else {
        return;
    };

    let sensor = MockSensor::connect(pipeline.local_addr());
    sensor.start_recording();
    // One window in flight (also retained), one more window buffered, then
    // 256 samples lost to overrun.
    sensor.eeg_samples(&vec![[0.0; 4]; 768]);

    let stats = poll_until(|| {
        let stats = pipeline.facade().stats();
        (stats.ingest.samples == 768).then_some(stats)
    })
    .expect("timed out waiting for samples");
    assert_eq!(stats.ingest.windows_dispatched, 1);
    assert_eq!(stats.ingest.samples_dropped, 256);
    assert!(matches!(stats.worker, WorkerHealth::Busy { .. }));

    release.send(()).unwrap();
    let first = poll_until(|| pipeline.facade().latest_prediction()).expect("first prediction");
    assert_eq!(first.direction, Direction::Right);

    // The worker is ready again; the next sample releases the buffered window.
    poll_until(|| (pipeline.facade().worker_health() == WorkerHealth::Ready).then_some(()))
        .expect("worker never became ready");
    sensor.eeg_samples(&[[0.0; 4]]);
    poll_until(|| (pipeline.facade().stats().ingest.windows_dispatched == 2).then_some(()))
        .expect("second window not dispatched");

    release.send(()).unwrap();
    pipeline.shutdown();
}

#[test]
fn malformed_packets_are_dropped() {
    let config = test_config();
    let Some(mut pipeline) =
        start_pipeline_or_skip("malformed_packets_are_dropped", &config, || Ok(left_stub()))
    else {
        return;
    };

    let sensor = MockSensor::connect(pipeline.local_addr());
    sensor.send_raw(b"definitely not osc");
    sensor.send("/muse/eeg", floats(&[1.0, 2.0, 3.0]));
    sensor.send("/muse/acc", vec![OscType::String("up".into())]);
    sensor.send("/muse/gyro", floats(&[0.0, 0.0, 0.0]));
    sensor.start_recording();
    sensor.eeg_samples(&[[1.0; 4]]);

    let stats = poll_until(|| {
        let stats = pipeline.facade().stats();
        (stats.ingest.samples == 1).then_some(stats)
    })
    .expect("valid sample after malformed ones was not ingested");
    assert_eq!(stats.ingest.malformed, 3);
    assert_eq!(stats.ingest.unrouted, 1);
    assert!(pipeline.is_listening());
    pipeline.shutdown();
}

#[test]
fn blinks_become_confirm_and_cancel() {
    let config = test_config();
    let Some(mut pipeline) =
        start_pipeline_or_skip("blinks_become_confirm_and_cancel", &config, || Ok(left_stub()))
    else {
        return;
    };
    let sensor = MockSensor::connect(pipeline.local_addr());

    sensor.blink();
    std::thread::sleep(Duration::from_millis(1000));
    sensor.blink();
    let confirm = poll_until(|| {
        let state = pipeline.facade().latest_confirm_state();
        (!state.is_idle()).then_some(state)
    })
    .expect("no confirm");
    assert!(confirm.confirmed);
    assert!(!confirm.cancelled);

    sensor.blink();
    let cancel = poll_until(|| {
        let state = pipeline.facade().latest_confirm_state();
        state.cancelled.then_some(state)
    })
    .expect("no cancel");
    assert!(!cancel.confirmed);
    assert!(pipeline.facade().latest_confirm_state().is_idle());
    pipeline.shutdown();
}

#[test]
fn motion_mode_follows_head_tilt() {
    let mut config = test_config();
    config.control.mode = ControlMode::Motion;
    let Some(mut pipeline) =
        start_pipeline_or_skip("motion_mode_follows_head_tilt", &config, || Ok(left_stub()))
    else {
        return;
    };
    let sensor = MockSensor::connect(pipeline.local_addr());

    sensor.accelerometer([0.0, -0.8, 0.0]);
    let frame = poll_until(|| {
        let frame = pipeline.poll_frame();
        frame.direction.map(|_| frame)
    })
    .expect("no motion direction");
    assert_eq!(frame.direction, Some(Direction::Right));
    assert_eq!(frame.motion, MotionState::Right);
    assert_eq!(frame.confidence, None);

    sensor.accelerometer([0.0, 0.0, 0.0]);
    poll_until(|| (pipeline.facade().latest_motion() == MotionState::Neutral).then_some(()))
        .expect("motion never returned to neutral");
    pipeline.shutdown();
}

#[test]
fn band_powers_are_exposed() {
    let config = test_config();
    let Some(mut pipeline) =
        start_pipeline_or_skip("band_powers_are_exposed", &config, || Ok(left_stub()))
    else {
        return;
    };
    let sensor = MockSensor::connect(pipeline.local_addr());
    sensor.send(
        &format!("/muse{}alpha{}", Suffixes::BAND_PREFIX, Suffixes::BAND_SUFFIX),
        floats(&[0.5, 0.1, 0.2, 0.3, 0.4]),
    );

    let powers = poll_until(|| pipeline.facade().latest_band_powers().get(Band::Alpha))
        .expect("band power not received");
    assert_eq!(powers, [0.1, 0.2, 0.3, 0.4]);
    pipeline.shutdown();
}

#[test]
fn lateralization_model_classifies_stream() {
    let model_path = temp_path("lateralization.json");
    LinearModel::lateralization().save(&model_path).unwrap();

    let mut config = test_config();
    config.inference.model_path = model_path.clone();
    let mut pipeline = match Pipeline::start(&config) {
        Ok(pipeline) => pipeline,
        Err(err @ PipelineError::BindFailed { .. }) => {
            eprintln!("Skipping lateralization_model_classifies_stream: {err}");
            return;
        }
        Err(err) => panic!("pipeline failed to start: {err}"),
    };

    let sensor = MockSensor::connect(pipeline.local_addr());
    sensor.start_recording();
    sensor.eeg_samples(&lateral_samples(256, 1.0, 20.0));

    let prediction = poll_until(|| pipeline.facade().latest_prediction()).expect("prediction");
    assert_eq!(prediction.direction, Direction::Right);
    assert!(prediction.confidence > 0.5);

    pipeline.shutdown();
    let _ = std::fs::remove_file(&model_path);
}

#[test]
fn missing_model_fails_before_binding() {
    // Find a free port, release it, and point the pipeline at it.
    let probe = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);

    let mut config = test_config();
    config.listener.port = port;
    config.inference.model_path = temp_path("no-such-model.json");

    let err = Pipeline::start(&config).err().expect("start should fail");
    assert!(matches!(err, PipelineError::ModelNotFound { .. }));
    assert!(err.is_fatal_at_startup());

    // The listener never bound, so the port is still free.
    assert!(std::net::UdpSocket::bind(("127.0.0.1", port)).is_ok());
}

#[test]
fn occupied_port_fails_startup() {
    let occupant = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let mut config = test_config();
    config.listener.port = occupant.local_addr().unwrap().port();

    let err = Pipeline::start_with(&config, || Ok(left_stub()))
        .err()
        .expect("start should fail");
    assert!(matches!(err, PipelineError::BindFailed { .. }));
}

#[test]
fn invalid_config_fails_startup() {
    let mut config = test_config();
    config.signal.window_overlap = 1.5;
    let err = Pipeline::start_with(&config, || Ok(left_stub()))
        .err()
        .expect("start should fail");
    assert!(matches!(err, PipelineError::ConfigError { .. }));
}
