#![allow(dead_code)]

use std::net::{SocketAddr, UdpSocket};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use oracle_bci::protocol::{Suffixes, Topics};
use oracle_bci::{
    ClassScores, Classifier, Epoch, Pipeline, PipelineConfig, PipelineError, PipelineResult,
};
use rosc::{OscBundle, OscMessage, OscPacket, OscTime, OscType};

pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Messages per OSC bundle when streaming samples, keeping the datagram
/// count well under the loopback receive buffer.
const SAMPLES_PER_BUNDLE: usize = 16;

/// Sends OSC datagrams to a pipeline the way a headset bridge would.
pub struct MockSensor {
    socket: UdpSocket,
    target: SocketAddr,
    topics: Topics,
}

impl MockSensor {
    pub fn connect(target: SocketAddr) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").expect("bind mock sensor socket");
        Self {
            socket,
            target,
            topics: Topics::default(),
        }
    }

    pub fn send_raw(&self, bytes: &[u8]) {
        self.socket
            .send_to(bytes, self.target)
            .expect("send datagram");
    }

    pub fn send_packet(&self, packet: &OscPacket) {
        let bytes = rosc::encoder::encode(packet).expect("encode OSC packet");
        self.send_raw(&bytes);
    }

    pub fn send(&self, addr: &str, args: Vec<OscType>) {
        self.send_packet(&OscPacket::Message(message(addr, args)));
    }

    pub fn start_recording(&self) {
        self.send(&self.topics.marker(Suffixes::MARKER_START), vec![]);
    }

    pub fn stop_recording(&self) {
        self.send(&self.topics.marker(Suffixes::MARKER_STOP), vec![]);
    }

    pub fn blink(&self) {
        self.send(&self.topics.sensor(Suffixes::BLINK), vec![OscType::Int(1)]);
    }

    pub fn accelerometer(&self, xyz: [f32; 3]) {
        self.send(&self.topics.sensor(Suffixes::ACC), floats(&xyz));
    }

    /// Stream EEG samples in bundles, pausing briefly between datagrams.
    pub fn eeg_samples(&self, samples: &[[f32; 4]]) {
        let addr = self.topics.sensor(Suffixes::EEG);
        for chunk in samples.chunks(SAMPLES_PER_BUNDLE) {
            let content = chunk
                .iter()
                .map(|s| OscPacket::Message(message(&addr, floats(s))))
                .collect();
            self.send_packet(&OscPacket::Bundle(OscBundle {
                timetag: OscTime {
                    seconds: 0,
                    fractional: 1,
                },
                content,
            }));
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

fn message(addr: &str, args: Vec<OscType>) -> OscMessage {
    OscMessage {
        addr: addr.to_string(),
        args,
    }
}

pub fn floats(values: &[f32]) -> Vec<OscType> {
    values.iter().copied().map(OscType::Float).collect()
}

/// `n` samples alternating in sign, left pair scaled by `left`, right by `right`.
pub fn lateral_samples(n: usize, left: f32, right: f32) -> Vec<[f32; 4]> {
    (0..n)
        .map(|i| {
            let s = if i % 2 == 0 { 1.0 } else { -1.0 };
            [left * s, -left * s, right * s, -right * s]
        })
        .collect()
}

// ─── Classifiers ────────────────────────────────────────────────────────

/// Returns the same scores for every epoch.
pub struct StubClassifier(pub ClassScores);

impl Classifier for StubClassifier {
    fn classify(&mut self, _epoch: &Epoch) -> PipelineResult<ClassScores> {
        Ok(self.0)
    }
}

/// Blocks each classification until released through the paired sender.
pub struct GatedClassifier {
    gate: mpsc::Receiver<()>,
    scores: ClassScores,
}

impl GatedClassifier {
    pub fn new(scores: ClassScores) -> (mpsc::Sender<()>, Self) {
        let (release, gate) = mpsc::channel();
        (release, Self { gate, scores })
    }
}

impl Classifier for GatedClassifier {
    fn classify(&mut self, _epoch: &Epoch) -> PipelineResult<ClassScores> {
        let _ = self.gate.recv();
        Ok(self.scores)
    }
}

// ─── Pipeline helpers ───────────────────────────────────────────────────

/// Loopback, ephemeral port, 1 s windows at 256 Hz without overlap.
pub fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.listener.address = "127.0.0.1".into();
    config.listener.port = 0;
    config.signal.window_overlap = 0.0;
    config
}

/// Route pipeline logs through the test harness. Set `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn start_pipeline_or_skip<C, L>(test_name: &str, config: &PipelineConfig, loader: L) -> Option<Pipeline>
where
    C: Classifier,
    L: FnOnce() -> PipelineResult<C> + Send + 'static,
{
    init_tracing();
    match Pipeline::start_with(config, loader) {
        Ok(pipeline) => Some(pipeline),
        Err(err @ PipelineError::BindFailed { .. }) => {
            eprintln!("Skipping {test_name}: unable to bind loopback socket: {err}");
            None
        }
        Err(err) => panic!("pipeline failed to start: {err}"),
    }
}

/// Poll `f` until it yields a value or [`STEP_TIMEOUT`] elapses.
pub fn poll_until<T>(mut f: impl FnMut() -> Option<T>) -> Option<T> {
    let deadline = Instant::now() + STEP_TIMEOUT;
    while Instant::now() < deadline {
        if let Some(value) = f() {
            return Some(value);
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    None
}

pub fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("oracle-bci-it-{}-{name}", std::process::id()))
}
