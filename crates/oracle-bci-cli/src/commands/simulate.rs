use std::f32::consts::TAU;
use std::time::Duration;

use colored::Colorize;
use rosc::{OscBundle, OscMessage, OscPacket, OscTime, OscType};
use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;

use oracle_bci::bands::Band;
use oracle_bci::motion::Axis;
use oracle_bci::protocol::{Suffixes, Topics};
use oracle_bci::{PipelineConfig, PipelineResult};

/// EEG samples per datagram.
const SAMPLES_PER_BUNDLE: usize = 16;

/// Carrier frequency of the synthetic EEG.
const CARRIER_HZ: f32 = 10.0;

/// Seconds the dominant hemisphere holds before switching sides.
const SIDE_PERIOD_SECS: f32 = 2.0;

/// Seconds between blink events.
const BLINK_PERIOD_SECS: f32 = 3.0;

// ─── Signal ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl Side {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn at(t: f32) -> Self {
        if (t / SIDE_PERIOD_SECS) as u64 % 2 == 0 {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// Amplitudes of the left and right electrode pairs.
    fn amplitudes(self) -> (f32, f32) {
        match self {
            Side::Left => (20.0, 2.0),
            Side::Right => (2.0, 20.0),
        }
    }
}

/// One sample of a carrier in opposite phase within each electrode pair.
fn eeg_sample(t: f32) -> [f32; 4] {
    let (left, right) = Side::at(t).amplitudes();
    let s = (TAU * CARRIER_HZ * t).sin();
    [left * s, -left * s, right * s, -right * s]
}

/// Acceleration that tilts the head toward `side` on the configured axis.
fn tilt(config: &PipelineConfig, side: Side) -> [f32; 3] {
    let value = match side {
        Side::Left => config.motion.threshold_up + 0.3,
        Side::Right => config.motion.threshold_down - 0.3,
    };
    let mut acceleration = [0.0; 3];
    let index = match config.motion.axis {
        Axis::X => 0,
        Axis::Y => 1,
        Axis::Z => 2,
    };
    acceleration[index] = value;
    acceleration
}

// ─── Transport ──────────────────────────────────────────────────────────

fn message(addr: String, args: Vec<OscType>) -> OscPacket {
    OscPacket::Message(OscMessage { addr, args })
}

fn floats(values: &[f32]) -> Vec<OscType> {
    values.iter().copied().map(OscType::Float).collect()
}

struct Sender {
    socket: UdpSocket,
    target: String,
    sent: u64,
}

impl Sender {
    async fn send(&mut self, packet: &OscPacket) -> PipelineResult<()> {
        let bytes = rosc::encoder::encode(packet)?;
        self.socket.send_to(&bytes, self.target.as_str()).await?;
        self.sent += 1;
        Ok(())
    }

    async fn send_bundle(&mut self, content: Vec<OscPacket>) -> PipelineResult<()> {
        self.send(&OscPacket::Bundle(OscBundle {
            timetag: OscTime {
                seconds: 0,
                fractional: 1,
            },
            content,
        }))
        .await
    }
}

// ─── Simulate ───────────────────────────────────────────────────────────

/// Stream a synthetic session to `target` in real time.
///
/// The dominant hemisphere alternates every two seconds and the head tilt
/// follows it, so both control modes see the same left/right rhythm. A
/// blink arrives every three seconds, doubled every other time.
pub async fn cmd_simulate(
    config: &PipelineConfig,
    target: &str,
    seconds: f64,
    keep_open: bool,
) -> PipelineResult<()> {
    let topics = Topics::from_config(&config.listener);
    let mut sender = Sender {
        socket: UdpSocket::bind("0.0.0.0:0").await?,
        target: target.to_string(),
        sent: 0,
    };

    let rate = config.signal.sample_rate_hz;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total_samples = (seconds.max(0.0) * rate) as usize;
    #[allow(clippy::cast_precision_loss)]
    let bundle_period = Duration::from_secs_f64(SAMPLES_PER_BUNDLE as f64 / rate);

    println!(
        "Streaming {seconds:.1}s of synthetic data to {} at {rate} Hz",
        target.cyan()
    );
    sender
        .send(&message(topics.marker(Suffixes::MARKER_START), vec![]))
        .await?;

    let eeg_addr = topics.sensor(Suffixes::EEG);
    let mut ticker = tokio::time::interval(bundle_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    let mut next_blink = BLINK_PERIOD_SECS;
    let mut blinks = 0u32;
    let mut next_bands = 0.0f32;
    let mut sample = 0usize;

    while sample < total_samples {
        ticker.tick().await;

        let count = SAMPLES_PER_BUNDLE.min(total_samples - sample);
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let content = (sample..sample + count)
            .map(|i| {
                let t = (i as f64 / rate) as f32;
                message(eeg_addr.clone(), floats(&eeg_sample(t)))
            })
            .collect();
        sender.send_bundle(content).await?;

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let t = (sample as f64 / rate) as f32;
        let side = Side::at(t);
        sender
            .send(&message(
                topics.sensor(Suffixes::ACC),
                floats(&tilt(config, side)),
            ))
            .await?;

        if t >= next_bands {
            let (left, right) = side.amplitudes();
            let content = Band::ALL
                .iter()
                .map(|&band| {
                    let scale = if band == Band::Alpha { 1.0 } else { 0.2 };
                    let powers = [left, left, right, right].map(|a| (a * scale).ln_1p());
                    message(topics.band(band), floats(&powers))
                })
                .collect();
            sender.send_bundle(content).await?;
            next_bands += 1.0;
        }

        if t >= next_blink {
            blinks += 1;
            let blink = message(topics.sensor(Suffixes::BLINK), vec![OscType::Int(1)]);
            sender.send(&blink).await?;
            if blinks % 2 == 0 {
                tokio::time::sleep(Duration::from_millis(300)).await;
                sender.send(&blink).await?;
            }
            next_blink += BLINK_PERIOD_SECS;
        }

        sample += count;
    }

    if keep_open {
        println!("{}", "Leaving session open (no stop marker sent).".yellow());
    } else {
        sender
            .send(&message(topics.marker(Suffixes::MARKER_STOP), vec![]))
            .await?;
    }

    println!(
        "{} Sent {} samples in {} datagrams",
        "Done.".green(),
        total_samples,
        sender.sent
    );
    Ok(())
}
