//! Typed packets decoded from OSC datagrams.
//!
//! Each OSC message is routed by address and checked for arity. Messages
//! with the wrong argument count or non-numeric arguments come back as
//! [`Inbound::Malformed`]; the caller drops them.

use rosc::{OscMessage, OscPacket, OscType};

use crate::bands::Band;
use crate::error::PipelineResult;
use crate::protocol::topics::{Route, Topics};
use crate::signal::CHANNEL_COUNT;

/// Largest EEG arity accepted: four channels plus up to two AUX columns.
const EEG_MAX_ARGS: usize = CHANNEL_COUNT + 2;

/// A validated sensor or marker packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Packet {
    /// One EEG sample, AUX columns stripped.
    Eeg([f32; CHANNEL_COUNT]),
    /// One 3-axis acceleration sample.
    Accelerometer([f32; 3]),
    Blink,
    JawClench,
    /// Per-channel absolute power of one band.
    BandPower(Band, [f32; CHANNEL_COUNT]),
    SessionStart,
    SessionStop,
}

/// Result of decoding one OSC message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Packet(Packet),
    /// Known topic, unexpected arity or argument types.
    Malformed { addr: String },
    /// No handler for this address.
    Unrouted { addr: String },
}

impl Packet {
    /// Decode one OSC message against the topic table.
    pub fn from_message(msg: &OscMessage, topics: &Topics) -> Inbound {
        let packet = match topics.route(&msg.addr) {
            Route::Unknown => {
                return Inbound::Unrouted {
                    addr: msg.addr.clone(),
                };
            }
            Route::Eeg => eeg_channels(&msg.args).map(Packet::Eeg),
            Route::Accelerometer => floats::<3>(&msg.args).map(Packet::Accelerometer),
            Route::BandPower(band) => band_channels(&msg.args).map(|p| Packet::BandPower(band, p)),
            Route::Blink => Some(Packet::Blink),
            Route::JawClench => Some(Packet::JawClench),
            Route::SessionStart => Some(Packet::SessionStart),
            Route::SessionStop => Some(Packet::SessionStop),
        };
        match packet {
            Some(packet) => Inbound::Packet(packet),
            None => Inbound::Malformed {
                addr: msg.addr.clone(),
            },
        }
    }
}

/// Decode a UDP datagram into one entry per contained OSC message.
///
/// Bundles are flattened in order. Fails only if the datagram is not valid
/// OSC at all.
pub fn decode_datagram(buf: &[u8], topics: &Topics) -> PipelineResult<Vec<Inbound>> {
    let (_, packet) = rosc::decoder::decode_udp(buf)?;
    let mut out = Vec::new();
    flatten(&packet, topics, &mut out);
    Ok(out)
}

fn flatten(packet: &OscPacket, topics: &Topics, out: &mut Vec<Inbound>) {
    match packet {
        OscPacket::Message(msg) => out.push(Packet::from_message(msg, topics)),
        OscPacket::Bundle(bundle) => {
            for inner in &bundle.content {
                flatten(inner, topics, out);
            }
        }
    }
}

// ─── Argument helpers ───────────────────────────────────────────────────

fn eeg_channels(args: &[OscType]) -> Option<[f32; CHANNEL_COUNT]> {
    if !(CHANNEL_COUNT..=EEG_MAX_ARGS).contains(&args.len()) {
        return None;
    }
    floats::<CHANNEL_COUNT>(&args[..CHANNEL_COUNT])
}

/// Band topics carry one value per channel, optionally led by an aggregate.
fn band_channels(args: &[OscType]) -> Option<[f32; CHANNEL_COUNT]> {
    match args.len() {
        CHANNEL_COUNT => floats::<CHANNEL_COUNT>(args),
        n if n == CHANNEL_COUNT + 1 => floats::<CHANNEL_COUNT>(&args[1..]),
        _ => None,
    }
}

/// Exactly `N` finite numeric arguments.
fn floats<const N: usize>(args: &[OscType]) -> Option<[f32; N]> {
    if args.len() != N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = as_f32(arg)?;
    }
    Some(out)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn as_f32(arg: &OscType) -> Option<f32> {
    let value = match arg {
        OscType::Float(v) => *v,
        OscType::Double(v) => *v as f32,
        OscType::Int(v) => *v as f32,
        OscType::Long(v) => *v as f32,
        _ => return None,
    };
    value.is_finite().then_some(value)
}
