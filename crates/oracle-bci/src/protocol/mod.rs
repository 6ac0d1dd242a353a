//! Wire protocol: the OSC topic table and datagram decoding.
//!
//! Sensor bridges publish one OSC message per reading over UDP. Topics are
//! `<sensor>/<suffix>` for sensor data and `<marker>/<n>` for session
//! markers; both prefixes come from [`ListenerConfig`](crate::config::ListenerConfig).

pub mod packet;
pub mod topics;

pub use packet::{Inbound, Packet, decode_datagram};
pub use topics::{Route, Suffixes, Topics};
