//! # Sensor Listener
//!
//! Binds the UDP socket and runs the receive loop on a dedicated background
//! thread, so the UI thread never blocks on network I/O.
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │  oracle-listener thread (current-thread runtime)  │
//! │                                                   │
//! │  recv_from ─▶ decode_datagram ─┬─▶ handler.handle │
//! │      ▲                         └─▶ handler.reject │
//! │      └── every 100ms: check `running`             │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! The loop ends when the handler returns [`Flow::Stop`] (session stop
//! marker) or when [`ListenerHandle::stop`] clears the running flag. Either
//! way the socket is closed and cannot be reopened within the session.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::config::ListenerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::ingest::{Flow, PacketHandler};
use crate::protocol::{Topics, decode_datagram};

/// Interval at which the receive loop re-checks the running flag.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Largest UDP payload.
const MAX_DATAGRAM_SIZE: usize = 65_536;

const LISTENER_THREAD_NAME: &str = "oracle-listener";

/// A bound, not yet running, sensor socket.
#[derive(Debug)]
pub struct Listener {
    socket: std::net::UdpSocket,
    local_addr: SocketAddr,
    topics: Topics,
}

impl Listener {
    /// Bind the configured address.
    ///
    /// # Errors
    /// [`PipelineError::BindFailed`] if the address is invalid or in use.
    pub fn bind(config: &ListenerConfig) -> PipelineResult<Self> {
        let addr = config.bind_addr();
        let bind_failed = |e: std::io::Error| PipelineError::BindFailed {
            addr: addr.clone(),
            reason: e.to_string(),
        };
        let socket = std::net::UdpSocket::bind(addr.as_str()).map_err(bind_failed)?;
        socket.set_nonblocking(true).map_err(bind_failed)?;
        let local_addr = socket.local_addr().map_err(bind_failed)?;

        Ok(Self {
            socket,
            local_addr,
            topics: Topics::from_config(config),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start the receive loop on its own thread.
    pub fn spawn<H: PacketHandler>(self, handler: H) -> PipelineResult<ListenerHandle> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()?;
        let socket = {
            let _entered = runtime.enter();
            UdpSocket::from_std(self.socket)?
        };

        let running = Arc::new(AtomicBool::new(true));
        let thread = {
            let running = Arc::clone(&running);
            let topics = self.topics;
            std::thread::Builder::new()
                .name(LISTENER_THREAD_NAME.into())
                .spawn(move || {
                    runtime.block_on(receive_loop(socket, topics, handler, &running));
                    running.store(false, Ordering::SeqCst);
                    tracing::debug!("Listener thread exiting");
                })?
        };

        tracing::info!(addr = %self.local_addr, "Listening for sensor packets");
        Ok(ListenerHandle {
            local_addr: self.local_addr,
            running,
            thread: Some(thread),
        })
    }
}

/// Handle to the running listener thread.
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns whether the receive loop is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the receive loop and wait for the thread to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Listener thread panicked");
            }
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn receive_loop<H: PacketHandler>(
    socket: UdpSocket,
    topics: Topics,
    mut handler: H,
    running: &AtomicBool,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    'recv: while running.load(Ordering::SeqCst) {
        let received = tokio::select! {
            received = socket.recv_from(&mut buf) => received,
            () = tokio::time::sleep(STOP_POLL_INTERVAL) => continue,
        };

        let (len, peer) = match received {
            Ok(received) => received,
            Err(e) => {
                tracing::warn!(error = %e, "UDP receive failed");
                continue;
            }
        };

        match decode_datagram(&buf[..len], &topics) {
            Ok(messages) => {
                for inbound in messages {
                    if handler.handle(inbound) == Flow::Stop {
                        break 'recv;
                    }
                }
            }
            Err(error) => {
                tracing::trace!(%peer, "Undecodable datagram");
                handler.reject(&error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Inbound, Packet};
    use rosc::{OscMessage, OscPacket, OscType};
    use std::sync::mpsc;
    use std::time::Instant;

    /// Forwards everything to a channel; stops on the session stop marker.
    struct ForwardingHandler(mpsc::Sender<Inbound>);

    impl PacketHandler for ForwardingHandler {
        fn handle(&mut self, inbound: Inbound) -> Flow {
            let stop = inbound == Inbound::Packet(Packet::SessionStop);
            let _ = self.0.send(inbound);
            if stop { Flow::Stop } else { Flow::Continue }
        }
    }

    fn loopback_config() -> ListenerConfig {
        ListenerConfig {
            address: "127.0.0.1".into(),
            port: 0,
            ..ListenerConfig::default()
        }
    }

    fn send(target: SocketAddr, addr: &str, args: Vec<OscType>) {
        let packet = OscPacket::Message(OscMessage {
            addr: addr.into(),
            args,
        });
        let bytes = rosc::encoder::encode(&packet).unwrap();
        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.send_to(&bytes, target).unwrap();
    }

    fn wait_until_stopped(handle: &ListenerHandle) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if !handle.is_running() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_bind_ephemeral_port() {
        let listener = Listener::bind(&loopback_config()).unwrap();
        assert_ne!(listener.local_addr().port(), 0);
    }

    #[test]
    fn test_bind_conflict_is_bind_failed() {
        let first = Listener::bind(&loopback_config()).unwrap();
        let taken = ListenerConfig {
            port: first.local_addr().port(),
            ..loopback_config()
        };
        let err = Listener::bind(&taken).unwrap_err();
        assert!(matches!(err, PipelineError::BindFailed { .. }));
        assert!(err.is_fatal_at_startup());
    }

    #[test]
    fn test_bind_invalid_address() {
        let config = ListenerConfig {
            address: "not-an-address".into(),
            ..loopback_config()
        };
        assert!(matches!(
            Listener::bind(&config),
            Err(PipelineError::BindFailed { .. })
        ));
    }

    #[test]
    fn test_receives_and_stops_on_marker() {
        let (tx, rx) = mpsc::channel();
        let listener = Listener::bind(&loopback_config()).unwrap();
        let target = listener.local_addr();
        let handle = listener.spawn(ForwardingHandler(tx)).unwrap();
        assert!(handle.is_running());

        send(target, "/muse/elements/blink", vec![OscType::Int(1)]);
        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(first, Inbound::Packet(Packet::Blink));

        send(target, "/Marker/2", vec![]);
        let stop = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(stop, Inbound::Packet(Packet::SessionStop));
        assert!(wait_until_stopped(&handle));
    }

    #[test]
    fn test_stop_joins_thread() {
        let (tx, _rx) = mpsc::channel();
        let listener = Listener::bind(&loopback_config()).unwrap();
        let mut handle = listener.spawn(ForwardingHandler(tx)).unwrap();
        handle.stop();
        assert!(!handle.is_running());
    }
}
