//! Best-effort wake channel to the prober process.

use std::io;
use std::net::{SocketAddr, UdpSocket};

use tracing::debug;

/// Fire-and-forget notification that wakes a sleeping prober.
///
/// Delivery is not guaranteed and duplicates are harmless: the prober's
/// own periodic timer self-corrects, and the wait loop keys on the shared
/// counters, never on the signal itself.
pub trait WakeSender: Send + Sync {
    fn wake(&self);
}

/// Sends a single loopback UDP datagram to the prober's wake port.
pub struct UdpWakeSender {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpWakeSender {
    pub fn new(wake_port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind(("127.0.0.1", 0))?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            target: SocketAddr::from(([127, 0, 0, 1], wake_port)),
        })
    }
}

impl WakeSender for UdpWakeSender {
    fn wake(&self) {
        // Failure to send is the same as a dropped datagram.
        if let Err(e) = self.socket.send_to(&[1u8], self.target) {
            debug!(error = %e, target = %self.target, "wake datagram not sent");
        }
    }
}

/// Wake sender that does nothing. For tests and for deployments where
/// the prober runs on its timer alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWake;

impl WakeSender for NoopWake {
    fn wake(&self) {}
}
