//! Prober-side wake channel listener.

use std::io;
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::warn;

/// Listens for wake datagrams from requester processes.
///
/// The channel is best-effort and idempotent: datagram content is
/// ignored and a burst of wakes arriving while a cycle runs coalesces
/// into a single follow-up cycle.
pub struct UdpWakeListener {
    socket: UdpSocket,
}

impl UdpWakeListener {
    pub async fn bind(port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind(("127.0.0.1", port)).await?;
        Ok(Self { socket })
    }

    /// The bound port; useful when binding port 0.
    pub fn port(&self) -> io::Result<u16> {
        Ok(self.socket.local_addr()?.port())
    }

    /// Wait for at least one wake datagram, then drain any backlog.
    pub async fn recv_wake(&self) {
        let mut buf = [0u8; 8];
        if let Err(e) = self.socket.recv_from(&mut buf).await {
            warn!(error = %e, "wake listener receive failed");
            // Don't hot-loop the select arm on a persistent socket error.
            tokio::time::sleep(Duration::from_millis(100)).await;
            return;
        }
        while self.socket.try_recv_from(&mut buf).is_ok() {}
    }
}
