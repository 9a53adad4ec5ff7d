//! "Log changed" notifications
//!
//! After every save the writer sends a small datagram carrying a running
//! counter. Report generators that want live refresh listen for it; nobody
//! listening is fine.

use crate::types::Result;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

/// Default address notifications are sent to
pub const DEFAULT_NOTIFY_ADDRESS: &str = "127.0.0.1:8008";

/// Receives a signal every time the log file has been rewritten
pub trait ChangeNotifier: Send {
    fn log_changed(&mut self);
}

/// Notifier that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl ChangeNotifier for NullNotifier {
    fn log_changed(&mut self) {}
}

/// Sends the change counter as a UDP datagram
#[derive(Debug)]
pub struct UdpNotifier {
    socket: UdpSocket,
    target: SocketAddr,
    count: u64,
}

impl UdpNotifier {
    pub fn new(target: impl ToSocketAddrs) -> Result<Self> {
        let target = target.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "No address to notify")
        })?;
        let bind: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind)?;

        Ok(Self {
            socket,
            target,
            count: 0,
        })
    }

    /// Number of notifications sent so far
    pub fn sent(&self) -> u64 {
        self.count
    }
}

impl ChangeNotifier for UdpNotifier {
    fn log_changed(&mut self) {
        let message = self.count.to_string();
        if let Err(e) = self.socket.send_to(message.as_bytes(), self.target) {
            log::debug!("Change notification to {} failed: {}", self.target, e);
        }
        self.count += 1;
    }
}

/// Waits for change notifications
#[derive(Debug)]
pub struct ChangeListener {
    socket: UdpSocket,
}

impl ChangeListener {
    pub fn bind(address: impl ToSocketAddrs) -> Result<Self> {
        Ok(Self {
            socket: UdpSocket::bind(address)?,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Block until a notification arrives or `timeout` passes
    ///
    /// Returns the counter carried by the notification, or `None` on timeout.
    /// `None` as timeout waits forever.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<Option<u64>> {
        let timeout = timeout.map(|t| t.max(Duration::from_millis(1)));
        self.socket.set_read_timeout(timeout)?;

        let mut buf = [0u8; 64];
        match self.socket.recv_from(&mut buf) {
            Ok((len, from)) => {
                let text = String::from_utf8_lossy(&buf[..len]);
                log::trace!("Change notification '{}' from {}", text, from);
                Ok(Some(text.trim().parse().unwrap_or_default()))
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
