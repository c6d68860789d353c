//! Session lifecycle on top of a [`Bridge`].
//!
//! An [`InstrumentSession`] is opened connected and addressed, tracks whether
//! the link is still usable and releases the transport exactly once.

use std::{fmt::Display, io, time::Duration};

use log::{debug, info, warn};
use serde::Deserialize;

use crate::bridge::Bridge;
use crate::proto::command::Command;
use crate::proto::{ProtoError, Result};
use crate::{DEFAULT_ADDRESS, DEFAULT_GPIB_ADDRESS, DEFAULT_PORT, DEFAULT_TIMEOUT};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    /// The transport failed, the session only accepts `close` now.
    Faulted,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Disconnected => f.write_str("disconnected"),
            SessionState::Connected => f.write_str("connected"),
            SessionState::Faulted => f.write_str("faulted"),
        }
    }
}

/// Where to find the instrument.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Host name or IP of the GPIB bridge
    pub address: String,
    /// TCP port of the GPIB bridge
    pub port: u16,
    /// GPIB address of the instrument on the bridge
    pub gpib_address: u8,
    /// Bound for connecting and for every reply
    pub timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            gpib_address: DEFAULT_GPIB_ADDRESS,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[cfg(feature = "prologix")]
impl ConnectionConfig {
    /// Open a session through a Prologix bridge.
    pub async fn connect(&self) -> Result<InstrumentSession<crate::bridge::PrologixBridge>> {
        let bridge = crate::bridge::PrologixBridge::new(&self.address, self.port, self.timeout);
        InstrumentSession::open(bridge, &self.address, self.gpib_address).await
    }
}

pub struct InstrumentSession<B: Bridge> {
    bridge: B,
    address: String,
    gpib_address: u8,
    state: SessionState,
    released: bool,
}

impl<B: Bridge> InstrumentSession<B> {
    /// Connect the bridge and address the instrument.
    ///
    /// An unreachable bridge fails with [`ProtoError::Connection`], a
    /// missing instrument with [`ProtoError::Address`]. The bridge is
    /// released before either error is returned.
    pub async fn open(mut bridge: B, address: &str, gpib_address: u8) -> Result<Self> {
        if let Err(source) = bridge.connect().await {
            release_after_failure(&mut bridge).await;
            return Err(ProtoError::Connection {
                address: address.to_string(),
                source,
            });
        }
        if let Err(source) = bridge.select(gpib_address).await {
            release_after_failure(&mut bridge).await;
            return Err(ProtoError::Address {
                gpib_address,
                source,
            });
        }
        info!("Connected to GPIB address {} via {}", gpib_address, address);
        Ok(Self {
            bridge,
            address: address.to_string(),
            gpib_address,
            state: SessionState::Connected,
            released: false,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn gpib_address(&self) -> u8 {
        self.gpib_address
    }

    fn ensure_connected(&self) -> Result<()> {
        match self.state {
            SessionState::Connected => Ok(()),
            state => Err(ProtoError::NotConnected(state)),
        }
    }

    fn fault(&mut self, err: io::Error) -> ProtoError {
        warn!("Transport failure, session faulted: {}", err);
        self.state = SessionState::Faulted;
        ProtoError::Io(err)
    }

    /// Send a command which has no reply.
    pub async fn write(&mut self, command: &Command) -> Result<()> {
        self.ensure_connected()?;
        let line = command.to_string();
        debug!("write {}", line);
        let result = self.bridge.write(&line).await;
        result.map_err(|err| self.fault(err))
    }

    /// Send a query and wait for its reply.
    pub async fn query(&mut self, command: &Command) -> Result<String> {
        self.ensure_connected()?;
        let line = command.to_string();
        debug!("query {}", line);
        let result = self.bridge.query(&line).await;
        let reply = result.map_err(|err| self.fault(err))?;
        debug!("reply {:?}", reply);
        Ok(reply)
    }

    /// Whether [`InstrumentSession::close`] has released the transport.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Release the transport.
    ///
    /// Safe to call on a closed or faulted session, the transport is only
    /// released the first time.
    pub async fn close(&mut self) -> Result<()> {
        self.state = SessionState::Disconnected;
        if self.released {
            return Ok(());
        }
        self.released = true;
        info!("Closing GPIB address {} via {}", self.gpib_address, self.address);
        self.bridge.close().await.map_err(ProtoError::Io)
    }
}

impl<B: Bridge> Drop for InstrumentSession<B> {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                "Session for GPIB address {} via {} dropped without close",
                self.gpib_address, self.address
            );
        }
    }
}

async fn release_after_failure<B: Bridge>(bridge: &mut B) {
    if let Err(err) = bridge.close().await {
        debug!("Releasing bridge after failed open: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::fake::RecordingBridge;

    #[tokio::test]
    async fn test_open() {
        let bridge = RecordingBridge::new();
        let session = InstrumentSession::open(bridge.clone(), "10.0.0.1", 10)
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.address(), "10.0.0.1");
        assert_eq!(session.gpib_address(), 10);
        assert_eq!(bridge.selected(), Some(10));
    }

    #[tokio::test]
    async fn test_open_unreachable() {
        let bridge = RecordingBridge::new().failing_connect();
        let result = InstrumentSession::open(bridge.clone(), "10.0.0.1", 10).await;
        assert!(matches!(result, Err(ProtoError::Connection { .. })));
        assert_eq!(bridge.closes(), 1);
    }

    #[tokio::test]
    async fn test_open_absent_device() {
        let bridge = RecordingBridge::new().failing_select();
        let result = InstrumentSession::open(bridge.clone(), "10.0.0.1", 10).await;
        assert!(matches!(
            result,
            Err(ProtoError::Address {
                gpib_address: 10,
                ..
            })
        ));
        assert_eq!(bridge.closes(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_faults_session() {
        let bridge = RecordingBridge::new().failing_on("*RST");
        let mut session = InstrumentSession::open(bridge.clone(), "10.0.0.1", 10)
            .await
            .unwrap();
        assert!(matches!(
            session.write(&Command::Reset).await,
            Err(ProtoError::Io(_))
        ));
        assert_eq!(session.state(), SessionState::Faulted);
        assert!(matches!(
            session.write(&Command::Beep).await,
            Err(ProtoError::NotConnected(SessionState::Faulted))
        ));
        assert!(bridge.commands().is_empty());

        session.close().await.unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(bridge.closes(), 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let bridge = RecordingBridge::new();
        let mut session = InstrumentSession::open(bridge.clone(), "10.0.0.1", 10)
            .await
            .unwrap();
        assert!(!session.is_released());
        session.close().await.unwrap();
        assert!(session.is_released());
        session.close().await.unwrap();
        assert_eq!(bridge.closes(), 1);
        assert!(matches!(
            session.query(&Command::Identify).await,
            Err(ProtoError::NotConnected(SessionState::Disconnected))
        ));
    }

    #[cfg(feature = "prologix")]
    #[tokio::test]
    async fn test_connect_unreachable_bridge() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let config = ConnectionConfig {
            address: "127.0.0.1".to_string(),
            port,
            timeout: Duration::from_millis(200),
            ..Default::default()
        };
        assert!(matches!(
            config.connect().await,
            Err(ProtoError::Connection { .. })
        ));
    }

    #[cfg(feature = "prologix")]
    #[tokio::test]
    async fn test_connect_silent_device() {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // Bridge accepts and swallows everything, nothing answers the poll.
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 256];
            while let Ok(n) = socket.read(&mut buf).await {
                if n == 0 {
                    break;
                }
            }
        });
        let config = ConnectionConfig {
            address: "127.0.0.1".to_string(),
            port,
            gpib_address: 7,
            timeout: Duration::from_millis(200),
        };
        assert!(matches!(
            config.connect().await,
            Err(ProtoError::Address { gpib_address: 7, .. })
        ));
    }
}
