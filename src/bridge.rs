//! Transport towards the instrument.
//!
//! [`Bridge`] is the contract a GPIB network adapter has to fulfil. The
//! driver only ever talks to the instrument through it, one request at a
//! time. [`PrologixBridge`] implements it for the Prologix GPIB-Ethernet
//! adapter.

use std::io;

use async_trait::async_trait;

/// Network to GPIB adapter.
#[async_trait]
pub trait Bridge: Send {
    /// Establish the network session.
    async fn connect(&mut self) -> io::Result<()>;

    /// Bind subsequent operations to the instrument at `address`.
    ///
    /// Fails if no device answers at that address.
    async fn select(&mut self, address: u8) -> io::Result<()>;

    /// Send a command without expecting a reply.
    async fn write(&mut self, command: &str) -> io::Result<()>;

    /// Send a command and return the instrument's reply line.
    async fn query(&mut self, command: &str) -> io::Result<String>;

    /// Release the network session. Calling it twice is harmless.
    async fn close(&mut self) -> io::Result<()>;
}

#[cfg(feature = "prologix")]
pub use prologix::PrologixBridge;

#[cfg(feature = "prologix")]
mod prologix {
    use std::{io, time::Duration};

    use async_trait::async_trait;
    use futures::{SinkExt, StreamExt};
    use log::{debug, trace};
    use tokio::{
        io::{AsyncRead, AsyncWrite},
        net::TcpStream,
        time::timeout,
    };
    use tokio_util::codec::{Decoder, Framed};

    use super::Bridge;
    use crate::proto::codec::{Frame, PrologixCodec};
    use crate::proto::command::ControllerCommand;

    /// Highest primary address on a GPIB bus.
    const MAX_GPIB_ADDRESS: u8 = 30;
    /// Read timeout range accepted by `++read_tmo_ms`.
    const READ_TMO_MS: (u128, u128) = (1, 3000);

    trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

    impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

    pub struct PrologixBridge {
        address: String,
        port: u16,
        timeout: Duration,
        stream: Option<Framed<Box<dyn Transport>, PrologixCodec>>,
    }

    impl PrologixBridge {
        pub fn new(address: impl Into<String>, port: u16, timeout: Duration) -> Self {
            Self {
                address: address.into(),
                port,
                timeout,
                stream: None,
            }
        }

        #[cfg(test)]
        pub(crate) async fn new_faked(
            buffer: crate::proto::fake::FakeBuffer,
            timeout: Duration,
        ) -> io::Result<Self> {
            let mut bridge = Self::new("fake", 0, timeout);
            bridge.attach(Box::new(buffer)).await?;
            Ok(bridge)
        }

        pub fn address(&self) -> &str {
            &self.address
        }

        async fn attach(&mut self, transport: Box<dyn Transport>) -> io::Result<()> {
            self.stream = Some(PrologixCodec::default().framed(transport));
            let read_tmo = self
                .timeout
                .as_millis()
                .clamp(READ_TMO_MS.0, READ_TMO_MS.1) as u16;
            for cmd in [
                ControllerCommand::Mode(1),
                ControllerCommand::Auto(false),
                ControllerCommand::Eoi(true),
                ControllerCommand::ReadTimeout(read_tmo),
            ] {
                self.send(Frame::Controller(cmd)).await?;
            }
            Ok(())
        }

        async fn send(&mut self, frame: Frame) -> io::Result<()> {
            trace!("-> {:?}", frame);
            let stream = self.stream.as_mut().ok_or_else(not_connected)?;
            stream.send(frame).await
        }

        async fn read_line(&mut self) -> io::Result<String> {
            let limit = self.timeout;
            let stream = self.stream.as_mut().ok_or_else(not_connected)?;
            match timeout(limit, stream.next()).await {
                Ok(Some(line)) => {
                    trace!("<- {:?}", line);
                    line
                }
                Ok(None) => Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Bridge closed the connection",
                )),
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("No reply within {:?}", limit),
                )),
            }
        }
    }

    fn not_connected() -> io::Error {
        io::Error::new(io::ErrorKind::NotConnected, "Bridge is not connected")
    }

    #[async_trait]
    impl Bridge for PrologixBridge {
        async fn connect(&mut self) -> io::Result<()> {
            let target = format!("{}:{}", self.address, self.port);
            debug!("Connecting to {}", target);
            let stream = match timeout(self.timeout, TcpStream::connect(target.as_str())).await {
                Ok(stream) => stream?,
                Err(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("Connect to {} timed out", target),
                    ))
                }
            };
            stream.set_nodelay(true)?;
            self.attach(Box::new(stream)).await
        }

        async fn select(&mut self, address: u8) -> io::Result<()> {
            if address > MAX_GPIB_ADDRESS {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("GPIB address must be 0 - {}", MAX_GPIB_ADDRESS),
                ));
            }
            self.send(Frame::Controller(ControllerCommand::Addr(address)))
                .await?;
            // A present device answers the serial poll with its status byte.
            self.send(Frame::Controller(ControllerCommand::SerialPoll))
                .await?;
            let reply = self.read_line().await.map_err(|e| {
                io::Error::new(io::ErrorKind::NotFound, format!("Serial poll failed: {}", e))
            })?;
            reply.trim().parse::<u8>().map(|_| ()).map_err(|_| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("Invalid serial poll reply: {:?}", reply),
                )
            })
        }

        async fn write(&mut self, command: &str) -> io::Result<()> {
            self.send(Frame::Data(command.to_string())).await
        }

        async fn query(&mut self, command: &str) -> io::Result<String> {
            self.write(command).await?;
            self.send(Frame::Controller(ControllerCommand::ReadEoi))
                .await?;
            self.read_line().await
        }

        async fn close(&mut self) -> io::Result<()> {
            match self.stream.take() {
                Some(mut stream) => {
                    debug!("Closing connection to {}:{}", self.address, self.port);
                    stream.close().await
                }
                None => Ok(()),
            }
        }
    }

}
