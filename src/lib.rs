//!
//! This library drives SCPI function generators connected through a
//! Prologix GPIB-Ethernet bridge.
//!
//! <br>
//!
//! # Details
//!
//! - Every parameter is checked against the hardware limits in
//!   [`limits`] before a command is sent. A rejected call sends nothing.
//!
//! - Basic setup and connection, the session is closed whatever the
//!   closure returns
//!
//!   ```no_run
//!   use afgctrl::session::ConnectionConfig;
//!   #[tokio::main]
//!   async fn main() -> afgctrl::Result<()> {
//!       ConnectionConfig::default()
//!           .with_generator(|fg| {
//!               Box::pin(async move {
//!                   eprintln!("Connected to: {}\n", fg.ident().await?.model);
//!                   fg.startup().await?;
//!                   Ok(())
//!               })
//!           })
//!           .await
//!   }
//!   ```
//!
//! - Manual close, the operation's error wins over a failed close
//!
//!   ```no_run
//!   use afgctrl::{session::ConnectionConfig, FunctionGenerator};
//!   # async fn run() -> afgctrl::Result<()> {
//!   let mut fg = FunctionGenerator::connect(&ConnectionConfig::default()).await?;
//!   let result = fg.set_burst(2).await;
//!   result.and(fg.close().await)
//!   # }
//!   ```
//!
//! # Supported devices
//!
//!  * Tektronix AFG3101C
//!  * Tektronix AFG3000 series, channel 1
//!

pub mod bridge;
pub mod device;
pub mod limits;
pub mod proto;
pub mod session;
pub mod startup;

pub use device::{FunctionGenerator, WaveformSpec};
pub use proto::Result;

use std::time::Duration;

/// Whether the Prologix bridge is compiled in.
pub const PROLOGIX_AVAILABLE: bool = cfg!(feature = "prologix");

/// Default address of the GPIB bridge.
pub const DEFAULT_ADDRESS: &str = "10.25.124.252";

/// Prologix GPIB-Ethernet listens on this TCP port.
pub const DEFAULT_PORT: u16 = 1234;

/// Default GPIB address of the function generator.
pub const DEFAULT_GPIB_ADDRESS: u8 = 10;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
