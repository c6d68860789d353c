//! Startup routine bringing the generator into a known output state.
//!
//! ```text
//! Disabled -> Probing -> Configured -> Enabled
//! ```
//!
//! The probe configures a sine and reads back the instrument error queue. A
//! complaint from the instrument at that point, or an error queue reply that
//! cannot be parsed, is logged and ignored. Transport failures abort the
//! routine.

use std::fmt::Display;
use std::time::Duration;

use log::{info, warn};

use crate::bridge::Bridge;
use crate::device::{FunctionGenerator, WaveformSpec};
use crate::proto::{ProtoError, Result};

/// Time the analog stages need after the probe.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StartupState {
    Disabled,
    Probing,
    Configured,
    Enabled,
}

impl Display for StartupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartupState::Disabled => f.write_str("disabled"),
            StartupState::Probing => f.write_str("probing"),
            StartupState::Configured => f.write_str("configured"),
            StartupState::Enabled => f.write_str("enabled"),
        }
    }
}

pub struct StartupSequence {
    settle: Duration,
    state: Option<StartupState>,
}

impl Default for StartupSequence {
    fn default() -> Self {
        Self::new(SETTLE_DELAY)
    }
}

impl StartupSequence {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            state: None,
        }
    }

    /// Last state reached, `None` before [`StartupSequence::run`].
    pub fn state(&self) -> Option<StartupState> {
        self.state
    }

    /// Waveform used to probe the instrument.
    pub fn probe_waveform() -> WaveformSpec {
        WaveformSpec::new("sinusoidal", 1e6, "VPP", 1.0, 0.0)
    }

    /// Waveform left on the output: 3 Vpp square at 1 kHz.
    pub fn default_waveform() -> WaveformSpec {
        WaveformSpec::new("square", 1e3, "VPP", 3.0, 0.0)
    }

    fn enter(&mut self, state: StartupState) {
        info!("Startup: {}", state);
        self.state = Some(state);
    }

    async fn probe<B: Bridge>(&self, fg: &mut FunctionGenerator<B>) -> Result<()> {
        fg.configure_waveform(&Self::probe_waveform()).await?;
        tokio::time::sleep(self.settle).await;
        match fg.next_error().await {
            Ok(Some(err)) => Err(ProtoError::Warning(err)),
            Ok(None) => Ok(()),
            Err(ProtoError::Unexpected(reply)) => {
                warn!("Unreadable error queue reply, continuing: {}", reply);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn run<B: Bridge>(&mut self, fg: &mut FunctionGenerator<B>) -> Result<StartupState> {
        self.enter(StartupState::Disabled);
        fg.disable().await?;

        self.enter(StartupState::Probing);
        match self.probe(fg).await {
            Ok(()) => {}
            Err(ProtoError::Warning(err)) => {
                warn!("Instrument complained during probe, continuing: {}", err);
            }
            Err(err) => return Err(err),
        }

        self.enter(StartupState::Configured);
        fg.configure_waveform(&Self::default_waveform()).await?;

        self.enter(StartupState::Enabled);
        fg.enable().await?;
        Ok(StartupState::Enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::fake::RecordingBridge;
    use crate::session::InstrumentSession;

    const SYST_ERR: &str = "SYSTem:ERRor?";

    async fn generator(bridge: &RecordingBridge) -> FunctionGenerator<RecordingBridge> {
        let session = InstrumentSession::open(bridge.clone(), "10.25.124.252", 10)
            .await
            .unwrap();
        FunctionGenerator::new(session)
    }

    fn expected_commands() -> Vec<&'static str> {
        vec![
            "output1:state off",
            "source1:function:shape SIN",
            "source1:frequency 1000000",
            "source1:voltage:unit VPP",
            "source1:voltage:amplitude 1VPP",
            "source1:voltage:offset 0",
            SYST_ERR,
            "source1:function:shape SQU",
            "source1:frequency 1000",
            "source1:voltage:unit VPP",
            "source1:voltage:amplitude 3VPP",
            "source1:voltage:offset 0",
            "output1:state on",
        ]
    }

    #[tokio::test]
    async fn test_startup_clean_error_queue() {
        let bridge = RecordingBridge::new().reply(SYST_ERR, "0,\"No error\"");
        let mut fg = generator(&bridge).await;
        let mut startup = StartupSequence::new(Duration::ZERO);
        assert_eq!(startup.state(), None);
        assert_eq!(startup.run(&mut fg).await.unwrap(), StartupState::Enabled);
        assert_eq!(startup.state(), Some(StartupState::Enabled));
        assert_eq!(bridge.commands(), expected_commands());
    }

    #[tokio::test]
    async fn test_startup_swallows_instrument_warning() {
        let bridge = RecordingBridge::new().reply(SYST_ERR, "-222,\"Data out of range\"");
        let mut fg = generator(&bridge).await;
        let mut startup = StartupSequence::new(Duration::ZERO);
        assert_eq!(startup.run(&mut fg).await.unwrap(), StartupState::Enabled);
        assert_eq!(bridge.commands(), expected_commands());
    }

    #[tokio::test]
    async fn test_startup_tolerates_malformed_error_reply() {
        let bridge = RecordingBridge::new().reply(SYST_ERR, "0");
        let mut fg = generator(&bridge).await;
        let mut startup = StartupSequence::new(Duration::ZERO);
        assert_eq!(startup.run(&mut fg).await.unwrap(), StartupState::Enabled);
        assert_eq!(startup.state(), Some(StartupState::Enabled));
        assert_eq!(bridge.commands(), expected_commands());
    }

    #[tokio::test]
    async fn test_startup_stops_on_transport_error() {
        let bridge = RecordingBridge::new().failing_on("source1:function:shape SIN");
        let mut fg = generator(&bridge).await;
        let mut startup = StartupSequence::new(Duration::ZERO);
        assert!(matches!(startup.run(&mut fg).await, Err(ProtoError::Io(_))));
        assert_eq!(startup.state(), Some(StartupState::Probing));
        assert_eq!(bridge.commands(), vec!["output1:state off"]);
    }

    #[tokio::test]
    async fn test_startup_waits_for_settling() {
        let bridge = RecordingBridge::new().reply(SYST_ERR, "0,\"No error\"");
        let mut fg = generator(&bridge).await;
        let settle = Duration::from_millis(50);
        let started = std::time::Instant::now();
        StartupSequence::new(settle).run(&mut fg).await.unwrap();
        assert!(started.elapsed() >= settle);
    }
}
