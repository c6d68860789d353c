use futures::future::BoxFuture;
use log::{debug, warn};

use crate::bridge::Bridge;
use crate::limits::{LimitTable, Quantity, LIMITS};
use crate::proto::command::{Command, Shape, State, VoltageUnit};
use crate::proto::response::{Ident, InstrumentError, OperationStatus};
use crate::proto::Result;
use crate::session::{InstrumentSession, SessionState};
use crate::startup::{StartupSequence, StartupState};

/// Waveform requested by the operator, validated as a whole before use.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformSpec {
    pub shape: String,
    pub frequency: f64,
    pub unit: String,
    pub amplitude: f64,
    pub offset: f64,
    pub impedance: Option<f64>,
    pub duty_cycle: Option<f64>,
}

impl WaveformSpec {
    pub fn new(
        shape: impl Into<String>,
        frequency: f64,
        unit: impl Into<String>,
        amplitude: f64,
        offset: f64,
    ) -> Self {
        Self {
            shape: shape.into(),
            frequency,
            unit: unit.into(),
            amplitude,
            offset,
            impedance: None,
            duty_cycle: None,
        }
    }

    pub fn with_impedance(mut self, ohms: f64) -> Self {
        self.impedance = Some(ohms);
        self
    }

    pub fn with_duty_cycle(mut self, percent: f64) -> Self {
        self.duty_cycle = Some(percent);
        self
    }

    /// Check every parameter, in order, and render the command sequence.
    ///
    /// Shape, frequency, unit and amplitude are checked in that order and
    /// the first failure is returned.
    pub fn commands(&self, limits: &LimitTable) -> Result<Vec<Command>> {
        let shape = limits.shape(&self.shape)?;
        let frequency = limits.frequency(self.frequency)?;
        let unit = limits.unit(&self.unit)?;
        let amplitude = limits.validate(Quantity::Amplitude, self.amplitude, Some(unit))?;
        let impedance = self
            .impedance
            .map(|ohms| limits.validate(Quantity::Impedance, ohms, None))
            .transpose()?;
        let duty_cycle = self
            .duty_cycle
            .map(|percent| limits.validate(Quantity::DutyCycle, percent, None))
            .transpose()?;

        let mut commands = vec![
            Command::Shape(shape),
            Command::Frequency(frequency),
            Command::VoltageUnit(unit),
            Command::Amplitude(amplitude, unit),
            Command::Offset(self.offset),
        ];
        commands.extend(impedance.map(Command::Impedance));
        commands.extend(duty_cycle.map(Command::DutyCycle));
        Ok(commands)
    }
}

/// Function generator on channel 1 of the addressed instrument.
///
/// Every parameter is checked against the [`LimitTable`] before the first
/// command leaves, a rejected call sends nothing.
pub struct FunctionGenerator<B: Bridge> {
    session: InstrumentSession<B>,
    limits: &'static LimitTable,
}

#[cfg(feature = "prologix")]
impl FunctionGenerator<crate::bridge::PrologixBridge> {
    /// Connect through a Prologix bridge.
    pub async fn connect(config: &crate::session::ConnectionConfig) -> Result<Self> {
        Ok(Self::new(config.connect().await?))
    }
}

#[cfg(feature = "prologix")]
impl crate::session::ConnectionConfig {
    /// Connect, run `f` and close the session again, whatever `f` returned.
    pub async fn with_generator<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'a> FnOnce(
            &'a mut FunctionGenerator<crate::bridge::PrologixBridge>,
        ) -> BoxFuture<'a, Result<T>>,
    {
        FunctionGenerator::connect(self).await?.scoped(f).await
    }
}

impl<B: Bridge> FunctionGenerator<B> {
    pub fn new(session: InstrumentSession<B>) -> Self {
        Self {
            session,
            limits: &LIMITS,
        }
    }

    pub fn session(&self) -> &InstrumentSession<B> {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn limits(&self) -> &LimitTable {
        self.limits
    }

    /// Run `f` against the generator, then close the session.
    ///
    /// The session is closed exactly once on every path. An error from `f`
    /// wins over an error from closing.
    pub async fn scoped<T, F>(mut self, f: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut Self) -> BoxFuture<'a, Result<T>>,
    {
        let result = f(&mut self).await;
        let closed = self.close().await;
        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                warn!("Close failed after error: {}", close_err);
                Err(err)
            }
        }
    }

    pub async fn close(&mut self) -> Result<()> {
        self.session.close().await
    }

    async fn send_all(&mut self, commands: &[Command]) -> Result<()> {
        for cmd in commands {
            self.session.write(cmd).await?;
        }
        Ok(())
    }

    /// Query device identification, the reply exactly as the instrument sent it
    pub async fn identification(&mut self) -> Result<String> {
        self.session.query(&Command::Identify).await
    }

    /// Query device identification
    pub async fn ident(&mut self) -> Result<Ident> {
        let reply = self.identification().await?;
        Ident::try_from(reply.as_str())
    }

    /// Factory reset.
    ///
    /// All previous configuration is void afterwards.
    pub async fn reset(&mut self) -> Result<()> {
        self.session.write(&Command::Reset).await
    }

    /// Query the operation condition register
    pub async fn status(&mut self) -> Result<OperationStatus> {
        let reply = self.session.query(&Command::OperationCondition).await?;
        OperationStatus::try_from(reply.as_str())
    }

    /// Pop the oldest entry of the instrument error queue
    pub async fn next_error(&mut self) -> Result<Option<InstrumentError>> {
        let reply = self.session.query(&Command::SystemError).await?;
        InstrumentError::parse(&reply)
    }

    /// Set frequency in Hz
    pub async fn set_frequency(&mut self, hz: f64) -> Result<()> {
        let hz = self.limits.frequency(hz)?;
        self.session.write(&Command::Frequency(hz)).await
    }

    /// Set waveform shape by name, see [`Shape`]
    pub async fn set_shape(&mut self, name: &str) -> Result<Shape> {
        let shape = self.limits.shape(name)?;
        self.session.write(&Command::Shape(shape)).await?;
        Ok(shape)
    }

    /// Emit `count` cycles per trigger.
    ///
    /// The instrument accepts 1 to 1,000,000 cycles, the count is passed
    /// through unchecked.
    pub async fn set_burst(&mut self, count: u32) -> Result<()> {
        self.send_all(&[
            Command::BurstState(State::On),
            Command::BurstCycles(count),
        ])
        .await
    }

    /// Back to continuous output
    pub async fn end_burst(&mut self) -> Result<()> {
        self.session.write(&Command::BurstState(State::Off)).await
    }

    pub async fn enable(&mut self) -> Result<()> {
        self.session.write(&Command::Output(State::On)).await
    }

    pub async fn disable(&mut self) -> Result<()> {
        self.session.write(&Command::Output(State::Off)).await
    }

    pub async fn set_voltage_unit(&mut self, name: &str) -> Result<VoltageUnit> {
        let unit = self.limits.unit(name)?;
        self.session.write(&Command::VoltageUnit(unit)).await?;
        Ok(unit)
    }

    /// Set amplitude in the given unit.
    ///
    /// The unit is sent first so the instrument interprets the value
    /// correctly.
    pub async fn set_amplitude(&mut self, value: f64, unit: &str) -> Result<()> {
        let unit = self.limits.unit(unit)?;
        let value = self
            .limits
            .validate(Quantity::Amplitude, value, Some(unit))?;
        self.send_all(&[Command::VoltageUnit(unit), Command::Amplitude(value, unit)])
            .await
    }

    /// Set DC offset in Volt
    pub async fn set_offset(&mut self, volts: f64) -> Result<()> {
        self.session.write(&Command::Offset(volts)).await
    }

    /// Set output load impedance in Ohm
    pub async fn set_impedance(&mut self, ohms: f64) -> Result<()> {
        let ohms = self.limits.validate(Quantity::Impedance, ohms, None)?;
        self.session.write(&Command::Impedance(ohms)).await
    }

    /// Set duty cycle in percent
    pub async fn set_duty_cycle(&mut self, percent: f64) -> Result<()> {
        let percent = self.limits.validate(Quantity::DutyCycle, percent, None)?;
        self.session.write(&Command::DutyCycle(percent)).await
    }

    pub async fn beep(&mut self) -> Result<()> {
        self.session.write(&Command::Beep).await
    }

    /// Configure a complete waveform.
    ///
    /// Nothing is sent unless every parameter is valid.
    pub async fn configure_waveform(&mut self, spec: &WaveformSpec) -> Result<()> {
        let commands = spec.commands(self.limits)?;
        debug!("Configuring {:?}", spec);
        self.send_all(&commands).await
    }

    /// Bring the output into the default state, see [`StartupSequence`].
    pub async fn startup(&mut self) -> Result<StartupState> {
        StartupSequence::default().run(self).await
    }
}
