use std::fmt::Display;

use serde::Serialize;

/// Waveform shapes understood by the function generator.
///
/// The human readable name is what operators type, the code is what goes
/// over the wire in `source1:function:shape`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Sinusoidal,
    Square,
    Pulse,
    Ramp,
    Noise,
    Sinc,
    Gaussian,
    Lorentz,
    ExponentialRise,
    ExponentialDecay,
    Haversine,
    User,
}

impl Shape {
    /// Every shape, in table order.
    pub const ALL: [Shape; 12] = [
        Self::Sinusoidal,
        Self::Square,
        Self::Pulse,
        Self::Ramp,
        Self::Noise,
        Self::Sinc,
        Self::Gaussian,
        Self::Lorentz,
        Self::ExponentialRise,
        Self::ExponentialDecay,
        Self::Haversine,
        Self::User,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sinusoidal => "sinusoidal",
            Self::Square => "square",
            Self::Pulse => "pulse",
            Self::Ramp => "ramp",
            Self::Noise => "noise",
            Self::Sinc => "sinc",
            Self::Gaussian => "gaussian",
            Self::Lorentz => "lorentz",
            Self::ExponentialRise => "exponential_rise",
            Self::ExponentialDecay => "exponential_decay",
            Self::Haversine => "haversine",
            Self::User => "user",
        }
    }

    /// Instrument code sent with `source1:function:shape`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sinusoidal => "SIN",
            Self::Square => "SQU",
            Self::Pulse => "PULS",
            Self::Ramp => "RAMP",
            Self::Noise => "PRN",
            Self::Sinc => "SINC",
            Self::Gaussian => "GAUS",
            Self::Lorentz => "LOR",
            Self::ExponentialRise => "ERIS",
            Self::ExponentialDecay => "EDEC",
            Self::Haversine => "HAV",
            Self::User => "USER",
        }
    }

    /// Exact lookup by human readable name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|shape| shape.name() == name)
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Amplitude representation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum VoltageUnit {
    /// Peak to peak voltage
    Vpp,
    /// Root mean square voltage
    Vrms,
    /// Power in decibel-milliwatts
    Dbm,
}

impl VoltageUnit {
    pub const ALL: [VoltageUnit; 3] = [Self::Vpp, Self::Vrms, Self::Dbm];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vpp => "VPP",
            Self::Vrms => "VRMS",
            Self::Dbm => "DBM",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|unit| unit.as_str() == name)
    }
}

impl Display for VoltageUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    On,
    Off,
}

impl From<bool> for State {
    fn from(value: bool) -> Self {
        if value {
            Self::On
        } else {
            Self::Off
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::On => f.write_str("on"),
            State::Off => f.write_str("off"),
        }
    }
}

impl clap::ValueEnum for State {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::On, Self::Off]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::On => clap::builder::PossibleValue::new("on"),
            Self::Off => clap::builder::PossibleValue::new("off"),
        })
    }
}

/// SCPI commands sent to the function generator.
///
/// The `Display` implementation renders the exact wire string, without
/// line termination.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Identify,
    Reset,
    OperationCondition,
    SystemError,
    Beep,
    Frequency(f64),
    Shape(Shape),
    BurstState(State),
    BurstCycles(u32),
    Output(State),
    VoltageUnit(VoltageUnit),
    Amplitude(f64, VoltageUnit),
    Offset(f64),
    Impedance(f64),
    DutyCycle(f64),
}

impl Command {
    /// Commands which make the instrument answer with a reply line.
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Self::Identify | Self::OperationCondition | Self::SystemError
        )
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identify => f.write_str("*IDN?"),
            Self::Reset => f.write_str("*RST"),
            Self::OperationCondition => f.write_str("STATus:OPERation:CONDition?"),
            Self::SystemError => f.write_str("SYSTem:ERRor?"),
            Self::Beep => f.write_str("system:beep"),
            Self::Frequency(hz) => write!(f, "source1:frequency {}", hz),
            Self::Shape(shape) => write!(f, "source1:function:shape {}", shape.code()),
            // Burst state is the one command the instrument manual spells in caps.
            Self::BurstState(State::On) => f.write_str("source1:BURSt:STATe ON"),
            Self::BurstState(State::Off) => f.write_str("source1:BURSt:STATe OFF"),
            Self::BurstCycles(count) => write!(f, "source1:BURSt:NCYCles {}", count),
            Self::Output(state) => write!(f, "output1:state {}", state),
            Self::VoltageUnit(unit) => write!(f, "source1:voltage:unit {}", unit),
            Self::Amplitude(value, unit) => {
                write!(f, "source1:voltage:amplitude {}{}", value, unit)
            }
            Self::Offset(value) => write!(f, "source1:voltage:offset {}", value),
            Self::Impedance(ohms) => write!(f, "output1:impedance {}", ohms),
            Self::DutyCycle(percent) => write!(f, "source1:pulse:dcycle {}", percent),
        }
    }
}

/// Commands interpreted by the Prologix controller itself.
///
/// These never reach the instrument.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ControllerCommand {
    /// Controller mode (1) or device mode (0)
    Mode(u8),
    /// Automatic read-after-write
    Auto(bool),
    /// Assert EOI with the last byte
    Eoi(bool),
    /// Read timeout in milliseconds, 1 - 3000
    ReadTimeout(u16),
    /// Address the instrument at this GPIB address
    Addr(u8),
    /// Serial poll the addressed instrument
    SerialPoll,
    /// Read until EOI is asserted
    ReadEoi,
}

impl Display for ControllerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mode(mode) => write!(f, "++mode {}", mode),
            Self::Auto(auto) => write!(f, "++auto {}", u8::from(*auto)),
            Self::Eoi(eoi) => write!(f, "++eoi {}", u8::from(*eoi)),
            Self::ReadTimeout(ms) => write!(f, "++read_tmo_ms {}", ms),
            Self::Addr(addr) => write!(f, "++addr {}", addr),
            Self::SerialPoll => f.write_str("++spoll"),
            Self::ReadEoi => f.write_str("++read eoi"),
        }
    }
}
