//! Hardware limits of the function generator.
//!
//! All bounds live in one [`LimitTable`], built once on first use and shared
//! read-only afterwards. Amplitude bounds are configured for `VPP` only, the
//! `VRMS` and `DBM` bounds are derived from them.

use std::fmt::{self, Display, Write};

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::proto::command::{Shape, VoltageUnit};

/// Frequency range in Hz.
pub const FREQ_LIMIT: Interval = Interval::new(1e-6, 150e6);
/// Duty cycle range in percent.
pub const DUTY_LIMIT: Interval = Interval::new(0.1, 99.9);
/// Output load impedance range in Ohm.
pub const IMP_LIMIT: Interval = Interval::new(1.0, 10_000.0);
/// Peak to peak amplitude range in Volt.
pub const VPP_LIMIT: Interval = Interval::new(0.02, 10.0);

/// Shared limit table.
pub static LIMITS: Lazy<LimitTable> = Lazy::new(LimitTable::new);

/// Closed interval `[min, max]`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self::new(f(self.min), f(self.max))
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// RMS bounds of a sine with the given peak to peak bounds, 3 decimals.
pub fn derive_vrms(vpp: Interval) -> Interval {
    vpp.map(|x| round_to(x / (2.0 * 2f64.sqrt()), 3))
}

/// dBm bounds into 50 Ohm for the given peak to peak bounds, 2 decimals.
pub fn derive_dbm(vpp: Interval) -> Interval {
    vpp.map(|x| round_to(20.0 * (x / (2.0 * 0.1f64.sqrt())).log10(), 2))
}

/// Quantities checked by the [`LimitTable`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Quantity {
    Frequency,
    DutyCycle,
    Amplitude,
    Impedance,
    Unit,
    Shape,
}

impl Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Frequency => "frequency",
            Self::DutyCycle => "duty cycle",
            Self::Amplitude => "amplitude",
            Self::Impedance => "impedance",
            Self::Unit => "voltage unit",
            Self::Shape => "shape",
        })
    }
}

/// What a rejected value would have had to be.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Allowed {
    Range(Interval),
    Set(Vec<&'static str>),
}

impl Display for Allowed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Allowed::Range(range) => write!(f, "allowed range is {}", range),
            Allowed::Set(set) => write!(f, "allowed values are {}", set.join(", ")),
        }
    }
}

/// A parameter was rejected before anything was sent to the instrument.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid {quantity} {value:?}, {allowed}")]
pub struct ValidationError {
    pub quantity: Quantity,
    pub value: String,
    pub allowed: Allowed,
}

#[derive(Debug, Clone, Serialize)]
pub struct LimitTable {
    pub frequency: Interval,
    pub duty_cycle: Interval,
    pub impedance: Interval,
    pub vpp: Interval,
    pub vrms: Interval,
    pub dbm: Interval,
}

impl LimitTable {
    pub fn new() -> Self {
        Self {
            frequency: FREQ_LIMIT,
            duty_cycle: DUTY_LIMIT,
            impedance: IMP_LIMIT,
            vpp: VPP_LIMIT,
            vrms: derive_vrms(VPP_LIMIT),
            dbm: derive_dbm(VPP_LIMIT),
        }
    }

    pub fn amplitude(&self, unit: VoltageUnit) -> Interval {
        match unit {
            VoltageUnit::Vpp => self.vpp,
            VoltageUnit::Vrms => self.vrms,
            VoltageUnit::Dbm => self.dbm,
        }
    }

    /// Check a numeric value against its bounds and hand it back unchanged.
    ///
    /// `unit` selects the amplitude interval and defaults to `VPP`, it is
    /// ignored for every other quantity. `Unit` and `Shape` are categorical
    /// and always fail here with their allowed set, use [`LimitTable::unit`]
    /// and [`LimitTable::shape`] for those.
    pub fn validate(
        &self,
        quantity: Quantity,
        value: f64,
        unit: Option<VoltageUnit>,
    ) -> Result<f64, ValidationError> {
        let range = match quantity {
            Quantity::Frequency => self.frequency,
            Quantity::DutyCycle => self.duty_cycle,
            Quantity::Impedance => self.impedance,
            Quantity::Amplitude => self.amplitude(unit.unwrap_or(VoltageUnit::Vpp)),
            Quantity::Unit => {
                return Err(ValidationError {
                    quantity,
                    value: value.to_string(),
                    allowed: units_allowed(),
                })
            }
            Quantity::Shape => {
                return Err(ValidationError {
                    quantity,
                    value: value.to_string(),
                    allowed: shapes_allowed(),
                })
            }
        };
        // NaN fails `contains` and is rejected like any other stray value.
        if range.contains(value) {
            Ok(value)
        } else {
            Err(ValidationError {
                quantity,
                value: value.to_string(),
                allowed: Allowed::Range(range),
            })
        }
    }

    pub fn frequency(&self, hz: f64) -> Result<f64, ValidationError> {
        self.validate(Quantity::Frequency, hz, None)
    }

    pub fn unit(&self, name: &str) -> Result<VoltageUnit, ValidationError> {
        VoltageUnit::from_name(name).ok_or_else(|| ValidationError {
            quantity: Quantity::Unit,
            value: name.to_string(),
            allowed: units_allowed(),
        })
    }

    pub fn shape(&self, name: &str) -> Result<Shape, ValidationError> {
        Shape::from_name(name).ok_or_else(|| ValidationError {
            quantity: Quantity::Shape,
            value: name.to_string(),
            allowed: shapes_allowed(),
        })
    }
}

impl Default for LimitTable {
    fn default() -> Self {
        Self::new()
    }
}

fn units_allowed() -> Allowed {
    Allowed::Set(VoltageUnit::ALL.iter().map(VoltageUnit::as_str).collect())
}

fn shapes_allowed() -> Allowed {
    Allowed::Set(Shape::ALL.iter().map(Shape::name).collect())
}

/// Render the shape table as help text.
pub fn shape_table_doc() -> String {
    let mut doc = String::from("Available shapes:\n");
    for shape in Shape::ALL {
        // Writing into a String cannot fail.
        let _ = writeln!(doc, "  {:<18} {}", shape.name(), shape.code());
    }
    doc
}

/// Render every limit as help text.
pub fn limit_table_doc(table: &LimitTable) -> String {
    let mut doc = String::new();
    let _ = writeln!(doc, "frequency    {} Hz", table.frequency);
    let _ = writeln!(doc, "duty cycle   {} %", table.duty_cycle);
    let _ = writeln!(doc, "impedance    {} Ohm", table.impedance);
    for unit in VoltageUnit::ALL {
        let _ = writeln!(doc, "amplitude    {} {}", table.amplitude(unit), unit);
    }
    doc
}
