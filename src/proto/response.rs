use std::fmt::Display;

use serde::Serialize;

use super::ProtoError;

/// Reply to `*IDN?`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ident {
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
}

impl TryFrom<&str> for Ident {
    type Error = ProtoError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let values: Vec<&str> = value.trim().splitn(4, ',').map(str::trim).collect();
        if values.len() == 4 {
            Ok(Self {
                manufacturer: String::from(values[0]),
                model: String::from(values[1]),
                serial: String::from(values[2]),
                firmware: String::from(values[3]),
            })
        } else {
            Err(ProtoError::Unexpected(format!(
                "Invalid data for IDN response: {}",
                value
            )))
        }
    }
}

impl Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.manufacturer, self.model, self.serial, self.firmware
        )
    }
}

/// Operation condition register.
///
/// The bit layout is instrument defined and left to the caller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct OperationStatus(pub u16);

impl OperationStatus {
    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn is_set(&self, bit: u8) -> bool {
        bit < 16 && self.0 & (1 << bit) != 0
    }
}

impl TryFrom<&str> for OperationStatus {
    type Error = ProtoError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value
            .trim()
            .trim_start_matches('+')
            .parse::<u16>()
            .map(Self)
            .map_err(|_| ProtoError::Unexpected(format!("Invalid status register: {}", value)))
    }
}

/// Entry of the instrument error queue, e.g. `-222,"Data out of range"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstrumentError {
    pub code: i32,
    pub message: String,
}

impl InstrumentError {
    /// Parse a `SYSTem:ERRor?` reply. An empty queue (code 0) yields `None`.
    pub fn parse(value: &str) -> Result<Option<Self>, ProtoError> {
        let (code, message) = value
            .trim()
            .split_once(',')
            .ok_or_else(|| ProtoError::Unexpected(format!("Invalid error entry: {}", value)))?;
        let code = code
            .trim()
            .parse::<i32>()
            .map_err(|_| ProtoError::Unexpected(format!("Invalid error code: {}", value)))?;
        if code == 0 {
            return Ok(None);
        }
        Ok(Some(Self {
            code,
            message: message.trim().trim_matches('"').to_string(),
        }))
    }
}

impl Display for InstrumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ident() {
        let id = Ident::try_from("TEKTRONIX,AFG3101C,C012345,SCPI:99.0 FV:3.1.1").unwrap();
        assert_eq!(id.manufacturer, "TEKTRONIX");
        assert_eq!(id.model, "AFG3101C");
        assert_eq!(id.serial, "C012345");
        assert_eq!(id.firmware, "SCPI:99.0 FV:3.1.1");
        assert_eq!(id.to_string(), "TEKTRONIX,AFG3101C,C012345,SCPI:99.0 FV:3.1.1");
        assert!(Ident::try_from("garbage").is_err());
    }

    #[test]
    fn test_status() {
        assert_eq!(OperationStatus::try_from("+0").unwrap(), OperationStatus(0));
        let status = OperationStatus::try_from("1032\n").unwrap();
        assert!(status.is_set(3));
        assert!(status.is_set(10));
        assert!(!status.is_set(0));
        assert!(!status.is_set(20));
        assert!(OperationStatus::try_from("busy").is_err());
    }

    #[test]
    fn test_error_queue() {
        assert_eq!(InstrumentError::parse("0,\"No error\"").unwrap(), None);
        assert_eq!(InstrumentError::parse("+0,\"No error\"").unwrap(), None);
        let err = InstrumentError::parse("-222,\"Data out of range\"")
            .unwrap()
            .unwrap();
        assert_eq!(err.code, -222);
        assert_eq!(err.message, "Data out of range");
        assert!(InstrumentError::parse("nonsense").is_err());
    }
}
