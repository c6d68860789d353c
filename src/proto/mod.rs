pub mod codec;
pub mod command;
pub mod response;

#[cfg(test)]
pub(crate) mod fake;

use std::io;

use thiserror::Error;

use crate::limits::ValidationError;
use crate::session::SessionState;
use response::InstrumentError;

pub type Result<T> = std::result::Result<T, ProtoError>;

#[derive(Error, Debug)]
pub enum ProtoError {
    #[error("Unable to reach GPIB bridge at {address}, check connection: {source}")]
    Connection {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("No instrument answering at GPIB address {gpib_address}, check IP/address: {source}")]
    Address {
        gpib_address: u8,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Instrument reported: {0}")]
    Warning(InstrumentError),

    #[error("Session is {0}, commands require a connected session")]
    NotConnected(SessionState),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Unexpected response: {0}")]
    Unexpected(String),

    #[error("Communication aborted")]
    Abort,
}
