use bytes::{BufMut, BytesMut};
use std::{
    fmt::{self, Write},
    io,
};
use tokio_util::codec::{Decoder, Encoder};

use super::command::ControllerCommand;

const LF: u8 = b'\n';
const CR: u8 = b'\r';
const ESC: u8 = 0x1b;
const PLUS: u8 = b'+';

/// Largest reply line accepted before giving up on the stream.
const MAX_LINE_LEN: usize = 64 * 1024;

/// Outgoing frame on the bridge socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Interpreted by the bridge, sent verbatim.
    Controller(ControllerCommand),
    /// Forwarded to the addressed instrument.
    Data(String),
}

/// Line codec for the Prologix GPIB-Ethernet bridge.
///
/// Instrument data has to be escaped: the bridge treats bare CR, LF, ESC and
/// a leading `+` as its own framing, so each of them is prefixed with ESC.
/// Replies are forwarded by the bridge as LF terminated lines.
#[derive(Debug, Default)]
pub struct PrologixCodec {
    // Bytes of the current line already scanned for LF.
    scanned: usize,
}

impl Decoder for PrologixCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match src[self.scanned..].iter().position(|b| *b == LF) {
            Some(offset) => {
                let end = self.scanned + offset;
                self.scanned = 0;
                let mut line = src.split_to(end + 1);
                line.truncate(end);
                if line.last() == Some(&CR) {
                    line.truncate(end - 1);
                }
                String::from_utf8(line.to_vec())
                    .map(Some)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            }
            None if src.len() > MAX_LINE_LEN => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Reply line exceeds maximum length",
            )),
            None => {
                // Not enough bytes yet
                self.scanned = src.len();
                Ok(None)
            }
        }
    }
}

fn write_fmt_guarded(dst: &mut BytesMut, args: fmt::Arguments<'_>) -> Result<(), io::Error> {
    dst.write_fmt(args)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

impl Encoder<Frame> for PrologixCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match &item {
            Frame::Controller(cmd) => write_fmt_guarded(dst, format_args!("{}", cmd))?,
            Frame::Data(data) => {
                dst.reserve(data.len() + 1);
                for b in data.bytes() {
                    if matches!(b, CR | LF | ESC | PLUS) {
                        dst.put_u8(ESC);
                    }
                    dst.put_u8(b);
                }
            }
        }
        dst.put_u8(LF);
        Ok(())
    }
}
