//! Byte-stream access to the module.
//!
//! The AT engine only needs to write a command and read back whole lines, so
//! that is all [`Transport`] asks for. [`SerialTransport`] is the real thing,
//! tests script their own.

use std::io::{self, BufRead, BufReader, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, FlowControl, SerialPort};
use tracing::debug;

use crate::error::Result;
use crate::line::strip_line_ending;

#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Writes `data` to the module as-is.
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Blocks until a full line is available and returns it without its
    /// `\r\n` terminator.
    fn read_line(&mut self) -> io::Result<Vec<u8>>;

    /// Discards anything pending in either direction.
    fn clear(&mut self) -> io::Result<()>;
}

/// How the serial line to the module is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialSettings {
    pub baud_rate: u32,
    /// RTS/CTS hardware flow control
    pub rtscts: bool,
    /// Upper bound for a single blocking line read
    pub read_timeout: Duration,
}

pub struct SerialTransport {
    reader: BufReader<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Opens `device` with the given settings.
    pub fn open(device: &str, settings: &SerialSettings) -> Result<Self> {
        let flow_control = if settings.rtscts {
            FlowControl::Hardware
        } else {
            FlowControl::None
        };
        let port = serialport::new(device, settings.baud_rate)
            .flow_control(flow_control)
            .timeout(settings.read_timeout)
            .open()?;
        debug!(device, baud_rate = settings.baud_rate, "Opened serial port");

        Ok(Self {
            reader: BufReader::new(port),
        })
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let port = self.reader.get_mut();
        port.write_all(data)?;
        port.flush()
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        if self.reader.read_until(b'\n', &mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "serial port returned no data",
            ));
        }

        Ok(strip_line_ending(&line).to_vec())
    }

    fn clear(&mut self) -> io::Result<()> {
        let buffered = self.reader.buffer().len();
        self.reader.consume(buffered);
        self.reader.get_ref().clear(ClearBuffer::All)?;

        Ok(())
    }
}
