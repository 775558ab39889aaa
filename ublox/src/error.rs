use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The module did not acknowledge a written command with a bare line
    /// terminator. Usually means we are out of sync with the line framing.
    #[error("ack was not received properly, received {received:?}")]
    AckMismatch { received: String },

    #[error("module rejected AT command: {command}")]
    Command { command: String },

    /// `ERROR` showed up while reading lines without a command in flight.
    #[error("module reported ERROR while waiting for {waiting_for}")]
    WaitAborted { waiting_for: String },

    /// `+CME ERROR` reported by the module. Carries the raw notification.
    #[error("module reported CME error: {0}")]
    FatalModule(String),

    #[error("operator {0} is not supported")]
    UnsupportedOperator(String),

    #[error("could not connect to {operator} within {timeout:?}")]
    ConnectionTimeout { operator: String, timeout: Duration },

    #[error("socket type can only be udp or tcp, got {0}")]
    UnsupportedSocketType(String),

    #[error("radio mode can only be nbiot or ltem, got {0}")]
    UnsupportedRadioMode(String),

    #[error("unexpected response from module: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("invalid hex payload: {0}")]
    Hex(#[from] hex::FromHexError),
}

pub type Result<T> = std::result::Result<T, Error>;
