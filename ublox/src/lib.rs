//! Driver for u-blox SARA cellular modules (SARA-N211 and SARA-R4) speaking
//! AT commands over a serial line.
//!
//! [`module::SaraModule`] is the entry point. It sequences commands through
//! [`at::AtClient`], which keeps the [`state::DeviceState`] up to date from the
//! URCs the module interleaves with its responses.

pub mod at;
pub mod config;
pub mod connection;
pub mod error;
pub mod line;
pub mod module;
pub mod socket;
pub mod state;
pub mod stats;
pub mod transport;
pub mod urc;

pub use error::{Error, Result};
