//! AT command transactions.
//!
//! The module is strictly half-duplex: we write one command, it acknowledges
//! the write with an empty line and then answers with zero or more
//! intermediate result lines terminated by `OK` or `ERROR`. URCs may show up
//! anywhere in between and are dispatched as soon as they are read.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::line::{self, classify, lossy, LineKind};
use crate::state::DeviceState;
use crate::transport::Transport;
use crate::urc::{self, Urc};

const TERMINATOR: &[u8] = b"\r\n";

/// What ends a read loop.
#[derive(Clone, Copy)]
enum Until<'a> {
    Ok,
    Urc(&'a dyn Fn(&Urc) -> bool),
}

pub struct AtClient<T> {
    transport: T,
    /// Module echoes every command back before acknowledging it.
    echo: bool,
    state: DeviceState,
}

impl<T: Transport> AtClient<T> {
    pub fn new(transport: T, echo: bool) -> Self {
        Self {
            transport,
            echo,
            state: DeviceState::default(),
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    /// Drops whatever the module sent that nobody asked for.
    pub fn clear(&mut self) -> Result<()> {
        self.transport.clear()?;
        Ok(())
    }

    /// Issues `command` and returns its intermediate result lines once the
    /// module answers `OK`.
    ///
    /// Empty lines and URCs are never part of the result. A `+CME ERROR` URC
    /// aborts the transaction with [`Error::FatalModule`].
    pub fn execute(&mut self, command: &str) -> Result<Vec<Vec<u8>>> {
        debug!(command, "Applying AT command");
        self.write(command)?;
        let response = self.read_until(command, Until::Ok)?;
        debug!(
            command,
            response = ?response.iter().map(|l| lossy(l)).collect::<Vec<_>>(),
            "AT command response"
        );

        Ok(response)
    }

    /// Reads lines without sending anything until a URC matching `wanted`
    /// has been dispatched. `what` names the wait in logs and errors.
    pub fn wait_for_urc(
        &mut self,
        what: &str,
        wanted: impl Fn(&Urc) -> bool,
    ) -> Result<Vec<Vec<u8>>> {
        debug!(what, "Waiting for URC");
        self.read_until(what, Until::Urc(&wanted))
    }

    fn write(&mut self, command: &str) -> Result<()> {
        let mut data = command.as_bytes().to_vec();
        if !data.ends_with(TERMINATOR) {
            data.extend_from_slice(TERMINATOR);
        }
        self.transport.write(&data)?;
        debug!(sent = %lossy(&data), "Sent");

        let ack = self.transport.read_line()?;
        let mut remaining = ack.as_slice();
        if self.echo {
            // The echo is the command as written followed by `\r`, the module
            // never echoes the `\n`.
            let echoed = line::strip_line_ending(command.as_bytes());
            remaining = remaining.strip_prefix(echoed).unwrap_or(remaining);
            remaining = remaining.strip_prefix(b"\r").unwrap_or(remaining);
        }

        if !remaining.is_empty() {
            return Err(Error::AckMismatch {
                received: lossy(&ack),
            });
        }

        Ok(())
    }

    fn read_until(&mut self, context: &str, until: Until<'_>) -> Result<Vec<Vec<u8>>> {
        let mut results = Vec::new();
        loop {
            let line = self.transport.read_line()?;
            debug!(line = %lossy(&line), "Received");
            match classify(&line) {
                LineKind::Empty => {}
                LineKind::Notification => {
                    let urc = urc::dispatch(&mut self.state, &line)?;
                    if matches!(until, Until::Urc(wanted) if wanted(&urc)) {
                        break;
                    }
                }
                LineKind::Ok => {
                    if matches!(until, Until::Ok) {
                        break;
                    }
                }
                LineKind::Error => {
                    warn!(context, response = %lossy(&line), "Module reported ERROR");
                    return Err(match until {
                        Until::Ok => Error::Command {
                            command: context.to_string(),
                        },
                        Until::Urc(_) => Error::WaitAborted {
                            waiting_for: context.to_string(),
                        },
                    });
                }
                LineKind::Result => results.push(line),
            }
        }

        Ok(results)
    }
}
