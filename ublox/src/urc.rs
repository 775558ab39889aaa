//! Unsolicited result codes.
//!
//! The module may emit `+ID: payload` lines at any time, including in the
//! middle of the response to an unrelated command. Every such line is decoded
//! into a [`Urc`] and applied to the [`DeviceState`] right away.

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::line::{lossy, URC_PREFIX};
use crate::state::{DeviceState, MAX_PENDING_MESSAGES};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Urc {
    /// `+CSCON: <n>,<mode>` signalling connection idle (false) or connected.
    ConnectionStatus(bool),
    /// `+CEREG: [<n>,]<stat>`
    EpsRegistration(u8),
    /// `+CGPADDR: <cid>,"<ip>"`
    IpAddress(String),
    /// `+NSONMI: <socket>,<length>`
    MessageAvailable(String),
    /// `+USOCR: <socket>`
    SocketCreated(u8),
    /// `+CME ERROR: <err>`, carries the raw line.
    CmeError(String),
    Unknown { id: String, payload: String },
}

impl Urc {
    /// Decodes a notification line (including its leading `+`).
    ///
    /// Payloads that do not have the expected shape decode as
    /// [`Urc::Unknown`] so newer firmware never trips us up.
    pub fn parse(line: &[u8]) -> Self {
        let text = lossy(line.strip_prefix(&[URC_PREFIX]).unwrap_or(line));
        let (id, payload) = match text.split_once(':') {
            Some((id, payload)) => (id, payload),
            None => (text.as_str(), ""),
        };

        let decoded = match id {
            "CSCON" => match payload.chars().last() {
                Some('0') => Some(Urc::ConnectionStatus(false)),
                Some('1') => Some(Urc::ConnectionStatus(true)),
                _ => None,
            },
            "CEREG" => payload
                .chars()
                .last()
                .and_then(|c| c.to_digit(10))
                .map(|status| Urc::EpsRegistration(status as u8)),
            "CGPADDR" => match (payload.find('"'), payload.rfind('"')) {
                (Some(first), Some(last)) if first < last => {
                    Some(Urc::IpAddress(payload[first + 1..last].to_string()))
                }
                _ => None,
            },
            "NSONMI" => Some(Urc::MessageAvailable(payload.trim_start().to_string())),
            "USOCR" => payload.trim().parse().ok().map(Urc::SocketCreated),
            "CME ERROR" => Some(Urc::CmeError(lossy(line))),
            _ => None,
        };

        decoded.unwrap_or_else(|| Urc::Unknown {
            id: id.to_string(),
            payload: payload.to_string(),
        })
    }
}

impl DeviceState {
    /// Applies a decoded URC. Only a CME error is a failure.
    pub fn apply(&mut self, urc: &Urc) -> Result<()> {
        match urc {
            Urc::ConnectionStatus(connected) => {
                self.connected = *connected;
                info!(connected, "Changed the connection status");
            }
            Urc::EpsRegistration(status) => {
                self.eps_reg_status = Some(*status);
                info!(status, "Updated EPS registration status");
            }
            Urc::IpAddress(ip) => {
                self.ip = Some(ip.clone());
                info!(%ip, "Updated the IP address of the module");
            }
            Urc::MessageAvailable(message) => {
                debug!(%message, "Message available");
                if self.available_messages.len() >= MAX_PENDING_MESSAGES {
                    let dropped = self.available_messages.pop_front();
                    warn!(?dropped, "Too many unread messages, dropping the oldest");
                }
                self.available_messages.push_back(message.clone());
            }
            Urc::SocketCreated(socket) => {
                debug!(socket, "Socket created");
                self.created_socket = Some(*socket);
            }
            Urc::CmeError(err) => return Err(Error::FatalModule(err.clone())),
            Urc::Unknown { id, payload } => {
                debug!(%id, %payload, "Unhandled URC");
            }
        }

        Ok(())
    }
}

/// Decodes `line`, applies it to `state` and hands back what was applied.
pub fn dispatch(state: &mut DeviceState, line: &[u8]) -> Result<Urc> {
    debug!(urc = %lossy(line), "Processing URC");
    let urc = Urc::parse(line);
    state.apply(&urc)?;

    Ok(urc)
}
