use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::line::lossy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketKind {
    Udp,
    Tcp,
}

impl SocketKind {
    /// IP protocol number used by the socket create commands.
    pub fn protocol(self) -> u8 {
        match self {
            SocketKind::Udp => 17,
            SocketKind::Tcp => 6,
        }
    }
}

impl FromStr for SocketKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "UDP" => Ok(SocketKind::Udp),
            "TCP" => Ok(SocketKind::Tcp),
            _ => Err(Error::UnsupportedSocketType(s.to_string())),
        }
    }
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketKind::Udp => write!(f, "UDP"),
            SocketKind::Tcp => write!(f, "TCP"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Socket {
    pub id: u8,
    pub kind: SocketKind,
    /// Local port, if one was requested.
    pub port: Option<u16>,
}

/// A message read from a socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datagram {
    pub socket: u8,
    pub ip: String,
    pub port: u16,
    pub data: Vec<u8>,
    /// Bytes of the message still held by the module.
    pub remaining: usize,
}

/// Hex payload as the send commands expect it.
pub fn encode_payload(data: &[u8]) -> String {
    hex::encode_upper(data)
}

/// Parses a socket read response, e.g.
/// `0,"192.168.1.1",5683,5,"68656C6C6F",0`.
pub fn parse_datagram(line: &[u8]) -> Result<Datagram> {
    let text = lossy(line).replace('"', "");
    let fields: Vec<&str> = text.split(',').map(str::trim).collect();
    let [socket, ip, port, length, data, remaining] = fields.as_slice() else {
        return Err(Error::InvalidResponse(format!(
            "expected 6 fields in socket read response, got {:?}",
            text
        )));
    };

    let invalid =
        |field: &str| Error::InvalidResponse(format!("invalid {field} in {text:?}"));
    let data = hex::decode(data)?;
    let length: usize = length.parse().map_err(|_| invalid("length"))?;
    if length != data.len() {
        return Err(invalid("length"));
    }

    Ok(Datagram {
        socket: socket.parse().map_err(|_| invalid("socket"))?,
        ip: ip.to_string(),
        port: port.parse().map_err(|_| invalid("port"))?,
        data,
        remaining: remaining.parse().map_err(|_| invalid("remaining length"))?,
    })
}
