use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::stats::RadioStats;

/// Unread `+NSONMI` notifications kept before the oldest are dropped.
pub const MAX_PENDING_MESSAGES: usize = 16;

/// What we currently know about the module, as learned from URCs and
/// statistics reports. Every field holds the latest reported value only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    /// Signalling connection is active (`+CSCON: 1`) rather than idle.
    pub connected: bool,
    /// EPS registration status code from `+CEREG`.
    pub eps_reg_status: Option<u8>,
    pub ip: Option<String>,
    /// `+NSONMI` payloads (`<socket>,<length>`) not yet read, oldest first.
    /// Holds at most [`MAX_PENDING_MESSAGES`].
    pub available_messages: VecDeque<String>,
    /// Socket id from the last `+USOCR` response.
    pub created_socket: Option<u8>,
    pub radio: RadioStats,
}
