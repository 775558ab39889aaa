//! Operator selection and waiting for network registration.

use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::at::AtClient;
use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::urc::Urc;

pub const AT_CHECK_REGISTRATION: &str = "AT+CEREG?";

/// EPS registration status: registered, home network.
pub const REGISTERED_HOME: u8 = 1;
/// EPS registration status: registered, roaming.
pub const REGISTERED_ROAMING: u8 = 5;
/// EPS registration status: not registered and not searching.
pub const NOT_REGISTERED: u8 = 0;

/// Operators we know the PLMN code and expected registration status of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Telia,
    Tre,
}

impl Operator {
    pub const ALL: [Operator; 2] = [Operator::Telia, Operator::Tre];

    pub fn name(self) -> &'static str {
        match self {
            Operator::Telia => "TELIA",
            Operator::Tre => "TRE",
        }
    }

    /// Numeric PLMN code used with `AT+COPS`.
    pub fn code(self) -> u32 {
        match self {
            Operator::Telia => 24001,
            Operator::Tre => 24002,
        }
    }

    /// Registration status the module reports once attached to this operator.
    pub fn registration_target(self) -> u8 {
        match self {
            Operator::Telia => REGISTERED_ROAMING,
            Operator::Tre => REGISTERED_HOME,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnsupportedOperator(s.to_string()))
    }
}

/// Which network to register on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatorSelection {
    Automatic,
    Named(Operator),
    /// Raw PLMN code, which may not be one of the known [`Operator`]s.
    Code(u32),
}

impl OperatorSelection {
    /// `None` selects automatically, digits are a raw PLMN code and anything
    /// else must be a known operator name.
    pub fn parse(operator: Option<&str>) -> Result<Self> {
        match operator.map(str::trim) {
            None | Some("") => Ok(Self::Automatic),
            Some(op) if op.chars().all(|c| c.is_ascii_digit()) => op
                .parse()
                .map(Self::Code)
                .map_err(|_| Error::UnsupportedOperator(op.to_string())),
            Some(op) => op.parse().map(Self::Named),
        }
    }

    pub fn cops_command(&self) -> String {
        match self.code() {
            Some(code) => format!("AT+COPS=1,2,\"{code}\""),
            None => "AT+COPS=0".to_string(),
        }
    }

    pub fn code(&self) -> Option<u32> {
        match self {
            OperatorSelection::Automatic => None,
            OperatorSelection::Named(op) => Some(op.code()),
            OperatorSelection::Code(code) => Some(*code),
        }
    }

    /// Whether `status` means we are attached to the selected network.
    ///
    /// Without a known operator either registered status is accepted.
    pub fn is_registered(&self, status: u8) -> bool {
        match self.code().and_then(Operator::from_code) {
            Some(op) => status == op.registration_target(),
            None => status == REGISTERED_HOME || status == REGISTERED_ROAMING,
        }
    }
}

impl fmt::Display for OperatorSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorSelection::Automatic => write!(f, "automatic"),
            OperatorSelection::Named(op) => write!(f, "{}", op.name()),
            OperatorSelection::Code(code) => write!(f, "{code}"),
        }
    }
}

/// How to find out that registration finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AwaitStrategy {
    /// Block on the line until the module reports the expected `+CEREG`.
    Passive,
    /// Query `AT+CEREG?` every `interval` until registered or `timeout`.
    Polling { interval: Duration, timeout: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Idle,
    AwaitingRegistration,
    Connected,
    TimedOut,
    Failed,
}

/// Drives the module from a submitted operator selection to a registered
/// network.
#[derive(Debug)]
pub struct Connector {
    state: ConnectionState,
    polls: u32,
}

impl Default for Connector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Idle,
            polls: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Registration queries issued so far while polling.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Back to [`ConnectionState::Idle`], forgetting the previous attempt.
    pub fn reset(&mut self) {
        self.state = ConnectionState::Idle;
        self.polls = 0;
    }

    /// Submits the operator selection to the module. A rejected selection
    /// ends in [`ConnectionState::Failed`].
    pub fn select_operator<T: Transport>(
        &mut self,
        at: &mut AtClient<T>,
        operator: &OperatorSelection,
    ) -> Result<()> {
        if let Err(e) = at.execute(&operator.cops_command()) {
            self.state = ConnectionState::Failed;
            warn!(%operator, "Operator selection failed: {e}");
            return Err(e);
        }

        Ok(())
    }

    pub fn await_connection<T: Transport>(
        &mut self,
        at: &mut AtClient<T>,
        operator: &OperatorSelection,
        strategy: AwaitStrategy,
    ) -> Result<()> {
        info!(%operator, ?strategy, "Awaiting connection");
        self.state = ConnectionState::AwaitingRegistration;
        self.polls = 0;

        let result = match strategy {
            AwaitStrategy::Passive => Self::wait_passive(at, operator),
            AwaitStrategy::Polling { interval, timeout } => {
                self.poll(at, operator, interval, timeout)
            }
        };

        self.state = match &result {
            Ok(()) => ConnectionState::Connected,
            Err(Error::ConnectionTimeout { .. }) => ConnectionState::TimedOut,
            Err(_) => ConnectionState::Failed,
        };
        match &result {
            Ok(()) => info!(%operator, "Connected"),
            Err(e) => warn!(%operator, state = ?self.state, "Connection failed: {e}"),
        }

        result
    }

    fn wait_passive<T: Transport>(
        at: &mut AtClient<T>,
        operator: &OperatorSelection,
    ) -> Result<()> {
        at.wait_for_urc("network registration", |urc| {
            matches!(urc, Urc::EpsRegistration(status) if operator.is_registered(*status))
        })?;

        Ok(())
    }

    fn poll<T: Transport>(
        &mut self,
        at: &mut AtClient<T>,
        operator: &OperatorSelection,
        interval: Duration,
        timeout: Duration,
    ) -> Result<()> {
        let start = Instant::now();
        loop {
            thread::sleep(interval);
            // The `+CEREG` answer is dispatched as a URC, so are any
            // registration changes the module reports meanwhile.
            at.execute(AT_CHECK_REGISTRATION)?;
            self.polls += 1;

            match at.state().eps_reg_status {
                Some(status) if operator.is_registered(status) => return Ok(()),
                Some(NOT_REGISTERED) | None => {
                    debug!(polls = self.polls, "Not registered yet")
                }
                Some(status) => debug!(polls = self.polls, status, "Still registering"),
            }

            if start.elapsed() > timeout {
                return Err(Error::ConnectionTimeout {
                    operator: operator.to_string(),
                    timeout,
                });
            }
        }
    }
}
