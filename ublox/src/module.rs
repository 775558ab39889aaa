//! High level driver for the SARA-N211 and SARA-R4 modules.
//!
//! Everything here is plain sequencing of AT commands on top of [`AtClient`],
//! the two models only differ in the commands and timings they use.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::at::AtClient;
use crate::connection::{AwaitStrategy, ConnectionState, Connector, OperatorSelection};
use crate::error::{Error, Result};
use crate::line::lossy;
use crate::socket::{self, Datagram, Socket, SocketKind};
use crate::state::DeviceState;
use crate::stats::{self, RadioStats};
use crate::transport::{SerialSettings, Transport};
use crate::urc::Urc;

pub const AT_ENABLE_NETWORK_REGISTRATION: &str = "AT+CEREG=1";
pub const AT_ENABLE_SIGNALING_CONNECTION_URC: &str = "AT+CSCON=1";
pub const AT_ENABLE_POWER_SAVING_MODE: &str = "AT+NPSMR=1";
pub const AT_ENABLE_ALL_RADIO_FUNCTIONS: &str = "AT+CFUN=1";
pub const AT_GET_IP: &str = "AT+CGPADDR";
pub const AT_RADIO_INFORMATION: &str = "AT+NUESTATS=\"RADIO\"";
pub const AT_ENABLE_VERBOSE_ERRORS: &str = "AT+CMEE=2";
pub const AT_SET_HEX_DATA_FORMAT: &str = "AT+UDCONF=1,1";
pub const AT_READ_SOCKET: &str = "AT+NSORF";

pub const DEFAULT_BANDS: [u8; 1] = [20];
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(180);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Model {
    /// SARA-N211, NB-IoT only
    N211,
    /// SARA-R4 series, LTE-M and NB-IoT
    R4,
}

impl Model {
    pub fn serial_settings(self, read_timeout: Duration) -> SerialSettings {
        let (baud_rate, rtscts) = match self {
            Model::N211 => (9600, false),
            Model::R4 => (115_200, true),
        };
        SerialSettings {
            baud_rate,
            rtscts,
            read_timeout,
        }
    }

    /// Whether the module echoes commands out of the box.
    pub fn default_echo(self) -> bool {
        matches!(self, Model::R4)
    }

    /// N211 reports registration by itself, R4 has to be asked.
    pub fn default_strategy(self) -> AwaitStrategy {
        match self {
            Model::N211 => AwaitStrategy::Passive,
            Model::R4 => AwaitStrategy::Polling {
                interval: DEFAULT_POLL_INTERVAL,
                timeout: DEFAULT_CONNECT_TIMEOUT,
            },
        }
    }

    fn reboot_command(self) -> &'static str {
        match self {
            Model::N211 => "AT+NRB",
            Model::R4 => "AT+CFUN=15",
        }
    }

    fn reboot_time(self) -> Duration {
        match self {
            Model::N211 => Duration::ZERO,
            Model::R4 => Duration::from_secs(10),
        }
    }

    fn send_command(self) -> &'static str {
        match self {
            Model::N211 => "AT+NSOST",
            Model::R4 => "AT+USOST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RadioMode {
    #[default]
    NbIot,
    LteM,
}

impl RadioMode {
    fn command(self) -> &'static str {
        match self {
            RadioMode::NbIot => "AT+URAT=8",
            RadioMode::LteM => "AT+URAT=7",
        }
    }
}

impl FromStr for RadioMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NBIOT" => Ok(RadioMode::NbIot),
            "LTEM" => Ok(RadioMode::LteM),
            _ => Err(Error::UnsupportedRadioMode(s.to_string())),
        }
    }
}

impl fmt::Display for RadioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioMode::NbIot => write!(f, "NBIOT"),
            RadioMode::LteM => write!(f, "LTEM"),
        }
    }
}

/// OR of one bit per band, band 1 being bit 0.
pub fn band_mask(bands: &[u8]) -> u64 {
    bands
        .iter()
        .filter(|band| (1..=64).contains(*band))
        .fold(0, |mask, band| mask | (1u64 << (band - 1)))
}

pub struct SaraModule<T> {
    at: AtClient<T>,
    model: Model,
    strategy: AwaitStrategy,
    connector: Connector,
    sockets: HashMap<u8, Socket>,
}

impl<T: Transport> SaraModule<T> {
    pub fn new(transport: T, model: Model, echo: bool) -> Self {
        Self {
            at: AtClient::new(transport, echo),
            model,
            strategy: model.default_strategy(),
            connector: Connector::new(),
            sockets: HashMap::new(),
        }
    }

    /// Overrides how [`Self::connect`] waits for registration.
    pub fn with_strategy(mut self, strategy: AwaitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn state(&self) -> &DeviceState {
        self.at.state()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connector.state()
    }

    pub fn sockets(&self) -> &HashMap<u8, Socket> {
        &self.sockets
    }

    pub fn reboot(&mut self) -> Result<()> {
        info!(model = ?self.model, "Rebooting module");
        self.at.execute(self.model.reboot_command())?;
        info!("Waiting for module to boot up");
        thread::sleep(self.model.reboot_time());
        self.at.clear()?;
        info!("Module rebooted");

        Ok(())
    }

    /// Runs everything needed to get the module up and working.
    ///
    /// `radio_mode` only matters for the R4.
    pub fn setup(&mut self, radio_mode: RadioMode) -> Result<()> {
        info!(model = ?self.model, "Starting initiation process");
        match self.model {
            Model::N211 => {
                self.enable_signaling_connection_urc()?;
                self.enable_network_registration()?;
                self.enable_psm_mode()?;
                self.enable_radio_functions()?;
            }
            Model::R4 => {
                self.set_radio_mode(radio_mode)?;
                self.enable_radio_functions()?;
                self.enable_network_registration()?;
                self.set_error_format()?;
                self.set_data_format()?;
            }
        }
        info!("Finished initiation process");

        Ok(())
    }

    pub fn enable_psm_mode(&mut self) -> Result<()> {
        self.at.execute(AT_ENABLE_POWER_SAVING_MODE)?;
        info!("Enabled power save mode");
        Ok(())
    }

    pub fn enable_signaling_connection_urc(&mut self) -> Result<()> {
        self.at.execute(AT_ENABLE_SIGNALING_CONNECTION_URC)?;
        info!("Signaling connection URC enabled");
        Ok(())
    }

    pub fn enable_network_registration(&mut self) -> Result<()> {
        self.at.execute(AT_ENABLE_NETWORK_REGISTRATION)?;
        info!("Network registration enabled");
        Ok(())
    }

    pub fn enable_radio_functions(&mut self) -> Result<()> {
        self.at.execute(AT_ENABLE_ALL_RADIO_FUNCTIONS)?;
        info!("All radio functions enabled");
        Ok(())
    }

    pub fn set_radio_mode(&mut self, mode: RadioMode) -> Result<()> {
        self.at.execute(mode.command())?;
        info!(%mode, "Radio mode set");
        Ok(())
    }

    pub fn set_error_format(&mut self) -> Result<()> {
        self.at.execute(AT_ENABLE_VERBOSE_ERRORS)?;
        info!("Verbose errors enabled");
        Ok(())
    }

    pub fn set_data_format(&mut self) -> Result<()> {
        self.at.execute(AT_SET_HEX_DATA_FORMAT)?;
        info!("Data format set to HEX");
        Ok(())
    }

    /// Restricts the NB-IoT radio to `bands`, [`DEFAULT_BANDS`] when empty.
    pub fn set_band_mask(&mut self, bands: &[u8]) -> Result<()> {
        let bands = if bands.is_empty() {
            &DEFAULT_BANDS[..]
        } else {
            bands
        };
        let mask = band_mask(bands);
        info!(?bands, mask, "Setting band mask");
        self.at.execute(&format!("AT+UBANDMASK=1,{mask},{mask}"))?;

        Ok(())
    }

    pub fn set_pdp_context(&mut self, apn: &str, pdp_type: &str, cid: u8) -> Result<()> {
        info!("Setting PDP context");
        self.at
            .execute(&format!("AT+CGDCONT={cid},\"{pdp_type}\",\"{apn}\""))?;
        info!(apn, pdp_type, "PDP context set");

        Ok(())
    }

    /// Selects the operator network and blocks until registered on it.
    ///
    /// Unknown operator names fail before anything is sent to the module.
    pub fn connect(&mut self, operator: Option<&str>) -> Result<()> {
        self.connector.reset();
        let selection = OperatorSelection::parse(operator)?;
        info!(operator = %selection, "Trying to connect to operator network");
        self.connector.select_operator(&mut self.at, &selection)?;
        self.connector
            .await_connection(&mut self.at, &selection, self.strategy)?;
        info!(operator = %selection, "Connected");

        Ok(())
    }

    pub fn update_ip_address(&mut self) -> Result<Option<&str>> {
        self.at.execute(AT_GET_IP)?;
        Ok(self.at.state().ip.as_deref())
    }

    pub fn update_radio_statistics(&mut self) -> Result<&RadioStats> {
        let report = self.at.execute(AT_RADIO_INFORMATION)?;
        let parsed = stats::parse_report(&report);
        let state = self.at.state_mut();
        state.radio.fold(&parsed);

        Ok(&state.radio)
    }

    /// Creates a socket and returns its id.
    pub fn create_socket(&mut self, kind: SocketKind, port: Option<u16>) -> Result<u8> {
        info!(%kind, ?port, "Creating socket");
        let id = match self.model {
            Model::N211 => {
                if kind != SocketKind::Udp {
                    return Err(Error::UnsupportedSocketType(kind.to_string()));
                }
                let mut command = format!("AT+NSOCR=\"DGRAM\",{}", kind.protocol());
                if let Some(port) = port {
                    command.push_str(&format!(",{port}"));
                }
                let response = self.at.execute(&command)?;
                let first = response.first().map(|l| lossy(l)).unwrap_or_default();
                first.trim().parse().map_err(|_| {
                    Error::InvalidResponse(format!("no socket id in {first:?}"))
                })?
            }
            Model::R4 => {
                let mut command = format!("AT+USOCR={}", kind.protocol());
                if let Some(port) = port {
                    command.push_str(&format!(",{port}"));
                }
                self.at.state_mut().created_socket = None;
                self.at.execute(&command)?;
                self.at.state_mut().created_socket.take().ok_or_else(|| {
                    Error::InvalidResponse(format!("no socket id returned for {command}"))
                })?
            }
        };

        self.sockets.insert(id, Socket { id, kind, port });
        info!(%kind, socket = id, "Socket created");

        Ok(id)
    }

    pub fn send_udp_data(
        &mut self,
        socket: u8,
        host: &str,
        port: u16,
        data: &[u8],
    ) -> Result<()> {
        info!(host, port, socket, data = %lossy(data), "Sending UDP message");
        let command = format!(
            "{}={socket},\"{host}\",{port},{},\"{}\"",
            self.model.send_command(),
            data.len(),
            socket::encode_payload(data)
        );
        self.at.execute(&command)?;

        Ok(())
    }

    /// Blocks until a message is available and reads it.
    pub fn receive_udp_data(&mut self) -> Result<Datagram> {
        info!("Waiting for UDP message");
        if self.at.state().available_messages.is_empty() {
            self.at.wait_for_urc("+NSONMI", |urc| {
                matches!(urc, Urc::MessageAvailable(_))
            })?;
        }
        let message_info = self
            .at
            .state_mut()
            .available_messages
            .pop_front()
            .ok_or_else(|| Error::InvalidResponse("no message available".to_string()))?;

        let response = self.at.execute(&format!("{AT_READ_SOCKET}={message_info}"))?;
        let line = response.first().ok_or_else(|| {
            Error::InvalidResponse(format!("empty response reading {message_info}"))
        })?;
        let datagram = socket::parse_datagram(line)?;
        debug!(?datagram, "Parsed UDP message");
        info!(data = %lossy(&datagram.data), "Received UDP message");

        Ok(datagram)
    }
}

impl<T> fmt::Debug for SaraModule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaraModule")
            .field("model", &self.model)
            .field("strategy", &self.strategy)
            .field("connector", &self.connector)
            .field("sockets", &self.sockets)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::at::tests::scripted;
    use crate::transport::MockTransport;

    #[test]
    fn test_band_mask() {
        assert_eq!(band_mask(&[20]), 1 << 19);
        assert_eq!(band_mask(&[1, 3, 8]), 0b1000_0101);
        assert_eq!(band_mask(&[1, 1]), 1);
        assert_eq!(band_mask(&[]), 0);
        assert_eq!(band_mask(&[0, 65]), 0);
    }

    #[test]
    fn test_radio_mode() {
        assert_eq!("nbiot".parse::<RadioMode>().unwrap(), RadioMode::NbIot);
        assert_eq!("LTEM".parse::<RadioMode>().unwrap(), RadioMode::LteM);
        assert!(matches!(
            "gsm".parse::<RadioMode>(),
            Err(Error::UnsupportedRadioMode(_))
        ));
    }

    #[test]
    fn test_unsupported_operator_never_writes() {
        let mut transport = MockTransport::new();
        transport.expect_write().never();
        transport.expect_read_line().never();
        let mut module = SaraModule::new(transport, Model::R4, true);

        let err = module.connect(Some("VODAFONE")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperator(name) if name == "VODAFONE"));
        assert_eq!(module.connection_state(), ConnectionState::Idle);
    }

    #[test]
    fn test_connect_starts_from_idle() {
        let transport = scripted(
            &["AT+COPS=1,2,\"24001\"\r\n"],
            &["", "OK", "+CEREG: 5"],
        );
        let mut module = SaraModule::new(transport, Model::N211, false);

        module.connect(Some("TELIA")).unwrap();
        assert_eq!(module.connection_state(), ConnectionState::Connected);

        assert!(module.connect(Some("VODAFONE")).is_err());
        assert_eq!(module.connection_state(), ConnectionState::Idle);
    }

    #[test]
    fn test_rejected_operator_selection_fails() {
        let transport = scripted(&["AT+COPS=0\r\n"], &["", "ERROR"]);
        let mut module = SaraModule::new(transport, Model::R4, false);

        let err = module.connect(None).unwrap_err();
        assert!(matches!(err, Error::Command { command } if command == "AT+COPS=0"));
        assert_eq!(module.connection_state(), ConnectionState::Failed);
    }

    #[test]
    fn test_n211_setup_sequence() {
        let transport = scripted(
            &[
                "AT+CSCON=1\r\n",
                "AT+CEREG=1\r\n",
                "AT+NPSMR=1\r\n",
                "AT+CFUN=1\r\n",
            ],
            &["", "OK", "", "OK", "", "OK", "", "OK"],
        );
        let mut module = SaraModule::new(transport, Model::N211, false);

        module.setup(RadioMode::NbIot).unwrap();
    }

    #[test]
    fn test_r4_setup_sequence_with_echo() {
        let transport = scripted(
            &[
                "AT+URAT=7\r\n",
                "AT+CFUN=1\r\n",
                "AT+CEREG=1\r\n",
                "AT+CMEE=2\r\n",
                "AT+UDCONF=1,1\r\n",
            ],
            &[
                "AT+URAT=7\r",
                "OK",
                "AT+CFUN=1\r",
                "OK",
                "AT+CEREG=1\r",
                "OK",
                "AT+CMEE=2\r",
                "OK",
                "AT+UDCONF=1,1\r",
                "OK",
            ],
        );
        let mut module = SaraModule::new(transport, Model::R4, true);

        module.setup(RadioMode::LteM).unwrap();
    }

    #[test]
    fn test_r4_create_socket() {
        let transport = scripted(&["AT+USOCR=17,5683\r\n"], &["", "+USOCR: 2", "OK"]);
        let mut module = SaraModule::new(transport, Model::R4, false);

        let id = module.create_socket(SocketKind::Udp, Some(5683)).unwrap();
        assert_eq!(id, 2);
        assert_eq!(
            module.sockets().get(&2),
            Some(&Socket {
                id: 2,
                kind: SocketKind::Udp,
                port: Some(5683)
            })
        );
    }

    #[test]
    fn test_n211_rejects_tcp_socket() {
        let transport = scripted(&[], &[]);
        let mut module = SaraModule::new(transport, Model::N211, false);

        assert!(matches!(
            module.create_socket(SocketKind::Tcp, None),
            Err(Error::UnsupportedSocketType(_))
        ));
    }

    #[test]
    fn test_r4_send_uses_usost() {
        let transport = scripted(
            &["AT+USOST=0,\"10.0.0.1\",5683,5,\"68656C6C6F\"\r\n"],
            &["", "+USOST: 0,5", "OK"],
        );
        let mut module = SaraModule::new(transport, Model::R4, false);

        module.send_udp_data(0, "10.0.0.1", 5683, b"hello").unwrap();
    }

    #[test]
    fn test_set_band_mask_defaults_to_band_20() {
        let transport = scripted(
            &["AT+UBANDMASK=1,524288,524288\r\n"],
            &["", "OK"],
        );
        let mut module = SaraModule::new(transport, Model::R4, false);

        module.set_band_mask(&[]).unwrap();
    }
}
