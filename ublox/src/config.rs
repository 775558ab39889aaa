use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::connection::AwaitStrategy;
use crate::module::{Model, RadioMode};

/// Primary application configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the serial device of the module
    pub device: PathBuf,

    pub model: Model,

    /// Whether the module echoes commands back
    pub echo: bool,

    /// Operator name or PLMN code, `None` for automatic selection
    pub operator: Option<String>,

    /// How to wait for network registration
    pub strategy: AwaitStrategy,

    /// Upper bound for a single blocking serial read
    pub read_timeout: Duration,

    pub reboot: bool,

    /// R4 only: radio access technology
    pub radio_mode: RadioMode,

    /// R4 only: APN for the PDP context
    pub apn: Option<String>,

    /// R4 only: bands to restrict the radio to
    pub bands: Vec<u8>,
}

impl Config {
    /// Create a new config from CLI arguments
    pub fn from_cli(cli: &Cli) -> Self {
        let echo = if cli.echo {
            true
        } else if cli.no_echo {
            false
        } else {
            cli.model.default_echo()
        };

        let strategy = match cli.model.default_strategy() {
            AwaitStrategy::Passive => AwaitStrategy::Passive,
            AwaitStrategy::Polling { .. } => AwaitStrategy::Polling {
                interval: Duration::from_secs(cli.poll_interval),
                timeout: Duration::from_secs(cli.connect_timeout),
            },
        };

        Self {
            device: PathBuf::from(&cli.device),
            model: cli.model,
            echo,
            operator: cli.operator.clone(),
            strategy,
            read_timeout: Duration::from_secs(cli.read_timeout),
            reboot: !cli.skip_reboot,
            radio_mode: cli.radio_mode,
            apn: cli.apn.clone(),
            bands: cli.bands.clone(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[arg(
        short = 'd',
        long = "device",
        env = "UBLOX_DEVICE",
        default_value = "/dev/ttyUSB0",
        help = "Path to the serial device of the module"
    )]
    pub device: String,

    #[arg(
        short = 'm',
        long = "model",
        value_enum,
        default_value = "n211",
        help = "Module model"
    )]
    pub model: Model,

    #[arg(
        long = "echo",
        conflicts_with = "no_echo",
        help = "Module echoes commands (default depends on the model)"
    )]
    pub echo: bool,

    #[arg(long = "no-echo", help = "Module does not echo commands")]
    pub no_echo: bool,

    #[arg(
        short = 'o',
        long = "operator",
        env = "UBLOX_OPERATOR",
        help = "Operator name (TELIA, TRE) or numeric PLMN code. Automatic selection if omitted"
    )]
    pub operator: Option<String>,

    #[arg(
        long = "connect-timeout",
        default_value = "180",
        help = "Seconds to wait for network registration when polling"
    )]
    pub connect_timeout: u64,

    #[arg(
        long = "poll-interval",
        default_value = "2",
        help = "Seconds between registration status queries when polling"
    )]
    pub poll_interval: u64,

    #[arg(
        long = "read-timeout",
        default_value = "300",
        help = "Timeout in seconds for a single serial read"
    )]
    pub read_timeout: u64,

    #[arg(long = "skip-reboot", help = "Do not reboot the module before setup")]
    pub skip_reboot: bool,

    #[arg(
        long = "radio-mode",
        default_value = "nbiot",
        help = "Radio access technology for the R4 (nbiot, ltem)"
    )]
    pub radio_mode: RadioMode,

    #[arg(long = "apn", help = "APN for the PDP context (R4)")]
    pub apn: Option<String>,

    #[arg(
        long = "bands",
        value_delimiter = ',',
        help = "Comma separated bands to restrict the radio to (R4)"
    )]
    pub bands: Vec<u8>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Reboot, set up and register on the network
    Connect,
    /// Print the radio statistics of the module as JSON
    Stats,
    /// Send a UDP message
    Send {
        host: String,
        port: u16,
        message: String,
        #[arg(long = "local-port", help = "Local port of the socket")]
        local_port: Option<u16>,
    },
    /// Wait for a UDP message and print it
    Receive {
        #[arg(long = "local-port", help = "Local port to listen on")]
        local_port: u16,
    },
}
