use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use serde_json::to_string_pretty;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

use orb_ublox::{
    config::{Cli, Command, Config},
    module::{Model, SaraModule},
    socket::SocketKind,
    transport::SerialTransport,
};

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_cli(&cli);
    let device = config.device.to_string_lossy().into_owned();

    info!(%device, model = ?config.model, "Opening module");
    let transport = SerialTransport::open(
        &device,
        &config.model.serial_settings(config.read_timeout),
    )
    .wrap_err_with(|| format!("Failed to open serial port '{device}'"))?;
    let mut module = SaraModule::new(transport, config.model, config.echo)
        .with_strategy(config.strategy);

    match &cli.command {
        Command::Connect => connect(&mut module, &config)?,
        Command::Stats => {
            let stats = module
                .update_radio_statistics()
                .wrap_err("Failed to read radio statistics")?;
            println!("{}", to_string_pretty(stats)?);
        }
        Command::Send {
            host,
            port,
            message,
            local_port,
        } => {
            let socket = module
                .create_socket(SocketKind::Udp, *local_port)
                .wrap_err("Failed to create socket")?;
            module
                .send_udp_data(socket, host, *port, message.as_bytes())
                .wrap_err_with(|| format!("Failed to send to {host}:{port}"))?;
        }
        Command::Receive { local_port } => {
            module
                .create_socket(SocketKind::Udp, Some(*local_port))
                .wrap_err("Failed to create socket")?;
            let datagram = module
                .receive_udp_data()
                .wrap_err("Failed to receive UDP message")?;
            println!("{}", to_string_pretty(&datagram)?);
        }
    }

    Ok(())
}

fn connect(module: &mut SaraModule<SerialTransport>, config: &Config) -> Result<()> {
    if config.reboot {
        module.reboot().wrap_err("Failed to reboot module")?;
    }
    module
        .setup(config.radio_mode)
        .wrap_err("Failed to set up module")?;

    if config.model == Model::R4 {
        if !config.bands.is_empty() {
            module.set_band_mask(&config.bands)?;
        }
        if let Some(apn) = &config.apn {
            module.set_pdp_context(apn, "IP", 1)?;
        }
    }

    module
        .connect(config.operator.as_deref())
        .wrap_err("Failed to connect to network")?;
    if let Some(ip) = module.update_ip_address()? {
        info!(%ip, "Got IP address");
    }

    Ok(())
}
