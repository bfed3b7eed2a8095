use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use thing_binding::gateway::{GatewayClient, SnapshotGateway};
use thing_binding::pubsub::{BusMessage, LocalBus, PubSubPort};
use thing_binding::td::synthesize;
use thing_binding::{Binding, BindingConfig, Error};

/// Thing binding - publishes device gateway nodes onto a message bus
#[derive(Parser)]
#[command(name = "thing-binding", version, about)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device gateway address (e.g. file:///var/lib/gateway/nodes.json)
    #[arg(short, long)]
    gateway: Option<String>,

    /// Binding instance ID
    #[arg(long)]
    binding_id: Option<String>,

    /// Seconds between gateway polls
    #[arg(long)]
    poll_interval: Option<u32>,

    /// Seconds between description re-announcements
    #[arg(long)]
    td_interval: Option<u32>,

    /// Seconds an unchanged value may go unpublished
    #[arg(long)]
    republish_interval: Option<u32>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the binding until interrupted (default)
    Run,
    /// Poll the gateway once and print every node's description
    Describe,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,thing_binding=info",
        1 => "info,thing_binding=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;

    let Some(address) = config.gateway_address.clone() else {
        anyhow::bail!("no gateway address configured (use --gateway or BINDING_GATEWAY_ADDRESS)");
    };
    let gateway: Arc<dyn GatewayClient> = Arc::new(SnapshotGateway::new(&address));

    if matches!(cli.command, Some(Command::Describe)) {
        return describe(gateway.as_ref(), &config.binding_id).await;
    }

    if !config.uses_local_bus() {
        return Err(Error::Connection(format!(
            "unsupported bus address '{}'",
            config.bus_address.as_deref().unwrap_or_default()
        ))
        .into());
    }

    tracing::info!(
        binding = %config.binding_id,
        gateway = %address,
        has_credentials = config.has_credentials(),
        "starting thing binding"
    );

    let bus = Arc::new(LocalBus::new());
    spawn_bus_logger(&bus);

    let binding = Arc::new(Binding::new(
        config,
        gateway,
        Arc::clone(&bus) as Arc<dyn PubSubPort>,
    ));

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
            }
            cancel.cancel();
        }
    });

    binding.start(cancel).await?;
    Ok(())
}

/// Build the effective configuration (cli > env > toml > default)
fn load_config(cli: &Cli) -> anyhow::Result<BindingConfig> {
    let mut config =
        BindingConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    if let Some(gateway) = &cli.gateway {
        config.gateway_address = Some(gateway.clone());
    }
    if let Some(id) = &cli.binding_id {
        config.binding_id.clone_from(id);
    }
    if let Some(secs) = cli.poll_interval {
        config.poll_interval = secs;
    }
    if let Some(secs) = cli.td_interval {
        config.td_interval = secs;
    }
    if let Some(secs) = cli.republish_interval {
        config.republish_interval = secs;
    }

    config.validate()?;
    Ok(config)
}

/// Print each node's description document
async fn describe(gateway: &dyn GatewayClient, binding_id: &str) -> anyhow::Result<()> {
    let nodes = gateway.poll_nodes().await?;
    for node in &nodes {
        let td = synthesize(node).with_publisher(binding_id);
        println!("{}", serde_json::to_string_pretty(&td)?);
    }
    Ok(())
}

/// Log everything published on the in-process bus
fn spawn_bus_logger(bus: &LocalBus) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(BusMessage::Description { thing_id, device_type, doc }) => {
                    tracing::debug!(
                        thing = %thing_id,
                        %device_type,
                        bytes = doc.len(),
                        "description"
                    );
                }
                Ok(BusMessage::Event { thing_id, name, payload }) => {
                    tracing::debug!(
                        thing = %thing_id,
                        event = %name,
                        value = %String::from_utf8_lossy(&payload),
                        "event"
                    );
                }
                Ok(BusMessage::Properties { thing_id, props }) => {
                    tracing::debug!(thing = %thing_id, count = props.len(), "properties");
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "bus logger lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
