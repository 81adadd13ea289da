use std::error::Error;

use clap::{Parser, Subcommand, ValueEnum};
use rand::Rng;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use btc_peer::wire::Command;
use btc_peer::{Config, Network, Session};

#[derive(Parser)]
#[command(name = "btc-peer")]
struct Cli {
    /// Peer to connect to, as host or host:port.
    #[arg(long)]
    node: String,

    /// Network to speak; selects magic bytes and the default port.
    #[arg(long, value_enum, default_value = "mainnet")]
    network: NetworkArg,

    /// User agent advertised in our version message.
    #[arg(long, default_value = "/btc-peer:0.1.0/")]
    user_agent: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, handshake, then log every dispatched message until the
    /// connection closes.
    Watch,
    /// Send a random-nonce ping and wait for the matching pong.
    Ping,
}

#[derive(Clone, Copy, ValueEnum)]
enum NetworkArg {
    Mainnet,
    Testnet,
}

impl From<NetworkArg> for Network {
    fn from(arg: NetworkArg) -> Self {
        match arg {
            NetworkArg::Mainnet => Network::Mainnet,
            NetworkArg::Testnet => Network::Testnet,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let network = Network::from(cli.network);

    let node = if cli.node.contains(':') {
        cli.node.clone()
    } else {
        format!("{}:{}", cli.node, network.default_port())
    };

    let mut config = Config::new(network);
    config.user_agent = cli.user_agent.clone();

    let mut session = Session::connect(&node, config)?;
    session.wait_established()?;

    match cli.command {
        Commands::Watch => watch(&mut session),
        Commands::Ping => ping(&mut session),
    }
}

fn watch(session: &mut Session) -> Result<(), Box<dyn Error>> {
    let reason = session.run(|command, payload| {
        info!(command = %command, len = payload.len(), "message");

        match command {
            // full objects arriving after our inv-triggered getdata
            Command::Tx => debug!(tx = %hex::encode(payload), "transaction bytes"),
            Command::Block => debug!(header = %hex::encode(&payload[..payload.len().min(80)]), "block header bytes"),
            _ => {}
        }
    });

    info!(%reason, "connection closed");
    Ok(())
}

fn ping(session: &mut Session) -> Result<(), Box<dyn Error>> {
    let nonce: u64 = rand::thread_rng().gen();
    session.send(Command::Ping, &nonce.to_le_bytes())?;
    info!(nonce, "ping sent");

    loop {
        let (command, payload) = session.recv()?;

        if command == Command::Pong && payload.len() >= 8 {
            let returned = u64::from_le_bytes(payload[..8].try_into()?);
            if returned == nonce {
                info!(nonce, "matching pong received");
                return Ok(());
            }
        }

        debug!(command = %command, len = payload.len(), "ignored while waiting for pong");
    }
}
