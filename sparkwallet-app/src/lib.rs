pub mod client;
pub mod clipboard;
pub mod commands;
pub mod controller;
pub mod error;
pub mod navigation;
pub mod pollers;
pub mod state;
pub mod storage;
pub mod vault;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use client::{EsploraDepositLookup, HttpWalletConnector, Network};
use clipboard::ClipboardService;
use commands::{execute, render, Command, Outcome};
use controller::WalletController;
use state::AppState;
use storage::{init_data_dir, load_settings, AppSettings};
use vault::{CredentialVault, FileStore, KeyValueStore, MemoryStore};

#[derive(Parser, Debug)]
#[command(name = "sparkwallet", author, version, about)]
pub struct Cli {
    /// Directory holding settings.json and the saved wallet
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// JSON-RPC endpoint of the wallet SDK bridge
    #[arg(long)]
    endpoint: Option<String>,

    /// Esplora API base URL used to find deposits
    #[arg(long)]
    esplora_url: Option<String>,

    /// Spark network (MAINNET, TESTNET, SIGNET, REGTEST, LOCAL)
    #[arg(long)]
    network: Option<Network>,

    /// Keep the wallet in memory only; nothing is written to disk
    #[arg(long)]
    ephemeral: bool,
}

impl Cli {
    fn apply(&self, settings: &mut AppSettings) {
        if let Some(endpoint) = &self.endpoint {
            settings.sdk_endpoint = endpoint.clone();
        }
        if let Some(url) = &self.esplora_url {
            settings.esplora_url = url.clone();
        }
        if let Some(network) = self.network {
            settings.network = network;
        }
    }
}

pub fn run() {
    // Logs go to stderr so they don't interleave with the rendered screens
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sparkwallet_app_lib=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run_shell(cli)) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run_shell(cli: Cli) -> anyhow::Result<()> {
    let data_dir = init_data_dir(cli.data_dir.as_deref())?;

    let mut settings = load_settings(&data_dir).unwrap_or_else(|e| {
        warn!("Ignoring unreadable settings: {}", e);
        AppSettings::default()
    });
    cli.apply(&mut settings);

    info!("Starting SparkWallet ({})", settings.network);
    info!("Data directory: {:?}", data_dir);
    info!("SDK bridge: {}", settings.sdk_endpoint);

    let connector = Arc::new(HttpWalletConnector::new(
        &settings.sdk_endpoint,
        settings.request_timeout(),
    )?);
    let deposits = Arc::new(EsploraDepositLookup::new(
        &settings.esplora_url,
        settings.request_timeout(),
    )?);
    let store: Arc<dyn KeyValueStore> = if cli.ephemeral {
        info!("Ephemeral mode: the wallet will not be saved");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FileStore::open(&data_dir)?)
    };

    let mut controller = WalletController::new(
        settings,
        connector,
        deposits,
        CredentialVault::new(store),
        ClipboardService::system(),
    );

    // Failures are already on the state and shown with the first screen
    let _ = controller.startup().await;
    print_screen(controller.state());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }

                match line.parse::<Command>() {
                    Ok(command) => match execute(&mut controller, command).await {
                        Ok(Outcome::Quit) => break,
                        Ok(Outcome::Print(text)) => println!("{}", text),
                        Ok(Outcome::Continue) | Err(_) => print_screen(controller.state()),
                    },
                    Err(e) => println!("{}", e),
                }
            }
            Some(event) = controller.next_event() => {
                if controller.handle_event(event).await {
                    print_screen(controller.state());
                }
            }
        }
    }

    controller.shutdown();
    info!("SparkWallet stopped");
    Ok(())
}

fn print_screen(state: &AppState) {
    println!("{}", render(state));
}
