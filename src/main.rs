//! ntf-relay CLI - runs the relay and talks to it.
//!
//! This is the main binary entry point. See the `ntf_relay` library for
//! the core functionality.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ntf_relay::notifications::apns::{ApnsClient, TlsConnector};
use ntf_relay::notifications::gcm::GcmClient;
use ntf_relay::socket::client;
use ntf_relay::{Config, Dispatcher, Platform, RelayServer};

/// Version of this build.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runs the relay until a gateway becomes unusable.
///
/// APNs must connect before the listener is bound: without it the relay
/// refuses to start.
fn run_server(config: &Config) -> Result<()> {
    log::info!("ntf-relay v{} starting", VERSION);

    let connector = TlsConnector::new(&config.apns)?;
    let apns = ApnsClient::connect(connector).with_context(|| {
        format!(
            "NOTIFICATION ERROR: unable to connect to APNS at {}:{}",
            config.apns.host, config.apns.port
        )
    })?;
    let gcm = GcmClient::new(&config.gcm)?;

    let mut server = RelayServer::bind(
        config.bind_addr()?,
        config.protocol.clone(),
        Dispatcher::new(apns, gcm),
    )?;
    server.run()
}

/// Platform names accepted on the command line.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum PlatformArg {
    /// Apple push (APNs).
    Ios,
    /// Google push (GCM).
    Android,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Ios => Platform::Ios,
            PlatformArg::Android => Platform::Android,
        }
    }
}

// CLI
#[derive(Parser)]
#[command(name = "ntf-relay")]
#[command(version = VERSION)]
#[command(about = "Relay socket push requests to APNs and GCM")]
struct Cli {
    /// Configuration file (defaults to <config dir>/ntf-relay/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr (or set NTF_RELAY_LOG_FILE)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to APNs, bind the relay socket and serve forever
    Serve,
    /// Send one notification through a running relay
    Send {
        /// Target platform
        #[arg(long, value_enum)]
        platform: PlatformArg,
        /// Device token (64 hex characters for iOS)
        #[arg(long)]
        token: String,
        /// Alert text
        #[arg(long)]
        message: String,
    },
    /// Print the effective configuration (API key omitted)
    Config,
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();
    if let Some(path) = log_file {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create log file at {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_file = cli
        .log_file
        .clone()
        .or_else(|| std::env::var_os("NTF_RELAY_LOG_FILE").map(PathBuf::from));
    init_logging(log_file.as_ref())?;

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            if let Err(e) = run_server(&config) {
                log::error!("{e:#}");
                return Err(e);
            }
        }
        Commands::Send {
            platform,
            token,
            message,
        } => {
            client::notify(
                config.bind_addr()?,
                &config.protocol,
                platform.into(),
                &token,
                &message,
            )?;
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
