use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use node_persist::band;
use node_persist::config::Config;
use node_persist::sim::{SimNode, SimRadio};
use node_persist::{FileStore, PersistenceContext, ProtocolEngine, RetainedFile, RetainedMemory};

#[derive(Parser)]
#[command(name = "node-persist")]
#[command(about = "Provision a LoRaWAN node and keep its session across sleep and power loss")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enter provisioning data on the console and store it
    Provision,
    /// Show stored provisioning data and retained state
    Status,
    /// Remove all provisioning and session data
    Wipe,
    /// List supported bands
    Bands,
    /// Run one wake cycle: resume or join, send an uplink, save, sleep
    Boot {
        /// FPort for the uplink
        #[arg(long, default_value_t = 1)]
        port: u8,
        /// Uplink payload as hex
        #[arg(long, default_value = "")]
        payload: String,
        /// Only restore state, do not join or send
        #[arg(long)]
        no_join: bool,
    },
    /// Drop retained memory, as a reset or power loss would
    PowerLoss,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config from {:?}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Bands => {
            for (i, band) in band::all().enumerate() {
                if band.sub_bands > 0 {
                    println!("{:2}  {} [{} sub-bands]", i, band, band.sub_bands);
                } else {
                    println!("{:2}  {}", i, band);
                }
            }
            return Ok(());
        }
        Command::PowerLoss => {
            RetainedFile::power_loss(&config.storage.retained)?;
            info!("Retained memory dropped");
            return Ok(());
        }
        _ => {}
    }

    let store = FileStore::open(&config.storage.durable)
        .with_context(|| format!("failed to open durable store {:?}", config.storage.durable))?;
    let retained = RetainedFile::load(&config.storage.retained);
    let mut ctx = PersistenceContext::new(store, retained);
    ctx.set_attempt_policy(config.provisioning.attempt_policy());

    match cli.command {
        Command::Provision => {
            if !ctx.provision_interactive()? {
                anyhow::bail!("provisioning data could not be stored");
            }
        }
        Command::Status => print_status(&mut ctx),
        Command::Wipe => {
            ctx.wipe()?;
            RetainedFile::power_loss(&config.storage.retained)?;
            println!("All LoRaWAN parameters wiped.");
        }
        Command::Boot {
            port,
            payload,
            no_join,
        } => {
            let payload = hex::decode(&payload).context("payload must be hex")?;
            let radio = SimRadio {
                accept_joins: config.radio.accept_joins,
            };

            let mut node: SimNode = ctx.manage(radio, !no_join)?;
            if node.is_joined() {
                let fcnt = node.send_uplink(port, &payload)?;
                println!(
                    "Uplink sent: DevAddr={:08X} FCnt={} DevNonce={}",
                    node.dev_addr().unwrap_or_default(),
                    fcnt,
                    node.dev_nonce()
                );
            } else if !no_join {
                warn!("Node did not join, nothing sent");
            }

            if !ctx.save_session(&node) {
                warn!("Nonces could not be saved to the durable store");
            }

            // Going to sleep: only retained memory is kept
            let (_, retained) = ctx.into_parts();
            retained.persist()?;
        }
        Command::Bands | Command::PowerLoss => {}
    }

    Ok(())
}

fn print_status(ctx: &mut PersistenceContext<FileStore, RetainedFile>) {
    let boot_count = ctx.retained().state().boot_count;
    if !ctx.is_provisioned() {
        println!("Not provisioned.");
        println!("Boot count: {}", boot_count);
        return;
    }

    let creds = ctx.credentials();
    println!("Band:       {}", creds.band());
    println!("Sub-band:   {}", creds.sub_band());
    println!("JoinEUI:    {:016X}", creds.join_eui());
    println!("DevEUI:     {:016X}", creds.dev_eui());
    println!("AppKey:     set");
    println!("NwkKey:     set");
    println!("Boot count: {}", boot_count);
}
