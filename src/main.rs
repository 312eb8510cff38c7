//! instance-init-rs - A safe Rust implementation of a boot-time instance
//! provisioning agent
//!
//! On boot the agent fetches instance metadata, applies the configured
//! plugins (skipping those already done on earlier boots), and finishes
//! with a reboot when a plugin asked for one or an orderly exit otherwise.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use instance_init_rs::config;
use instance_init_rs::engine::{ConfigStatusStore, InitManager, PluginStatusStore};
use instance_init_rs::metadata;
use instance_init_rs::osutils::{AgentPaths, LinuxOsUtils};
use instance_init_rs::plugins::{self, PluginStatus};

#[derive(Parser)]
#[command(name = "instance-init-rs")]
#[command(author, version, about = "Safe Rust boot-time provisioning agent", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to the agent config file
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one provisioning pass (the default)
    Run,
    /// Show the recorded status of each configured plugin
    Status,
    /// Force a plugin to execute again on the next boot
    Reset {
        /// Plugin name (e.g., ChefBootstrapPlugin)
        plugin: String,
    },
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = config::load(cli.config.as_deref())
        .await
        .context("loading agent config")?;

    let paths = AgentPaths::with_base(&config.state_dir);
    let osutils = Arc::new(LinuxOsUtils::new(paths.clone()));
    let status: Arc<dyn PluginStatusStore> = Arc::new(ConfigStatusStore::new(osutils.clone()));

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            info!("Starting provisioning run");

            let service = metadata::detect_service(&config)
                .await
                .context("resolving metadata service")?;
            let plugins = plugins::load_plugins(&config.plugins, &paths);

            let manager = InitManager::new(osutils, status);
            manager
                .run(service.as_ref(), &plugins)
                .await
                .context("provisioning run failed")?;
        }
        Commands::Status => {
            for name in &config.plugins {
                let recorded = status
                    .get(name)
                    .await
                    .with_context(|| format!("reading status of '{name}'"))?;
                match recorded {
                    Some(value) => println!("{name}: {value}"),
                    None => println!("{name}: not-run"),
                }
            }
        }
        Commands::Reset { plugin } => {
            status
                .set(&plugin, PluginStatus::ExecuteOnNextBoot)
                .await
                .with_context(|| format!("resetting status of '{plugin}'"))?;
            println!("{plugin}: will execute on next boot");
        }
    }

    Ok(())
}
