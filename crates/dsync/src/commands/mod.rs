//! CLI command dispatch and execution

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod devices;
mod pipeline;
mod plugins;
mod sync;

/// dsync - sync folders between this machine and Android devices
#[derive(Parser, Debug)]
#[command(
    name = "dsync",
    version,
    about = "Sync folders between this machine and Android devices",
    long_about = "Manage sync pipelines and run them against devices reachable through adb"
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to the adb executable
    #[arg(long, global = true, value_name = "PATH")]
    adb: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List connected devices
    Devices(devices::DevicesArgs),

    /// Manage pipelines
    #[command(subcommand)]
    Pipeline(pipeline::PipelineCommand),

    /// Run or preview one pipeline
    Sync(sync::SyncArgs),

    /// List available plugins
    Plugins(plugins::PluginsArgs),
}

/// Options shared by every command
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub adb: Option<String>,
}

impl Cli {
    /// Logs go to stderr so `--json` output stays clean. Quiet unless asked.
    pub fn init_logging(&self) {
        if self.verbose {
            droidsync_core::logging::init_with_level(tracing::Level::DEBUG);
        } else if std::env::var_os("DROIDSYNC_LOG").is_some() {
            droidsync_core::logging::init();
        } else {
            droidsync_core::logging::init_with_level(tracing::Level::WARN);
        }
    }

    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let global = GlobalArgs {
            config: self.config,
            adb: self.adb,
        };
        match self.command {
            Commands::Devices(args) => devices::execute(&global, args).await,
            Commands::Pipeline(command) => pipeline::execute(&global, command),
            Commands::Sync(args) => sync::execute(&global, args).await,
            Commands::Plugins(args) => plugins::execute(&global, args),
        }
    }
}
