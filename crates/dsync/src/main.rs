//! dsync - sync folders between this machine and Android devices
//!
//! A headless front end over the droidsync engine: list devices, manage
//! pipelines, preview and run syncs.

use clap::Parser;

mod commands;
mod util;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    cli.init_logging();

    if let Err(e) = cli.execute().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
