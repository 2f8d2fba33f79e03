//! Devices command implementation - list connected devices

use anyhow::{Context, Result};
use clap::Args;

use super::GlobalArgs;
use crate::util::context::CliContext;

/// List connected devices
#[derive(Args, Debug)]
pub struct DevicesArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the devices command
pub async fn execute(global: &GlobalArgs, args: DevicesArgs) -> Result<()> {
    let ctx = CliContext::load(global)?;
    let serials = ctx
        .client()
        .list_devices()
        .await
        .context("Cannot list devices")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&serials)?);
        return Ok(());
    }

    if serials.is_empty() {
        println!("No devices connected");
    } else {
        for serial in serials {
            println!("{serial}");
        }
    }
    Ok(())
}
