//! Plugins command implementation - list registered plugins

use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::GlobalArgs;
use crate::util::context::CliContext;

/// List available plugins
#[derive(Args, Debug)]
pub struct PluginsArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the plugins command
pub fn execute(global: &GlobalArgs, args: PluginsArgs) -> Result<()> {
    let ctx = CliContext::load(global)?;
    let host = ctx.plugins();
    let registry = host.registry();

    let plugins: Vec<_> = registry
        .list()
        .into_iter()
        .filter_map(|name| registry.get(name))
        .collect();

    if args.json {
        let entries: Vec<_> = plugins
            .iter()
            .map(|p| json!({ "name": p.name, "description": p.description }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for plugin in plugins {
        println!("{:<16} {}", plugin.name, plugin.description);
    }
    Ok(())
}
