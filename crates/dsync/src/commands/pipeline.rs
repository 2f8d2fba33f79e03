//! Pipeline command implementation - create, inspect and remove pipelines

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use droidsync_core::schema::{Direction, NewPipeline, Pipeline, PluginConfig};
use std::path::PathBuf;

use super::GlobalArgs;
use crate::util::context::CliContext;

#[derive(Subcommand, Debug)]
pub enum PipelineCommand {
    /// List all pipelines
    List(ListArgs),

    /// Show one pipeline as JSON
    Show(TargetArgs),

    /// Create a pipeline
    Add(AddArgs),

    /// Delete a pipeline
    Remove(TargetArgs),

    /// Turn auto-sync on or off
    Auto(AutoArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Pipeline id or name
    pipeline: String,
}

#[derive(Args, Debug)]
pub struct AutoArgs {
    /// Pipeline id or name
    pipeline: String,

    /// on or off
    #[arg(action = clap::ArgAction::Set, value_parser = clap::builder::BoolishValueParser::new())]
    enabled: bool,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Pipeline name (unique)
    name: String,

    /// Host folder
    #[arg(long, value_name = "PATH")]
    local: PathBuf,

    /// Device folder, e.g. /sdcard/DCIM/Camera
    #[arg(long, value_name = "PATH")]
    device: String,

    /// Only run against this device (default: whichever is connected)
    #[arg(long)]
    serial: Option<String>,

    /// local_to_device, device_to_local or bidirectional
    #[arg(long, default_value = "local_to_device")]
    direction: Direction,

    /// Only sync these extensions (comma separated or repeated)
    #[arg(long, value_delimiter = ',', value_name = "EXT")]
    include: Vec<String>,

    /// Never sync these extensions
    #[arg(long, value_delimiter = ',', value_name = "EXT")]
    exclude: Vec<String>,

    /// Only sync files modified within this many days
    #[arg(long, value_name = "DAYS")]
    within_days: Option<u32>,

    /// Sync automatically when the device connects
    #[arg(long)]
    auto: bool,

    /// Plugin name
    #[arg(long)]
    plugin: Option<String>,

    /// Plugin setting as KEY=VALUE; VALUE is parsed as JSON when possible
    #[arg(long = "plugin-config", value_name = "KEY=VALUE", value_parser = parse_plugin_setting)]
    plugin_config: Vec<(String, serde_json::Value)>,

    /// Output the created pipeline as JSON
    #[arg(long)]
    json: bool,
}

/// Execute a pipeline subcommand
pub fn execute(global: &GlobalArgs, command: PipelineCommand) -> Result<()> {
    let ctx = CliContext::load(global)?;
    let store = ctx.open_store()?;

    match command {
        PipelineCommand::List(args) => {
            let pipelines = store.list();
            if args.json {
                let owned: Vec<&Pipeline> = pipelines.iter().map(|p| p.as_ref()).collect();
                println!("{}", serde_json::to_string_pretty(&owned)?);
            } else if pipelines.is_empty() {
                println!("No pipelines. Create one with `dsync pipeline add`.");
            } else {
                print_table(&pipelines);
            }
        }
        PipelineCommand::Show(args) => {
            let pipeline = ctx.resolve_pipeline(&store, &args.pipeline)?;
            println!("{}", serde_json::to_string_pretty(pipeline.as_ref())?);
        }
        PipelineCommand::Add(args) => {
            let json = args.json;
            let new = new_pipeline(args)?;
            let pipeline = store.add(new)?;
            if json {
                println!("{}", serde_json::to_string_pretty(pipeline.as_ref())?);
            } else {
                println!("Created pipeline '{}' ({})", pipeline.name, pipeline.id);
            }
        }
        PipelineCommand::Remove(args) => {
            let pipeline = ctx.resolve_pipeline(&store, &args.pipeline)?;
            store.remove(pipeline.id)?;
            println!("Removed pipeline '{}'", pipeline.name);
        }
        PipelineCommand::Auto(args) => {
            let pipeline = ctx.resolve_pipeline(&store, &args.pipeline)?;
            let updated = store.set_auto_sync(pipeline.id, args.enabled)?;
            println!(
                "Auto-sync for '{}' is {}",
                updated.name,
                if updated.auto_sync { "on" } else { "off" }
            );
        }
    }
    Ok(())
}

fn new_pipeline(args: AddArgs) -> Result<NewPipeline> {
    let local_path = std::path::absolute(&args.local)
        .with_context(|| format!("Invalid local path {}", args.local.display()))?;

    let mut plugin_config = PluginConfig::new();
    for (key, value) in args.plugin_config {
        plugin_config.insert(key, value);
    }

    let mut new = NewPipeline::new(args.name, local_path, args.device);
    new.device_serial = args.serial.unwrap_or_default();
    new.direction = args.direction;
    new.include_extensions = args.include;
    new.exclude_extensions = args.exclude;
    new.modified_within_days = args.within_days;
    new.auto_sync = args.auto;
    new.plugin = args.plugin;
    new.plugin_config = plugin_config;
    Ok(new)
}

fn parse_plugin_setting(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn print_table(pipelines: &[std::sync::Arc<Pipeline>]) {
    println!(
        "{:<20} {:<16} {:<6} {:<16} {}",
        "NAME", "DIRECTION", "AUTO", "DEVICE", "PATHS"
    );
    for p in pipelines {
        let device = if p.device_serial.is_empty() {
            "any"
        } else {
            p.device_serial.as_str()
        };
        let arrow = match p.direction {
            Direction::LocalToDevice => "->",
            Direction::DeviceToLocal => "<-",
            Direction::Bidirectional => "<->",
        };
        println!(
            "{:<20} {:<16} {:<6} {:<16} {} {} {}",
            p.name,
            p.direction.to_string(),
            if p.auto_sync { "on" } else { "off" },
            device,
            p.local_path.display(),
            arrow,
            p.device_path
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plugin_setting() {
        assert_eq!(
            parse_plugin_setting("interval_days=7").unwrap(),
            ("interval_days".to_string(), serde_json::json!(7))
        );
        assert_eq!(
            parse_plugin_setting("date_format=%m-%d").unwrap(),
            ("date_format".to_string(), serde_json::json!("%m-%d"))
        );
        assert_eq!(
            parse_plugin_setting("prefer=\"local\"").unwrap().1,
            serde_json::json!("local")
        );
        assert!(parse_plugin_setting("novalue").is_err());
        assert!(parse_plugin_setting("=x").is_err());
    }
}
