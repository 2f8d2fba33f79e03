//! Sync command implementation - preview or run one pipeline

use anyhow::{Context, Result, bail};
use clap::Args;
use droidsync_core::{RunResult, RunTrigger, SyncPlan};
use droidsync_daemon::sync::SyncObserver;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::GlobalArgs;
use crate::util::context::CliContext;
use crate::util::progress::ProgressPrinter;

/// Run or preview one pipeline
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Pipeline id or name
    pipeline: String,

    /// Device serial (default: the pipeline's device, else the first connected one)
    #[arg(long)]
    serial: Option<String>,

    /// Print the plan without transferring anything
    #[arg(long)]
    dry_run: bool,

    /// Output the plan or run result as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the sync command
pub async fn execute(global: &GlobalArgs, args: SyncArgs) -> Result<()> {
    let ctx = CliContext::load(global)?;
    let store = ctx.open_store()?;
    let pipeline = ctx.resolve_pipeline(&store, &args.pipeline)?;

    let observer: Arc<dyn SyncObserver> = Arc::new(ProgressPrinter::new(args.json));
    let executor = ctx.executor(observer);

    let serial = match args.serial {
        Some(serial) => serial,
        None => executor
            .resolve_serial(&pipeline)
            .await
            .context("Cannot pick a device")?,
    };

    if args.dry_run {
        let plan = executor.preview(&pipeline, &serial).await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            print_plan(&pipeline.name, &serial, &plan);
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Ctrl+C received, cancelling after the current operation");
            cancel_on_signal.cancel();
        }
    });

    let result = executor
        .sync(Arc::clone(&pipeline), &serial, RunTrigger::Manual, &cancel)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&pipeline.name, &result);
    }

    if !result.is_success() {
        bail!(
            "sync of '{}' did not complete: {} of {} operations failed",
            pipeline.name,
            result.operations_failed,
            result.operations_attempted
        );
    }
    Ok(())
}

fn print_plan(name: &str, serial: &str, plan: &SyncPlan) {
    if plan.is_noop() {
        println!("'{name}' is up to date on {serial}");
    } else {
        println!("Plan for '{name}' on {serial}:");
    }
    for op in &plan.operations {
        println!("  {op}");
    }
    let s = plan.summary;
    println!(
        "{} mkdir, {} push, {} pull, {} delete, {} skipped",
        s.mkdirs, s.pushes, s.pulls, s.deletes, s.skips
    );
}

fn print_summary(name: &str, result: &RunResult) {
    let elapsed = result.finished_at - result.started_at;
    println!(
        "'{}': {} ({} ms)",
        name,
        result.stats(),
        elapsed.num_milliseconds()
    );
    for (op, reason) in result.failures() {
        println!("  failed: {op}: {reason}");
    }
}
