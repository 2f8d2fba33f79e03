//! Graceful shutdown coordination for background tasks

use anyhow::Result;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Wait for each task to finish after cancellation.
///
/// Tasks still running after `shutdown_timeout` are aborted and counted as
/// timeouts; shutdown continues with the rest.
///
/// # Errors
///
/// Fails when any task panicked.
pub async fn graceful_shutdown(
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    shutdown_timeout: Duration,
) -> Result<()> {
    info!(
        "Waiting for {} task(s) to stop (timeout: {:?})",
        tasks.len(),
        shutdown_timeout
    );

    let mut success_count = 0;
    let mut timeout_count = 0;
    let mut error_count = 0;

    for (name, mut handle) in tasks {
        match timeout(shutdown_timeout, &mut handle).await {
            Ok(Ok(())) => {
                info!("Task {} stopped cleanly", name);
                success_count += 1;
            }
            Ok(Err(e)) => {
                error!("Task {} failed: {}", name, e);
                error_count += 1;
            }
            Err(_) => {
                warn!("Task {} did not stop within {:?}; aborting", name, shutdown_timeout);
                handle.abort();
                timeout_count += 1;
            }
        }
    }

    info!(
        "Shutdown complete: {} clean, {} timeout, {} error",
        success_count, timeout_count, error_count
    );

    if error_count > 0 {
        anyhow::bail!("{error_count} task(s) failed during shutdown");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_clean_and_stuck_tasks() {
        let clean = tokio::spawn(async {});
        let stuck = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        let result = graceful_shutdown(
            vec![("clean", clean), ("stuck", stuck)],
            Duration::from_millis(50),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_panicked_task_is_an_error() {
        let panicked = tokio::spawn(async { panic!("boom"); });
        let result = graceful_shutdown(vec![("panicked", panicked)], Duration::from_secs(1)).await;
        assert!(result.unwrap_err().to_string().contains("1 task(s)"));
    }
}
