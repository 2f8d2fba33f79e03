//! `adb` process bridge

use super::error::{BridgeError, Result};
use super::parse::{
    STAT_FORMAT, StderrKind, classify_stderr, names_missing_path, parse_devices, parse_listing,
    parse_stat_line, shell_quote,
};
use super::transport::Bridge;
use async_trait::async_trait;
use droidsync_core::config::BridgeConfig;
use droidsync_core::schema::FileEntry;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{trace, warn};

/// Bridge backed by the `adb` executable.
#[derive(Debug, Clone)]
pub struct AdbBridge {
    adb_path: String,
    command_timeout: Duration,
    list_timeout: Duration,
    transfer_timeout: Duration,
}

/// Captured output of one invocation
struct Captured {
    command_line: String,
    success: bool,
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl Captured {
    fn failed(&self) -> BridgeError {
        BridgeError::CommandFailed {
            command: self.command_line.clone(),
            code: self.code,
            stderr: self.stderr.trim().to_string(),
        }
    }
}

impl AdbBridge {
    pub fn new(adb_path: impl Into<String>, config: &BridgeConfig) -> Self {
        Self {
            adb_path: adb_path.into(),
            command_timeout: Duration::from_secs(config.command_timeout_secs.max(1)),
            list_timeout: Duration::from_secs(config.list_timeout_secs.max(1)),
            transfer_timeout: Duration::from_secs(config.transfer_timeout_secs.max(1)),
        }
    }

    /// Run `adb <args>` and capture its output whatever the exit status.
    ///
    /// Only failures to start or finish the process are errors here.
    async fn exec(&self, args: &[&str], timeout: Duration) -> Result<Captured> {
        let command_line = format!("{} {}", self.adb_path, args.join(" "));
        trace!("Running {}", command_line);

        let child = Command::new(&self.adb_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BridgeError::unavailable(format!("failed to start {}: {e}", self.adb_path))
            })?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(BridgeError::unavailable(format!(
                    "failed waiting for {command_line}: {e}"
                )));
            }
            Err(_) => {
                return Err(BridgeError::unavailable(format!(
                    "{command_line} timed out after {timeout:?}"
                )));
            }
        };

        Ok(Captured {
            command_line,
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run `adb <args>` and classify failures.
    ///
    /// `missing_path` names the device path the command refers to, so a
    /// "No such file" failure can be reported as `RemotePath`.
    async fn run(
        &self,
        args: &[&str],
        timeout: Duration,
        missing_path: Option<&str>,
    ) -> Result<Captured> {
        let out = self.exec(args, timeout).await?;
        if out.success {
            return Ok(out);
        }

        // Some adb builds report device shell errors on stdout
        let combined = format!("{}\n{}", out.stderr, out.stdout);
        match (classify_stderr(&combined), missing_path) {
            (StderrKind::Unavailable, _) => {
                Err(BridgeError::unavailable(out.stderr.trim().to_string()))
            }
            (StderrKind::MissingPath, Some(path)) => Err(missing(path)),
            _ => Err(out.failed()),
        }
    }

    async fn shell(
        &self,
        serial: &str,
        script: &str,
        timeout: Duration,
        missing_path: Option<&str>,
    ) -> Result<Captured> {
        self.run(&["-s", serial, "shell", script], timeout, missing_path)
            .await
    }
}

fn missing(path: &str) -> BridgeError {
    BridgeError::RemotePath {
        path: path.to_string(),
        message: "No such file or directory".to_string(),
    }
}

#[async_trait]
impl Bridge for AdbBridge {
    async fn list_devices(&self) -> Result<Vec<String>> {
        let out = self.run(&["devices"], self.command_timeout, None).await?;
        Ok(parse_devices(&out.stdout))
    }

    async fn list_remote(&self, serial: &str, root: &str) -> Result<Vec<FileEntry>> {
        // -H: /sdcard itself is a symlink on most devices
        let script = format!(
            "find -H {} -mindepth 1 -exec stat -c {} {{}} +",
            shell_quote(root),
            shell_quote(STAT_FORMAT)
        );
        let out = self
            .exec(&["-s", serial, "shell", script.as_str()], self.list_timeout)
            .await?;
        if out.success {
            return Ok(parse_listing(&out.stdout, root));
        }

        let combined = format!("{}\n{}", out.stderr, out.stdout);
        if classify_stderr(&combined) == StderrKind::Unavailable {
            return Err(BridgeError::unavailable(out.stderr.trim().to_string()));
        }
        if names_missing_path(&combined, root) {
            return Err(missing(root));
        }

        // Unreadable subfolders or files vanishing mid-walk fail the command
        // but leave the rest of the listing intact
        let entries = parse_listing(&out.stdout, root);
        if entries.is_empty() {
            return Err(out.failed());
        }
        warn!(
            "Partial listing of {} on {}: {}",
            root,
            serial,
            out.stderr.trim()
        );
        Ok(entries)
    }

    async fn stat_remote(&self, serial: &str, path: &str) -> Result<Option<FileEntry>> {
        let script = format!("stat -c {} {}", shell_quote(STAT_FORMAT), shell_quote(path));
        match self
            .shell(serial, &script, self.command_timeout, Some(path))
            .await
        {
            Ok(out) => Ok(out.stdout.lines().find_map(parse_stat_line).map(|stat| {
                FileEntry {
                    relative_path: path.to_string(),
                    size: stat.size,
                    modified: stat.modified,
                    is_dir: stat.is_dir,
                }
            })),
            Err(BridgeError::RemotePath { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn mkdirs(&self, serial: &str, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let quoted: Vec<String> = paths.iter().map(|p| shell_quote(p)).collect();
        let script = format!("mkdir -p {}", quoted.join(" "));
        self.shell(serial, &script, self.command_timeout, None)
            .await?;
        Ok(())
    }

    async fn push(&self, serial: &str, local: &Path, remote: &str) -> Result<()> {
        tokio::fs::metadata(local)
            .await
            .map_err(|e| BridgeError::local(local, e))?;
        let local_str = local.to_string_lossy().into_owned();
        self.run(
            &["-s", serial, "push", local_str.as_str(), remote],
            self.transfer_timeout,
            None,
        )
        .await?;
        Ok(())
    }

    async fn pull(&self, serial: &str, remote: &str, local: &Path) -> Result<()> {
        let local_str = local.to_string_lossy().into_owned();
        self.run(
            &["-s", serial, "pull", "-a", remote, local_str.as_str()],
            self.transfer_timeout,
            Some(remote),
        )
        .await?;
        Ok(())
    }

    async fn remove_remote(&self, serial: &str, path: &str) -> Result<()> {
        let script = format!("rm -rf {}", shell_quote(path));
        self.shell(serial, &script, self.command_timeout, Some(path))
            .await?;
        Ok(())
    }
}
