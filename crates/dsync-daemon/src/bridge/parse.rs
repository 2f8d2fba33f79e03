//! Parsers for `adb` text output

use chrono::{DateTime, Utc};
use droidsync_core::schema::FileEntry;

/// `stat -c` format used for listings: type, size, mtime (epoch seconds), name
pub const STAT_FORMAT: &str = "%F|%s|%Y|%n";

/// Serials from `adb devices` output. Only the `device` state counts;
/// `offline`, `unauthorized` and friends are not usable.
pub fn parse_devices(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            (state == "device").then(|| serial.to_string())
        })
        .collect()
}

/// One parsed `stat -c '%F|%s|%Y|%n'` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatLine {
    pub is_dir: bool,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub path: String,
}

/// Parse a single stat line. Symlinks, sockets and malformed lines yield `None`.
pub fn parse_stat_line(line: &str) -> Option<StatLine> {
    let line = line.trim_end_matches('\r');
    let mut parts = line.splitn(4, '|');
    let kind = parts.next()?;
    let size = parts.next()?.trim().parse::<u64>().ok()?;
    let mtime = parts.next()?.trim().parse::<i64>().ok()?;
    let path = parts.next()?;
    if path.is_empty() {
        return None;
    }

    let is_dir = match kind {
        "directory" => true,
        "regular file" | "regular empty file" => false,
        _ => return None,
    };

    Some(StatLine {
        is_dir,
        size: if is_dir { 0 } else { size },
        modified: DateTime::<Utc>::from_timestamp(mtime, 0)?,
        path: path.to_string(),
    })
}

/// Turn `find ... -exec stat` output into entries relative to `root`.
pub fn parse_listing(output: &str, root: &str) -> Vec<FileEntry> {
    let prefix = if root == "/" {
        "/".to_string()
    } else {
        format!("{}/", root.trim_end_matches('/'))
    };

    let mut entries: Vec<FileEntry> = output
        .lines()
        .filter_map(parse_stat_line)
        .filter_map(|stat| {
            let relative = stat.path.strip_prefix(&prefix)?.trim_matches('/');
            if relative.is_empty() {
                return None;
            }
            Some(FileEntry {
                relative_path: relative.to_string(),
                size: stat.size,
                modified: stat.modified,
                is_dir: stat.is_dir,
            })
        })
        .collect();
    entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    entries
}

/// Quote one argument for the device shell.
pub fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// How a failed command's stderr should be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StderrKind {
    /// Device or server unusable
    Unavailable,
    /// Path missing on the device
    MissingPath,
    Other,
}

pub fn classify_stderr(stderr: &str) -> StderrKind {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("no devices/emulators found")
        || lower.contains("device offline")
        || lower.contains("device unauthorized")
        || (lower.contains("device '") && lower.contains("not found"))
        || lower.contains("cannot connect to daemon")
        || lower.contains("daemon not running")
    {
        StderrKind::Unavailable
    } else if lower.contains("no such file or directory") {
        StderrKind::MissingPath
    } else {
        StderrKind::Other
    }
}

/// Whether a "No such file or directory" message is about `path` itself
/// rather than something below it.
///
/// Matches both `find: '/x': ...` and `find: /x: ...` forms.
pub fn names_missing_path(stderr: &str, path: &str) -> bool {
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    let quoted = format!("'{path}'");
    let bare = format!("{path}:");
    stderr.lines().any(|line| {
        line.to_ascii_lowercase().contains("no such file or directory")
            && (line.contains(&quoted) || line.contains(&bare))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_devices_only_counts_ready_devices() {
        let output = "List of devices attached\n\
                      emulator-5554\tdevice\n\
                      R58M123ABC\tunauthorized\n\
                      0123456789\toffline\n\
                      192.168.1.20:5555\tdevice product:x model:Pixel_7\n\
                      \n";
        assert_eq!(
            parse_devices(output),
            vec!["emulator-5554".to_string(), "192.168.1.20:5555".to_string()]
        );
    }

    #[test]
    fn test_parse_devices_empty() {
        assert!(parse_devices("List of devices attached\n\n").is_empty());
        assert!(parse_devices("* daemon started successfully\nList of devices attached\n").is_empty());
    }

    #[test]
    fn test_parse_stat_line_variants() {
        let dir = parse_stat_line("directory|4096|1710000000|/sdcard/Docs/a").unwrap();
        assert!(dir.is_dir);
        assert_eq!(dir.size, 0);

        let file = parse_stat_line("regular file|12|1710000000|/sdcard/Docs/a|b.txt").unwrap();
        assert_eq!(file.path, "/sdcard/Docs/a|b.txt");
        assert_eq!(file.size, 12);
        assert_eq!(file.modified.timestamp(), 1_710_000_000);

        assert!(parse_stat_line("regular empty file|0|1710000000|/sdcard/e").is_some());
        assert!(parse_stat_line("symbolic link|8|1710000000|/sdcard/l").is_none());
        assert!(parse_stat_line("garbage").is_none());
    }

    #[test]
    fn test_parse_listing_relative_to_root() {
        let output = "directory|4096|1710000000|/sdcard/Docs/sub\r\n\
                      regular file|3|1710000001|/sdcard/Docs/sub/x.txt\n\
                      regular file|5|1710000002|/sdcard/Docs/top.md\n";
        let entries = parse_listing(output, "/sdcard/Docs/");
        let paths: Vec<&str> = entries.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["sub", "sub/x.txt", "top.md"]);
        assert!(entries[0].is_dir);
        assert_eq!(entries[2].size, 5);
    }

    #[test]
    fn test_names_missing_path_only_for_the_path_itself() {
        assert!(names_missing_path(
            "find: '/sdcard/Docs': No such file or directory",
            "/sdcard/Docs/"
        ));
        assert!(names_missing_path(
            "find: /sdcard/Docs: No such file or directory",
            "/sdcard/Docs"
        ));
        // A file that vanished during the walk
        assert!(!names_missing_path(
            "find: '/sdcard/Docs/gone.tmp': No such file or directory",
            "/sdcard/Docs"
        ));
        assert!(!names_missing_path(
            "find: /sdcard/Docs/Android/data: Permission denied",
            "/sdcard/Docs"
        ));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/sdcard/My Docs"), "'/sdcard/My Docs'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_classify_stderr() {
        assert_eq!(
            classify_stderr("adb: device 'abc' not found"),
            StderrKind::Unavailable
        );
        assert_eq!(classify_stderr("error: device offline"), StderrKind::Unavailable);
        assert_eq!(
            classify_stderr("find: '/sdcard/x': No such file or directory"),
            StderrKind::MissingPath
        );
        assert_eq!(classify_stderr("Permission denied"), StderrKind::Other);
    }
}
