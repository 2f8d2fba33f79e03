use std::path::PathBuf;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Bridge errors
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Bridge binary missing, not responding, or device gone
    #[error("bridge unavailable: {message}")]
    Unavailable { message: String },

    /// Device-side path missing or unreadable
    #[error("remote path {path}: {message}")]
    RemotePath { path: String, message: String },

    /// Host-side path missing or unreadable
    #[error("local path {}: {source}", .path.display())]
    LocalPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bridge ran but reported failure
    #[error("`{command}` failed (exit code {}): {stderr}", display_code(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "none".to_string(),
    }
}

impl BridgeError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        BridgeError::Unavailable {
            message: message.into(),
        }
    }

    pub fn local(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BridgeError::LocalPath {
            path: path.into(),
            source,
        }
    }

    /// `true` when the rest of a run cannot succeed either.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, BridgeError::Unavailable { .. })
    }
}
