//! Errors produced while talking to the tmux binary

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Fragments of stderr that mean "there is no tmux server to talk to"
const NO_SERVER_HINTS: &[&str] = &[
    "failed to connect to server",
    "no server running",
    "error connecting to",
];

#[derive(Debug, Error)]
pub enum TmuxError {
    #[error("tmux not found in PATH (install tmux >= 3.1)")]
    NotFound,

    #[error("tmux binary {0} does not exist")]
    MissingBinary(PathBuf),

    #[error("failed to run tmux {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("tmux {command} timed out after {}ms", timeout.as_millis())]
    Timeout { command: String, timeout: Duration },

    #[error("tmux {command} failed: {stderr}")]
    Failed {
        command: String,
        stderr: String,
        status: Option<i32>,
    },

    #[error("{command}: malformed line {line:?}")]
    Malformed { command: &'static str, line: String },

    #[error("invalid {field} {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("{0} id cannot be empty")]
    EmptyId(&'static str),
}

impl TmuxError {
    /// Whether this error only says that no tmux server is running
    pub fn is_no_server(&self) -> bool {
        let text = match self {
            TmuxError::Failed { stderr, .. } => stderr.to_lowercase(),
            other => other.to_string().to_lowercase(),
        };
        NO_SERVER_HINTS.iter().any(|hint| text.contains(hint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stderr: &str) -> TmuxError {
        TmuxError::Failed {
            command: "list-sessions".into(),
            stderr: stderr.into(),
            status: Some(1),
        }
    }

    #[test]
    fn test_no_server_detection() {
        assert!(failed("no server running on /tmp/tmux-1000/default").is_no_server());
        let missing = "error connecting to /tmp/tmux-1000/default (No such file or directory)";
        assert!(failed(missing).is_no_server());
        assert!(failed("Failed to connect to server").is_no_server());
        assert!(!failed("can't find session: $9").is_no_server());
        assert!(!TmuxError::NotFound.is_no_server());
    }
}
