use std::io;
use std::path::PathBuf;

/// Errors produced by the update pipeline.
#[derive(Debug, thiserror::Error)]
pub enum UpdaterError {
    /// Channel name outside the fixed set; fatal before any file I/O.
    #[error("unknown update channel \"{name}\" (expected stable, main, unstable or test)")]
    UnknownChannel { name: String },

    /// A required CLI argument was not supplied.
    #[error("missing required argument: {0}")]
    MissingInput(&'static str),

    /// Payload or artifact root missing; fatal for that unit of work only.
    #[error("{what} not found at {}", path.display())]
    ResourceNotFound { what: &'static str, path: PathBuf },

    /// File replacement failed. Reported, never retried past the attempt budget.
    #[error("install failed: {reason}")]
    Install { reason: String },

    /// The relaunch spawn failed. Reported; the applied update stays in place.
    #[error("relaunch failed: {reason}")]
    Relaunch { reason: String },

    /// Update targets never became writable within the probe window.
    #[error("update targets still locked after {waited_secs}s")]
    QuiesceTimeout { waited_secs: u64 },

    #[error("{context}: {source}")]
    Io {
        context: String,
        source: io::Error,
    },
}

impl UpdaterError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_the_unrecognized_channel() {
        let err = UpdaterError::UnknownChannel {
            name: "nightly".into(),
        };
        assert!(err.to_string().contains("nightly"));
    }

    #[test]
    fn shows_the_missing_resource_path() {
        let err = UpdaterError::ResourceNotFound {
            what: "update payload",
            path: PathBuf::from("/tmp/update.zip"),
        };
        let text = err.to_string();
        assert!(text.contains("update payload"));
        assert!(text.contains("/tmp/update.zip"));
    }

    #[test]
    fn keeps_io_context_and_source() {
        let source = io::Error::new(io::ErrorKind::PermissionDenied, "locked");
        let err = UpdaterError::io("failed to write manifest", source);
        let text = err.to_string();
        assert!(text.contains("failed to write manifest"));
        assert!(text.contains("locked"));
    }

    #[test]
    fn reports_quiesce_timeout_duration() {
        let err = UpdaterError::QuiesceTimeout { waited_secs: 30 };
        assert!(err.to_string().contains("30"));
    }
}
