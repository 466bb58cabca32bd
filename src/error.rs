//! Error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for DNS override operations.
pub type Result<T> = std::result::Result<T, DnsError>;

/// Errors returned by DNS override operations.
#[derive(Debug, Error)]
pub enum DnsError {
    /// The live resolver file does not exist, so there is nothing to back up.
    #[error("failed to backup DNS configuration (file availability check failed): {}", .path.display())]
    SourceMissing {
        /// The live resolver path.
        path: PathBuf,
        /// The failed `stat`.
        #[source]
        source: std::io::Error,
    },

    /// Renaming the live file to the backup location failed.
    #[error("failed to backup DNS configuration: {source}")]
    BackupFailed {
        #[source]
        source: std::io::Error,
    },

    /// Writing the override content failed.
    #[error("failed to update DNS configuration at {}: {}", .path.display(), .source)]
    WriteFailed {
        /// The live resolver path.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Renaming the backup back to the live path failed.
    #[error("failed to restore DNS configuration: {source}")]
    RestoreFailed {
        #[source]
        source: std::io::Error,
    },

    /// The runtime environment forbids modifying the resolver file.
    #[error("{source}\n\n{hint}")]
    EnvironmentRestricted {
        /// The failure that triggered the diagnosis.
        source: Box<DnsError>,
        /// User-facing remediation message.
        hint: String,
    },

    /// The file watcher could not be established.
    #[error("failed to start DNS-change monitoring: {0}")]
    MonitorInitFailed(#[from] notify::Error),

    /// Crash recovery at startup failed.
    #[error("failed to restore DNS to default: {0}")]
    Initialize(#[source] Box<DnsError>),

    /// Invalid configuration values.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl DnsError {
    /// Returns `true` if the underlying I/O error is `PermissionDenied`.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::SourceMissing { source, .. }
            | Self::BackupFailed { source }
            | Self::WriteFailed { source, .. }
            | Self::RestoreFailed { source } => {
                source.kind() == std::io::ErrorKind::PermissionDenied
            }
            Self::EnvironmentRestricted { source, .. } | Self::Initialize(source) => {
                source.is_permission_denied()
            }
            Self::MonitorInitFailed(_) | Self::InvalidConfig(_) => false,
        }
    }
}
