//! Two-slot rotation between the live resolver file and its backup.
//!
//! The backup's existence is the only record of an active override
//! session. Both directions are a single `rename`, so the live path holds
//! either the original or the override, apart from the instant between
//! moving the original out and writing the override in.

use std::path::{Path, PathBuf};

use crate::error::{DnsError, Result};

/// Owns the live/backup path pair.
#[derive(Debug, Clone)]
pub struct BackupStore {
    live: PathBuf,
    backup: PathBuf,
}

impl BackupStore {
    /// Creates a store rotating `live` into `backup`.
    #[must_use]
    pub fn new(live: impl Into<PathBuf>, backup: impl Into<PathBuf>) -> Self {
        Self {
            live: live.into(),
            backup: backup.into(),
        }
    }

    /// Returns the live resolver path.
    #[must_use]
    pub fn live_path(&self) -> &Path {
        &self.live
    }

    /// Returns the backup path.
    #[must_use]
    pub fn backup_path(&self) -> &Path {
        &self.backup
    }

    /// Returns `true` if an override session is active.
    #[must_use]
    pub fn backup_exists(&self) -> bool {
        std::fs::metadata(&self.backup).is_ok()
    }

    /// Moves the live file to the backup location.
    ///
    /// Returns `Ok(false)` without touching anything if a backup already
    /// exists and `overwrite` is `false`: the first captured original wins
    /// over content that may already be ours.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::SourceMissing`] if the live file does not exist,
    /// or [`DnsError::BackupFailed`] if the rename fails.
    pub fn create_backup(&self, overwrite: bool) -> Result<bool> {
        if let Err(source) = std::fs::metadata(&self.live) {
            return Err(DnsError::SourceMissing {
                path: self.live.clone(),
                source,
            });
        }

        if self.backup_exists() && !overwrite {
            tracing::debug!(
                backup = %self.backup.display(),
                "DNS backup already exists, keeping it"
            );
            return Ok(false);
        }

        std::fs::rename(&self.live, &self.backup)
            .map_err(|source| DnsError::BackupFailed { source })?;

        tracing::info!(
            live = %self.live.display(),
            backup = %self.backup.display(),
            "Backed up OS DNS configuration"
        );
        Ok(true)
    }

    /// Moves the backup back to the live path.
    ///
    /// Succeeds as a no-op when there is no backup.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::RestoreFailed`] if the rename fails.
    pub fn restore_backup(&self) -> Result<()> {
        if !self.backup_exists() {
            tracing::debug!(
                backup = %self.backup.display(),
                "No DNS backup, nothing to restore"
            );
            return Ok(());
        }

        std::fs::rename(&self.backup, &self.live)
            .map_err(|source| DnsError::RestoreFailed { source })?;

        tracing::info!(live = %self.live.display(), "Restored OS DNS configuration");
        Ok(())
    }
}
