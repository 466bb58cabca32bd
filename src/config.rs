//! Manager configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DnsError, Result};

/// Default system resolver file.
pub const DEFAULT_RESOLV_CONF: &str = "/etc/resolv.conf";

/// Default backup location. Lives next to the resolver file so the
/// rotation stays a single rename on one volume.
pub const DEFAULT_BACKUP: &str = "/etc/resolv.conf.vpnsave";

/// Default quiet interval before reasserting after an external edit.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

/// Configuration for a [`DnsManager`](crate::DnsManager).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use resolvconf_guard::DnsManagerConfig;
///
/// let config = DnsManagerConfig::new()
///     .with_paths("/tmp/resolv.conf", "/tmp/resolv.conf.vpnsave")
///     .with_debounce(Duration::from_millis(200));
///
/// assert_eq!(config.debounce, Duration::from_millis(200));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct DnsManagerConfig {
    /// The live resolver file consulted by the OS.
    pub resolv_conf_path: PathBuf,

    /// Where the original content is parked during an override session.
    pub backup_path: PathBuf,

    /// Quiet interval used to coalesce bursts of external edits.
    pub debounce: Duration,

    /// Name written into the autogenerated header.
    pub generator: String,
}

impl DnsManagerConfig {
    /// Creates a config targeting `/etc/resolv.conf`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolv_conf_path: PathBuf::from(DEFAULT_RESOLV_CONF),
            backup_path: PathBuf::from(DEFAULT_BACKUP),
            debounce: DEFAULT_DEBOUNCE,
            generator: default_generator(),
        }
    }

    /// Overrides both file locations (useful for testing).
    #[must_use]
    pub fn with_paths(mut self, resolv_conf: impl Into<PathBuf>, backup: impl Into<PathBuf>) -> Self {
        self.resolv_conf_path = resolv_conf.into();
        self.backup_path = backup.into();
        self
    }

    /// Overrides the debounce interval.
    #[must_use]
    pub const fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Overrides the header generator name.
    #[must_use]
    pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
        self.generator = generator.into();
        self
    }

    /// Checks that the config can drive a rotation.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::InvalidConfig`] if both paths are the same or
    /// the debounce interval is zero.
    pub fn validate(&self) -> Result<()> {
        if self.resolv_conf_path == self.backup_path {
            return Err(DnsError::InvalidConfig(format!(
                "backup path must differ from resolver path ({})",
                self.backup_path.display()
            )));
        }
        if self.debounce.is_zero() {
            return Err(DnsError::InvalidConfig("debounce must be non-zero".into()));
        }
        Ok(())
    }
}

impl Default for DnsManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_generator() -> String {
    std::env::args()
        .next()
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}
