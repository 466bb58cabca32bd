//! Restricted-environment diagnostics.
//!
//! Consulted only after a backup attempt has already failed, to turn a
//! bare I/O error into something the user can act on.

use std::io;
use std::path::Path;

use crate::util::is_writable;

/// Snap interface that grants write access to `/etc/resolv.conf`.
const SNAP_RESOLV_CONF_PLUG: &str = "etc-resolv-conf";

/// Explains why the runtime environment may forbid editing the resolver file.
pub trait EnvironmentProbe: Send + Sync {
    /// Returns a remediation hint if the environment is known to block
    /// writes to `resolv_conf`, or `None` if nothing specific applies.
    ///
    /// Must not have side effects.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment could not be inspected.
    fn restriction_hint(&self, resolv_conf: &Path) -> io::Result<Option<String>>;
}

/// Detects snap confinement without the `etc-resolv-conf` plug connected.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapEnvironment;

impl EnvironmentProbe for SnapEnvironment {
    fn restriction_hint(&self, resolv_conf: &Path) -> io::Result<Option<String>> {
        let Some(snap_name) = snap_name() else {
            return Ok(None);
        };

        let dir = resolv_conf.parent().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("resolver path has no parent: {}", resolv_conf.display()),
            )
        })?;

        // The rotation renames inside the directory, so both must be writable.
        if is_writable(resolv_conf) && is_writable(dir) {
            return Ok(None);
        }

        Ok(Some(snap_hint(&snap_name)))
    }
}

/// Returns the snap name if running inside a snap.
fn snap_name() -> Option<String> {
    std::env::var_os("SNAP")?;
    Some(std::env::var("SNAP_NAME").unwrap_or_else(|_| "<snap>".to_string()))
}

fn snap_hint(snap_name: &str) -> String {
    format!(
        "The snap is not allowed to modify '/etc/resolv.conf'. \
         Connect the '{SNAP_RESOLV_CONF_PLUG}' interface and try again:\n    \
         sudo snap connect {snap_name}:{SNAP_RESOLV_CONF_PLUG}"
    )
}
