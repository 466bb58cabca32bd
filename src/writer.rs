//! Override content generation and commit.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{DnsError, Result};
use crate::settings::ManualDnsSettings;

/// Permissions for a freshly created resolver file.
const RESOLV_CONF_MODE: u32 = 0o644;

/// Writes override content to the live resolver path.
#[derive(Debug, Clone)]
pub struct OverrideWriter {
    path: PathBuf,
    generator: String,
}

impl OverrideWriter {
    /// Creates a writer for `path`; `generator` is named in the header.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, generator: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            generator: generator.into(),
        }
    }

    /// Returns the target path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates or truncates the live file, writes the override and syncs it.
    ///
    /// Writing the same settings twice produces identical bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::WriteFailed`] on any I/O failure.
    pub fn write_override(&self, settings: &ManualDnsSettings) -> Result<()> {
        let content = generate_file_content(&self.generator, settings);
        self.commit(content.as_bytes())
            .map_err(|source| DnsError::WriteFailed {
                path: self.path.clone(),
                source,
            })?;

        tracing::debug!(
            path = %self.path.display(),
            servers = settings.servers.len(),
            "Wrote DNS override"
        );
        Ok(())
    }

    fn commit(&self, content: &[u8]) -> std::io::Result<()> {
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(RESOLV_CONF_MODE)
            .open(&self.path)?;
        file.write_all(content)?;
        file.sync_all()
    }
}

/// Generates resolver file content.
///
/// ```text
/// # resolv.conf autogenerated by 'vpnd'
///
/// nameserver 10.0.0.1
/// nameserver 10.0.0.2
/// ```
fn generate_file_content(generator: &str, settings: &ManualDnsSettings) -> String {
    let mut content = format!("# resolv.conf autogenerated by '{generator}'\n\n");
    for server in &settings.servers {
        content.push_str("nameserver ");
        content.push_str(&server.to_string());
        content.push('\n');
    }
    content
}
