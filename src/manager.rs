//! DNS override controller.
//!
//! Composes the backup rotation, the override writer and the change
//! monitor behind the operations the connection lifecycle calls.

use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::backup::BackupStore;
use crate::config::DnsManagerConfig;
use crate::environment::{EnvironmentProbe, SnapEnvironment};
use crate::error::{DnsError, Result};
use crate::monitor::{ChangeMonitor, MonitorSession, MonitorState};
use crate::settings::ManualDnsSettings;
use crate::writer::OverrideWriter;

/// Forces DNS through the tunnel by overriding the resolver file.
///
/// # Lifecycle
///
/// 1. [`initialize`](Self::initialize) at daemon start undoes any override
///    left behind by a crash.
/// 2. [`set_manual`](Self::set_manual) backs up the original, writes the
///    override and starts defending it against external edits.
/// 3. [`delete_manual`](Self::delete_manual) stops the defence and puts the
///    original back.
///
/// Every operation stops the running monitor before touching the files,
/// and all operations are serialized by an internal lock that the monitor
/// also takes before reasserting. There is never more than one writer.
///
/// # Example
///
/// ```rust,ignore
/// use resolvconf_guard::{DnsManager, DnsManagerConfig, ManualDnsSettings};
///
/// let dns = DnsManager::new(DnsManagerConfig::new(), tokio::runtime::Handle::current())?;
/// dns.initialize()?;
/// dns.set_manual(&ManualDnsSettings::new(["10.64.0.1".parse()?]))?;
/// // ...
/// dns.delete_manual()?;
/// ```
pub struct DnsManager {
    inner: Arc<Inner>,
    runtime: Handle,
}

struct Inner {
    config: DnsManagerConfig,
    store: BackupStore,
    writer: OverrideWriter,
    probe: Box<dyn EnvironmentProbe>,
    session: Mutex<Option<MonitorSession>>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Option<MonitorSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Recreates a vanished backup and rewrites the override.
    fn reassert(&self, settings: &ManualDnsSettings) -> Result<()> {
        if !self.store.backup_exists() {
            if let Err(e) = self.store.create_backup(false) {
                tracing::warn!(error = %e, "Failed to re-create DNS backup");
            }
        }
        self.writer.write_override(settings)
    }

    /// Replaces a backup failure with a remediation hint when the
    /// environment explains it.
    fn diagnose(&self, err: DnsError) -> DnsError {
        match self.probe.restriction_hint(self.store.live_path()) {
            Ok(Some(hint)) => DnsError::EnvironmentRestricted {
                source: Box::new(err),
                hint,
            },
            Ok(None) => err,
            Err(e) => {
                tracing::error!(error = %e, "Failed to inspect runtime environment");
                err
            }
        }
    }
}

fn stop_monitoring(session: &mut Option<MonitorSession>) {
    if let Some(session) = session.take() {
        session.stop();
    }
}

impl DnsManager {
    /// Creates a manager that spawns its monitor on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::InvalidConfig`] if the config fails validation.
    pub fn new(config: DnsManagerConfig, runtime: Handle) -> Result<Self> {
        Self::with_probe(config, runtime, SnapEnvironment)
    }

    /// Creates a manager with a custom environment probe.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::InvalidConfig`] if the config fails validation.
    pub fn with_probe(
        config: DnsManagerConfig,
        runtime: Handle,
        probe: impl EnvironmentProbe + 'static,
    ) -> Result<Self> {
        config.validate()?;
        let store = BackupStore::new(&config.resolv_conf_path, &config.backup_path);
        let writer = OverrideWriter::new(&config.resolv_conf_path, &config.generator);
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                store,
                writer,
                probe: Box::new(probe),
                session: Mutex::new(None),
            }),
            runtime,
        })
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &DnsManagerConfig {
        &self.inner.config
    }

    /// Restores the original configuration if a previous run left an
    /// override behind. Call once at daemon start.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::Initialize`] wrapping the restore failure.
    pub fn initialize(&self) -> Result<()> {
        if !self.inner.store.backup_exists() {
            tracing::debug!("No DNS backup from a previous session");
            return Ok(());
        }

        tracing::info!(
            "Detected DNS configuration from the previous VPN connection. Restoring OS-default DNS values"
        );
        self.delete_manual()
            .map_err(|e| DnsError::Initialize(Box::new(e)))
    }

    /// Overrides the resolver file with `settings` and starts defending it.
    ///
    /// Empty settings restore the original instead. Returns the settings
    /// actually applied.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::SourceMissing`] or [`DnsError::BackupFailed`] if
    /// the original could not be backed up (as
    /// [`DnsError::EnvironmentRestricted`] when the environment explains
    /// why), [`DnsError::WriteFailed`] if the override could not be written
    /// (the original is moved back if this call backed it up), or
    /// [`DnsError::RestoreFailed`] for empty settings.
    pub fn set_manual(&self, settings: &ManualDnsSettings) -> Result<ManualDnsSettings> {
        let mut session = self.inner.lock();
        stop_monitoring(&mut session);

        if settings.is_empty() {
            self.inner.store.restore_backup()?;
            return Ok(ManualDnsSettings::default());
        }

        let created = match self.inner.store.create_backup(false) {
            Ok(created) => created,
            Err(e) => return Err(self.inner.diagnose(e)),
        };
        if let Err(e) = self.inner.writer.write_override(settings) {
            // Put back the original we just moved away; an older backup
            // belongs to an earlier session and stays.
            if created {
                if let Err(restore_err) = self.inner.store.restore_backup() {
                    tracing::error!(error = %restore_err, "Failed to roll back DNS backup");
                }
            }
            return Err(e);
        }

        *session = Some(self.start_monitoring(settings.clone()));
        tracing::info!(
            servers = ?settings.servers,
            path = %self.inner.store.live_path().display(),
            "Applied manual DNS"
        );
        Ok(settings.clone())
    }

    /// Stops defending the override and restores the original.
    ///
    /// A no-op if no override is active.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::RestoreFailed`] if the backup could not be moved back.
    pub fn delete_manual(&self) -> Result<()> {
        let mut session = self.inner.lock();
        stop_monitoring(&mut session);
        self.inner.store.restore_backup()
    }

    /// Restores the original while the tunnel is paused.
    ///
    /// Behaves like [`delete_manual`](Self::delete_manual); the override is
    /// not re-applied by [`resume`](Self::resume).
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::RestoreFailed`] if the backup could not be moved back.
    pub fn pause(&self, _local_interface: Option<IpAddr>) -> Result<()> {
        let mut session = self.inner.lock();
        if !self.inner.store.backup_exists() {
            tracing::debug!("No DNS override active, nothing to pause");
            return Ok(());
        }
        stop_monitoring(&mut session);
        self.inner.store.restore_backup()
    }

    /// Does nothing; see [`pause`](Self::pause).
    ///
    /// # Errors
    ///
    /// Never fails.
    #[allow(clippy::unused_self, clippy::unnecessary_wraps)]
    pub const fn resume(&self, _local_interface: Option<IpAddr>) -> Result<()> {
        Ok(())
    }

    /// Returns `true` while an override session is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.store.backup_exists()
    }

    /// Returns `true` while a monitor task is alive.
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.inner
            .lock()
            .as_ref()
            .is_some_and(|session| !session.is_finished())
    }

    /// Returns the monitor's state, or [`MonitorState::Stopped`] if none.
    #[must_use]
    pub fn monitor_state(&self) -> MonitorState {
        self.inner
            .lock()
            .as_ref()
            .map_or(MonitorState::Stopped, MonitorSession::state)
    }

    /// Returns a receiver for the current monitor's state transitions.
    #[must_use]
    pub fn subscribe_monitor(&self) -> Option<watch::Receiver<MonitorState>> {
        self.inner.lock().as_ref().map(MonitorSession::subscribe)
    }

    fn start_monitoring(&self, settings: ManualDnsSettings) -> MonitorSession {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let reassert = move |cancel_token: &CancellationToken| -> Result<bool> {
            let Some(inner) = inner.upgrade() else {
                return Ok(false);
            };
            let _session = inner.lock();
            // A controller call that stopped us may have run while we waited.
            if cancel_token.is_cancelled() {
                return Ok(false);
            }
            inner.reassert(&settings)?;
            Ok(true)
        };

        ChangeMonitor::start(
            &self.runtime,
            self.inner.store.live_path(),
            self.inner.config.debounce,
            reassert,
        )
    }
}

impl Drop for DnsManager {
    fn drop(&mut self) {
        stop_monitoring(&mut self.inner.lock());
    }
}
