//! # resolvconf-guard
//!
//! DNS leak protection for VPN daemons on Linux.
//!
//! While a tunnel is up, the system resolver file (`/etc/resolv.conf`) is
//! replaced with one that only lists the tunnel's DNS servers. This crate
//! keeps that override in place and guarantees the original comes back:
//!
//! - the original is parked with a single `rename`, and its presence at the
//!   backup path is the only record that an override is active;
//! - a background task watches the resolver file and, after a short quiet
//!   interval, rewrites the override if another program touched it;
//! - on the next daemon start, a leftover backup means the previous run
//!   crashed, and the original is restored.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use resolvconf_guard::{DnsManager, DnsManagerConfig, ManualDnsSettings};
//!
//! let dns = DnsManager::new(DnsManagerConfig::new(), tokio::runtime::Handle::current())?;
//!
//! // Undo whatever a crashed previous run left behind.
//! dns.initialize()?;
//!
//! // Tunnel is up.
//! dns.set_manual(&ManualDnsSettings::new(["10.64.0.1".parse()?]))?;
//!
//! // Tunnel is down.
//! dns.delete_manual()?;
//! ```
//!
//! ## Permissions
//!
//! Renaming and writing under `/etc` requires root. Under snap confinement
//! the `etc-resolv-conf` interface must also be connected; failures there
//! come back as [`DnsError::EnvironmentRestricted`] with instructions.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod backup;
pub mod config;
pub mod environment;
pub mod error;
pub mod manager;
pub mod monitor;
pub mod settings;
pub mod util;
pub mod writer;

pub use backup::BackupStore;
pub use config::DnsManagerConfig;
pub use environment::{EnvironmentProbe, SnapEnvironment};
pub use error::{DnsError, Result};
pub use manager::DnsManager;
pub use monitor::{ChangeMonitor, MonitorSession, MonitorState};
pub use settings::{DnsEncryption, ManualDnsSettings};
pub use writer::OverrideWriter;
