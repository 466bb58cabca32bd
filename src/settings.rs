//! Manual DNS settings supplied by the connection lifecycle.

use std::net::IpAddr;

/// Transport hint attached to the configured servers.
///
/// The resolver file only carries addresses; the hint travels with the
/// settings so callers get back exactly what they asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DnsEncryption {
    /// Plain DNS over UDP/TCP port 53.
    #[default]
    None,
    /// DNS over TLS.
    DnsOverTls,
    /// DNS over HTTPS.
    DnsOverHttps,
}

/// DNS servers to force while the tunnel is up.
///
/// Empty settings mean "no override requested" and are treated like a
/// full restore.
///
/// # Example
///
/// ```
/// use resolvconf_guard::ManualDnsSettings;
///
/// let settings = ManualDnsSettings::new(["10.0.0.1".parse().unwrap()]);
/// assert!(!settings.is_empty());
/// assert!(ManualDnsSettings::default().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualDnsSettings {
    /// Nameserver addresses, in the order they are written.
    pub servers: Vec<IpAddr>,

    /// Transport hint.
    pub encryption: DnsEncryption,

    /// DoH URI template, meaningful only with [`DnsEncryption::DnsOverHttps`].
    pub doh_template: Option<String>,
}

impl ManualDnsSettings {
    /// Creates plain-DNS settings for the given servers.
    #[must_use]
    pub fn new(servers: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            servers: servers.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Overrides the transport hint.
    #[must_use]
    pub const fn with_encryption(mut self, encryption: DnsEncryption) -> Self {
        self.encryption = encryption;
        self
    }

    /// Sets the DoH URI template.
    #[must_use]
    pub fn with_doh_template(mut self, template: impl Into<String>) -> Self {
        self.doh_template = Some(template.into());
        self
    }

    /// Returns `true` if no servers are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_keeps_order_and_defaults() {
        let s = ManualDnsSettings::new(["10.0.0.2".parse().unwrap(), "10.0.0.1".parse().unwrap()]);
        assert_eq!(s.servers[0].to_string(), "10.0.0.2");
        assert_eq!(s.servers[1].to_string(), "10.0.0.1");
        assert_eq!(s.encryption, DnsEncryption::None);
        assert!(s.doh_template.is_none());
    }

    #[test]
    fn empty_is_sentinel() {
        assert!(ManualDnsSettings::default().is_empty());
        assert!(ManualDnsSettings::new([]).is_empty());
    }

    #[test]
    fn builders() {
        let s = ManualDnsSettings::new(["1.1.1.1".parse().unwrap()])
            .with_encryption(DnsEncryption::DnsOverHttps)
            .with_doh_template("https://dns.example/dns-query");
        assert_eq!(s.encryption, DnsEncryption::DnsOverHttps);
        assert_eq!(s.doh_template.as_deref(), Some("https://dns.example/dns-query"));
    }
}
