//! Certificate profile: who the certificate is for and what it covers

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::config::{BootstrapConfig, SubjectConfig};
use crate::error::{BootstrapError, Result};

/// Loopback addresses every bootstrap certificate must cover.
pub const LOOPBACK_IPS: [IpAddr; 2] = [
    IpAddr::V4(Ipv4Addr::LOCALHOST),
    IpAddr::V6(Ipv6Addr::LOCALHOST),
];

pub const LOCALHOST: &str = "localhost";

/// A single Subject Alternative Name entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SanEntry {
    Dns(String),
    Ip(IpAddr),
}

impl std::fmt::Display for SanEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SanEntry::Dns(name) => f.write_str(name),
            SanEntry::Ip(ip) => write!(f, "{ip}"),
        }
    }
}

/// Everything needed to issue the self-signed server certificate
#[derive(Debug, Clone)]
pub struct CertificateProfile {
    domain: String,
    subject: SubjectConfig,
    validity_days: u32,
}

impl CertificateProfile {
    /// Build a profile for `domain`, normalizing and validating it.
    pub fn for_domain(domain: &str, subject: SubjectConfig, validity_days: u32) -> Result<Self> {
        Ok(Self {
            domain: normalize_domain(domain)?,
            subject,
            validity_days,
        })
    }

    pub fn from_config(cfg: &BootstrapConfig) -> Result<Self> {
        Self::for_domain(&cfg.domain, cfg.subject.clone(), cfg.validity_days)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn subject(&self) -> &SubjectConfig {
        &self.subject
    }

    pub fn validity_days(&self) -> u32 {
        self.validity_days
    }

    /// Contact address placed in the subject's emailAddress attribute.
    pub fn contact_email(&self) -> String {
        format!("admin@{}", self.domain)
    }

    /// Wildcard covering the domain's parent zone.
    pub fn wildcard(&self) -> String {
        wildcard_for(&self.domain)
    }

    /// Ordered, de-duplicated SANs: domain, localhost, wildcard, loopback IPs.
    pub fn subject_alt_names(&self) -> Vec<SanEntry> {
        let mut sans: Vec<SanEntry> = Vec::with_capacity(5);
        let candidates = [
            SanEntry::Dns(self.domain.clone()),
            SanEntry::Dns(LOCALHOST.to_string()),
            SanEntry::Dns(self.wildcard()),
        ]
        .into_iter()
        .chain(LOOPBACK_IPS.into_iter().map(SanEntry::Ip));

        for san in candidates {
            if !sans.contains(&san) {
                sans.push(san);
            }
        }
        sans
    }
}

/// `*.` followed by the last two labels of `domain`.
///
/// A single-label domain yields `*.<domain>`.
pub fn wildcard_for(domain: &str) -> String {
    let labels: Vec<&str> = domain.split('.').collect();
    let zone = if labels.len() > 2 {
        labels[labels.len() - 2..].join(".")
    } else {
        domain.to_string()
    };
    format!("*.{zone}")
}

/// Trim, lowercase and strip a trailing dot, then reject anything that
/// cannot be a DNS SAN.
pub fn normalize_domain(raw: &str) -> Result<String> {
    let invalid = |reason: &str| BootstrapError::InvalidDomain {
        domain: raw.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = raw.trim();
    let domain = trimmed
        .strip_suffix('.')
        .unwrap_or(trimmed)
        .to_ascii_lowercase();

    if domain.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if domain.parse::<IpAddr>().is_ok() {
        return Err(invalid("IP addresses are always covered; expected a DNS name"));
    }
    if domain.len() > 253 {
        return Err(invalid("longer than 253 characters"));
    }
    for label in domain.split('.') {
        if label.is_empty() {
            return Err(invalid("contains an empty label"));
        }
        if label.len() > 63 {
            return Err(invalid("label longer than 63 characters"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid("label starts or ends with '-'"));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(invalid("only letters, digits, '-' and '_' are allowed"));
        }
    }
    Ok(domain)
}
