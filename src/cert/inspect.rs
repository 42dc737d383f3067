//! Validation and reporting for certificate material already on disk

use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

use log::warn;
use rsa::RsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::public_key::PublicKey;

use super::profile::{CertificateProfile, SanEntry};
use crate::error::{BootstrapError, Result};

/// Warn once fewer than this many days of validity remain.
pub const EXPIRY_WARNING_DAYS: i64 = 30;

/// What an existing certificate (and optionally its key) contains.
#[derive(Debug, Clone)]
pub struct CertificateReport {
    pub common_name: Option<String>,
    pub subject_alt_names: Vec<SanEntry>,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    pub key_encipherment: bool,
    pub data_encipherment: bool,
    pub server_auth: bool,
    /// RSA modulus size in bits, if the key is RSA
    pub rsa_key_bits: Option<usize>,
    /// SHA-256 over the DER certificate, lowercase hex
    pub fingerprint_sha256: String,
    /// `None` when no key was supplied
    pub key_matches: Option<bool>,
}

/// Problems found when holding a report against a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    MissingSan(String),
    Expired,
    NotYetValid,
    KeyMismatch,
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Finding::MissingSan(san) => write!(f, "missing required SAN '{san}'"),
            Finding::Expired => f.write_str("certificate has expired"),
            Finding::NotYetValid => f.write_str("certificate is not yet valid"),
            Finding::KeyMismatch => f.write_str("private key does not match certificate"),
        }
    }
}

impl CertificateReport {
    pub fn validity_days(&self) -> i64 {
        (self.not_after - self.not_before).whole_days()
    }

    /// Check this report against the names and window `profile` requires.
    pub fn check_against(&self, profile: &CertificateProfile, now: OffsetDateTime) -> Vec<Finding> {
        let mut findings: Vec<Finding> = profile
            .subject_alt_names()
            .into_iter()
            .filter(|required| !self.subject_alt_names.contains(required))
            .map(|missing| Finding::MissingSan(missing.to_string()))
            .collect();

        if now > self.not_after {
            findings.push(Finding::Expired);
        } else if now < self.not_before {
            findings.push(Finding::NotYetValid);
        } else if (self.not_after - now).whole_days() < EXPIRY_WARNING_DAYS {
            warn!(
                "Certificate expires within {EXPIRY_WARNING_DAYS} days ({}), consider regenerating",
                self.not_after
            );
        }

        if self.key_matches == Some(false) {
            findings.push(Finding::KeyMismatch);
        }

        if let Some(cn) = &self.common_name
            && cn != profile.domain()
        {
            warn!(
                "Certificate has Common Name '{cn}' (expected '{}')",
                profile.domain()
            );
        }

        findings
    }
}

/// Read and inspect a certificate file, checking `key_path` against it if given.
pub fn inspect_files(cert_path: &Path, key_path: Option<&Path>) -> Result<CertificateReport> {
    let cert_pem = fs::read_to_string(cert_path).map_err(|e| {
        BootstrapError::Inspect(format!("failed to read {}: {e}", cert_path.display()))
    })?;
    let key_pem = key_path
        .map(|path| {
            fs::read_to_string(path).map_err(|e| {
                BootstrapError::Inspect(format!("failed to read {}: {e}", path.display()))
            })
        })
        .transpose()?;
    inspect_pem(&cert_pem, key_pem.as_deref())
}

/// Inspect PEM certificate text, optionally checking a PKCS#8 key against it.
pub fn inspect_pem(cert_pem: &str, key_pem: Option<&str>) -> Result<CertificateReport> {
    let block = pem::parse(cert_pem)
        .map_err(|e| BootstrapError::Inspect(format!("invalid PEM: {e}")))?;
    if block.tag() != "CERTIFICATE" {
        return Err(BootstrapError::Inspect(format!(
            "expected a CERTIFICATE block, found '{}'",
            block.tag()
        )));
    }

    let (_, cert) = x509_parser::parse_x509_certificate(block.contents())
        .map_err(|e| BootstrapError::Inspect(format!("invalid X.509 certificate: {e}")))?;

    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string);

    let validity = cert.validity();
    let not_before = to_datetime(validity.not_before.timestamp())?;
    let not_after = to_datetime(validity.not_after.timestamp())?;

    let (key_encipherment, data_encipherment) = match cert
        .key_usage()
        .map_err(|e| BootstrapError::Inspect(format!("invalid key usage: {e}")))?
    {
        Some(ku) => (ku.value.key_encipherment(), ku.value.data_encipherment()),
        None => (false, false),
    };
    let server_auth = cert
        .extended_key_usage()
        .map_err(|e| BootstrapError::Inspect(format!("invalid extended key usage: {e}")))?
        .is_some_and(|eku| eku.value.server_auth);

    let rsa_key_bits = match cert.public_key().parsed() {
        Ok(PublicKey::RSA(rsa)) => Some(rsa.key_size()),
        _ => None,
    };

    let key_matches = key_pem
        .map(|pem| key_matches_certificate(pem, &cert))
        .transpose()?;

    Ok(CertificateReport {
        common_name,
        subject_alt_names: extract_sans(&cert)?,
        not_before,
        not_after,
        key_encipherment,
        data_encipherment,
        server_auth,
        rsa_key_bits,
        fingerprint_sha256: hex::encode(Sha256::digest(block.contents())),
        key_matches,
    })
}

fn to_datetime(timestamp: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|e| BootstrapError::Inspect(format!("timestamp out of range: {e}")))
}

/// Compare the key's SubjectPublicKeyInfo with the certificate's.
fn key_matches_certificate(key_pem: &str, cert: &X509Certificate<'_>) -> Result<bool> {
    let key = RsaPrivateKey::from_pkcs8_pem(key_pem)
        .map_err(|e| BootstrapError::Inspect(format!("invalid PKCS#8 RSA key: {e}")))?;
    let spki = key
        .to_public_key()
        .to_public_key_der()
        .map_err(|e| BootstrapError::Inspect(format!("failed to encode public key: {e}")))?;
    Ok(spki.as_bytes() == cert.public_key().raw)
}

fn extract_sans(cert: &X509Certificate<'_>) -> Result<Vec<SanEntry>> {
    let mut sans = Vec::new();

    let Some(san_ext) = cert
        .subject_alternative_name()
        .map_err(|e| BootstrapError::Inspect(format!("invalid SAN extension: {e}")))?
    else {
        return Ok(sans);
    };

    for name in &san_ext.value.general_names {
        match name {
            GeneralName::DNSName(dns) => sans.push(SanEntry::Dns(dns.to_string())),
            GeneralName::IPAddress(bytes) => {
                if let Some(ip) = ip_from_bytes(bytes) {
                    sans.push(SanEntry::Ip(ip));
                }
            }
            _ => {}
        }
    }
    Ok(sans)
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        Some(IpAddr::V4(Ipv4Addr::from(octets)))
    } else if let Ok(octets) = <[u8; 16]>::try_from(bytes) {
        Some(IpAddr::V6(Ipv6Addr::from(octets)))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_bytes_decode_both_families() {
        assert_eq!(ip_from_bytes(&[127, 0, 0, 1]), Some("127.0.0.1".parse().unwrap()));
        let mut v6 = [0u8; 16];
        v6[15] = 1;
        assert_eq!(ip_from_bytes(&v6), Some("::1".parse().unwrap()));
        assert_eq!(ip_from_bytes(&[1, 2, 3]), None);
    }

    #[test]
    fn rejects_non_certificate_pem() {
        let block = pem::Pem::new("PRIVATE KEY", vec![1, 2, 3]);
        let err = inspect_pem(&pem::encode(&block), None).expect_err("should fail");
        assert!(err.to_string().contains("CERTIFICATE"), "got: {err}");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            inspect_pem("not a certificate", None),
            Err(BootstrapError::Inspect(_))
        ));
    }
}
