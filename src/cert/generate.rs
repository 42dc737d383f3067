//! In-process RSA key generation and self-signed certificate issuance

use log::info;
use rand::rngs::OsRng;
use rcgen::string::{Ia5String, PrintableString};
use rcgen::{
    CertificateParams, DistinguishedName, DnType, DnValue, ExtendedKeyUsagePurpose, KeyPair,
    KeyUsagePurpose, SanType,
};
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use time::OffsetDateTime;

use super::profile::{CertificateProfile, SanEntry};
use crate::error::{BootstrapError, Result};
use crate::progress::{Phase, Progress, ProgressSink};

pub const RSA_KEY_BITS: usize = 2048;

/// OID 1.2.840.113549.1.9.1 (PKCS #9 emailAddress)
const EMAIL_ADDRESS_OID: [u64; 7] = [1, 2, 840, 113549, 1, 9, 1];

/// Freshly issued key + certificate, held in memory until committed to disk.
pub struct IssuedCertificate {
    pub key_pem: String,
    pub cert_pem: String,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

/// Generate a 2048-bit RSA key usable for RSA/SHA-256 signing.
pub fn generate_key() -> Result<KeyPair> {
    let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)?;
    let pkcs8_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| BootstrapError::Crypto(format!("Failed to encode private key: {e}")))?;
    let key_pair = KeyPair::from_pem_and_sign_algo(&pkcs8_pem, &rcgen::PKCS_RSA_SHA256)?;
    Ok(key_pair)
}

/// Build certificate parameters for `profile`, valid from `now`.
pub fn build_params(profile: &CertificateProfile, now: OffsetDateTime) -> Result<CertificateParams> {
    let mut params = CertificateParams::default();

    params.distinguished_name = distinguished_name(profile)?;

    for san in profile.subject_alt_names() {
        let entry = match san {
            SanEntry::Ip(ip) => SanType::IpAddress(ip),
            SanEntry::Dns(name) => SanType::DnsName(
                Ia5String::try_from(name.as_str())
                    .map_err(|e| BootstrapError::Crypto(format!("Invalid DNS name '{name}': {e}")))?,
            ),
        };
        params.subject_alt_names.push(entry);
    }

    params.key_usages = vec![
        KeyUsagePurpose::KeyEncipherment,
        KeyUsagePurpose::DataEncipherment,
    ];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

    params.not_before = now;
    params.not_after = now + time::Duration::days(i64::from(profile.validity_days()));

    Ok(params)
}

/// Subject: fixed C/ST/L/O/OU placeholders, CN = domain, emailAddress = admin@domain.
fn distinguished_name(profile: &CertificateProfile) -> Result<DistinguishedName> {
    let subject = profile.subject();
    let country = PrintableString::try_from(subject.country.as_str())
        .map_err(|e| BootstrapError::Crypto(format!("Invalid country code: {e}")))?;
    let email = Ia5String::try_from(profile.contact_email())
        .map_err(|e| BootstrapError::Crypto(format!("Invalid contact email: {e}")))?;

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CountryName, DnValue::PrintableString(country));
    dn.push(DnType::StateOrProvinceName, subject.state.as_str());
    dn.push(DnType::LocalityName, subject.locality.as_str());
    dn.push(DnType::OrganizationName, subject.organization.as_str());
    dn.push(DnType::OrganizationalUnitName, subject.organizational_unit.as_str());
    dn.push(DnType::CommonName, profile.domain());
    dn.push(
        DnType::CustomDnType(EMAIL_ADDRESS_OID.to_vec()),
        DnValue::Ia5String(email),
    );
    Ok(dn)
}

/// Generate a key and self-sign a server certificate for `profile`.
///
/// Nothing touches the file system; the caller decides where the PEMs go.
pub fn issue_self_signed(
    profile: &CertificateProfile,
    sink: &mut dyn ProgressSink,
) -> Result<IssuedCertificate> {
    sink.report(Progress::new(
        Phase::GeneratingKey,
        format!("Generating {RSA_KEY_BITS}-bit RSA private key"),
    ));
    let key_pair = generate_key()?;

    sink.report(Progress::new(
        Phase::BuildingRequest,
        format!(
            "Building certificate request for CN={} <{}>",
            profile.domain(),
            profile.contact_email()
        ),
    ));
    // X.509 times carry whole seconds only
    let now = OffsetDateTime::now_utc()
        .replace_nanosecond(0)
        .map_err(|e| BootstrapError::Crypto(format!("Invalid issue time: {e}")))?;
    let params = build_params(profile, now)?;
    let not_before = params.not_before;
    let not_after = params.not_after;

    sink.report(Progress::new(
        Phase::Signing,
        format!("Self-signing certificate valid for {} days", profile.validity_days()),
    ));
    let cert = params.self_signed(&key_pair)?;
    info!("Issued self-signed certificate for {}", profile.domain());

    Ok(IssuedCertificate {
        key_pem: key_pair.serialize_pem(),
        cert_pem: cert.pem(),
        not_before,
        not_after,
    })
}
