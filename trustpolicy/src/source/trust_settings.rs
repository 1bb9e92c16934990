//! The trust_settings module provides the usage constraint structures attached to trust anchors and
//! the [`AnchorSource`] interface used to mark a [`CandidatePath`](crate::CandidatePath) as anchored.
//!
//! [`TrustSettingsStore`] is an in-memory [`AnchorSource`] keyed by certificate SHA-1 digest. Stores
//! are usually populated from configuration:
//!
//! ```
//! use trustpolicy::*;
//!
//! let mut store = TrustSettingsStore::default();
//! let deny = Constraint {
//!     result: Some(TrustSettingsResult::Deny),
//!     ..Default::default()
//! };
//! store.add_anchor(&[0x11; 20], AnchorStore::Admin, vec![deny]);
//! assert_eq!(1, store.len());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::environment::trust_environment_traits::AnchorSource;
use crate::source::certificate_facts::*;
use crate::validator::check_names::CheckName;
use crate::validator::policy::OptionValue;

/// Sign or verify data (trust settings key usage bit)
pub const TS_KEY_USE_SIGNATURE: u32 = 0x0000_0001;
/// Encrypt or decrypt data
pub const TS_KEY_USE_EN_DECRYPT_DATA: u32 = 0x0000_0002;
/// Encrypt or decrypt a key
pub const TS_KEY_USE_EN_DECRYPT_KEY: u32 = 0x0000_0004;
/// Sign or verify a certificate
pub const TS_KEY_USE_SIGN_CERT: u32 = 0x0000_0008;
/// Sign or verify revocation information (CRLs, OCSP responses)
pub const TS_KEY_USE_SIGN_REVOCATION: u32 = 0x0000_0010;
/// Key exchange, i.e., Diffie-Hellman or ECDH
pub const TS_KEY_USE_KEY_EXCHANGE: u32 = 0x0000_0020;
/// Any usage
pub const TS_KEY_USE_ANY: u32 = 0xffff_ffff;

/// `x509_to_trust_settings_usage` maps keyUsage bits (see [`KU_DIGITAL_SIGNATURE`] and friends) to
/// trust settings key usage bits. Bits without a trust settings counterpart are dropped.
pub fn x509_to_trust_settings_usage(ku: u32) -> u32 {
    let mut retval = 0;
    for (x509, ts) in [
        (KU_DIGITAL_SIGNATURE, TS_KEY_USE_SIGNATURE),
        (KU_DATA_ENCIPHERMENT, TS_KEY_USE_EN_DECRYPT_DATA),
        (KU_KEY_ENCIPHERMENT, TS_KEY_USE_EN_DECRYPT_KEY),
        (KU_KEY_CERT_SIGN, TS_KEY_USE_SIGN_CERT),
        (KU_CRL_SIGN, TS_KEY_USE_SIGN_REVOCATION),
        (KU_KEY_AGREEMENT, TS_KEY_USE_KEY_EXCHANGE),
    ] {
        if ku & x509 == x509 {
            retval |= ts;
        }
    }
    retval
}

/// Outcome declared by a usage constraint
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum TrustSettingsResult {
    /// No constraint matched or the constraint could not be interpreted
    #[default]
    Invalid,
    /// The certificate is a trusted root
    TrustRoot,
    /// The certificate is trusted as if it were a root, i.e., a pinned intermediate
    TrustAsRoot,
    /// The certificate is explicitly distrusted
    Deny,
    /// The constraint neither grants nor denies trust
    Unspecified,
}

/// Trust store from which an anchor was obtained
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AnchorStore {
    /// Platform-provided anchors
    System,
    /// Anchors added by an administrator
    Admin,
    /// Anchors added by a user
    User,
}

/// [`Constraint`] limits the circumstances in which a certificate is trusted. Every field that is
/// present must match for the constraint to apply; absent fields are ignored.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraint {
    /// OID of a policy that must be active
    pub policy_oid: Option<String>,
    /// Name of a policy that must be active
    pub policy_name: Option<String>,
    /// Hostname, email address or EAP server name the matched policy must be evaluating
    pub policy_string: Option<String>,
    /// Trust settings key usage bits (see [`TS_KEY_USE_SIGNATURE`] and friends)
    pub key_usage: Option<u32>,
    /// Identifier of an application requirement evaluated by the environment
    pub application_requirement: Option<String>,
    /// Error code that the constraint permits, i.e., -2147409654 to tolerate expiration
    pub allowed_error: Option<i32>,
    /// Declared outcome, [`TrustSettingsResult::TrustRoot`] when absent
    pub result: Option<TrustSettingsResult>,
    /// Additional policy options whose keys make the corresponding checks relevant for this path
    pub policy_options: Option<BTreeMap<CheckName, OptionValue>>,
}

#[derive(Clone, Debug)]
struct AnchorEntry {
    store: AnchorStore,
    constraints: Vec<Constraint>,
}

/// [`TrustSettingsStore`] is an in-memory [`AnchorSource`] keyed by certificate SHA-1 digest.
#[derive(Clone, Debug, Default)]
pub struct TrustSettingsStore {
    anchors: BTreeMap<Vec<u8>, AnchorEntry>,
}

impl TrustSettingsStore {
    /// `add_anchor` adds (or replaces) the anchor identified by the given certificate SHA-1 digest.
    pub fn add_anchor(&mut self, cert_sha1: &[u8], store: AnchorStore, constraints: Vec<Constraint>) {
        self.anchors.insert(
            cert_sha1.to_vec(),
            AnchorEntry {
                store,
                constraints,
            },
        );
    }

    /// `len` returns the number of anchors in the store.
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// `is_empty` returns true if the store contains no anchors.
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

impl AnchorSource for TrustSettingsStore {
    fn is_anchor(&self, cert: &dyn CertificateFacts) -> bool {
        self.anchors.contains_key(cert.certificate_sha1())
    }

    fn usage_constraints(&self, cert: &dyn CertificateFacts) -> Vec<Constraint> {
        self.anchors
            .get(cert.certificate_sha1())
            .map(|e| e.constraints.clone())
            .unwrap_or_default()
    }

    fn store(&self, cert: &dyn CertificateFacts) -> Option<AnchorStore> {
        self.anchors.get(cert.certificate_sha1()).map(|e| e.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_mapping() {
        assert_eq!(0, x509_to_trust_settings_usage(0));
        assert_eq!(
            TS_KEY_USE_SIGN_CERT | TS_KEY_USE_SIGN_REVOCATION,
            x509_to_trust_settings_usage(KU_KEY_CERT_SIGN | KU_CRL_SIGN)
        );
        assert_eq!(
            TS_KEY_USE_SIGNATURE,
            x509_to_trust_settings_usage(KU_DIGITAL_SIGNATURE | KU_NON_REPUDIATION)
        );
    }

    #[test]
    fn constraint_json() {
        let c: Constraint = serde_json::from_str(
            r#"{"policy_name": "sslServer", "allowed_error": -2147409654, "result": "TrustAsRoot"}"#,
        )
        .unwrap();
        assert_eq!(Some("sslServer".to_string()), c.policy_name);
        assert_eq!(Some(-2147409654), c.allowed_error);
        assert_eq!(Some(TrustSettingsResult::TrustAsRoot), c.result);
        assert!(c.key_usage.is_none());
    }
}
