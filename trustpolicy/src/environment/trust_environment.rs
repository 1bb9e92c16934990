//! TrustEnvironment aggregates a set of function pointers, trait objects and reference data that
//! policy evaluation consults: hashing and signature verification, application requirement checks,
//! trust anchor sources, blocked and graylisted keys, EV anchors and trusted CT logs.
//!
//! The sample below illustrates preparation of a TrustEnvironment object.
//! ```
//! use trustpolicy::*;
//!
//! let mut env = TrustEnvironment::default();
//!
//! // add hashing and signature verification capabilities
//! populate_default_environment(&mut env);
//!
//! // install reference data, i.e., as read from a settings file
//! let settings = EnvironmentSettings::from_json(r#"{"blocked_keys": ["0102030405060708090A0B0C0D0E0F1011121314"]}"#).unwrap();
//! env.apply_settings(&settings).unwrap();
//! assert!(env.is_blocked_key(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20]));
//!
//! // add a source of trust anchors
//! env.add_anchor_source(Box::new(TrustSettingsStore::default()));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use base64ct::{Base64, Encoding};
use der::asn1::ObjectIdentifier;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::environment::environment_settings::EnvironmentSettings;
use crate::environment::trust_environment_traits::*;
use crate::util::crypto::*;
use crate::util::error::*;
use crate::util::pvc_utilities::hex_to_buffer;
use crate::CandidatePath;

/// [`TrustedLog`] identifies a certificate transparency log whose SCTs are accepted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrustedLog {
    /// DER-encoded SubjectPublicKeyInfo of the log
    pub key_der: Vec<u8>,
    /// Time (seconds since the Unix epoch) at which the log stopped being qualified, if any
    pub expiry: Option<u64>,
}

impl TrustedLog {
    /// `log_id` returns the RFC 6962 log ID, i.e., the SHA-256 digest of the log's public key.
    pub fn log_id(&self) -> Vec<u8> {
        sha256_digest(&self.key_der)
    }
}

/// [`TrustEnvironment`] provides a switchboard of callback functions and reference data that allow
/// support to vary on different platforms or to be tailored for specific use cases.
#[derive(Default)]
pub struct TrustEnvironment {
    //--------------------------------------------------------------------------
    //Crypto interfaces
    //--------------------------------------------------------------------------
    /// List of functions that provide a message digest functionality
    calculate_hash_callbacks: Vec<CalculateHash>,

    /// List of functions that provide a signature verification functionality given a message
    verify_signature_message_callbacks: Vec<VerifySignatureMessage>,

    //--------------------------------------------------------------------------
    //Trust settings interfaces
    //--------------------------------------------------------------------------
    /// List of functions that evaluate application requirements named by usage constraints
    application_requirement_callbacks: Vec<CheckApplicationRequirement>,

    /// List of trait objects that identify trust anchors
    anchor_sources: Vec<Box<dyn AnchorSource + Send + Sync>>,

    //--------------------------------------------------------------------------
    //Reference data
    //--------------------------------------------------------------------------
    blocked_keys: BTreeSet<Vec<u8>>,
    graylisted_keys: BTreeSet<Vec<u8>>,
    distrusted_roots: BTreeSet<Vec<u8>>,
    ev_anchors: BTreeMap<ObjectIdentifier, BTreeSet<Vec<u8>>>,
    trusted_logs: Vec<TrustedLog>,
}

impl TrustEnvironment {
    /// TrustEnvironment::new returns a new [`TrustEnvironment`] with empty callback vectors and no
    /// reference data
    pub fn new() -> TrustEnvironment {
        TrustEnvironment::default()
    }

    /// clear_all_callbacks clears the contents of all function pointer and trait object vectors
    /// associated with an instance of [`TrustEnvironment`].
    pub fn clear_all_callbacks(&mut self) {
        self.clear_calculate_hash_callbacks();
        self.clear_verify_signature_message_callbacks();
        self.clear_application_requirement_callbacks();
        self.clear_anchor_sources();
    }

    /// add_calculate_hash_callback adds a [`CalculateHash`] callback to the list used by calculate_hash.
    pub fn add_calculate_hash_callback(&mut self, c: CalculateHash) {
        self.calculate_hash_callbacks.push(c);
    }

    /// clear_calculate_hash_callbacks clears the list of [`CalculateHash`] callbacks used by calculate_hash.
    pub fn clear_calculate_hash_callbacks(&mut self) {
        self.calculate_hash_callbacks.clear();
    }

    /// calculate_hash iterates over calculate_hash_callbacks until an authoritative answer is found
    /// or all options have been exhausted
    pub fn calculate_hash(
        &self,
        hash_alg: &AlgorithmIdentifierOwned,
        buffer_to_hash: &[u8],
    ) -> Result<Vec<u8>> {
        for f in &self.calculate_hash_callbacks {
            if let Ok(r) = f(self, hash_alg, buffer_to_hash) {
                return Ok(r);
            }
        }
        Err(Error::Unrecognized)
    }

    /// add_verify_signature_message_callback adds a [`VerifySignatureMessage`] callback to the list used by verify_signature_message.
    pub fn add_verify_signature_message_callback(&mut self, c: VerifySignatureMessage) {
        self.verify_signature_message_callbacks.push(c);
    }

    /// clear_verify_signature_message_callbacks clears the list of [`VerifySignatureMessage`] callbacks used by verify_signature_message.
    pub fn clear_verify_signature_message_callbacks(&mut self) {
        self.verify_signature_message_callbacks.clear();
    }

    /// verify_signature_message iterates over verify_signature_message_callbacks until an authoritative answer is found
    /// or all options have been exhausted
    pub fn verify_signature_message(
        &self,
        message_to_verify: &[u8],                 // buffer to verify
        signature: &[u8],                         // signature
        signature_alg: &AlgorithmIdentifierOwned, // signature algorithm
        spki: &SubjectPublicKeyInfoOwned,         // public key
    ) -> Result<()> {
        for f in &self.verify_signature_message_callbacks {
            if f(self, message_to_verify, signature, signature_alg, spki).is_ok() {
                return Ok(());
            }
        }
        Err(Error::SignatureVerificationFailure)
    }

    /// add_application_requirement_callback adds a [`CheckApplicationRequirement`] callback to the list
    /// used by check_application_requirement.
    pub fn add_application_requirement_callback(&mut self, c: CheckApplicationRequirement) {
        self.application_requirement_callbacks.push(c);
    }

    /// clear_application_requirement_callbacks clears the list of [`CheckApplicationRequirement`]
    /// callbacks.
    pub fn clear_application_requirement_callbacks(&mut self) {
        self.application_requirement_callbacks.clear();
    }

    /// check_application_requirement returns true if any callback reports that the requirement is
    /// satisfied. With no callbacks installed, no requirement is satisfied.
    pub fn check_application_requirement(&self, requirement: &str) -> bool {
        self.application_requirement_callbacks
            .iter()
            .any(|f| f(self, requirement))
    }

    /// add_anchor_source adds an [`AnchorSource`] object to the list used by apply_anchor_sources.
    pub fn add_anchor_source(&mut self, c: Box<dyn AnchorSource + Send + Sync>) {
        self.anchor_sources.push(c);
    }

    /// clear_anchor_sources clears the list of [`AnchorSource`] objects used by apply_anchor_sources.
    pub fn clear_anchor_sources(&mut self) {
        self.anchor_sources.clear();
    }

    /// apply_anchor_sources marks the path as anchored, and collects usage constraints and anchor
    /// stores for each certificate, using each available [`AnchorSource`] in turn.
    pub fn apply_anchor_sources(&self, path: &mut CandidatePath) {
        for source in &self.anchor_sources {
            path.apply_anchor_source(source.as_ref());
        }
    }

    /// add_blocked_key adds the SHA-1 digest of a public key to the set of blocked keys.
    pub fn add_blocked_key(&mut self, key_sha1: &[u8]) {
        self.blocked_keys.insert(key_sha1.to_vec());
    }

    /// is_blocked_key returns true if the SHA-1 digest of a public key is in the set of blocked keys.
    pub fn is_blocked_key(&self, key_sha1: &[u8]) -> bool {
        self.blocked_keys.contains(key_sha1)
    }

    /// add_graylisted_key adds the SHA-1 digest of a public key to the set of graylisted keys.
    pub fn add_graylisted_key(&mut self, key_sha1: &[u8]) {
        self.graylisted_keys.insert(key_sha1.to_vec());
    }

    /// is_graylisted_key returns true if the SHA-1 digest of a public key is graylisted.
    pub fn is_graylisted_key(&self, key_sha1: &[u8]) -> bool {
        self.graylisted_keys.contains(key_sha1)
    }

    /// add_distrusted_root adds the SHA-256 digest of a root certificate whose children issued on or
    /// after 2016-10-21 are rejected.
    pub fn add_distrusted_root(&mut self, cert_sha256: &[u8]) {
        self.distrusted_roots.insert(cert_sha256.to_vec());
    }

    /// is_distrusted_root returns true if the SHA-256 digest of a root certificate is date-constrained.
    pub fn is_distrusted_root(&self, cert_sha256: &[u8]) -> bool {
        self.distrusted_roots.contains(cert_sha256)
    }

    /// add_ev_anchor records that the root with the given SHA-1 digest is recognized for the EV policy.
    pub fn add_ev_anchor(&mut self, policy: ObjectIdentifier, cert_sha1: &[u8]) {
        self.ev_anchors
            .entry(policy)
            .or_default()
            .insert(cert_sha1.to_vec());
    }

    /// is_ev_anchor returns true if the root with the given SHA-1 digest is recognized for the EV policy.
    pub fn is_ev_anchor(&self, policy: &ObjectIdentifier, cert_sha1: &[u8]) -> bool {
        self.ev_anchors
            .get(policy)
            .map_or(false, |anchors| anchors.contains(cert_sha1))
    }

    /// add_trusted_log adds a log to the list of trusted certificate transparency logs.
    pub fn add_trusted_log(&mut self, log: TrustedLog) {
        self.trusted_logs.push(log);
    }

    /// trusted_logs returns the list of trusted certificate transparency logs.
    pub fn trusted_logs(&self) -> &[TrustedLog] {
        &self.trusted_logs
    }

    /// apply_settings installs the reference data from an [`EnvironmentSettings`] object. Data is
    /// added to whatever the environment already holds. Nothing is installed if any value fails to
    /// parse.
    pub fn apply_settings(&mut self, settings: &EnvironmentSettings) -> Result<()> {
        let parse_all = |digests: &[String]| -> Result<Vec<Vec<u8>>> {
            digests.iter().map(|d| hex_to_buffer(d)).collect()
        };

        let blocked = parse_all(&settings.blocked_keys)?;
        let graylisted = parse_all(&settings.graylisted_keys)?;
        let distrusted = parse_all(&settings.distrusted_roots)?;

        let mut ev = vec![];
        for (oid, roots) in &settings.ev_anchors {
            let policy = ObjectIdentifier::new(oid)
                .map_err(|_e| Error::InvalidOption(format!("invalid EV policy OID: {}", oid)))?;
            ev.push((policy, parse_all(roots)?));
        }

        let mut logs = vec![];
        for log in &settings.trusted_logs {
            let key_der = Base64::decode_vec(&log.key)
                .map_err(|_e| Error::InvalidOption(format!("invalid log key: {}", log.key)))?;
            logs.push(TrustedLog {
                key_der,
                expiry: log.expiry,
            });
        }

        self.blocked_keys.extend(blocked);
        self.graylisted_keys.extend(graylisted);
        self.distrusted_roots.extend(distrusted);
        for (policy, roots) in ev {
            self.ev_anchors.entry(policy).or_default().extend(roots);
        }
        self.trusted_logs.extend(logs);
        Ok(())
    }
}

/// `populate_default_environment` populates a [`TrustEnvironment`] object with the crypto callbacks
/// implemented by this library.
///
/// The following callbacks are added:
/// - [`calculate_hash_rust_crypto`]
/// - [`verify_signature_message_rust_crypto`]
pub fn populate_default_environment(env: &mut TrustEnvironment) {
    env.add_calculate_hash_callback(calculate_hash_rust_crypto);
    env.add_verify_signature_message_callback(verify_signature_message_rust_crypto);
}
