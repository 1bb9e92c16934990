//! Extended Validation (EV) determination
//!
//! A path is EV if the leaf asserts at least one certificate policy that survives intersection with
//! the policies of every subordinate CA and for which the root is a recognized EV anchor, and the
//! CAs in the path satisfy the EV certificate profile. The outcome is only a classification; failing
//! to qualify does not affect the trust result of the path.

use std::collections::BTreeSet;

use der::asn1::ObjectIdentifier;

use crate::environment::trust_environment::TrustEnvironment;
use crate::source::certificate_facts::*;
use crate::util::logging::*;
use crate::util::pvc_alg_oids::PKIX_CE_ANY_POLICY;
use crate::util::pvc_utilities::*;
use crate::validator::candidate_path::CandidatePath;

/// `meets_ev_key_size` requires EC keys of at least 256 bits, and RSA keys of at least 2048 bits, or
/// 1024 bits for certificates issued before 2011 that expire before 2014.
fn meets_ev_key_size(cert: &dyn CertificateFacts) -> bool {
    let legacy = cert.not_before() < TIME_2011_01_01 && cert.not_after() < TIME_2014_01_01;
    let rsa_bits = if legacy { 1024 } else { 2048 };
    cert.is_at_least_key_size(rsa_bits, 256)
}

fn has_ca_key_usage(cert: &dyn CertificateFacts) -> bool {
    let required = KU_KEY_CERT_SIGN | KU_CRL_SIGN;
    cert.key_usage().map_or(false, |ku| ku & required == required)
}

fn meets_ev_subordinate_profile(cert: &dyn CertificateFacts) -> bool {
    if cert.policy_oids().map_or(true, |p| p.is_empty()) {
        log_message(&TpLogLevels::TpDebug, "EV: subordinate CA asserts no policies");
        return false;
    }
    if !cert.has_crl_distribution_points() {
        log_message(&TpLogLevels::TpDebug, "EV: subordinate CA has no CRL distribution point");
        return false;
    }
    if !cert.is_ca() || !has_ca_key_usage(cert) {
        log_message(&TpLogLevels::TpDebug, "EV: subordinate CA lacks CA constraints or key usage");
        return false;
    }
    if !meets_ev_key_size(cert) {
        log_message(&TpLogLevels::TpDebug, "EV: subordinate CA key is too small");
        return false;
    }
    if cert.not_before() >= TIME_2016_01_01 && cert.signature_hash_algorithm() == SignatureHash::Sha1
    {
        log_message(&TpLogLevels::TpDebug, "EV: subordinate CA is signed using SHA-1");
        return false;
    }
    true
}

fn meets_ev_root_profile(cert: &dyn CertificateFacts) -> bool {
    if cert.not_before() < TIME_2006_10_01 {
        return true;
    }
    cert.version() >= 3 && cert.is_ca() && has_ca_key_usage(cert) && meets_ev_key_size(cert)
}

/// `is_extended_validation` returns true if the path satisfies the EV profile, using the EV anchors
/// known to the environment.
pub fn is_extended_validation(env: &TrustEnvironment, path: &CandidatePath) -> bool {
    let count = path.len();
    let leaf = match path.leaf() {
        Some(leaf) => leaf,
        None => return false,
    };

    let mut valid_policies: BTreeSet<ObjectIdentifier> = leaf
        .policy_oids()
        .unwrap_or_default()
        .iter()
        .filter(|oid| **oid != PKIX_CE_ANY_POLICY)
        .cloned()
        .collect();
    if valid_policies.is_empty() {
        return false;
    }

    // roots may not issue EV leaf certificates directly after the cut-over
    if leaf.not_before() >= TIME_2016_07_01 && count < 3 {
        log_message(&TpLogLevels::TpDebug, "EV: leaf issued directly by the root");
        return false;
    }

    for ix in 1..count.saturating_sub(1) {
        let ca = path.certificates[ix].as_ref();
        if !meets_ev_subordinate_profile(ca) {
            return false;
        }
        let ca_policies = ca.policy_oids().unwrap_or_default();
        if !ca_policies.contains(&PKIX_CE_ANY_POLICY) {
            valid_policies.retain(|oid| ca_policies.contains(oid));
        }
        if valid_policies.is_empty() {
            log_message(&TpLogLevels::TpDebug, "EV: no policies remain after intersection");
            return false;
        }
    }

    let root = match path.root() {
        Some(root) => root,
        None => return false,
    };
    valid_policies.retain(|oid| env.is_ev_anchor(oid, root.certificate_sha1()));
    if valid_policies.is_empty() {
        log_message(&TpLogLevels::TpDebug, "EV: root is not an EV anchor for the leaf policies");
        return false;
    }

    meets_ev_root_profile(root)
}
