//! Checks applied to the candidate path as a whole
//!
//! Failures concerning the issuer of the leaf are reported at index 1, or at index 0 when the path
//! contains only the leaf.

use std::collections::BTreeMap;

use der::asn1::ObjectIdentifier;

use crate::source::certificate_facts::*;
use crate::source::trust_settings::AnchorStore;
use crate::validator::candidate_path::CandidatePath;
use crate::validator::check_names::CheckName;
use crate::validator::leaf_checks::{digest_values, has_marker, oid_values};
use crate::validator::policy::OptionValue;
use crate::validator::pvc::PolicyVerificationContext;

/// Value of the Revocation option that demands a positive revocation response
const REQUIRE_POSITIVE_RESPONSE: &str = "RequirePositiveResponse";

/// `non_anchor_count` returns the number of certificates in the path that are not the anchor.
fn non_anchor_count(path: &CandidatePath) -> usize {
    if path.is_anchored {
        path.len().saturating_sub(1)
    } else {
        path.len()
    }
}

fn issuer_index(path: &CandidatePath) -> usize {
    if path.len() > 1 {
        1
    } else {
        0
    }
}

fn anchored_in_system_store(path: &CandidatePath) -> bool {
    path.is_anchored && path.store(path.len().saturating_sub(1)) == Some(AnchorStore::System)
}

/// Checks registered for keys handled by the fixed portion of path evaluation
pub(crate) fn check_no_op(
    _pvc: &mut PolicyVerificationContext<'_>,
    _path: &CandidatePath,
    _key: &CheckName,
) {
}

/// Shared implementation of checks comparing an attribute of the leaf's issuer with the option
fn check_issuer_attribute(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
    values: fn(&dyn CertificateFacts) -> Vec<String>,
) {
    let wanted = match pvc.option(key).and_then(|v| v.strings()) {
        Some(w) => w,
        None => return,
    };
    let found = match path.certificate(1) {
        Some(issuer) => values(issuer).iter().any(|v| wanted.contains(&v.as_str())),
        None => false,
    };
    if !found {
        pvc.set_result(path, key, issuer_index(path), false);
    }
}

pub(crate) fn check_issuer_common_name(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    check_issuer_attribute(pvc, path, key, |c| c.common_names());
}

pub(crate) fn check_intermediate_organization(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    check_issuer_attribute(pvc, path, key, |c| c.organizations());
}

pub(crate) fn check_intermediate_country(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    check_issuer_attribute(pvc, path, key, |c| c.countries());
}

pub(crate) fn check_intermediate_marker_oid(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let oids = match pvc.option(key) {
        Some(v) => oid_values(v),
        None => return,
    };
    if oids.is_empty() {
        return;
    }
    if !path
        .certificate(1)
        .map_or(false, |issuer| has_marker(issuer, &oids, true))
    {
        pvc.set_result(path, key, issuer_index(path), false);
    }
}

pub(crate) fn check_intermediate_eku(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let oids = match pvc.option(key) {
        Some(v) => oid_values(v),
        None => return,
    };
    if oids.is_empty() {
        return;
    }
    let found = path
        .certificate(1)
        .and_then(|issuer| issuer.extended_key_usage())
        .map_or(false, |ekus| oids.iter().any(|o| ekus.contains(o)));
    if !found {
        pvc.set_result(path, key, issuer_index(path), false);
    }
}

/// Shared implementation of checks matching SPKI digests of certificates in a range of indices
fn check_spki_digests(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
    range: core::ops::Range<usize>,
) {
    let digests = match pvc.option(key) {
        Some(v) => digest_values(v),
        None => return,
    };
    if digests.is_empty() {
        return;
    }
    let found = range.filter_map(|ix| path.certificate(ix)).any(|cert| {
        digests
            .iter()
            .any(|d| d.as_slice() == cert.spki_sha256())
    });
    if !found {
        pvc.set_result(path, key, issuer_index(path), false);
    }
}

pub(crate) fn check_intermediate_spki_sha256(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let end = path.len().saturating_sub(1);
    check_spki_digests(pvc, path, key, 1..end);
}

pub(crate) fn check_ca_spki_sha256(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    check_spki_digests(pvc, path, key, 1..path.len());
}

fn check_anchor_digest(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
    use_sha256: bool,
) {
    let root = match path.root() {
        Some(root) => root,
        None => return,
    };
    let digests = match pvc.option(key) {
        Some(v) => digest_values(v),
        None => return,
    };
    if digests.is_empty() {
        return;
    }
    let digest = if use_sha256 {
        root.certificate_sha256()
    } else {
        root.certificate_sha1()
    };
    if !digests.iter().any(|d| d.as_slice() == digest) {
        pvc.set_result(path, key, path.len() - 1, false);
    }
}

pub(crate) fn check_anchor_sha1(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    check_anchor_digest(pvc, path, key, false);
}

pub(crate) fn check_anchor_sha256(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    check_anchor_digest(pvc, path, key, true);
}

pub(crate) fn check_chain_length(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    if let Some(length) = pvc.option(key).and_then(|v| v.as_integer()) {
        if path.len() as i64 != length {
            pvc.set_result(path, key, 0, false);
        }
    }
}

fn minimum_sizes(value: &OptionValue) -> Option<BTreeMap<&str, i64>> {
    let dict = value.as_dictionary()?;
    let mut sizes = BTreeMap::new();
    for (alg, size) in dict {
        sizes.insert(alg.as_str(), size.as_integer()?);
    }
    Some(sizes)
}

/// Every key must use an algorithm named in the option dictionary (`RSA` or `EC`) and be at least
/// the size given for that algorithm.
pub(crate) fn check_key_size(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let sizes = match pvc.option(key).and_then(minimum_sizes) {
        Some(s) => s,
        None => return,
    };
    for (ix, cert) in path.certificates.iter().enumerate() {
        let name = match cert.public_key_algorithm() {
            KeyAlgorithm::Rsa => "RSA",
            KeyAlgorithm::Ec => "EC",
            KeyAlgorithm::Other => "",
        };
        let ok = sizes
            .get(name)
            .map_or(false, |min| cert.public_key_size() as i64 >= *min);
        if !ok && !pvc.set_result(path, key, ix, false) {
            return;
        }
    }
}

pub(crate) fn check_weak_key_size(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    for (ix, cert) in path.certificates.iter().enumerate() {
        if cert.is_weak_key() && !pvc.set_result(path, key, ix, false) {
            return;
        }
    }
}

pub(crate) fn check_weak_signature(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    for ix in 0..non_anchor_count(path) {
        if path.certificates[ix].is_weak_hash() && !pvc.set_result(path, key, ix, false) {
            return;
        }
    }
}

pub(crate) fn check_signature_hash_algorithms(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let allowed = match pvc.option(key).and_then(|v| v.strings()) {
        Some(a) => a,
        None => return,
    };
    for ix in 0..non_anchor_count(path) {
        let hash = path.certificates[ix].signature_hash_algorithm().name();
        if !allowed.iter().any(|a| a.eq_ignore_ascii_case(hash))
            && !pvc.set_result(path, key, ix, false)
        {
            return;
        }
    }
}

/// MD2, MD4, MD5 and SHA-1 signatures are rejected below anchors from the System store.
pub(crate) fn check_system_trusted_weak_hash(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    if !anchored_in_system_store(path) {
        return;
    }
    for ix in 0..non_anchor_count(path) {
        let weak = matches!(
            path.certificates[ix].signature_hash_algorithm(),
            SignatureHash::Md2 | SignatureHash::Md4 | SignatureHash::Md5 | SignatureHash::Sha1
        );
        if weak && !pvc.set_result(path, key, ix, false) {
            return;
        }
    }
}

/// RSA keys under 2048 bits and EC keys under 224 bits are rejected in paths to anchors from the
/// System store.
pub(crate) fn check_system_trusted_weak_key(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    if !anchored_in_system_store(path) {
        return;
    }
    for (ix, cert) in path.certificates.iter().enumerate() {
        if !cert.is_at_least_key_size(2048, 224) && !pvc.set_result(path, key, ix, false) {
            return;
        }
    }
}

pub(crate) fn check_certificate_policy(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let wanted = match pvc.option(key).and_then(|v| v.as_str()) {
        Some(w) => match ObjectIdentifier::new(w) {
            Ok(oid) => oid,
            Err(_e) => return,
        },
        None => return,
    };
    let found = path
        .leaf()
        .and_then(|leaf| leaf.policy_oids())
        .map_or(false, |oids| oids.contains(&wanted));
    if !found {
        pvc.set_result(path, key, 0, false);
    }
}

fn require_revocation_responses(pvc: &mut PolicyVerificationContext<'_>, path: &CandidatePath) {
    let count = non_anchor_count(path);
    for flag in pvc.require_revocation_response.iter_mut().take(count) {
        *flag = true;
    }
}

pub(crate) fn check_revocation(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    if pvc.option(key).and_then(|v| v.as_str()) == Some(REQUIRE_POSITIVE_RESPONSE) {
        require_revocation_responses(pvc, path);
    }
}

pub(crate) fn check_revocation_response_required(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    _key: &CheckName,
) {
    require_revocation_responses(pvc, path);
}

pub(crate) fn check_extended_validation(
    pvc: &mut PolicyVerificationContext<'_>,
    _path: &CandidatePath,
    _key: &CheckName,
) {
    pvc.optionally_ev = true;
}
