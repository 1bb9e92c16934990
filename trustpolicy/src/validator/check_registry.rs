//! Registries mapping policy option keys to the functions that implement leaf and path checks

use std::collections::BTreeMap;

use lazy_static::lazy_static;

use crate::util::logging::*;
use crate::validator::candidate_path::CandidatePath;
use crate::validator::check_names::CheckName;
use crate::validator::leaf_checks::*;
use crate::validator::path_checks::*;
use crate::validator::pvc::PolicyVerificationContext;
use crate::validator::trust_result::TrustResult;

/// Signature shared by all check functions. Checks report failures via
/// [`PolicyVerificationContext::set_result`] and friends rather than by returning a value.
pub(crate) type CheckFn = fn(&mut PolicyVerificationContext<'_>, &CandidatePath, &CheckName);

/// Phase of evaluation in which a policy option key is being dispatched
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Phase {
    /// Checks applied once to the leaf certificate
    Leaf,
    /// Checks applied to the path as a whole
    Path,
}

lazy_static! {
    static ref LEAF_CHECKS: BTreeMap<CheckName, CheckFn> = {
        let mut m: BTreeMap<CheckName, CheckFn> = BTreeMap::new();
        m.insert(CheckName::SslHostname, check_ssl_hostname);
        m.insert(CheckName::Email, check_email);
        m.insert(CheckName::SubjectCommonName, check_subject_common_name);
        m.insert(CheckName::SubjectCommonNamePrefix, check_subject_common_name_prefix);
        m.insert(CheckName::SubjectCommonNameTest, check_subject_common_name_test);
        m.insert(CheckName::SubjectOrganization, check_subject_organization);
        m.insert(CheckName::SubjectOrganizationalUnit, check_subject_organizational_unit);
        m.insert(CheckName::ExtendedKeyUsage, check_extended_key_usage);
        m.insert(CheckName::KeyUsage, check_key_usage);
        m.insert(CheckName::NotValidBefore, check_not_valid_before);
        m.insert(CheckName::EapTrustedServerNames, check_eap_trusted_server_names);
        m.insert(CheckName::LeafMarkerOid, check_leaf_marker_oid);
        m.insert(CheckName::LeafMarkerOidWithoutValueCheck, check_leaf_marker_oid_no_value_check);
        m.insert(CheckName::LeafMarkersProdAndQa, check_leaf_markers_prod_and_qa);
        m.insert(CheckName::BlackListedLeaf, check_blacklisted_leaf);
        m.insert(CheckName::GrayListedLeaf, check_graylisted_leaf);
        m.insert(CheckName::PinningRequired, check_pinning_required);
        m.insert(CheckName::NotCa, check_not_ca);
        m.insert(CheckName::LeafSpkiSha256, check_leaf_spki_sha256);
        m.insert(CheckName::ValidityPeriodMaximums, check_validity_period_maximums);
        m.insert(CheckName::NonEmptySubject, check_non_empty_subject);
        m
    };

    static ref PATH_CHECKS: BTreeMap<CheckName, CheckFn> = {
        let mut m: BTreeMap<CheckName, CheckFn> = BTreeMap::new();
        m.insert(CheckName::IssuerCommonName, check_issuer_common_name);
        m.insert(CheckName::IntermediateMarkerOid, check_intermediate_marker_oid);
        m.insert(CheckName::IntermediateSpkiSha256, check_intermediate_spki_sha256);
        m.insert(CheckName::IntermediateEku, check_intermediate_eku);
        m.insert(CheckName::IntermediateOrganization, check_intermediate_organization);
        m.insert(CheckName::IntermediateCountry, check_intermediate_country);
        m.insert(CheckName::CaSpkiSha256, check_ca_spki_sha256);
        m.insert(CheckName::AnchorSha1, check_anchor_sha1);
        m.insert(CheckName::AnchorSha256, check_anchor_sha256);
        m.insert(CheckName::ChainLength, check_chain_length);
        m.insert(CheckName::KeySize, check_key_size);
        m.insert(CheckName::WeakKeySize, check_weak_key_size);
        m.insert(CheckName::WeakSignature, check_weak_signature);
        m.insert(CheckName::SignatureHashAlgorithms, check_signature_hash_algorithms);
        m.insert(CheckName::SystemTrustedWeakHash, check_system_trusted_weak_hash);
        m.insert(CheckName::SystemTrustedWeakKey, check_system_trusted_weak_key);
        m.insert(CheckName::CertificatePolicy, check_certificate_policy);
        m.insert(CheckName::Revocation, check_revocation);
        m.insert(CheckName::RevocationResponseRequired, check_revocation_response_required);
        m.insert(CheckName::ExtendedValidation, check_extended_validation);

        // performed by the fixed portion of path evaluation
        for check in [
            CheckName::BasicCertificateProcessing,
            CheckName::IdLinkage,
            CheckName::ValidLeaf,
            CheckName::ValidIntermediates,
            CheckName::ValidRoot,
            CheckName::AnchorTrusted,
            CheckName::WeakLeaf,
            CheckName::WeakIntermediates,
            CheckName::NameConstraints,
            CheckName::BasicConstraints,
            CheckName::BasicConstraintsCa,
            CheckName::CriticalExtensions,
            CheckName::BlackListedKey,
            CheckName::GrayListedKey,
            CheckName::UsageConstraints,
            CheckName::CtRequired,
        ] {
            m.insert(check, check_no_op);
        }
        m
    };
}

/// `supported_checks` returns the names of all checks a policy may request, leaf checks first.
pub fn supported_checks() -> Vec<CheckName> {
    LEAF_CHECKS.keys().chain(PATH_CHECKS.keys()).cloned().collect()
}

/// `validate_key` runs the check for a policy option key if the key belongs to the given phase.
/// Keys that belong to the other phase are skipped. Keys unknown to both registries set the result
/// to [`TrustResult::OtherError`].
pub(crate) fn validate_key(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    check: &CheckName,
    phase: Phase,
) {
    let (registry, other) = match phase {
        Phase::Leaf => (&*LEAF_CHECKS, &*PATH_CHECKS),
        Phase::Path => (&*PATH_CHECKS, &*LEAF_CHECKS),
    };
    if let Some(f) = registry.get(check) {
        f(pvc, path, check);
    } else if !other.contains_key(check) {
        log_message(
            &TpLogLevels::TpWarn,
            &format!("Policy requested unsupported check: {}", check),
        );
        pvc.escalate(TrustResult::OtherError);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registries_are_disjoint() {
        for key in LEAF_CHECKS.keys() {
            assert!(!PATH_CHECKS.contains_key(key), "{} registered twice", key);
        }
        assert!(PATH_CHECKS.contains_key(&CheckName::CtRequired));
        assert!(LEAF_CHECKS.contains_key(&CheckName::SslHostname));
        let unknown = CheckName::from("PinningDatabaseFeature");
        assert!(!LEAF_CHECKS.contains_key(&unknown) && !PATH_CHECKS.contains_key(&unknown));
        assert_eq!(LEAF_CHECKS.len() + PATH_CHECKS.len(), supported_checks().len());
    }
}
