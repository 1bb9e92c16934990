//! Fixed portion of path evaluation: key identifier linkage, RFC 5280 basic certificate processing,
//! blocked and graylisted keys, and usage constraints
//!
//! Basic certificate processing walks the path from the certificate nearest the anchor toward the
//! leaf as described in [RFC 5280 Section 6.1.3], accumulating name constraints and the maximum path
//! length as it goes.
//!
//! [RFC 5280 Section 6.1.3]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1.3>

use crate::source::trust_settings::{AnchorStore, TrustSettingsResult};
use crate::util::logging::*;
use crate::util::pvc_utilities::{name_to_string, TIME_2016_10_21};
use crate::validator::candidate_path::CandidatePath;
use crate::validator::check_names::CheckName;
use crate::validator::constraint_matcher::meets_constraint;
use crate::validator::name_constraints_set::NameConstraintsSet;
use crate::validator::pvc::PolicyVerificationContext;
use crate::validator::trust_result::TrustResult;

/// `get_trust_settings_result` returns the result declared by the first usage constraint on the
/// certificate at index ix that matches the evaluation. A matching constraint that declares no
/// result yields [`TrustSettingsResult::TrustRoot`]. When no constraint matches, or there are none,
/// [`TrustSettingsResult::Invalid`] is returned.
pub(crate) fn get_trust_settings_result(
    pvc: &PolicyVerificationContext<'_>,
    path: &CandidatePath,
    ix: usize,
) -> TrustSettingsResult {
    path.constraints(ix)
        .iter()
        .find(|c| meets_constraint(pvc, path, ix, c))
        .map_or(TrustSettingsResult::Invalid, |c| {
            c.result.unwrap_or(TrustSettingsResult::TrustRoot)
        })
}

/// `is_anchor_trusted` returns true if the path is anchored and the anchor either carries no usage
/// constraints or its constraints declare it a root.
fn is_anchor_trusted(pvc: &PolicyVerificationContext<'_>, path: &CandidatePath) -> bool {
    if !path.is_anchored || path.is_empty() {
        return false;
    }
    let ix = path.len() - 1;
    if path.constraints(ix).is_empty() {
        return true;
    }
    matches!(
        get_trust_settings_result(pvc, path, ix),
        TrustSettingsResult::TrustRoot | TrustSettingsResult::TrustAsRoot
    )
}

/// `id_linkage` verifies that each authority key identifier matches the subject key identifier of
/// the issuer, when both are present.
pub(crate) fn id_linkage(pvc: &mut PolicyVerificationContext<'_>, path: &CandidatePath) {
    for i in (1..path.len()).rev() {
        let child = &path.certificates[i - 1];
        let parent = &path.certificates[i];
        if let (Some(akid), Some(skid)) = (
            child.authority_key_identifier(),
            parent.subject_key_identifier(),
        ) {
            if akid != skid && !pvc.set_result(path, &CheckName::IdLinkage, i - 1, false) {
                return;
            }
        }
    }
}

/// `basic_certificate_processing` checks validity periods, key strength, name constraints, basic
/// constraints and critical extensions for each certificate in the path.
pub(crate) fn basic_certificate_processing(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
) {
    let count = path.len();
    if count == 0 {
        return;
    }

    let trusted = is_anchor_trusted(pvc, path);
    if !trusted
        && !path.is_allowlisted
        && !pvc.set_result_forced(path, &CheckName::AnchorTrusted, count - 1, false)
    {
        return;
    }

    // a trusted anchor is not itself processed
    let n = if trusted { count - 1 } else { count };
    let mut permitted_subtrees = NameConstraintsSet::default();
    let mut excluded_subtrees = NameConstraintsSet::default();
    let mut max_path_length = n;

    for i in 1..=n {
        let ix = n - i;
        let is_last = i == n;
        let cert = path.certificates[ix].as_ref();

        if !cert.is_valid_at(pvc.verify_time()) {
            let key = if is_last {
                CheckName::ValidLeaf
            } else if ix == count - 1 {
                CheckName::ValidRoot
            } else {
                CheckName::ValidIntermediates
            };
            if !pvc.set_result(path, &key, ix, false) {
                return;
            }
        }

        if cert.is_weak_key() {
            let key = if is_last {
                CheckName::WeakLeaf
            } else {
                CheckName::WeakIntermediates
            };
            if !pvc.record_fatal_check(&key, ix, false) {
                return;
            }
            pvc.escalate(TrustResult::FatalTrustFailure);
        }

        if !cert.is_self_issued() || is_last {
            let subject = cert.subject();
            let san = cert.subject_alt_names();
            let excluded = excluded_subtrees.subject_within_excluded_subtrees(subject)
                || excluded_subtrees.san_within_excluded_subtrees(san);
            let permitted = permitted_subtrees.subject_within_permitted_subtrees(subject)
                && permitted_subtrees.san_within_permitted_subtrees(san);
            if excluded || !permitted {
                log_message(
                    &TpLogLevels::TpInfo,
                    &format!(
                        "Name constraints violated by certificate at index {} ({})",
                        ix,
                        name_to_string(subject)
                    ),
                );
                if !pvc.set_result_forced(path, &CheckName::NameConstraints, ix, false) {
                    return;
                }
            }
        }

        if is_last {
            continue;
        }

        if cert.version() >= 3
            && !cert.is_ca()
            && !pvc.set_result_forced(path, &CheckName::BasicConstraintsCa, ix, false)
        {
            return;
        }

        if !cert.is_self_issued() {
            if max_path_length > 0 {
                max_path_length -= 1;
            } else if !pvc.set_result_forced(path, &CheckName::BasicConstraints, ix, false) {
                return;
            }
        }

        if let Some(path_len) = cert.path_len_constraint() {
            if (path_len as usize) < max_path_length {
                max_path_length = path_len as usize;
            }
        }

        if let Some(nc) = cert.name_constraints() {
            if let Some(permitted) = &nc.permitted_subtrees {
                permitted_subtrees.calculate_intersection(permitted);
            }
            if let Some(excluded) = &nc.excluded_subtrees {
                excluded_subtrees.calculate_union(excluded);
            }
        }

        if cert.has_unknown_critical_extensions()
            && !pvc.set_result_forced(path, &CheckName::CriticalExtensions, ix, false)
        {
            return;
        }
    }

    if path.certificates[0].has_unknown_critical_extensions() {
        pvc.set_result_forced(path, &CheckName::CriticalExtensions, 0, false);
    }
}

/// `check_blocked_keys` rejects paths in which a certificate other than the leaf or anchor has a
/// blocked or graylisted key, and paths to date-constrained roots containing certificates issued
/// after the cut-over date.
pub(crate) fn check_blocked_keys(pvc: &mut PolicyVerificationContext<'_>, path: &CandidatePath) {
    let count = path.len();
    let end = if path.is_anchored {
        count.saturating_sub(1)
    } else {
        count
    };
    let env = pvc.env();

    for ix in 1..end {
        let key_sha1 = path.certificates[ix].public_key_sha1();
        if env.is_blocked_key(key_sha1) {
            if !pvc.record_fatal_check(&CheckName::BlackListedKey, ix, false) {
                return;
            }
            if !path.is_allowlisted {
                pvc.escalate(TrustResult::FatalTrustFailure);
            }
        }
        if env.is_graylisted_key(key_sha1)
            && !pvc.set_result_forced(path, &CheckName::GrayListedKey, ix, false)
        {
            return;
        }
    }

    let root = match path.root() {
        Some(root) => root,
        None => return,
    };
    if !env.is_distrusted_root(root.certificate_sha256()) {
        return;
    }
    for ix in 0..count - 1 {
        if path.certificates[ix].not_before() >= TIME_2016_10_21 {
            log_message(
                &TpLogLevels::TpInfo,
                &format!(
                    "Certificate at index {} was issued under a date-constrained root after the cut-over",
                    ix
                ),
            );
            if !pvc.record_fatal_check(&CheckName::BlackListedKey, ix, false) {
                return;
            }
            pvc.escalate(TrustResult::FatalTrustFailure);
        }
    }
}

/// `check_usage_constraints` applies the results declared by usage constraints. A Deny result is
/// recorded as a failure. Anchors from the Admin or User stores that are not denied mark an "ok"
/// result as [`TrustResult::Proceed`].
pub(crate) fn check_usage_constraints(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
) {
    for ix in 0..path.len() {
        match get_trust_settings_result(pvc, path, ix) {
            TrustSettingsResult::Deny => {
                if !pvc.set_result_forced(path, &CheckName::UsageConstraints, ix, false) {
                    return;
                }
                pvc.escalate(TrustResult::Deny);
            }
            TrustSettingsResult::TrustRoot
            | TrustSettingsResult::TrustAsRoot
            | TrustSettingsResult::Invalid => {
                if matches!(path.store(ix), Some(AnchorStore::Admin | AnchorStore::User)) {
                    pvc.proceed();
                }
            }
            TrustSettingsResult::Unspecified => {}
        }
    }
}
