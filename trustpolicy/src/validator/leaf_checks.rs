//! Checks applied once to the leaf certificate (index 0) of a candidate path
//!
//! Each function reads its parameter from the current policy's option for the check. Options with an
//! unexpected type cause the check to be skipped.

use core::str::FromStr;

use der::asn1::ObjectIdentifier;
use lazy_static::lazy_static;
use x509_cert::name::Name;

use crate::source::certificate_facts::CertificateFacts;
use crate::util::logging::*;
use crate::util::pvc_alg_oids::PKIX_CE_ANY_EXTENDED_KEY_USAGE;
use crate::util::pvc_utilities::*;
use crate::validator::candidate_path::CandidatePath;
use crate::validator::check_names::CheckName;
use crate::validator::policy::{OptionValue, POLICY_NAME_SSL_SERVER};
use crate::validator::pvc::PolicyVerificationContext;
use crate::validator::trust_result::TrustResult;

const SECONDS_PER_DAY: u64 = 86400;

/// Issuer of the certificates fraudulently obtained from the UTN-USERFirst-Hardware CA in 2011
const BLOCKED_ISSUER: &str = "CN=UTN-USERFirst-Hardware,OU=http://www.usertrust.com,O=The USERTRUST Network,L=Salt Lake City,ST=UT,C=US";

const BLOCKED_SERIALS: [&str; 9] = [
    "047ECBE9FCA55F7BD09EAE36E10CAE1E",
    "00F5C86AF36162F13A64F54F6DC9587C06",
    "00D7558FDAF5F1105BB213282B707729A3",
    "392A434F0E07DF1F8AA305DE34E0C229",
    "3E75CED46B693021218830AE86A82A71",
    "00E9028B9578E415DC1A710A2B88154447",
    "00D8F35F4EB7872B2DAB0692E315382FB0",
    "009239D5348F40D1695A745470E1F23F43",
    "00B0B7133ED096F9B56FAE91C874BD3AC0",
];

lazy_static! {
    static ref BLOCKED_ISSUER_NAME: Option<Name> = Name::from_str(BLOCKED_ISSUER).ok();
    static ref BLOCKED_SERIAL_NUMBERS: Vec<Vec<u8>> = BLOCKED_SERIALS
        .iter()
        .filter_map(|s| hex_to_buffer(s).ok())
        .map(|s| strip_leading_zeros(&s).to_vec())
        .collect();
}

fn strip_leading_zeros(serial: &[u8]) -> &[u8] {
    let first = serial.iter().position(|b| *b != 0).unwrap_or(serial.len());
    &serial[first..]
}

/// `oid_values` parses the OIDs named by an option, skipping any that are malformed.
pub(crate) fn oid_values(value: &OptionValue) -> Vec<ObjectIdentifier> {
    value
        .strings()
        .unwrap_or_default()
        .iter()
        .filter_map(|s| match ObjectIdentifier::new(s) {
            Ok(oid) => Some(oid),
            Err(_e) => {
                log_message(
                    &TpLogLevels::TpDebug,
                    &format!("Ignoring malformed OID in policy option: {}", s),
                );
                None
            }
        })
        .collect()
}

/// `digest_values` parses the hex digests named by an option, skipping any that are malformed.
pub(crate) fn digest_values(value: &OptionValue) -> Vec<Vec<u8>> {
    value
        .strings()
        .unwrap_or_default()
        .iter()
        .filter_map(|s| hex_to_buffer(s).ok())
        .collect()
}

/// `has_marker` returns true if the certificate contains an extension identified by one of the
/// OIDs. When check_value is true, the extension value must be empty or an encoded NULL.
pub(crate) fn has_marker(
    cert: &dyn CertificateFacts,
    oids: &[ObjectIdentifier],
    check_value: bool,
) -> bool {
    oids.iter().any(|oid| match cert.extension_value(oid) {
        Some(value) => !check_value || value.is_empty() || value == [0x05, 0x00],
        None => false,
    })
}

fn leaf_matches_hostname(leaf: &dyn CertificateFacts, hostname: &str) -> bool {
    if let Some(ip) = ip_address_bytes(hostname) {
        return leaf.ip_addresses().contains(&ip);
    }
    let dns_names = leaf.dns_names();
    if !dns_names.is_empty() {
        dns_names.iter().any(|p| host_matches_pattern(p, hostname))
    } else {
        leaf.common_names()
            .iter()
            .any(|cn| host_matches_pattern(cn, hostname))
    }
}

/// Fails when no DNS name (or CN, absent DNS names) in the leaf matches the hostname. IP address
/// literals are compared to IP address SANs.
pub(crate) fn check_ssl_hostname(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let leaf = match path.leaf() {
        Some(leaf) => leaf,
        None => return,
    };
    let hostname = match pvc.option(key).and_then(|v| v.as_str()) {
        Some(h) if !h.is_empty() => h,
        _ => return,
    };
    if !leaf_matches_hostname(leaf, hostname) {
        pvc.set_result(path, key, 0, false);
    }
}

pub(crate) fn check_email(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let leaf = match path.leaf() {
        Some(leaf) => leaf,
        None => return,
    };
    let email = match pvc.option(key).and_then(|v| v.as_str()) {
        Some(e) if !e.is_empty() => e,
        _ => return,
    };
    if !leaf
        .email_addresses()
        .iter()
        .any(|e| e.eq_ignore_ascii_case(email))
    {
        pvc.set_result(path, key, 0, false);
    }
}

/// Shared implementation of checks comparing subject attribute values with a string option
fn check_subject_attribute(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
    values: fn(&dyn CertificateFacts) -> Vec<String>,
    matches: fn(&str, &str) -> bool,
) {
    let leaf = match path.leaf() {
        Some(leaf) => leaf,
        None => return,
    };
    let wanted = match pvc.option(key).and_then(|v| v.as_str()) {
        Some(w) => w,
        None => return,
    };
    if !values(leaf).iter().any(|v| matches(v, wanted)) {
        pvc.set_result(path, key, 0, false);
    }
}

pub(crate) fn check_subject_common_name(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    check_subject_attribute(pvc, path, key, |c| c.common_names(), |v, w| v == w);
}

pub(crate) fn check_subject_common_name_prefix(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    check_subject_attribute(pvc, path, key, |c| c.common_names(), |v, w| v.starts_with(w));
}

pub(crate) fn check_subject_common_name_test(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    check_subject_attribute(
        pvc,
        path,
        key,
        |c| c.common_names(),
        |v, w| v == w || v.strip_prefix("TEST ") == Some(w),
    );
}

pub(crate) fn check_subject_organization(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    check_subject_attribute(pvc, path, key, |c| c.organizations(), |v, w| v == w);
}

pub(crate) fn check_subject_organizational_unit(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    check_subject_attribute(pvc, path, key, |c| c.organizational_units(), |v, w| v == w);
}

/// Passes when the leaf has no EKU extension, asserts anyExtendedKeyUsage, or asserts one of the
/// OIDs named by the option.
pub(crate) fn check_extended_key_usage(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let leaf = match path.leaf() {
        Some(leaf) => leaf,
        None => return,
    };
    let wanted = match pvc.option(key) {
        Some(v) if v.strings().is_some() => oid_values(v),
        _ => return,
    };
    let ekus = match leaf.extended_key_usage() {
        Some(ekus) => ekus,
        None => return,
    };
    if ekus.contains(&PKIX_CE_ANY_EXTENDED_KEY_USAGE) || wanted.iter().any(|w| ekus.contains(w)) {
        return;
    }
    pvc.set_result(path, key, 0, false);
}

/// Passes when the leaf has no key usage extension or permits every bit of one of the option values.
pub(crate) fn check_key_usage(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let leaf = match path.leaf() {
        Some(leaf) => leaf,
        None => return,
    };
    let wanted = match pvc.option(key).and_then(|v| v.integers()) {
        Some(w) => w,
        None => return,
    };
    let ku = match leaf.key_usage() {
        Some(ku) => ku,
        None => return,
    };
    let masks: Vec<u32> = wanted.iter().filter_map(|v| u32::try_from(*v).ok()).collect();
    if masks.is_empty() {
        return;
    }
    if !masks.iter().any(|v| ku & v == *v) {
        pvc.set_result(path, key, 0, false);
    }
}

pub(crate) fn check_not_valid_before(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let leaf = match path.leaf() {
        Some(leaf) => leaf,
        None => return,
    };
    if let Some(earliest) = pvc.option(key).and_then(|v| v.as_integer()) {
        if (leaf.not_before() as i64) < earliest {
            pvc.set_result(path, key, 0, false);
        }
    }
}

fn eap_name_matches(trusted: &str, name: &str) -> bool {
    let trusted = normalize_host(trusted);
    let name = normalize_host(name);
    if trusted.is_empty() || name.is_empty() {
        return false;
    }
    trusted == name
        || (trusted.starts_with('.') && name.ends_with(&trusted))
        || host_matches_pattern(&name, &trusted)
        || host_matches_pattern(&trusted, &name)
}

/// Passes when the option is an empty list or some DNS name (or CN, absent DNS names) of the leaf
/// matches a trusted server name.
pub(crate) fn check_eap_trusted_server_names(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let leaf = match path.leaf() {
        Some(leaf) => leaf,
        None => return,
    };
    let trusted = match pvc.option(key).and_then(|v| v.strings()) {
        Some(t) => t,
        None => return,
    };
    if trusted.is_empty() {
        return;
    }
    let mut names = leaf.dns_names();
    if names.is_empty() {
        names = leaf.common_names();
    }
    if !names
        .iter()
        .any(|n| trusted.iter().any(|t| eap_name_matches(t, n)))
    {
        pvc.set_result(path, key, 0, false);
    }
}

fn check_leaf_marker(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
    value: Option<&OptionValue>,
    check_value: bool,
) {
    let leaf = match path.leaf() {
        Some(leaf) => leaf,
        None => return,
    };
    let oids = match value {
        Some(v) => oid_values(v),
        None => return,
    };
    if oids.is_empty() {
        return;
    }
    if !has_marker(leaf, &oids, check_value) {
        pvc.set_result(path, key, 0, false);
    }
}

pub(crate) fn check_leaf_marker_oid(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let value = pvc.option(key);
    check_leaf_marker(pvc, path, key, value, true);
}

pub(crate) fn check_leaf_marker_oid_no_value_check(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let value = pvc.option(key);
    check_leaf_marker(pvc, path, key, value, false);
}

/// Only the "ProdMarker" entry of the option dictionary is consulted.
pub(crate) fn check_leaf_markers_prod_and_qa(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let value = pvc
        .option(key)
        .and_then(|v| v.as_dictionary())
        .and_then(|d| d.get("ProdMarker"));
    check_leaf_marker(pvc, path, key, value, true);
}

/// `is_blocked_leaf` returns true for the certificates fraudulently issued under UTN-USERFirst-Hardware.
fn is_blocked_leaf(leaf: &dyn CertificateFacts) -> bool {
    let issuer = match BLOCKED_ISSUER_NAME.as_ref() {
        Some(issuer) => issuer,
        None => return false,
    };
    if !compare_names(issuer, leaf.issuer()) {
        return false;
    }
    let serial = strip_leading_zeros(leaf.serial_number());
    BLOCKED_SERIAL_NUMBERS.iter().any(|s| s.as_slice() == serial)
}

pub(crate) fn check_blacklisted_leaf(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let leaf = match path.leaf() {
        Some(leaf) => leaf,
        None => return,
    };
    if is_blocked_leaf(leaf) || pvc.env().is_blocked_key(leaf.public_key_sha1()) {
        log_message(
            &TpLogLevels::TpInfo,
            &format!(
                "Leaf certificate issued by {} is blocked",
                name_to_string(leaf.issuer())
            ),
        );
        pvc.record_fatal_check(key, 0, false);
        pvc.escalate(TrustResult::FatalTrustFailure);
    }
}

pub(crate) fn check_graylisted_leaf(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let leaf = match path.leaf() {
        Some(leaf) => leaf,
        None => return,
    };
    if pvc.env().is_graylisted_key(leaf.public_key_sha1()) {
        pvc.set_result(path, key, 0, false);
    }
}

/// Fails unless some policy being evaluated is named for a use case other than generic TLS server
/// authentication.
pub(crate) fn check_pinning_required(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    if pvc
        .policies()
        .iter()
        .all(|p| p.name.is_empty() || p.name == POLICY_NAME_SSL_SERVER)
    {
        pvc.set_result(path, key, 0, false);
    }
}

pub(crate) fn check_not_ca(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    if path.leaf().map_or(false, |leaf| leaf.is_ca()) {
        pvc.set_result(path, key, 0, false);
    }
}

pub(crate) fn check_leaf_spki_sha256(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let leaf = match path.leaf() {
        Some(leaf) => leaf,
        None => return,
    };
    let digests = match pvc.option(key) {
        Some(v) => digest_values(v),
        None => return,
    };
    if digests.is_empty() {
        return;
    }
    if !digests.iter().any(|d| d.as_slice() == leaf.spki_sha256()) {
        pvc.set_result(path, key, 0, false);
    }
}

pub(crate) fn check_validity_period_maximums(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let leaf = match path.leaf() {
        Some(leaf) => leaf,
        None => return,
    };
    let days = match pvc.option(key).and_then(|v| v.as_integer()) {
        Some(d) if d >= 0 => d as u64,
        _ => return,
    };
    let lifetime = leaf.not_after().saturating_sub(leaf.not_before());
    if lifetime > days.saturating_mul(SECONDS_PER_DAY) {
        pvc.set_result(path, key, 0, false);
    }
}

/// Fails when the subject is empty, unless a critical subject alternative name extension is present.
pub(crate) fn check_non_empty_subject(
    pvc: &mut PolicyVerificationContext<'_>,
    path: &CandidatePath,
    key: &CheckName,
) {
    let leaf = match path.leaf() {
        Some(leaf) => leaf,
        None => return,
    };
    if leaf.subject().0.is_empty()
        && (leaf.subject_alt_names().is_none() || !leaf.subject_alt_names_critical())
    {
        pvc.set_result(path, key, 0, false);
    }
}
