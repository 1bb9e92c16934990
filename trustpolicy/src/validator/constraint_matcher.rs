//! The constraint_matcher module determines whether a usage constraint attached to a trust anchor
//! applies to the evaluation in progress.

use crate::source::trust_settings::*;
use crate::validator::candidate_path::CandidatePath;
use crate::validator::check_names::CheckName;
use crate::validator::policy::*;
use crate::validator::pvc::PolicyVerificationContext;

/// Options whose value names the subject an evaluation is bound to
const POLICY_STRING_OPTIONS: [CheckName; 3] = [
    CheckName::SslHostname,
    CheckName::Email,
    CheckName::EapTrustedServerNames,
];

/// `find_policy` returns the first policy matching both the OID and name, then the first matching
/// the OID alone, then the first matching the name alone.
fn find_policy<'a>(
    policies: &'a [Policy],
    oid: Option<&str>,
    name: Option<&str>,
) -> Option<&'a Policy> {
    if let (Some(oid), Some(name)) = (oid, name) {
        if let Some(p) = policies.iter().find(|p| p.oid == oid && p.name == name) {
            return Some(p);
        }
    }
    if let Some(oid) = oid {
        if let Some(p) = policies.iter().find(|p| p.oid == oid) {
            return Some(p);
        }
    }
    if let Some(name) = name {
        if let Some(p) = policies.iter().find(|p| p.name == name) {
            return Some(p);
        }
    }
    None
}

fn policy_string_matches(policy: &Policy, wanted: &str) -> bool {
    POLICY_STRING_OPTIONS.iter().any(|check| {
        policy
            .option(check)
            .and_then(|v| v.strings())
            .map_or(false, |values| values.iter().any(|v| v.eq_ignore_ascii_case(wanted)))
    })
}

/// `evaluated_key_usage` returns the trust settings key usage bits exercised by the evaluation for
/// the certificate at index ix.
fn evaluated_key_usage(policies: &[Policy], ix: usize) -> u32 {
    let mut usage = 0;
    if policies.iter().any(|p| p.name == POLICY_NAME_OCSP_SIGNER) {
        usage |= TS_KEY_USE_SIGN_REVOCATION;
    }
    if ix != 0 {
        usage |= TS_KEY_USE_SIGN_CERT;
    }
    for policy in policies {
        if let Some(values) = policy.option(&CheckName::KeyUsage).and_then(|v| v.integers()) {
            for v in values {
                usage |= x509_to_trust_settings_usage(v as u32);
            }
        }
    }
    usage
}

/// `meets_constraint` returns true if every field present in the constraint matches the evaluation
/// of the certificate at index ix. Absent fields match anything.
///
/// - `policy_oid`/`policy_name` must identify one of the policies being evaluated.
/// - `policy_string` must equal (ignoring case) the hostname, email address or EAP server name of
///   the matched policy, or of the current policy when the constraint names no policy.
/// - `key_usage` must equal the usage exercised by the evaluation unless it is [`TS_KEY_USE_ANY`].
/// - `application_requirement` must be satisfied according to the environment.
pub fn meets_constraint(
    pvc: &PolicyVerificationContext<'_>,
    _path: &CandidatePath,
    ix: usize,
    constraint: &Constraint,
) -> bool {
    let policies = pvc.policies();

    let mut matched = None;
    if constraint.policy_oid.is_some() || constraint.policy_name.is_some() {
        matched = find_policy(
            policies,
            constraint.policy_oid.as_deref(),
            constraint.policy_name.as_deref(),
        );
        if matched.is_none() {
            return false;
        }
    }

    if let Some(wanted) = &constraint.policy_string {
        match matched.or_else(|| pvc.current_policy()) {
            Some(policy) if policy_string_matches(policy, wanted) => {}
            _ => return false,
        }
    }

    if let Some(ku) = constraint.key_usage {
        if ku != TS_KEY_USE_ANY && ku != evaluated_key_usage(policies, ix) {
            return false;
        }
    }

    if let Some(requirement) = &constraint.application_requirement {
        if !pvc.env().check_application_requirement(requirement) {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::trust_environment::TrustEnvironment;
    use crate::source::certificate_facts::*;

    fn ctx_with<'a>(env: &'a TrustEnvironment, policies: &'a [Policy]) -> PolicyVerificationContext<'a> {
        PolicyVerificationContext::new(env, policies, 0, &[])
    }

    #[test]
    fn policy_lookup_order() {
        let policies = vec![
            Policy::new("a", "1.2.3"),
            Policy::new("b", "1.2.4"),
            Policy::new("c", "1.2.3"),
        ];
        assert_eq!("c", find_policy(&policies, Some("1.2.3"), Some("c")).unwrap().name);
        assert_eq!("a", find_policy(&policies, Some("1.2.3"), Some("z")).unwrap().name);
        assert_eq!("b", find_policy(&policies, Some("9.9"), Some("b")).unwrap().name);
        assert!(find_policy(&policies, Some("9.9"), None).is_none());
    }

    #[test]
    fn key_usage_reconstruction() {
        let policies = vec![Policy::ocsp_signer()];
        assert_eq!(
            TS_KEY_USE_SIGN_REVOCATION | TS_KEY_USE_SIGNATURE,
            evaluated_key_usage(&policies, 0)
        );
        let policies = vec![Policy::basic_x509().with_option(
            CheckName::KeyUsage,
            OptionValue::Integer(i64::from(KU_KEY_ENCIPHERMENT)),
        )];
        assert_eq!(
            TS_KEY_USE_SIGN_CERT | TS_KEY_USE_EN_DECRYPT_KEY,
            evaluated_key_usage(&policies, 2)
        );
    }

    #[test]
    fn fields_must_all_match() {
        let env = TrustEnvironment::default();
        let policies = vec![Policy::ssl_server(Some("WWW.example.com"))];
        let pvc = ctx_with(&env, &policies);
        let path = CandidatePath::new(vec![]);

        let c = Constraint {
            policy_name: Some(POLICY_NAME_SSL_SERVER.to_string()),
            policy_string: Some("www.EXAMPLE.com".to_string()),
            ..Default::default()
        };
        assert!(meets_constraint(&pvc, &path, 0, &c));

        let c = Constraint {
            policy_name: Some(POLICY_NAME_SMIME.to_string()),
            ..Default::default()
        };
        assert!(!meets_constraint(&pvc, &path, 0, &c));

        let c = Constraint {
            key_usage: Some(TS_KEY_USE_ANY),
            ..Default::default()
        };
        assert!(meets_constraint(&pvc, &path, 0, &c));

        let c = Constraint {
            key_usage: Some(TS_KEY_USE_SIGNATURE),
            ..Default::default()
        };
        assert!(!meets_constraint(&pvc, &path, 1, &c));

        let c = Constraint {
            application_requirement: Some("anchor requirement".to_string()),
            ..Default::default()
        };
        assert!(!meets_constraint(&pvc, &path, 0, &c));
        assert!(meets_constraint(&pvc, &path, 0, &Constraint::default()));
    }
}
