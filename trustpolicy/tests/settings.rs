mod common;

use base64ct::{Base64, Encoding};
use common::*;
use serde_json::json;
use trustpolicy::*;

/// 2014-05-13T16:53:20Z
const MAY_2014: u64 = 1400000000;

fn configured(settings: serde_json::Value) -> TrustEnvironment {
    let mut env = environment_trusting(&root(), AnchorStore::System);
    let settings = EnvironmentSettings::from_json(&settings.to_string()).unwrap();
    env.apply_settings(&settings).unwrap();
    env
}

#[test]
fn distrusted_root_cut_over() {
    let env = configured(json!({
        "distrusted_roots": [buffer_to_hex(root().certificate_sha256())]
    }));
    let policies = vec![Policy::basic_x509()];

    let mut pvc = PolicyVerificationContext::new(&env, &policies, VERIFY_TIME, &[]);
    let mut path = three_cert_path();
    assert_eq!(TrustResult::FatalTrustFailure, pvc.evaluate(&mut path));
    assert!(pvc.details()[0].contains_key(&CheckName::BlackListedKey));
    assert!(pvc.details()[2].is_empty());

    // certificates issued before the cut-over are unaffected
    let old_leaf = leaf().validity(MAY_2014, JAN_2025);
    let old_ca = intermediate().validity(MAY_2014, JAN_2025);
    let mut pvc = PolicyVerificationContext::new(&env, &policies, VERIFY_TIME, &[]);
    let mut path = CandidatePath::new(vec![old_leaf.boxed(), old_ca.boxed(), root().boxed()]);
    assert_eq!(TrustResult::Unspecified, pvc.evaluate(&mut path));
}

#[test]
fn graylisted_intermediate() {
    let env = configured(json!({
        "graylisted_keys": [buffer_to_hex(intermediate().public_key_sha1())]
    }));
    let policies = vec![Policy::basic_x509()];
    let mut pvc = PolicyVerificationContext::new(&env, &policies, VERIFY_TIME, &[]);
    let mut path = three_cert_path();
    assert_eq!(TrustResult::RecoverableTrustFailure, pvc.evaluate(&mut path));
    assert!(pvc.details()[1].contains_key(&CheckName::GrayListedKey));
}

#[test]
fn logs_and_ev_anchors_from_settings() {
    let log = TestLog::new(7);
    let key = Base64::encode_string(&log.trusted_log(None).key_der);
    let env = configured(json!({
        "ev_anchors": { "2.23.140.1.1": [buffer_to_hex(root().certificate_sha1())] },
        "trusted_logs": [ { "key": key, "expiry": JAN_2025 } ]
    }));

    assert_eq!(1, env.trusted_logs().len());
    assert_eq!(Some(JAN_2025), env.trusted_logs()[0].expiry);
    assert_eq!(log.trusted_log(None).log_id(), env.trusted_logs()[0].log_id());
    assert!(env.is_ev_anchor(
        &der::asn1::ObjectIdentifier::new_unwrap("2.23.140.1.1"),
        root().certificate_sha1()
    ));
}

#[test]
fn rejected_settings_change_nothing() {
    let mut env = environment_trusting(&root(), AnchorStore::System);
    let settings = EnvironmentSettings::from_json(
        &json!({
            "blocked_keys": [buffer_to_hex(leaf().public_key_sha1())],
            "trusted_logs": [ { "key": "not base64!" } ]
        })
        .to_string(),
    )
    .unwrap();
    assert!(env.apply_settings(&settings).is_err());
    assert!(!env.is_blocked_key(leaf().public_key_sha1()));
    assert!(env.trusted_logs().is_empty());
}
