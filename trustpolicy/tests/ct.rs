mod common;

use common::*;
use trustpolicy::*;

/// 2023-06-01T00:00:00Z
const JUN_2023: u64 = 1685577600;
/// 2024-04-01T00:00:00Z, ten months after JUN_2023
const APR_2024: u64 = 1711929600;
/// SCT issuance time in milliseconds
const SCT_TIME: u64 = 1690000000 * 1000;

fn ct_leaf() -> TestCertificate {
    TestCertificate::new("ct leaf", LEAF_DN, CA_DN)
        .dns_names(&["www.example.com"])
        .validity(JUN_2023, APR_2024)
}

fn embed(leaf: &mut TestCertificate, logs: &[&TestLog]) {
    let issuer = intermediate();
    let tbs = precert_tbs(&leaf.label);
    let entry = LogEntry::Precert {
        issuer_key_hash: issuer.spki_sha256(),
        tbs_certificate: &tbs,
    };
    let scts: Vec<Vec<u8>> = logs.iter().map(|l| l.sct(SCT_TIME, &entry)).collect();
    leaf.sct_list = Some(sct_list(&scts));
}

fn env_with_logs(logs: &[TrustedLog]) -> TrustEnvironment {
    let mut env = environment_trusting(&root(), AnchorStore::System);
    for log in logs {
        env.add_trusted_log(log.clone());
    }
    env
}

fn path_for(leaf: TestCertificate) -> CandidatePath {
    CandidatePath::new(vec![leaf.boxed(), intermediate().boxed(), root().boxed()])
}

#[test]
fn two_embedded_scts_qualify() {
    let (log1, log2) = (TestLog::new(1), TestLog::new(2));
    let env = env_with_logs(&[log1.trusted_log(None), log2.trusted_log(None)]);
    let mut leaf = ct_leaf();
    embed(&mut leaf, &[&log1, &log2]);

    assert!(is_ct_qualified(&env, &path_for(leaf), VERIFY_TIME));
}

#[test]
fn one_embedded_sct_is_not_enough() {
    let (log1, log2) = (TestLog::new(1), TestLog::new(2));
    let env = env_with_logs(&[log1.trusted_log(None), log2.trusted_log(None)]);
    let mut leaf = ct_leaf();
    embed(&mut leaf, &[&log1]);

    let policies = vec![Policy::ssl_server(Some("www.example.com"))
        .with_option(CheckName::CtRequired, true.into())];
    let mut pvc = PolicyVerificationContext::new(&env, &policies, VERIFY_TIME, &[]);
    let mut path = path_for(leaf);
    assert_eq!(TrustResult::RecoverableTrustFailure, pvc.evaluate(&mut path));
    assert!(!path.is_ct);
    assert!(!pvc.is_ct());
    assert!(pvc.details()[0].contains_key(&CheckName::CtRequired));
}

#[test]
fn ct_required_passes_when_qualified() {
    let (log1, log2) = (TestLog::new(1), TestLog::new(2));
    let env = env_with_logs(&[log1.trusted_log(None), log2.trusted_log(None)]);
    let mut leaf = ct_leaf();
    embed(&mut leaf, &[&log1, &log2]);

    let policies = vec![Policy::ssl_server(Some("www.example.com"))
        .with_option(CheckName::CtRequired, true.into())];
    let mut pvc = PolicyVerificationContext::new(&env, &policies, VERIFY_TIME, &[]);
    let mut path = path_for(leaf);
    assert_eq!(TrustResult::Unspecified, pvc.evaluate(&mut path));
    assert!(path.is_ct);
    assert!(pvc.is_ct());
}

#[test]
fn retired_log_counts_for_embedded_scts() {
    let (log1, log2) = (TestLog::new(1), TestLog::new(2));
    // log1 stopped being qualified after the SCT was issued but before verification
    let retired = log1.trusted_log(Some(1695000000));
    let env = env_with_logs(&[retired, log2.trusted_log(None)]);
    let mut leaf = ct_leaf();
    embed(&mut leaf, &[&log1, &log2]);
    assert!(is_ct_qualified(&env, &path_for(leaf.clone()), VERIFY_TIME));

    // with only the retired log nothing is currently qualified
    let env = env_with_logs(&[log1.trusted_log(Some(1695000000))]);
    embed(&mut leaf, &[&log1]);
    assert!(!is_ct_qualified(&env, &path_for(leaf), VERIFY_TIME));
}

#[test]
fn builder_scts_qualify() {
    let (log1, log2) = (TestLog::new(1), TestLog::new(2));
    let env = env_with_logs(&[log1.trusted_log(None), log2.trusted_log(None)]);
    let leaf = ct_leaf();
    let entry = LogEntry::X509(&leaf.encoded);
    let scts = vec![log1.sct(SCT_TIME, &entry), log2.sct(SCT_TIME, &entry)];

    let mut path = path_for(leaf.clone());
    path.builder_scts = scts.clone();
    // malformed OCSP responses are ignored
    path.ocsp_responses = vec![vec![0x30, 0x03, 0x0a, 0x01, 0x00]];
    assert!(is_ct_qualified(&env, &path, VERIFY_TIME));

    // the same SCTs do not verify against a different certificate
    let mut other = ct_leaf();
    other.encoded = b"another certificate".to_vec();
    let mut path = path_for(other);
    path.builder_scts = scts;
    assert!(!is_ct_qualified(&env, &path, VERIFY_TIME));
}

#[test]
fn untrusted_and_future_scts_are_ignored() {
    let (log1, log2, log3) = (TestLog::new(1), TestLog::new(2), TestLog::new(3));
    let env = env_with_logs(&[log1.trusted_log(None), log2.trusted_log(None)]);
    let leaf = ct_leaf();
    let entry = LogEntry::X509(&leaf.encoded);

    let mut path = path_for(leaf.clone());
    path.builder_scts = vec![log1.sct(SCT_TIME, &entry), log3.sct(SCT_TIME, &entry)];
    assert!(!is_ct_qualified(&env, &path, VERIFY_TIME));

    let mut path = path_for(leaf.clone());
    path.builder_scts = vec![
        log1.sct(SCT_TIME, &entry),
        log2.sct((VERIFY_TIME + 60) * 1000, &entry),
    ];
    assert!(!is_ct_qualified(&env, &path, VERIFY_TIME));
}

#[test]
fn ocsp_response_parsing_fails_cleanly() {
    assert!(scts_from_ocsp_response(&[0x30, 0x03, 0x0a, 0x01, 0x01]).is_err());
    assert!(scts_from_ocsp_response(b"not der").is_err());
}
