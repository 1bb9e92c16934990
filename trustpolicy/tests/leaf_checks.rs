mod common;

use common::*;
use der::asn1::ObjectIdentifier;
use x509_cert::name::RdnSequence;
use trustpolicy::*;

const SERVER_AUTH: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.1");
const CLIENT_AUTH: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.2");

/// Runs leaf checks for a single policy and returns the result and the failed checks for the leaf.
fn run(policy: Policy, leaf: TestCertificate) -> (TrustResult, Vec<CheckName>) {
    let env = TrustEnvironment::default();
    let policies = vec![policy];
    let mut pvc = PolicyVerificationContext::new(&env, &policies, VERIFY_TIME, &[]);
    let path = CandidatePath::new(vec![leaf.boxed(), intermediate().boxed()]);
    let result = pvc.leaf_checks(&path);
    let failed = pvc.details()[0].keys().cloned().collect();
    (result, failed)
}

fn custom() -> Policy {
    Policy::new("custom", "1.2.3")
}

#[test]
fn hostname() {
    let (result, failed) = run(Policy::ssl_server(Some("www.example.com")), leaf());
    assert_eq!(TrustResult::Unspecified, result);
    assert!(failed.is_empty());

    let wildcard = leaf().dns_names(&["*.example.com"]);
    let (result, _) = run(Policy::ssl_server(Some("mail.example.com")), wildcard.clone());
    assert!(result.is_ok());
    let (result, failed) = run(Policy::ssl_server(Some("a.b.example.com")), wildcard);
    assert_eq!(TrustResult::RecoverableTrustFailure, result);
    assert_eq!(vec![CheckName::SslHostname], failed);

    // common name is only consulted when there are no DNS names
    let mut cn_only = leaf();
    cn_only.san = None;
    assert!(run(Policy::ssl_server(Some("www.example.com")), cn_only).0.is_ok());
}

#[test]
fn email() {
    let smime = leaf().emails(&["Joe@Example.com"]);
    assert!(run(Policy::smime(Some("joe@example.com")), smime.clone()).0.is_ok());
    let (_, failed) = run(Policy::smime(Some("sue@example.com")), smime);
    assert_eq!(vec![CheckName::Email], failed);
}

#[test]
fn extended_key_usage() {
    // absent EKU passes
    assert!(run(Policy::ssl_server(None), leaf()).0.is_ok());
    assert!(run(Policy::ssl_server(None), leaf().eku(&[SERVER_AUTH])).0.is_ok());
    let (_, failed) = run(Policy::ssl_server(None), leaf().eku(&[CLIENT_AUTH]));
    assert_eq!(vec![CheckName::ExtendedKeyUsage], failed);
    assert!(run(Policy::ssl_server(None), leaf().eku(&[PKIX_CE_ANY_EXTENDED_KEY_USAGE])).0.is_ok());
}

#[test]
fn key_usage() {
    let mut signer = leaf();
    signer.key_usage = Some(KU_DIGITAL_SIGNATURE | KU_KEY_ENCIPHERMENT);
    let policy = custom().with_option(
        CheckName::KeyUsage,
        OptionValue::Array(vec![
            OptionValue::Integer(KU_KEY_AGREEMENT as i64),
            OptionValue::Integer(KU_DIGITAL_SIGNATURE as i64),
        ]),
    );
    assert!(run(policy.clone(), signer.clone()).0.is_ok());

    let policy = custom().with_option(CheckName::KeyUsage, OptionValue::Integer(KU_KEY_CERT_SIGN as i64));
    assert_eq!(vec![CheckName::KeyUsage], run(policy.clone(), signer).1);
    // absent key usage passes
    assert!(run(policy, leaf()).0.is_ok());
}

#[test]
fn key_usage_out_of_range_is_skipped() {
    let mut signer = leaf();
    signer.key_usage = Some(KU_DIGITAL_SIGNATURE);
    let policy = custom().with_option(CheckName::KeyUsage, OptionValue::Integer(-1));
    assert!(run(policy, signer.clone()).0.is_ok());

    let policy = custom().with_option(
        CheckName::KeyUsage,
        OptionValue::Array(vec![OptionValue::Integer(1 << 40), OptionValue::Integer(-8)]),
    );
    assert!(run(policy, signer.clone()).0.is_ok());

    // usable values are still enforced
    let policy = custom().with_option(
        CheckName::KeyUsage,
        OptionValue::Array(vec![
            OptionValue::Integer(-1),
            OptionValue::Integer(KU_KEY_CERT_SIGN as i64),
        ]),
    );
    assert_eq!(vec![CheckName::KeyUsage], run(policy, signer).1);
}

#[test]
fn subject_names() {
    let mut test_leaf = leaf();
    test_leaf.subject = name("CN=TEST Widget Service,O=Widgets,OU=Ops");
    let policy = custom()
        .with_option(CheckName::SubjectCommonNameTest, "Widget Service".into())
        .with_option(CheckName::SubjectCommonNamePrefix, "TEST W".into())
        .with_option(CheckName::SubjectOrganization, "Widgets".into())
        .with_option(CheckName::SubjectOrganizationalUnit, "Ops".into());
    assert!(run(policy, test_leaf.clone()).0.is_ok());

    let policy = custom().with_option(CheckName::SubjectCommonName, "Widget Service".into());
    assert_eq!(vec![CheckName::SubjectCommonName], run(policy, test_leaf).1);
}

#[test]
fn not_ca_and_validity() {
    let policy = custom()
        .with_option(CheckName::NotCa, true.into())
        .with_option(CheckName::ValidityPeriodMaximums, OptionValue::Integer(398))
        .with_option(CheckName::NotValidBefore, OptionValue::Integer(JAN_2023 as i64));
    let (_, failed) = run(policy.clone(), intermediate());
    assert_eq!(vec![CheckName::NotCa, CheckName::ValidityPeriodMaximums], failed);

    let short = leaf().validity(NOV_2023, NOV_2023 + 90 * 86400);
    assert!(run(policy.clone(), short).0.is_ok());

    let early = leaf().validity(JAN_2023 - 86400, JAN_2023 + 90 * 86400);
    assert_eq!(vec![CheckName::NotValidBefore], run(policy, early).1);
}

#[test]
fn spki_pinning() {
    let target = leaf();
    let policy = custom().with_option(
        CheckName::LeafSpkiSha256,
        OptionValue::Array(vec![
            "00".into(),
            buffer_to_hex(target.spki_sha256()).as_str().into(),
        ]),
    );
    assert!(run(policy, target).0.is_ok());

    let policy = custom().with_option(CheckName::LeafSpkiSha256, "00".into());
    assert_eq!(vec![CheckName::LeafSpkiSha256], run(policy, leaf()).1);
}

#[test]
fn eap_server_names() {
    let radius = leaf().dns_names(&["radius.corp.example.com"]);
    let policy = custom().with_option(
        CheckName::EapTrustedServerNames,
        OptionValue::Array(vec![".example.com".into()]),
    );
    assert!(run(policy, radius.clone()).0.is_ok());

    let policy = custom().with_option(
        CheckName::EapTrustedServerNames,
        OptionValue::Array(vec!["radius.example.net".into()]),
    );
    assert_eq!(vec![CheckName::EapTrustedServerNames], run(policy, radius.clone()).1);

    // an empty list accepts any server
    let policy = custom().with_option(CheckName::EapTrustedServerNames, OptionValue::Array(vec![]));
    assert!(run(policy, radius).0.is_ok());
}

#[test]
fn pinning_required() {
    let (_, failed) = run(
        Policy::ssl_server(None).with_option(CheckName::PinningRequired, true.into()),
        leaf(),
    );
    assert_eq!(vec![CheckName::PinningRequired], failed);

    let policy = Policy::new("pinnedService", "1.2.840.1").with_option(CheckName::PinningRequired, true.into());
    assert!(run(policy, leaf()).0.is_ok());
}

#[test]
fn graylisted_leaf() {
    let mut env = TrustEnvironment::default();
    env.add_graylisted_key(leaf().public_key_sha1());
    let policies = vec![Policy::ssl_server(None)];
    let mut pvc = PolicyVerificationContext::new(&env, &policies, VERIFY_TIME, &[]);
    let path = CandidatePath::new(vec![leaf().boxed()]);
    assert_eq!(TrustResult::RecoverableTrustFailure, pvc.leaf_checks(&path));
    assert!(pvc.details()[0].contains_key(&CheckName::GrayListedLeaf));
}

#[test]
fn empty_subject() {
    let mut anonymous = leaf();
    anonymous.subject = RdnSequence(vec![]);
    let policy = custom().with_option(CheckName::NonEmptySubject, true.into());
    assert_eq!(vec![CheckName::NonEmptySubject], run(policy.clone(), anonymous.clone()).1);

    anonymous.san_critical = true;
    assert!(run(policy, anonymous).0.is_ok());
}

#[test]
fn unrequested_checks_do_not_fail() {
    // the leaf fails hostname matching but no policy asks for it
    assert!(run(custom(), leaf().dns_names(&["www.example.net"])).0.is_ok());
}
