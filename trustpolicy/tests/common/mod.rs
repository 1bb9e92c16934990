#![allow(dead_code)]

use core::str::FromStr;

use der::asn1::{Ia5String, ObjectIdentifier};
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use p256::pkcs8::EncodePublicKey;
use x509_cert::ext::pkix::constraints::name::{GeneralSubtree, NameConstraints};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{BasicConstraints, SubjectAltName};
use x509_cert::name::Name;

use trustpolicy::*;

/// 2023-11-14T22:13:20Z
pub const VERIFY_TIME: u64 = 1700000000;
/// 2023-01-01T00:00:00Z
pub const JAN_2023: u64 = 1672531200;
/// 2023-11-01T00:00:00Z
pub const NOV_2023: u64 = 1698796800;
/// 2025-01-01T00:00:00Z
pub const JAN_2025: u64 = 1735689600;

/// Certificate facts assembled by hand so tests can describe exactly the properties they need.
#[derive(Clone)]
pub struct TestCertificate {
    pub label: String,
    pub not_before: u64,
    pub not_after: u64,
    pub version: u8,
    pub serial: Vec<u8>,
    pub subject: Name,
    pub issuer: Name,
    pub san: Option<SubjectAltName>,
    pub san_critical: bool,
    pub key_usage: Option<u32>,
    pub eku: Option<Vec<ObjectIdentifier>>,
    pub basic_constraints: Option<BasicConstraints>,
    pub name_constraints: Option<NameConstraints>,
    pub policies: Option<Vec<ObjectIdentifier>>,
    pub crldp: bool,
    pub skid: Option<Vec<u8>>,
    pub akid: Option<Vec<u8>>,
    pub unknown_critical: bool,
    pub key_algorithm: KeyAlgorithm,
    pub key_size: usize,
    pub signature_hash: SignatureHash,
    pub cert_sha1: Vec<u8>,
    pub cert_sha256: Vec<u8>,
    pub key_sha1: Vec<u8>,
    pub spki_sha256: Vec<u8>,
    pub sct_list: Option<Vec<u8>>,
    pub encoded: Vec<u8>,
}

pub fn name(s: &str) -> Name {
    Name::from_str(s).unwrap()
}

impl TestCertificate {
    /// An end entity certificate valid from 2023 through 2024 with a 2048-bit RSA key.
    pub fn new(label: &str, subject: &str, issuer: &str) -> TestCertificate {
        TestCertificate {
            label: label.to_string(),
            not_before: JAN_2023,
            not_after: JAN_2025,
            version: 3,
            serial: vec![0x01],
            subject: name(subject),
            issuer: name(issuer),
            san: None,
            san_critical: false,
            key_usage: None,
            eku: None,
            basic_constraints: None,
            name_constraints: None,
            policies: None,
            crldp: false,
            skid: None,
            akid: None,
            unknown_critical: false,
            key_algorithm: KeyAlgorithm::Rsa,
            key_size: 2048,
            signature_hash: SignatureHash::Sha256,
            cert_sha1: sha1_digest(label.as_bytes()),
            cert_sha256: sha256_digest(label.as_bytes()),
            key_sha1: sha1_digest(format!("{} key", label).as_bytes()),
            spki_sha256: sha256_digest(format!("{} spki", label).as_bytes()),
            sct_list: None,
            encoded: label.as_bytes().to_vec(),
        }
    }

    pub fn ca(mut self, path_len: Option<u8>) -> TestCertificate {
        self.basic_constraints = Some(BasicConstraints {
            ca: true,
            path_len_constraint: path_len,
        });
        self.key_usage = Some(KU_KEY_CERT_SIGN | KU_CRL_SIGN);
        self
    }

    pub fn validity(mut self, not_before: u64, not_after: u64) -> TestCertificate {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    pub fn key(mut self, alg: KeyAlgorithm, size: usize) -> TestCertificate {
        self.key_algorithm = alg;
        self.key_size = size;
        self
    }

    pub fn dns_names(mut self, names: &[&str]) -> TestCertificate {
        let gns = names
            .iter()
            .map(|n| GeneralName::DnsName(Ia5String::new(n).unwrap()))
            .collect();
        self.san = Some(SubjectAltName(gns));
        self
    }

    pub fn emails(mut self, addrs: &[&str]) -> TestCertificate {
        let gns = addrs
            .iter()
            .map(|n| GeneralName::Rfc822Name(Ia5String::new(n).unwrap()))
            .collect();
        self.san = Some(SubjectAltName(gns));
        self
    }

    pub fn eku(mut self, oids: &[ObjectIdentifier]) -> TestCertificate {
        self.eku = Some(oids.to_vec());
        self
    }

    pub fn policies(mut self, oids: &[ObjectIdentifier]) -> TestCertificate {
        self.policies = Some(oids.to_vec());
        self
    }

    pub fn dns_constraints(mut self, permitted: &[&str], excluded: &[&str]) -> TestCertificate {
        let subtrees = |names: &[&str]| -> Option<Vec<GeneralSubtree>> {
            if names.is_empty() {
                return None;
            }
            Some(
                names
                    .iter()
                    .map(|n| GeneralSubtree {
                        base: GeneralName::DnsName(Ia5String::new(n).unwrap()),
                        minimum: 0,
                        maximum: None,
                    })
                    .collect(),
            )
        };
        self.name_constraints = Some(NameConstraints {
            permitted_subtrees: subtrees(permitted),
            excluded_subtrees: subtrees(excluded),
        });
        self
    }

    pub fn ev_capable(mut self) -> TestCertificate {
        self.crldp = true;
        self
    }

    pub fn boxed(self) -> Box<dyn CertificateFacts> {
        Box::new(self)
    }
}

impl CertificateFacts for TestCertificate {
    fn not_before(&self) -> u64 {
        self.not_before
    }
    fn not_after(&self) -> u64 {
        self.not_after
    }
    fn version(&self) -> u8 {
        self.version
    }
    fn serial_number(&self) -> &[u8] {
        &self.serial
    }
    fn subject(&self) -> &Name {
        &self.subject
    }
    fn issuer(&self) -> &Name {
        &self.issuer
    }
    fn subject_alt_names(&self) -> Option<&SubjectAltName> {
        self.san.as_ref()
    }
    fn subject_alt_names_critical(&self) -> bool {
        self.san_critical
    }
    fn key_usage(&self) -> Option<u32> {
        self.key_usage
    }
    fn extended_key_usage(&self) -> Option<&[ObjectIdentifier]> {
        self.eku.as_deref()
    }
    fn basic_constraints(&self) -> Option<&BasicConstraints> {
        self.basic_constraints.as_ref()
    }
    fn name_constraints(&self) -> Option<&NameConstraints> {
        self.name_constraints.as_ref()
    }
    fn policy_oids(&self) -> Option<&[ObjectIdentifier]> {
        self.policies.as_deref()
    }
    fn has_crl_distribution_points(&self) -> bool {
        self.crldp
    }
    fn subject_key_identifier(&self) -> Option<&[u8]> {
        self.skid.as_deref()
    }
    fn authority_key_identifier(&self) -> Option<&[u8]> {
        self.akid.as_deref()
    }
    fn has_unknown_critical_extensions(&self) -> bool {
        self.unknown_critical
    }
    fn extension_value(&self, _oid: &ObjectIdentifier) -> Option<&[u8]> {
        None
    }
    fn public_key_algorithm(&self) -> KeyAlgorithm {
        self.key_algorithm
    }
    fn public_key_size(&self) -> usize {
        self.key_size
    }
    fn signature_hash_algorithm(&self) -> SignatureHash {
        self.signature_hash
    }
    fn certificate_sha1(&self) -> &[u8] {
        &self.cert_sha1
    }
    fn certificate_sha256(&self) -> &[u8] {
        &self.cert_sha256
    }
    fn public_key_sha1(&self) -> &[u8] {
        &self.key_sha1
    }
    fn spki_sha256(&self) -> &[u8] {
        &self.spki_sha256
    }
    fn sct_list(&self) -> Option<&[u8]> {
        self.sct_list.as_deref()
    }
    fn precertificate_tbs(&self) -> Option<Vec<u8>> {
        self.sct_list.as_ref().map(|_| precert_tbs(&self.label))
    }
    fn encoded(&self) -> &[u8] {
        &self.encoded
    }
}

/// Stand-in for the TBSCertificate logged for a precertificate
pub fn precert_tbs(label: &str) -> Vec<u8> {
    format!("{} tbs", label).into_bytes()
}

pub const ROOT_DN: &str = "CN=Test Root,O=Test,C=US";
pub const CA_DN: &str = "CN=Test Issuing CA,O=Test,C=US";
pub const LEAF_DN: &str = "CN=www.example.com,O=Test,C=US";

pub fn root() -> TestCertificate {
    TestCertificate::new("root", ROOT_DN, ROOT_DN).ca(None)
}

pub fn intermediate() -> TestCertificate {
    TestCertificate::new("ca", CA_DN, ROOT_DN).ca(None)
}

pub fn leaf() -> TestCertificate {
    TestCertificate::new("leaf", LEAF_DN, CA_DN).dns_names(&["www.example.com"])
}

/// Leaf, issuing CA and root
pub fn three_cert_path() -> CandidatePath {
    CandidatePath::new(vec![leaf().boxed(), intermediate().boxed(), root().boxed()])
}

/// Environment with the default crypto callbacks and the given root trusted from the System store
pub fn environment_trusting(root: &TestCertificate, store: AnchorStore) -> TrustEnvironment {
    environment_with_constraints(root, store, vec![])
}

pub fn environment_with_constraints(
    root: &TestCertificate,
    store: AnchorStore,
    constraints: Vec<Constraint>,
) -> TrustEnvironment {
    let mut env = TrustEnvironment::default();
    populate_default_environment(&mut env);
    let mut anchors = TrustSettingsStore::default();
    anchors.add_anchor(root.certificate_sha1(), store, constraints);
    env.add_anchor_source(Box::new(anchors));
    env
}

/// A CT log backed by a deterministic P-256 key
pub struct TestLog {
    key: SigningKey,
}

impl TestLog {
    pub fn new(seed: u8) -> TestLog {
        TestLog {
            key: SigningKey::from_slice(&[seed; 32]).unwrap(),
        }
    }

    pub fn trusted_log(&self, expiry: Option<u64>) -> TrustedLog {
        let key_der = self.key.verifying_key().to_public_key_der().unwrap();
        TrustedLog {
            key_der: key_der.as_bytes().to_vec(),
            expiry,
        }
    }

    /// `sct` returns a TLS-encoded SCT issued at timestamp (milliseconds) over the entry.
    pub fn sct(&self, timestamp: u64, entry: &LogEntry<'_>) -> Vec<u8> {
        let mut sct = Sct {
            version: 0,
            log_id: [0; 32],
            timestamp,
            extensions: vec![],
            hash_algorithm: SCT_HASH_SHA256,
            signature_algorithm: SCT_SIGNATURE_ECDSA,
            signature: vec![],
        };
        sct.log_id
            .copy_from_slice(&self.trusted_log(None).log_id());
        let tbs = signed_data(&sct, entry).unwrap();
        let sig: Signature = self.key.sign(&tbs);
        sct.signature = sig.to_der().as_bytes().to_vec();

        let mut out = vec![sct.version];
        out.extend_from_slice(&sct.log_id);
        out.extend_from_slice(&sct.timestamp.to_be_bytes());
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&[sct.hash_algorithm, sct.signature_algorithm]);
        out.extend_from_slice(&(sct.signature.len() as u16).to_be_bytes());
        out.extend_from_slice(&sct.signature);
        out
    }
}

/// `sct_list` wraps encoded SCTs in a SignedCertificateTimestampList.
pub fn sct_list(scts: &[Vec<u8>]) -> Vec<u8> {
    let mut items = vec![];
    for s in scts {
        items.extend_from_slice(&(s.len() as u16).to_be_bytes());
        items.extend_from_slice(s);
    }
    let mut out = (items.len() as u16).to_be_bytes().to_vec();
    out.extend_from_slice(&items);
    out
}
