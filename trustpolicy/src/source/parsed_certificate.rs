//! Provides [`ParsedCertificate`], a [`CertificateFacts`] implementation for DER- or PEM-encoded
//! X.509 certificates.

use der::asn1::{ObjectIdentifier, OctetString};
use der::{Decode, DecodePem, Encode};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use x509_cert::ext::pkix::{
    constraints::name::NameConstraints, AuthorityKeyIdentifier, BasicConstraints,
    CertificatePolicies, ExtendedKeyUsage, KeyUsage, SubjectAltName, SubjectKeyIdentifier,
};
use x509_cert::name::Name;
use x509_cert::Certificate;

use crate::source::certificate_facts::*;
use crate::util::error::*;
use crate::util::logging::*;
use crate::util::pvc_alg_oids::*;

/// Extensions whose semantics are processed while evaluating policies. A critical extension that is
/// not in this list (or that fails to decode) causes the CriticalExtensions check to fail.
pub const PROCESSED_EXTENSIONS: &[ObjectIdentifier] = &[
    PKIX_CE_SUBJECT_KEY_IDENTIFIER,
    PKIX_CE_KEY_USAGE,
    PKIX_CE_SUBJECT_ALT_NAME,
    PKIX_CE_ISSUER_ALT_NAME,
    PKIX_CE_BASIC_CONSTRAINTS,
    PKIX_CE_NAME_CONSTRAINTS,
    PKIX_CE_CRL_DISTRIBUTION_POINTS,
    PKIX_CE_CERTIFICATE_POLICIES,
    PKIX_CE_POLICY_MAPPINGS,
    PKIX_CE_AUTHORITY_KEY_IDENTIFIER,
    PKIX_CE_POLICY_CONSTRAINTS,
    PKIX_CE_EXT_KEY_USAGE,
    PKIX_CE_INHIBIT_ANY_POLICY,
];

/// [`ParsedCertificate`] aggregates a binary, DER-encoded Certificate, the decoded Certificate and the
/// facts extracted from it that policy checks consult.
#[derive(Clone)]
pub struct ParsedCertificate {
    encoded: Vec<u8>,
    decoded: Certificate,
    not_before: u64,
    not_after: u64,
    key_usage: Option<u32>,
    eku: Option<Vec<ObjectIdentifier>>,
    san: Option<SubjectAltName>,
    san_critical: bool,
    basic_constraints: Option<BasicConstraints>,
    name_constraints: Option<NameConstraints>,
    policies: Option<Vec<ObjectIdentifier>>,
    has_crldp: bool,
    skid: Option<Vec<u8>>,
    akid: Option<Vec<u8>>,
    unknown_critical: bool,
    key_algorithm: KeyAlgorithm,
    key_size: usize,
    signature_hash: SignatureHash,
    cert_sha1: Vec<u8>,
    cert_sha256: Vec<u8>,
    key_sha1: Vec<u8>,
    spki_sha256: Vec<u8>,
    sct_list: Option<Vec<u8>>,
}

impl TryFrom<&[u8]> for ParsedCertificate {
    type Error = Error;

    fn try_from(enc_cert: &[u8]) -> Result<Self> {
        ParsedCertificate::from_der(enc_cert)
    }
}

impl ParsedCertificate {
    /// `from_der` decodes a DER-encoded certificate and extracts its facts.
    pub fn from_der(enc_cert: &[u8]) -> Result<ParsedCertificate> {
        let cert = Certificate::from_der(enc_cert)?;
        ParsedCertificate::from_decoded(enc_cert.to_vec(), cert)
    }

    /// `from_pem` decodes a PEM-encoded certificate and extracts its facts.
    pub fn from_pem(pem: &[u8]) -> Result<ParsedCertificate> {
        let cert = Certificate::from_pem(pem)?;
        let enc_cert = cert.to_der()?;
        ParsedCertificate::from_decoded(enc_cert, cert)
    }

    /// `decoded_certificate` returns the decoded Certificate structure.
    pub fn decoded_certificate(&self) -> &Certificate {
        &self.decoded
    }

    fn from_decoded(encoded: Vec<u8>, decoded: Certificate) -> Result<ParsedCertificate> {
        let tbs = &decoded.tbs_certificate;
        let spki = &tbs.subject_public_key_info;
        let enc_spki = spki.to_der()?;

        let (key_algorithm, key_size) = key_algorithm_and_size(spki)?;

        let mut pc = ParsedCertificate {
            not_before: tbs.validity.not_before.to_unix_duration().as_secs(),
            not_after: tbs.validity.not_after.to_unix_duration().as_secs(),
            key_usage: None,
            eku: None,
            san: None,
            san_critical: false,
            basic_constraints: None,
            name_constraints: None,
            policies: None,
            has_crldp: false,
            skid: None,
            akid: None,
            unknown_critical: false,
            key_algorithm,
            key_size,
            signature_hash: SignatureHash::from_signature_algorithm(&decoded.signature_algorithm.oid),
            cert_sha1: Sha1::digest(&encoded).to_vec(),
            cert_sha256: Sha256::digest(&encoded).to_vec(),
            key_sha1: Sha1::digest(spki.subject_public_key.raw_bytes()).to_vec(),
            spki_sha256: Sha256::digest(&enc_spki).to_vec(),
            sct_list: None,
            encoded,
            decoded: decoded.clone(),
        };
        pc.parse_extensions(&decoded);
        Ok(pc)
    }

    fn parse_extensions(&mut self, cert: &Certificate) {
        let exts = match &cert.tbs_certificate.extensions {
            Some(exts) => exts,
            None => return,
        };

        for ext in exts {
            let v = ext.extn_value.as_bytes();
            let parsed = match ext.extn_id {
                PKIX_CE_KEY_USAGE => KeyUsage::from_der(v)
                    .map(|ku| self.key_usage = Some(u32::from(ku.0.bits()))),
                PKIX_CE_EXT_KEY_USAGE => {
                    ExtendedKeyUsage::from_der(v).map(|eku| self.eku = Some(eku.0))
                }
                PKIX_CE_SUBJECT_ALT_NAME => SubjectAltName::from_der(v).map(|san| {
                    self.san = Some(san);
                    self.san_critical = ext.critical;
                }),
                PKIX_CE_BASIC_CONSTRAINTS => {
                    BasicConstraints::from_der(v).map(|bc| self.basic_constraints = Some(bc))
                }
                PKIX_CE_NAME_CONSTRAINTS => {
                    NameConstraints::from_der(v).map(|nc| self.name_constraints = Some(nc))
                }
                PKIX_CE_CERTIFICATE_POLICIES => CertificatePolicies::from_der(v).map(|cp| {
                    self.policies = Some(cp.0.iter().map(|p| p.policy_identifier).collect())
                }),
                PKIX_CE_CRL_DISTRIBUTION_POINTS => {
                    self.has_crldp = true;
                    Ok(())
                }
                PKIX_CE_SUBJECT_KEY_IDENTIFIER => SubjectKeyIdentifier::from_der(v)
                    .map(|skid| self.skid = Some(skid.0.as_bytes().to_vec())),
                PKIX_CE_AUTHORITY_KEY_IDENTIFIER => AuthorityKeyIdentifier::from_der(v).map(|akid| {
                    self.akid = akid.key_identifier.map(|kid| kid.as_bytes().to_vec())
                }),
                CT_EMBEDDED_SCT_LIST => {
                    OctetString::from_der(v).map(|os| self.sct_list = Some(os.as_bytes().to_vec()))
                }
                _ => {
                    if ext.critical && !PROCESSED_EXTENSIONS.contains(&ext.extn_id) {
                        self.unknown_critical = true;
                    }
                    Ok(())
                }
            };
            if let Err(e) = parsed {
                log_message(
                    &TpLogLevels::TpError,
                    format!("Failed to parse extension {}: {}", ext.extn_id, e).as_str(),
                );
                if ext.critical {
                    self.unknown_critical = true;
                }
            }
        }
    }
}

fn key_algorithm_and_size(spki: &spki::SubjectPublicKeyInfoOwned) -> Result<(KeyAlgorithm, usize)> {
    match spki.algorithm.oid {
        PKIXALG_RSA_ENCRYPTION => {
            let rsa = rsa::pkcs1::RsaPublicKey::from_der(spki.subject_public_key.raw_bytes())
                .map_err(|_e| Error::ParseError)?;
            let modulus = rsa.modulus.as_bytes();
            let bits = match modulus.first() {
                Some(b) => (modulus.len() - 1) * 8 + (8 - b.leading_zeros() as usize),
                None => 0,
            };
            Ok((KeyAlgorithm::Rsa, bits))
        }
        PKIXALG_EC_PUBLIC_KEY => {
            let curve = match &spki.algorithm.parameters {
                Some(params) => params.decode_as::<ObjectIdentifier>().ok(),
                None => None,
            };
            let bits = match curve {
                Some(PKIXALG_SECP224R1) => 224,
                Some(PKIXALG_SECP256R1) => 256,
                Some(PKIXALG_SECP384R1) => 384,
                Some(PKIXALG_SECP521R1) => 521,
                _ => 0,
            };
            Ok((KeyAlgorithm::Ec, bits))
        }
        _ => Ok((KeyAlgorithm::Other, 0)),
    }
}

impl CertificateFacts for ParsedCertificate {
    fn not_before(&self) -> u64 {
        self.not_before
    }
    fn not_after(&self) -> u64 {
        self.not_after
    }
    fn version(&self) -> u8 {
        self.decoded.tbs_certificate.version as u8 + 1
    }
    fn serial_number(&self) -> &[u8] {
        self.decoded.tbs_certificate.serial_number.as_bytes()
    }
    fn subject(&self) -> &Name {
        &self.decoded.tbs_certificate.subject
    }
    fn issuer(&self) -> &Name {
        &self.decoded.tbs_certificate.issuer
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
        self.has_crldp
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
    fn extension_value(&self, oid: &ObjectIdentifier) -> Option<&[u8]> {
        self.decoded
            .tbs_certificate
            .extensions
            .as_ref()
            .and_then(|exts| exts.iter().find(|ext| ext.extn_id == *oid))
            .map(|ext| ext.extn_value.as_bytes())
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
        let mut tbs = self.decoded.tbs_certificate.clone();
        if let Some(exts) = tbs.extensions.take() {
            let kept: Vec<_> = exts
                .into_iter()
                .filter(|ext| ext.extn_id != CT_EMBEDDED_SCT_LIST)
                .collect();
            if !kept.is_empty() {
                tbs.extensions = Some(kept);
            }
        }
        tbs.to_der().ok()
    }
    fn encoded(&self) -> &[u8] {
        &self.encoded
    }
}
