//! The certificate_facts module defines [`CertificateFacts`], the read-only view of a certificate
//! that every policy check consumes. The engine never decodes certificates itself; callers supply an
//! implementation, i.e., [`ParsedCertificate`](crate::ParsedCertificate) for DER-encoded certificates.

use der::asn1::ObjectIdentifier;
use x509_cert::ext::pkix::{
    constraints::name::NameConstraints, name::GeneralName, BasicConstraints, SubjectAltName,
};
use x509_cert::name::Name;

use crate::util::pvc_alg_oids::*;
use crate::util::pvc_utilities::{attribute_values, compare_names};

/// digitalSignature bit from the keyUsage extension
pub const KU_DIGITAL_SIGNATURE: u32 = 1 << 0;
/// nonRepudiation (contentCommitment) bit from the keyUsage extension
pub const KU_NON_REPUDIATION: u32 = 1 << 1;
/// keyEncipherment bit from the keyUsage extension
pub const KU_KEY_ENCIPHERMENT: u32 = 1 << 2;
/// dataEncipherment bit from the keyUsage extension
pub const KU_DATA_ENCIPHERMENT: u32 = 1 << 3;
/// keyAgreement bit from the keyUsage extension
pub const KU_KEY_AGREEMENT: u32 = 1 << 4;
/// keyCertSign bit from the keyUsage extension
pub const KU_KEY_CERT_SIGN: u32 = 1 << 5;
/// cRLSign bit from the keyUsage extension
pub const KU_CRL_SIGN: u32 = 1 << 6;
/// encipherOnly bit from the keyUsage extension
pub const KU_ENCIPHER_ONLY: u32 = 1 << 7;
/// decipherOnly bit from the keyUsage extension
pub const KU_DECIPHER_ONLY: u32 = 1 << 8;

/// Public key algorithm families distinguished by key size checks
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KeyAlgorithm {
    /// rsaEncryption
    Rsa,
    /// id-ecPublicKey
    Ec,
    /// Anything else
    Other,
}

/// Hash algorithm used by the signature on a certificate
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum SignatureHash {
    /// MD2
    Md2,
    /// MD4
    Md4,
    /// MD5
    Md5,
    /// SHA-1
    Sha1,
    /// SHA-224
    Sha224,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
    /// Not recognized
    Unknown,
}

impl SignatureHash {
    /// `from_signature_algorithm` maps a signature algorithm OID to the hash it uses.
    pub fn from_signature_algorithm(oid: &ObjectIdentifier) -> SignatureHash {
        match *oid {
            PKIXALG_MD2_WITH_RSA_ENCRYPTION => SignatureHash::Md2,
            PKIXALG_MD4_WITH_RSA_ENCRYPTION => SignatureHash::Md4,
            PKIXALG_MD5_WITH_RSA_ENCRYPTION => SignatureHash::Md5,
            PKIXALG_SHA1_WITH_RSA_ENCRYPTION | PKIXALG_ECDSA_WITH_SHA1 => SignatureHash::Sha1,
            PKIXALG_SHA224_WITH_RSA_ENCRYPTION | PKIXALG_ECDSA_WITH_SHA224 => SignatureHash::Sha224,
            PKIXALG_SHA256_WITH_RSA_ENCRYPTION | PKIXALG_ECDSA_WITH_SHA256 => SignatureHash::Sha256,
            PKIXALG_SHA384_WITH_RSA_ENCRYPTION | PKIXALG_ECDSA_WITH_SHA384 => SignatureHash::Sha384,
            PKIXALG_SHA512_WITH_RSA_ENCRYPTION | PKIXALG_ECDSA_WITH_SHA512 => SignatureHash::Sha512,
            _ => SignatureHash::Unknown,
        }
    }

    /// `name` returns the name used for this hash in `SignatureHashAlgorithms` policy options.
    pub fn name(&self) -> &'static str {
        match self {
            SignatureHash::Md2 => "MD2",
            SignatureHash::Md4 => "MD4",
            SignatureHash::Md5 => "MD5",
            SignatureHash::Sha1 => "SHA1",
            SignatureHash::Sha224 => "SHA224",
            SignatureHash::Sha256 => "SHA256",
            SignatureHash::Sha384 => "SHA384",
            SignatureHash::Sha512 => "SHA512",
            SignatureHash::Unknown => "Unknown",
        }
    }
}

/// The [`CertificateFacts`] trait exposes the attributes of a certificate consulted by policy checks.
///
/// Times are expressed as seconds since the Unix epoch. Digests are returned as raw bytes.
pub trait CertificateFacts: Send + Sync {
    /// notBefore
    fn not_before(&self) -> u64;
    /// notAfter
    fn not_after(&self) -> u64;
    /// Certificate version as an integer, i.e., 3 for a v3 certificate
    fn version(&self) -> u8;
    /// Serial number as encoded, including any leading zero octet
    fn serial_number(&self) -> &[u8];
    /// Subject name
    fn subject(&self) -> &Name;
    /// Issuer name
    fn issuer(&self) -> &Name;
    /// Subject alternative names, if the extension is present
    fn subject_alt_names(&self) -> Option<&SubjectAltName>;
    /// Whether the subject alternative name extension is marked critical
    fn subject_alt_names_critical(&self) -> bool;
    /// Key usage bits using the `KU_*` bit positions, if the extension is present
    fn key_usage(&self) -> Option<u32>;
    /// Extended key usage OIDs, if the extension is present
    fn extended_key_usage(&self) -> Option<&[ObjectIdentifier]>;
    /// Basic constraints, if the extension is present
    fn basic_constraints(&self) -> Option<&BasicConstraints>;
    /// Name constraints, if the extension is present
    fn name_constraints(&self) -> Option<&NameConstraints>;
    /// Certificate policy OIDs, if the extension is present
    fn policy_oids(&self) -> Option<&[ObjectIdentifier]>;
    /// Whether a CRL distribution points extension is present
    fn has_crl_distribution_points(&self) -> bool;
    /// keyIdentifier from the subject key identifier extension
    fn subject_key_identifier(&self) -> Option<&[u8]>;
    /// keyIdentifier from the authority key identifier extension
    fn authority_key_identifier(&self) -> Option<&[u8]>;
    /// Whether the certificate carries a critical extension the engine does not process
    fn has_unknown_critical_extensions(&self) -> bool;
    /// Raw extnValue contents of the extension with the given OID
    fn extension_value(&self, oid: &ObjectIdentifier) -> Option<&[u8]>;
    /// Public key algorithm family
    fn public_key_algorithm(&self) -> KeyAlgorithm;
    /// Public key size in bits (modulus length for RSA, field size for EC)
    fn public_key_size(&self) -> usize;
    /// Hash algorithm used by the signature on this certificate
    fn signature_hash_algorithm(&self) -> SignatureHash;
    /// SHA-1 digest of the encoded certificate
    fn certificate_sha1(&self) -> &[u8];
    /// SHA-256 digest of the encoded certificate
    fn certificate_sha256(&self) -> &[u8];
    /// SHA-1 digest of the subject public key bits
    fn public_key_sha1(&self) -> &[u8];
    /// SHA-256 digest of the encoded SubjectPublicKeyInfo
    fn spki_sha256(&self) -> &[u8];
    /// TLS-encoded SignedCertificateTimestampList from the embedded SCT extension
    fn sct_list(&self) -> Option<&[u8]>;
    /// Encoded TBSCertificate with the embedded SCT extension removed
    fn precertificate_tbs(&self) -> Option<Vec<u8>>;
    /// Encoded certificate
    fn encoded(&self) -> &[u8];

    /// `is_self_issued` returns true if the subject field in the certificate is the same as the issuer
    /// field.
    fn is_self_issued(&self) -> bool {
        compare_names(self.issuer(), self.subject())
    }

    /// `is_ca` returns true when basic constraints are present and assert cA.
    fn is_ca(&self) -> bool {
        self.basic_constraints().map_or(false, |bc| bc.ca)
    }

    /// `path_len_constraint` returns the pathLenConstraint from basic constraints, if any.
    fn path_len_constraint(&self) -> Option<u8> {
        self.basic_constraints().and_then(|bc| bc.path_len_constraint)
    }

    /// `is_valid_at` returns true if time falls within the validity period (inclusive).
    fn is_valid_at(&self, time: u64) -> bool {
        self.not_before() <= time && time <= self.not_after()
    }

    /// `is_weak_key` returns true for RSA keys under 1024 bits, EC keys under 224 bits and keys
    /// using an unrecognized algorithm.
    fn is_weak_key(&self) -> bool {
        match self.public_key_algorithm() {
            KeyAlgorithm::Rsa => self.public_key_size() < 1024,
            KeyAlgorithm::Ec => self.public_key_size() < 224,
            KeyAlgorithm::Other => true,
        }
    }

    /// `is_at_least_key_size` returns true if the key meets the size floor for its algorithm.
    fn is_at_least_key_size(&self, rsa_bits: usize, ec_bits: usize) -> bool {
        match self.public_key_algorithm() {
            KeyAlgorithm::Rsa => self.public_key_size() >= rsa_bits,
            KeyAlgorithm::Ec => self.public_key_size() >= ec_bits,
            KeyAlgorithm::Other => false,
        }
    }

    /// `is_weak_hash` returns true for signatures that use MD2, MD4 or MD5.
    fn is_weak_hash(&self) -> bool {
        matches!(
            self.signature_hash_algorithm(),
            SignatureHash::Md2 | SignatureHash::Md4 | SignatureHash::Md5
        )
    }

    /// commonName values from the subject
    fn common_names(&self) -> Vec<String> {
        attribute_values(self.subject(), &PKIX_AT_COMMON_NAME)
    }

    /// organizationName values from the subject
    fn organizations(&self) -> Vec<String> {
        attribute_values(self.subject(), &PKIX_AT_ORGANIZATION_NAME)
    }

    /// organizationalUnitName values from the subject
    fn organizational_units(&self) -> Vec<String> {
        attribute_values(self.subject(), &PKIX_AT_ORGANIZATIONAL_UNIT_NAME)
    }

    /// countryName values from the subject
    fn countries(&self) -> Vec<String> {
        attribute_values(self.subject(), &PKIX_AT_COUNTRY_NAME)
    }

    /// dNSName values from the subject alternative name extension
    fn dns_names(&self) -> Vec<String> {
        let mut retval = vec![];
        if let Some(san) = self.subject_alt_names() {
            for gn in san.0.iter() {
                if let GeneralName::DnsName(dns) = gn {
                    retval.push(dns.to_string());
                }
            }
        }
        retval
    }

    /// rfc822Name values from the subject alternative name extension followed by emailAddress
    /// values from the subject
    fn email_addresses(&self) -> Vec<String> {
        let mut retval = vec![];
        if let Some(san) = self.subject_alt_names() {
            for gn in san.0.iter() {
                if let GeneralName::Rfc822Name(rfc822) = gn {
                    retval.push(rfc822.to_string());
                }
            }
        }
        retval.extend(attribute_values(self.subject(), &PKCS9_EMAIL_ADDRESS));
        retval
    }

    /// iPAddress values from the subject alternative name extension
    fn ip_addresses(&self) -> Vec<Vec<u8>> {
        let mut retval = vec![];
        if let Some(san) = self.subject_alt_names() {
            for gn in san.0.iter() {
                if let GeneralName::IpAddress(ip) = gn {
                    retval.push(ip.as_bytes().to_vec());
                }
            }
        }
        retval
    }
}
