//! Names of the checks that policies may request, and the status codes used to waive them

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::util::error::Error;

macro_rules! check_names {
    ($($(#[$doc:meta])* $variant:ident => $name:literal,)+) => {
        /// [`CheckName`] identifies a policy check. The canonical string for each variant is the key
        /// used in policy option maps, constraint option maps, exceptions and evaluation details.
        #[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum CheckName {
            $($(#[$doc])* $variant,)+
            /// A check name not known to this library
            Other(String),
        }

        impl CheckName {
            /// `as_str` returns the canonical string for the check.
            pub fn as_str(&self) -> &str {
                match self {
                    $(CheckName::$variant => $name,)+
                    CheckName::Other(s) => s.as_str(),
                }
            }
        }

        impl From<&str> for CheckName {
            fn from(s: &str) -> CheckName {
                match s {
                    $($name => CheckName::$variant,)+
                    _ => CheckName::Other(s.to_string()),
                }
            }
        }
    };
}

check_names! {
    /// Leaf certificate matches the hostname option
    SslHostname => "SSLHostname",
    /// Leaf certificate contains the email address option
    Email => "Email",
    /// Leaf subject common name equals the option
    SubjectCommonName => "SubjectCommonName",
    /// Leaf subject common name starts with the option
    SubjectCommonNamePrefix => "SubjectCommonNamePrefix",
    /// Leaf subject common name equals the option, optionally prefixed with "TEST "
    SubjectCommonNameTest => "SubjectCommonNameTEST",
    /// Leaf subject organization equals the option
    SubjectOrganization => "SubjectOrganization",
    /// Leaf subject organizational unit equals the option
    SubjectOrganizationalUnit => "SubjectOrganizationalUnit",
    /// Leaf extended key usage contains one of the option values
    ExtendedKeyUsage => "ExtendedKeyUsage",
    /// Leaf key usage permits one of the option values
    KeyUsage => "KeyUsage",
    /// Leaf was not issued before the option time
    NotValidBefore => "NotValidBefore",
    /// Leaf name matches one of the EAP trusted server names
    EapTrustedServerNames => "EAPTrustedServerNames",
    /// Leaf carries the marker extension with an empty or NULL value
    LeafMarkerOid => "LeafMarkerOid",
    /// Leaf carries the marker extension
    LeafMarkerOidWithoutValueCheck => "LeafMarkerOidWithoutValueCheck",
    /// Leaf carries the production marker extension
    LeafMarkersProdAndQa => "LeafMarkersProdAndQA",
    /// Leaf is not on the built-in or configured leaf blocklist
    BlackListedLeaf => "BlackListedLeaf",
    /// Leaf key is not graylisted
    GrayListedLeaf => "GrayListedLeaf",
    /// Some active policy is a pinning policy
    PinningRequired => "PinningRequired",
    /// Leaf is not a CA
    NotCa => "NotCA",
    /// Leaf SPKI SHA-256 digest is one of the option values
    LeafSpkiSha256 => "LeafSPKISHA256",
    /// Leaf validity period does not exceed the option (days)
    ValidityPeriodMaximums => "ValidityPeriodMaximums",
    /// Leaf subject is not empty, or the leaf has a critical subject alternative name extension
    NonEmptySubject => "NonEmptySubject",
    /// Issuer of the leaf has a common name matching the option
    IssuerCommonName => "IssuerCommonName",
    /// Issuer of the leaf carries the marker extension
    IntermediateMarkerOid => "IntermediateMarkerOid",
    /// Some intermediate SPKI SHA-256 digest is one of the option values
    IntermediateSpkiSha256 => "IntermediateSPKISHA256",
    /// Issuer of the leaf has the extended key usage
    IntermediateEku => "IntermediateEKU",
    /// Issuer of the leaf has the organization
    IntermediateOrganization => "IntermediateOrganization",
    /// Issuer of the leaf has the country
    IntermediateCountry => "IntermediateCountry",
    /// Some CA SPKI SHA-256 digest is one of the option values
    CaSpkiSha256 => "CAspkiSHA256",
    /// Anchor certificate SHA-1 digest is one of the option values
    AnchorSha1 => "AnchorSHA1",
    /// Anchor certificate SHA-256 digest is one of the option values
    AnchorSha256 => "AnchorSHA256",
    /// Path has exactly the option number of certificates
    ChainLength => "ChainLength",
    /// Every key meets the minimum sizes in the option
    KeySize => "KeySize",
    /// No key is weak
    WeakKeySize => "WeakKeySize",
    /// No signature uses a weak hash
    WeakSignature => "WeakSignature",
    /// Every non-anchor signature uses a hash named in the option
    SignatureHashAlgorithms => "SignatureHashAlgorithms",
    /// No weak hashes are used in paths to system anchors
    SystemTrustedWeakHash => "SystemTrustedWeakHash",
    /// No weak keys are used in paths to system anchors
    SystemTrustedWeakKey => "SystemTrustedWeakKey",
    /// Leaf asserts the certificate policy in the option
    CertificatePolicy => "CertificatePolicy",
    /// Revocation checking requirements
    Revocation => "Revocation",
    /// A positive revocation response is required for every non-anchor certificate
    RevocationResponseRequired => "RevocationResponseRequired",
    /// The evaluation opts in to EV determination
    ExtendedValidation => "ExtendedValidation",
    /// The path must be CT qualified
    CtRequired => "CTRequired",
    /// RFC 5280 basic certificate processing
    BasicCertificateProcessing => "BasicCertificateProcessing",
    /// Authority key identifiers match issuer subject key identifiers
    IdLinkage => "IdLinkage",
    /// Leaf is within its validity period
    ValidLeaf => "ValidLeaf",
    /// Intermediates are within their validity periods
    ValidIntermediates => "ValidIntermediates",
    /// Untrusted root is within its validity period
    ValidRoot => "ValidRoot",
    /// Path terminates at a trusted anchor
    AnchorTrusted => "AnchorTrusted",
    /// Leaf key is not weak
    WeakLeaf => "WeakLeaf",
    /// Intermediate keys are not weak
    WeakIntermediates => "WeakIntermediates",
    /// Names satisfy the accumulated name constraints
    NameConstraints => "NameConstraints",
    /// Path length constraints are satisfied
    BasicConstraints => "BasicConstraints",
    /// Version 3 issuing certificates assert cA
    BasicConstraintsCa => "BasicConstraintsCA",
    /// No unrecognized critical extensions are present
    CriticalExtensions => "CriticalExtensions",
    /// No certificate key is blocked
    BlackListedKey => "BlackListedKey",
    /// No certificate key is graylisted
    GrayListedKey => "GrayListedKey",
    /// No usage constraint denies trust
    UsageConstraints => "UsageConstraints",
}

impl From<String> for CheckName {
    fn from(s: String) -> CheckName {
        CheckName::from(s.as_str())
    }
}

impl From<CheckName> for String {
    fn from(c: CheckName) -> String {
        c.as_str().to_string()
    }
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CheckName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(CheckName::from(s))
    }
}

/// Status code for an expired certificate
pub const ERR_CERT_EXPIRED: i32 = -2147409654;
/// Status code for a certificate that is not yet valid
pub const ERR_CERT_NOT_VALID_YET: i32 = -2147409653;
/// Status code for an untrusted anchor
pub const ERR_NOT_TRUSTED: i32 = -2147409622;
/// Status code for a hostname mismatch
pub const ERR_HOSTNAME_MISMATCH: i32 = -2147408896;
/// Status code for a missing S/MIME email address
pub const ERR_SMIME_EMAIL_ADDRS_NOT_FOUND: i32 = -2147408872;

/// `allowed_error_codes` returns the status codes a usage constraint's `allowed_error` may name to
/// waive the check. Checks without a code cannot be waived by usage constraints.
pub fn allowed_error_codes(check: &CheckName) -> &'static [i32] {
    match check {
        CheckName::ValidLeaf | CheckName::ValidIntermediates | CheckName::ValidRoot => {
            &[ERR_CERT_EXPIRED, ERR_CERT_NOT_VALID_YET]
        }
        CheckName::AnchorTrusted => &[ERR_NOT_TRUSTED],
        CheckName::SslHostname => &[ERR_HOSTNAME_MISMATCH],
        CheckName::Email => &[ERR_SMIME_EMAIL_ADDRS_NOT_FOUND],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn canonical_names() {
        assert_eq!("SSLHostname", CheckName::SslHostname.to_string());
        assert_eq!(CheckName::CaSpkiSha256, "CAspkiSHA256".parse().unwrap());
        assert_eq!(CheckName::LeafMarkersProdAndQa, CheckName::from("LeafMarkersProdAndQA"));
        assert_eq!(
            CheckName::Other("PinningDatabaseFeature".to_string()),
            CheckName::from("PinningDatabaseFeature")
        );
        assert_eq!("PinningDatabaseFeature", CheckName::from("PinningDatabaseFeature").as_str());
    }

    #[test]
    fn serde_uses_canonical_names() {
        let mut m = BTreeMap::new();
        m.insert(CheckName::NotCa, true);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(r#"{"NotCA":true}"#, json);
        let back: BTreeMap<CheckName, bool> = serde_json::from_str(r#"{"CTRequired":false}"#).unwrap();
        assert_eq!(Some(&false), back.get(&CheckName::CtRequired));
    }

    #[test]
    fn waivable_checks() {
        assert!(allowed_error_codes(&CheckName::ValidRoot).contains(&ERR_CERT_EXPIRED));
        assert_eq!(&[ERR_HOSTNAME_MISMATCH], allowed_error_codes(&CheckName::SslHostname));
        assert!(allowed_error_codes(&CheckName::BlackListedKey).is_empty());
    }
}
