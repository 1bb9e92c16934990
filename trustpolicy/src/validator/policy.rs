//! The policy module provides the [`Policy`] structure, a named set of options each of which requests
//! a check, and constructors for commonly used policies.
//!
//! ```
//! use trustpolicy::*;
//!
//! let policy = Policy::ssl_server(Some("www.example.com"))
//!     .with_option(CheckName::ChainLength, OptionValue::Integer(3));
//! assert_eq!(POLICY_NAME_SSL_SERVER, policy.name);
//! assert_eq!(Some("www.example.com"), policy.option_str(&CheckName::SslHostname));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::validator::check_names::CheckName;

/// Name of the TLS server authentication policy
pub const POLICY_NAME_SSL_SERVER: &str = "sslServer";
/// Name of the TLS client authentication policy
pub const POLICY_NAME_SSL_CLIENT: &str = "sslClient";
/// Name of the S/MIME policy
pub const POLICY_NAME_SMIME: &str = "SMIME";
/// Name of the OCSP response signer policy
pub const POLICY_NAME_OCSP_SIGNER: &str = "OCSPSigner";
/// Name of the basic X.509 policy
pub const POLICY_NAME_BASIC_X509: &str = "basicX509";

/// OID of the TLS server authentication policy (id-kp-serverAuth)
pub const POLICY_OID_SSL_SERVER: &str = "1.3.6.1.5.5.7.3.1";
/// OID of the TLS client authentication policy (id-kp-clientAuth)
pub const POLICY_OID_SSL_CLIENT: &str = "1.3.6.1.5.5.7.3.2";
/// OID of the S/MIME policy (id-kp-emailProtection)
pub const POLICY_OID_SMIME: &str = "1.3.6.1.5.5.7.3.4";
/// OID of the OCSP response signer policy (id-kp-OCSPSigning)
pub const POLICY_OID_OCSP_SIGNER: &str = "1.3.6.1.5.5.7.3.9";
/// OID of the basic X.509 policy (anyExtendedKeyUsage)
pub const POLICY_OID_BASIC_X509: &str = "2.5.29.37.0";

/// [`OptionValue`] is the value associated with a check in a policy's option map.
///
/// Accessors return `None` when the value has an unexpected type. Checks treat `None` as a reason
/// to skip the check rather than to fail it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Boolean value, usually `true` for checks that take no parameter
    Bool(bool),
    /// Integer value, i.e., a length, a time or a bit mask
    Integer(i64),
    /// String value, i.e., a hostname, OID or hex digest
    String(String),
    /// List of values
    Array(Vec<OptionValue>),
    /// Map of values
    Dictionary(BTreeMap<String, OptionValue>),
}

impl OptionValue {
    /// `as_bool` returns the value if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// `as_integer` returns the value if this is an `Integer`.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            OptionValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// `as_str` returns the value if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// `as_array` returns the values if this is an `Array`.
    pub fn as_array(&self) -> Option<&[OptionValue]> {
        match self {
            OptionValue::Array(a) => Some(a.as_slice()),
            _ => None,
        }
    }

    /// `as_dictionary` returns the map if this is a `Dictionary`.
    pub fn as_dictionary(&self) -> Option<&BTreeMap<String, OptionValue>> {
        match self {
            OptionValue::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// `strings` returns a single string as a one element list or the string elements of an array.
    /// Returns `None` for other types or for an array containing anything other than strings.
    pub fn strings(&self) -> Option<Vec<&str>> {
        match self {
            OptionValue::String(s) => Some(vec![s.as_str()]),
            OptionValue::Array(a) => a.iter().map(|v| v.as_str()).collect(),
            _ => None,
        }
    }

    /// `integers` returns a single integer as a one element list or the integer elements of an array.
    /// Returns `None` for other types or for an array containing anything other than integers.
    pub fn integers(&self) -> Option<Vec<i64>> {
        match self {
            OptionValue::Integer(i) => Some(vec![*i]),
            OptionValue::Array(a) => a.iter().map(|v| v.as_integer()).collect(),
            _ => None,
        }
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> OptionValue {
        OptionValue::Bool(b)
    }
}

impl From<i64> for OptionValue {
    fn from(i: i64) -> OptionValue {
        OptionValue::Integer(i)
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> OptionValue {
        OptionValue::String(s.to_string())
    }
}

/// [`Policy`] is a named set of options. Each key in `options` requests the corresponding check and
/// the value parameterizes it.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Name of the policy, i.e., "sslServer"
    #[serde(default)]
    pub name: String,
    /// OID of the policy in dot notation
    #[serde(default)]
    pub oid: String,
    /// Checks requested by the policy
    #[serde(default)]
    pub options: BTreeMap<CheckName, OptionValue>,
}

impl Policy {
    /// `new` returns a policy with the given name and OID and no options.
    pub fn new(name: &str, oid: &str) -> Policy {
        Policy {
            name: name.to_string(),
            oid: oid.to_string(),
            options: BTreeMap::new(),
        }
    }

    /// `with_option` adds (or replaces) an option and returns the policy.
    pub fn with_option(mut self, check: CheckName, value: OptionValue) -> Policy {
        self.options.insert(check, value);
        self
    }

    /// `option` returns the value of the option for the check, if present.
    pub fn option(&self, check: &CheckName) -> Option<&OptionValue> {
        self.options.get(check)
    }

    /// `option_str` returns the value of the option for the check if present and a string.
    pub fn option_str(&self, check: &CheckName) -> Option<&str> {
        self.options.get(check).and_then(|v| v.as_str())
    }

    /// `has_option` returns true if the policy requests the check.
    pub fn has_option(&self, check: &CheckName) -> bool {
        self.options.contains_key(check)
    }

    /// `basic_x509` returns a policy that performs RFC 5280 basic certificate processing along with
    /// weak key, blocked key and usage constraint checks.
    pub fn basic_x509() -> Policy {
        Policy::new(POLICY_NAME_BASIC_X509, POLICY_OID_BASIC_X509).with_basic_options()
    }

    /// `ssl_server` returns a policy for TLS server certificates, optionally bound to a hostname.
    pub fn ssl_server(hostname: Option<&str>) -> Policy {
        let mut policy = Policy::new(POLICY_NAME_SSL_SERVER, POLICY_OID_SSL_SERVER)
            .with_basic_options()
            .with_option(
                CheckName::ExtendedKeyUsage,
                OptionValue::Array(vec![POLICY_OID_SSL_SERVER.into()]),
            )
            .with_option(CheckName::BlackListedLeaf, true.into())
            .with_option(CheckName::GrayListedLeaf, true.into())
            .with_option(CheckName::SystemTrustedWeakHash, true.into())
            .with_option(CheckName::SystemTrustedWeakKey, true.into());
        if let Some(hostname) = hostname {
            policy = policy.with_option(CheckName::SslHostname, hostname.into());
        }
        policy
    }

    /// `ev_server` returns a TLS server policy that also opts in to EV determination.
    pub fn ev_server(hostname: Option<&str>) -> Policy {
        Policy::ssl_server(hostname).with_option(CheckName::ExtendedValidation, true.into())
    }

    /// `ssl_client` returns a policy for TLS client certificates.
    pub fn ssl_client() -> Policy {
        Policy::new(POLICY_NAME_SSL_CLIENT, POLICY_OID_SSL_CLIENT)
            .with_basic_options()
            .with_option(
                CheckName::ExtendedKeyUsage,
                OptionValue::Array(vec![POLICY_OID_SSL_CLIENT.into()]),
            )
    }

    /// `smime` returns a policy for S/MIME certificates, optionally bound to an email address.
    pub fn smime(email: Option<&str>) -> Policy {
        let mut policy = Policy::new(POLICY_NAME_SMIME, POLICY_OID_SMIME)
            .with_basic_options()
            .with_option(
                CheckName::ExtendedKeyUsage,
                OptionValue::Array(vec![POLICY_OID_SMIME.into()]),
            );
        if let Some(email) = email {
            policy = policy.with_option(CheckName::Email, email.into());
        }
        policy
    }

    /// `ocsp_signer` returns a policy for OCSP response signing certificates.
    pub fn ocsp_signer() -> Policy {
        Policy::new(POLICY_NAME_OCSP_SIGNER, POLICY_OID_OCSP_SIGNER)
            .with_basic_options()
            .with_option(
                CheckName::ExtendedKeyUsage,
                OptionValue::Array(vec![POLICY_OID_OCSP_SIGNER.into()]),
            )
            .with_option(
                CheckName::KeyUsage,
                OptionValue::Integer(i64::from(crate::KU_DIGITAL_SIGNATURE)),
            )
    }

    fn with_basic_options(mut self) -> Policy {
        for check in [
            CheckName::BasicCertificateProcessing,
            CheckName::CriticalExtensions,
            CheckName::IdLinkage,
            CheckName::BasicConstraints,
            CheckName::BasicConstraintsCa,
            CheckName::NameConstraints,
            CheckName::ValidLeaf,
            CheckName::ValidIntermediates,
            CheckName::ValidRoot,
            CheckName::WeakLeaf,
            CheckName::WeakIntermediates,
            CheckName::BlackListedKey,
            CheckName::GrayListedKey,
            CheckName::UsageConstraints,
            CheckName::NonEmptySubject,
        ] {
            self.options.insert(check, OptionValue::Bool(true));
        }
        self
    }
}
