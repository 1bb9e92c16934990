//! Loads JSON-formatted evaluation scenarios.
//!
//! A scenario names the certificates in a candidate path (leaf first), the policies to apply and,
//! optionally, the anchors, exceptions and stapled data that accompany the path:
//!
//! ```json
//! {
//!   "certificates": ["leaf.der", "issuing_ca.der", { "der": "MIIC..." }],
//!   "policies": [
//!     { "preset": "sslServer", "value": "www.example.com" },
//!     { "name": "custom", "oid": "1.2.3", "options": { "ChainLength": 3 } }
//!   ],
//!   "verify_time": 1700000000,
//!   "anchors": [ { "certificate": 2, "store": "System", "constraints": [] } ],
//!   "exceptions": [ { "values": { "ValidLeaf": false } } ],
//!   "builder_scts": ["AGRf..."],
//!   "ocsp_responses": []
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64ct::{Base64, Encoding};
use log::debug;
use serde::Deserialize;

use trustpolicy::*;

/// Location of a certificate: a file name or base64-encoded DER
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum CertificateRef {
    /// File containing a DER- or PEM-encoded certificate
    File(String),
    /// Base64-encoded DER certificate
    Encoded {
        /// Base64-encoded DER certificate
        der: String,
    },
}

/// A policy given either as one of the built-in policies or in full
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum PolicyRef {
    /// Built-in policy, optionally with a hostname or email address and extra options
    Preset {
        /// Name of the built-in policy, i.e., "sslServer" or "EV"
        preset: String,
        /// Hostname or email address the policy evaluates
        #[serde(default)]
        value: Option<String>,
        /// Options added to (or replacing) the built-in options
        #[serde(default)]
        options: BTreeMap<CheckName, OptionValue>,
    },
    /// Policy with explicit name, OID and options
    Full(Policy),
}

/// Anchor recognized for a certificate in the path
#[derive(Clone, Debug, Deserialize)]
pub struct AnchorRef {
    /// Index of the certificate in the scenario's certificate list
    pub certificate: usize,
    /// Store the anchor was obtained from
    #[serde(default = "default_store")]
    pub store: AnchorStore,
    /// Usage constraints for the anchor
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

fn default_store() -> AnchorStore {
    AnchorStore::System
}

/// Exception record with a hex SHA-1 certificate digest
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ExceptionRef {
    /// Hex SHA-1 digest of the certificate the record is bound to
    #[serde(default)]
    pub cert_sha1: Option<String>,
    /// Check names paired with the accepted failure value
    #[serde(default)]
    pub values: BTreeMap<CheckName, bool>,
}

/// [`Scenario`] is the deserialized form of a scenario file.
#[derive(Clone, Debug, Deserialize)]
pub struct Scenario {
    /// Certificates from the leaf to the root
    pub certificates: Vec<CertificateRef>,
    /// Policies to evaluate
    pub policies: Vec<PolicyRef>,
    /// Time of evaluation (seconds since the Unix epoch)
    #[serde(default)]
    pub verify_time: Option<u64>,
    /// Anchors to install into the environment
    #[serde(default)]
    pub anchors: Vec<AnchorRef>,
    /// Exception records
    #[serde(default)]
    pub exceptions: Vec<ExceptionRef>,
    /// Base64-encoded TLS SCTs obtained outside of the certificate
    #[serde(default)]
    pub builder_scts: Vec<String>,
    /// Base64-encoded DER OCSP responses for the leaf certificate
    #[serde(default)]
    pub ocsp_responses: Vec<String>,
    /// True if revocation processing restored trust in the path
    #[serde(default)]
    pub allowlisted: bool,
}

/// [`LoadedScenario`] holds the inputs to an evaluation derived from a [`Scenario`].
pub struct LoadedScenario {
    /// Parsed certificates from the leaf to the root
    pub certificates: Vec<ParsedCertificate>,
    /// Policies to evaluate
    pub policies: Vec<Policy>,
    /// Time of evaluation if given by the scenario
    pub verify_time: Option<u64>,
    /// Anchor source populated from the scenario's anchors
    pub anchors: TrustSettingsStore,
    /// Exception records
    pub exceptions: Vec<ExceptionRecord>,
    /// Decoded builder SCTs
    pub builder_scts: Vec<Vec<u8>>,
    /// Decoded OCSP responses
    pub ocsp_responses: Vec<Vec<u8>>,
    /// True if revocation processing restored trust in the path
    pub allowlisted: bool,
}

impl LoadedScenario {
    /// `candidate_path` returns a fresh candidate path containing the scenario's certificates.
    pub fn candidate_path(&self) -> CandidatePath {
        let certs: Vec<Box<dyn CertificateFacts>> = self
            .certificates
            .iter()
            .map(|c| Box::new(c.clone()) as Box<dyn CertificateFacts>)
            .collect();
        let mut path = CandidatePath::new(certs);
        path.builder_scts = self.builder_scts.clone();
        path.ocsp_responses = self.ocsp_responses.clone();
        path.is_allowlisted = self.allowlisted;
        path
    }
}

fn decode_base64(what: &str, b64: &str) -> Result<Vec<u8>> {
    Base64::decode_vec(b64).map_err(|_e| Error::InvalidOption(format!("invalid base64 {}: {}", what, b64)))
}

/// `preset_policy` returns the built-in policy with the given name.
pub fn preset_policy(preset: &str, value: Option<&str>) -> Result<Policy> {
    match preset {
        POLICY_NAME_SSL_SERVER => Ok(Policy::ssl_server(value)),
        POLICY_NAME_SSL_CLIENT => Ok(Policy::ssl_client()),
        POLICY_NAME_SMIME => Ok(Policy::smime(value)),
        POLICY_NAME_OCSP_SIGNER => Ok(Policy::ocsp_signer()),
        POLICY_NAME_BASIC_X509 => Ok(Policy::basic_x509()),
        "EV" => Ok(Policy::ev_server(value)),
        _ => Err(Error::InvalidOption(format!("unknown policy preset: {}", preset))),
    }
}

fn load_certificate(cert_ref: &CertificateRef, base: &Path) -> Result<ParsedCertificate> {
    match cert_ref {
        CertificateRef::File(fname) => {
            let mut pb = PathBuf::from(fname);
            if pb.is_relative() {
                pb = base.join(pb);
            }
            debug!("Reading certificate from {:?}", pb);
            let der = get_file_as_byte_vec_pem(&pb)?;
            ParsedCertificate::from_der(&der)
        }
        CertificateRef::Encoded { der } => {
            ParsedCertificate::from_der(&decode_base64("certificate", der)?)
        }
    }
}

impl Scenario {
    /// `from_json` parses a scenario from a JSON string.
    pub fn from_json(json: &str) -> Result<Scenario> {
        Ok(serde_json::from_str(json)?)
    }

    /// `from_file` reads a scenario from a JSON file.
    pub fn from_file(fname: &Path) -> Result<Scenario> {
        let json = get_file_as_byte_vec(fname)?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// `load` reads the certificates named by the scenario, resolving relative file names against
    /// base, and decodes the remaining inputs.
    pub fn load(&self, base: &Path) -> Result<LoadedScenario> {
        let certificates = self
            .certificates
            .iter()
            .map(|c| load_certificate(c, base))
            .collect::<Result<Vec<_>>>()?;

        let mut policies = vec![];
        for p in &self.policies {
            match p {
                PolicyRef::Preset {
                    preset,
                    value,
                    options,
                } => {
                    let mut policy = preset_policy(preset, value.as_deref())?;
                    policy.options.extend(options.clone());
                    policies.push(policy);
                }
                PolicyRef::Full(policy) => policies.push(policy.clone()),
            }
        }

        let mut anchors = TrustSettingsStore::default();
        for a in &self.anchors {
            let cert = certificates.get(a.certificate).ok_or_else(|| {
                Error::InvalidOption(format!("anchor index {} is out of range", a.certificate))
            })?;
            anchors.add_anchor(cert.certificate_sha1(), a.store, a.constraints.clone());
        }

        let mut exceptions = vec![];
        for e in &self.exceptions {
            let cert_sha1 = match &e.cert_sha1 {
                Some(hex) => Some(hex_to_buffer(hex)?),
                None => None,
            };
            exceptions.push(ExceptionRecord {
                cert_sha1,
                values: e.values.clone(),
            });
        }

        Ok(LoadedScenario {
            certificates,
            policies,
            verify_time: self.verify_time,
            anchors,
            exceptions,
            builder_scts: self
                .builder_scts
                .iter()
                .map(|s| decode_base64("SCT", s))
                .collect::<Result<Vec<_>>>()?,
            ocsp_responses: self
                .ocsp_responses
                .iter()
                .map(|s| decode_base64("OCSP response", s))
                .collect::<Result<Vec<_>>>()?,
            allowlisted: self.allowlisted,
        })
    }
}
