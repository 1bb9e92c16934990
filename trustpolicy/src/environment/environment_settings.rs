//! Structures and functions related to configuring the data a [`TrustEnvironment`](crate::TrustEnvironment)
//! consults: blocked and graylisted keys, date-constrained roots, EV anchors and trusted CT logs.
//!
//! Settings are expressed as JSON. Digests are hex strings and log keys are base64-encoded DER
//! SubjectPublicKeyInfo structures:
//!
//! ```json
//! {
//!   "blocked_keys": ["C1D2..."],
//!   "ev_anchors": { "2.23.140.1.1": ["A1B2..."] },
//!   "trusted_logs": [ { "key": "MFkwEwYH...", "expiry": 1735689600 } ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::util::error::*;
use crate::util::pvc_utilities::get_file_as_byte_vec;

/// Trusted log entry as expressed in settings files
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TrustedLogSettings {
    /// Base64-encoded DER SubjectPublicKeyInfo of the log
    pub key: String,
    /// Time (seconds since the Unix epoch) at which the log stopped being qualified, if any
    #[serde(default)]
    pub expiry: Option<u64>,
}

/// [`EnvironmentSettings`] is the serializable form of the data installed into a
/// [`TrustEnvironment`](crate::TrustEnvironment) by `apply_settings`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSettings {
    /// Hex SHA-1 digests of public keys that are blocked
    pub blocked_keys: Vec<String>,
    /// Hex SHA-1 digests of public keys that are graylisted
    pub graylisted_keys: Vec<String>,
    /// Hex SHA-256 digests of root certificates whose children issued on or after 2016-10-21 are
    /// rejected
    pub distrusted_roots: Vec<String>,
    /// Map from EV policy OID to hex SHA-1 digests of roots recognized for that policy
    pub ev_anchors: BTreeMap<String, Vec<String>>,
    /// Trusted certificate transparency logs
    pub trusted_logs: Vec<TrustedLogSettings>,
}

impl EnvironmentSettings {
    /// `from_json` parses settings from a JSON string.
    pub fn from_json(json: &str) -> Result<EnvironmentSettings> {
        Ok(serde_json::from_str(json)?)
    }

    /// `from_file` reads settings from a JSON file.
    pub fn from_file(fname: &Path) -> Result<EnvironmentSettings> {
        let json = get_file_as_byte_vec(fname)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings() {
        let s = EnvironmentSettings::from_json(r#"{"blocked_keys": ["00ff"]}"#).unwrap();
        assert_eq!(vec!["00ff".to_string()], s.blocked_keys);
        assert!(s.trusted_logs.is_empty());
        assert!(s.ev_anchors.is_empty());

        let s = EnvironmentSettings::from_json(
            r#"{"trusted_logs": [{"key": "AAAA"}, {"key": "AQID", "expiry": 100}]}"#,
        )
        .unwrap();
        assert_eq!(2, s.trusted_logs.len());
        assert_eq!(None, s.trusted_logs[0].expiry);
        assert_eq!(Some(100), s.trusted_logs[1].expiry);
    }

    #[test]
    fn malformed_settings() {
        assert!(matches!(
            EnvironmentSettings::from_json(r#"{"blocked_keys": "00ff"}"#),
            Err(Error::JsonError(_))
        ));
        assert!(matches!(
            EnvironmentSettings::from_file(Path::new("no/such/settings.json")),
            Err(Error::StdIoError(_))
        ));
    }
}
