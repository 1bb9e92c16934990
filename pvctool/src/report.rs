//! Describes the outcome of evaluating a scenario

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use trustpolicy::*;

/// Failed checks for one certificate in the path
#[derive(Clone, Debug, Default, Serialize)]
pub struct CertificateReport {
    /// Index of the certificate in the path
    pub index: usize,
    /// Subject name of the certificate
    pub subject: String,
    /// Hex SHA-256 digest of the certificate
    pub sha256: String,
    /// Failed checks paired with the recorded value
    pub failures: BTreeMap<CheckName, bool>,
    /// True if the policies require a positive revocation response for the certificate
    pub revocation_response_required: bool,
}

/// [`EvaluationReport`] collects the trust result and diagnostics produced for a candidate path.
#[derive(Clone, Debug, Default, Serialize)]
pub struct EvaluationReport {
    /// Overall trust result
    pub result: TrustResult,
    /// Time of evaluation (seconds since the Unix epoch)
    pub verify_time: u64,
    /// Names of the evaluated policies
    pub policies: Vec<String>,
    /// True if the last certificate is a trust anchor
    pub anchored: bool,
    /// True if the path is certificate transparency qualified
    pub ct_qualified: bool,
    /// True if the path qualifies for extended validation
    pub extended_validation: bool,
    /// Per-certificate diagnostics
    pub certificates: Vec<CertificateReport>,
}

impl EvaluationReport {
    /// `new` assembles a report from an evaluated path and the context that evaluated it.
    pub fn new(
        result: TrustResult,
        pvc: &PolicyVerificationContext<'_>,
        path: &CandidatePath,
    ) -> EvaluationReport {
        let details = pvc.details();
        let revocation = pvc.require_revocation_response();
        let certificates = path
            .certificates
            .iter()
            .enumerate()
            .map(|(index, cert)| CertificateReport {
                index,
                subject: name_to_string(cert.subject()),
                sha256: buffer_to_hex(cert.certificate_sha256()),
                failures: details.get(index).cloned().unwrap_or_default(),
                revocation_response_required: revocation.get(index).copied().unwrap_or(false),
            })
            .collect();

        EvaluationReport {
            result,
            verify_time: pvc.verify_time(),
            policies: pvc.policies().iter().map(|p| p.name.clone()).collect(),
            anchored: path.is_anchored,
            ct_qualified: path.is_ct,
            extended_validation: path.is_ev,
            certificates,
        }
    }

    /// `to_json` returns the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Trust result: {}", self.result)?;
        writeln!(f, "Verify time: {}", self.verify_time)?;
        writeln!(f, "Policies: {}", self.policies.join(", "))?;
        writeln!(f, "Anchored: {}", self.anchored)?;
        writeln!(f, "CT qualified: {}", self.ct_qualified)?;
        writeln!(f, "EV: {}", self.extended_validation)?;
        for cert in &self.certificates {
            writeln!(f, "Certificate {}: {}", cert.index, cert.subject)?;
            writeln!(f, "\tSHA-256: {}", cert.sha256)?;
            if cert.revocation_response_required {
                writeln!(f, "\tRevocation response required")?;
            }
            for (check, value) in &cert.failures {
                writeln!(f, "\tFailed: {} ({})", check, value)?;
            }
        }
        Ok(())
    }
}
