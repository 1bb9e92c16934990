//! The candidate_path module provides [`CandidatePath`], an ordered list of certificates from a
//! target (index 0) to the certificate treated as the anchor for the path (the last index), along
//! with the anchoring facts and results attached to the path by evaluation.

use crate::environment::trust_environment_traits::AnchorSource;
use crate::source::certificate_facts::CertificateFacts;
use crate::source::trust_settings::{AnchorStore, Constraint};

/// [`CandidatePath`] is a certification path proposed by a path builder for evaluation.
pub struct CandidatePath {
    /// Certificates from the leaf (index 0) to the anchor or root (last index)
    pub certificates: Vec<Box<dyn CertificateFacts>>,
    /// True if the last certificate is a trust anchor
    pub is_anchored: bool,
    /// Usage constraints for each certificate, empty when none apply
    pub usage_constraints: Vec<Vec<Constraint>>,
    /// Store from which each certificate was obtained, if it is an anchor
    pub anchor_store: Vec<Option<AnchorStore>>,
    /// True if revocation processing restored trust in an untrusted anchor or blocked key
    pub is_allowlisted: bool,
    /// True once path checks have determined the EV and CT status for the path
    pub path_validated: bool,
    /// True if the path qualifies as EV (only ever set for CT qualified paths)
    pub is_ev: bool,
    /// True if the path is CT qualified
    pub is_ct: bool,
    /// TLS-encoded SCTs for the leaf certificate obtained by the path builder, i.e., via TLS
    pub builder_scts: Vec<Vec<u8>>,
    /// DER-encoded OCSP responses for the leaf certificate
    pub ocsp_responses: Vec<Vec<u8>>,
}

impl CandidatePath {
    /// `new` returns a path containing the given certificates with no anchoring facts.
    pub fn new(certificates: Vec<Box<dyn CertificateFacts>>) -> CandidatePath {
        let count = certificates.len();
        CandidatePath {
            certificates,
            is_anchored: false,
            usage_constraints: vec![vec![]; count],
            anchor_store: vec![None; count],
            is_allowlisted: false,
            path_validated: false,
            is_ev: false,
            is_ct: false,
            builder_scts: vec![],
            ocsp_responses: vec![],
        }
    }

    /// `len` returns the number of certificates in the path.
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    /// `is_empty` returns true if the path contains no certificates.
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// `certificate` returns the certificate at the given index.
    pub fn certificate(&self, index: usize) -> Option<&dyn CertificateFacts> {
        self.certificates.get(index).map(|c| c.as_ref())
    }

    /// `leaf` returns the certificate at index 0.
    pub fn leaf(&self) -> Option<&dyn CertificateFacts> {
        self.certificate(0)
    }

    /// `root` returns the last certificate in the path.
    pub fn root(&self) -> Option<&dyn CertificateFacts> {
        self.certificates.last().map(|c| c.as_ref())
    }

    /// `constraints` returns the usage constraints for the certificate at the given index.
    pub fn constraints(&self, index: usize) -> &[Constraint] {
        self.usage_constraints
            .get(index)
            .map(|c| c.as_slice())
            .unwrap_or_default()
    }

    /// `store` returns the anchor store for the certificate at the given index.
    pub fn store(&self, index: usize) -> Option<AnchorStore> {
        self.anchor_store.get(index).copied().flatten()
    }

    /// `apply_anchor_source` records usage constraints and anchor stores for each certificate the
    /// source recognizes and marks the path as anchored if the last certificate is an anchor.
    /// Facts recorded by an earlier source are not replaced.
    pub fn apply_anchor_source(&mut self, source: &dyn AnchorSource) {
        let count = self.certificates.len();
        self.usage_constraints.resize(count, vec![]);
        self.anchor_store.resize(count, None);
        for (i, cert) in self.certificates.iter().enumerate() {
            let cert = cert.as_ref();
            if self.anchor_store[i].is_some() || !source.is_anchor(cert) {
                continue;
            }
            self.anchor_store[i] = source.store(cert);
            self.usage_constraints[i] = source.usage_constraints(cert);
            if i + 1 == count {
                self.is_anchored = true;
            }
        }
    }
}
