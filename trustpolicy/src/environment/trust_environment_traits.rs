//! The trust_environment_traits module features trait definitions and type definitions that are used
//! by [`TrustEnvironment`] to provide functionality that supports evaluating trust policies.

use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::source::certificate_facts::CertificateFacts;
use crate::source::trust_settings::{AnchorStore, Constraint};
use crate::util::error::*;
use crate::TrustEnvironment;

/// `CalculateHash` provides a function signature for implementations that perform hashing
pub type CalculateHash = fn(
    &TrustEnvironment,
    &AlgorithmIdentifierOwned, // hash alg
    &[u8],                     // buffer to hash
) -> Result<Vec<u8>>;

/// `VerifySignatureMessage` provides a function signature for implementations that perform signature
/// verification over a message.
pub type VerifySignatureMessage = fn(
    &TrustEnvironment,
    &[u8],                      // message to hash and verify
    &[u8],                      // signature
    &AlgorithmIdentifierOwned,  // signature algorithm
    &SubjectPublicKeyInfoOwned, // public key
) -> Result<()>;

/// `CheckApplicationRequirement` provides a function signature for implementations that determine
/// whether the calling application satisfies the named requirement of a usage constraint.
pub type CheckApplicationRequirement = fn(&TrustEnvironment, &str) -> bool;

/// The [`AnchorSource`] trait enables trait objects to identify trust anchors and provide the usage
/// constraints and store associated with each, i.e., from configuration, a system store accessed via
/// FFI, etc.
pub trait AnchorSource {
    /// `is_anchor` returns true if the certificate is a trust anchor.
    fn is_anchor(&self, cert: &dyn CertificateFacts) -> bool;

    /// `usage_constraints` returns the usage constraints for the certificate, which may be empty.
    fn usage_constraints(&self, cert: &dyn CertificateFacts) -> Vec<Constraint>;

    /// `store` returns the store from which the certificate was obtained, if it is an anchor.
    fn store(&self, cert: &dyn CertificateFacts) -> Option<AnchorStore>;
}
