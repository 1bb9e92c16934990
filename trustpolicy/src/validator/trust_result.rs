//! Outcome of a trust policy evaluation

use core::fmt;

use serde::{Deserialize, Serialize};

/// [`TrustResult`] is ordered by severity. The result of an evaluation only ever moves to an equal or
/// more severe value, except that an "ok" result is raised to `Proceed` when an exception or an
/// admin-trusted anchor was relied upon.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub enum TrustResult {
    /// No failures were recorded
    #[default]
    Unspecified,
    /// No failures were recorded, or failures were waived, and the caller may proceed
    Proceed,
    /// At least one check failed, but the user may choose to trust the path
    RecoverableTrustFailure,
    /// The path was explicitly denied by trust settings
    Deny,
    /// The path can not be trusted
    FatalTrustFailure,
    /// Evaluation could not be completed, i.e., a policy named an unknown check
    OtherError,
}

impl TrustResult {
    /// `is_ok` returns true for `Unspecified` and `Proceed`.
    pub fn is_ok(&self) -> bool {
        matches!(self, TrustResult::Unspecified | TrustResult::Proceed)
    }

    /// `combine` returns the more severe of the two results.
    pub fn combine(self, other: TrustResult) -> TrustResult {
        self.max(other)
    }
}

impl fmt::Display for TrustResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrustResult::Unspecified => "Unspecified",
            TrustResult::Proceed => "Proceed",
            TrustResult::RecoverableTrustFailure => "RecoverableTrustFailure",
            TrustResult::Deny => "Deny",
            TrustResult::FatalTrustFailure => "FatalTrustFailure",
            TrustResult::OtherError => "OtherError",
        };
        write!(f, "{}", s)
    }
}

#[test]
fn severity_order() {
    assert!(TrustResult::Unspecified < TrustResult::Proceed);
    assert!(TrustResult::Proceed < TrustResult::RecoverableTrustFailure);
    assert!(TrustResult::Deny < TrustResult::FatalTrustFailure);
    assert_eq!(
        TrustResult::Deny,
        TrustResult::Deny.combine(TrustResult::RecoverableTrustFailure)
    );
    assert!(TrustResult::Proceed.is_ok());
    assert!(!TrustResult::Deny.is_ok());
}
