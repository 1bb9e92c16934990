//! The pvc module provides [`PolicyVerificationContext`], the state record for evaluating candidate
//! certification paths against a list of policies.
//!
//! A context is created for one set of policies, one verification time and one set of exceptions and
//! may be used to evaluate any number of candidate paths that share a leaf certificate. Leaf checks
//! run once per distinct leaf and their outcome is reused for each candidate.
//!
//! ```no_run
//! use trustpolicy::*;
//!
//! # fn load_path() -> CandidatePath { CandidatePath::new(vec![]) }
//! let mut env = TrustEnvironment::default();
//! populate_default_environment(&mut env);
//!
//! let policies = vec![Policy::ssl_server(Some("www.example.com"))];
//! let mut pvc = PolicyVerificationContext::new(&env, &policies, 1700000000, &[]);
//! let mut path = load_path();
//! let result = pvc.evaluate(&mut path);
//! if !result.is_ok() {
//!     for (index, failures) in pvc.details().iter().enumerate() {
//!         for check in failures.keys() {
//!             println!("certificate {} failed {}", index, check);
//!         }
//!     }
//! }
//! ```

use std::collections::BTreeMap;

use crate::environment::trust_environment::TrustEnvironment;
use crate::util::logging::*;
use crate::validator::basic_processing::*;
use crate::validator::candidate_path::CandidatePath;
use crate::validator::certificate_transparency::is_ct_qualified;
use crate::validator::check_names::*;
use crate::validator::check_registry::{validate_key, Phase};
use crate::validator::constraint_matcher::meets_constraint;
use crate::validator::extended_validation::is_extended_validation;
use crate::validator::policy::{OptionValue, Policy};
use crate::validator::trust_result::TrustResult;

/// [`ExceptionRecord`] allows a caller to accept specific check failures.
///
/// When a list of exceptions is supplied, record *i* applies to certificate *i* of the path, and only
/// when `cert_sha1` matches the SHA-1 digest of that certificate. A list containing a single record
/// with no digest applies to every certificate.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExceptionRecord {
    /// SHA-1 digest of the certificate the record is bound to
    pub cert_sha1: Option<Vec<u8>>,
    /// Check names paired with the failure value that is accepted
    pub values: BTreeMap<CheckName, bool>,
}

/// Outcome of leaf checks saved for reuse with later candidate paths
#[derive(Clone, Debug)]
struct LeafCache {
    leaf_sha1: Vec<u8>,
    result: TrustResult,
    details: BTreeMap<CheckName, bool>,
}

/// [`PolicyVerificationContext`] accumulates the result and per-certificate details of an evaluation.
pub struct PolicyVerificationContext<'a> {
    env: &'a TrustEnvironment,
    policies: &'a [Policy],
    verify_time: u64,
    exceptions: &'a [ExceptionRecord],

    result: TrustResult,
    details: Vec<BTreeMap<CheckName, bool>>,
    leaf_cache: Option<LeafCache>,

    /// Index of the policy whose options are being dispatched
    pub(crate) policy_index: usize,
    /// Per-certificate flags noting that a positive revocation response is required
    pub(crate) require_revocation_response: Vec<bool>,
    /// Set when a policy asks for EV determination
    pub(crate) optionally_ev: bool,
    is_ct: bool,
}

impl<'a> PolicyVerificationContext<'a> {
    /// `new` returns a context for evaluating paths against the given policies at verify_time
    /// (seconds since the Unix epoch).
    pub fn new(
        env: &'a TrustEnvironment,
        policies: &'a [Policy],
        verify_time: u64,
        exceptions: &'a [ExceptionRecord],
    ) -> PolicyVerificationContext<'a> {
        PolicyVerificationContext {
            env,
            policies,
            verify_time,
            exceptions,
            result: TrustResult::Unspecified,
            details: vec![],
            leaf_cache: None,
            policy_index: 0,
            require_revocation_response: vec![],
            optionally_ev: false,
            is_ct: false,
        }
    }

    /// `env` returns the environment consulted by checks.
    pub fn env(&self) -> &'a TrustEnvironment {
        self.env
    }

    /// `policies` returns the policies being evaluated.
    pub fn policies(&self) -> &'a [Policy] {
        self.policies
    }

    /// `verify_time` returns the verification time in seconds since the Unix epoch.
    pub fn verify_time(&self) -> u64 {
        self.verify_time
    }

    /// `current_policy` returns the policy whose options are being dispatched.
    pub fn current_policy(&self) -> Option<&'a Policy> {
        self.policies.get(self.policy_index)
    }

    /// `option` returns the current policy's value for the check.
    pub fn option(&self, check: &CheckName) -> Option<&'a OptionValue> {
        self.current_policy().and_then(|p| p.option(check))
    }

    /// `result` returns the result accumulated so far.
    pub fn result(&self) -> TrustResult {
        self.result
    }

    /// `details` returns the failed checks for each certificate of the most recently evaluated path.
    pub fn details(&self) -> &[BTreeMap<CheckName, bool>] {
        &self.details
    }

    /// `require_revocation_response` returns, for each certificate of the most recently evaluated
    /// path, whether a policy demands a positive revocation response.
    pub fn require_revocation_response(&self) -> &[bool] {
        &self.require_revocation_response
    }

    /// `is_ct` returns true if the most recently evaluated path is CT qualified.
    pub fn is_ct(&self) -> bool {
        self.is_ct
    }

    /// `escalate` moves the result to the given severity if it is worse than the current result.
    pub(crate) fn escalate(&mut self, result: TrustResult) {
        self.result = self.result.combine(result);
    }

    /// `proceed` marks an "ok" result as relying on an override.
    pub(crate) fn proceed(&mut self) {
        if self.result.is_ok() {
            self.result = TrustResult::Proceed;
        }
    }

    fn check_is_requested(&self, path: &CandidatePath, check: &CheckName) -> bool {
        if self.current_policy().map_or(false, |p| p.has_option(check)) {
            return true;
        }
        path.usage_constraints.iter().flatten().any(|c| {
            c.policy_options
                .as_ref()
                .map_or(false, |o| o.contains_key(check))
        })
    }

    fn exception_applies(
        &self,
        path: &CandidatePath,
        check: &CheckName,
        ix: usize,
        value: bool,
    ) -> bool {
        let record = match self.exceptions {
            [global] if global.cert_sha1.is_none() => global,
            _ => match (self.exceptions.get(ix), path.certificate(ix)) {
                (Some(record), Some(cert))
                    if record.cert_sha1.as_deref() == Some(cert.certificate_sha1()) =>
                {
                    record
                }
                _ => return false,
            },
        };
        record.values.get(check) == Some(&value)
    }

    /// `record_check_result` notes the outcome of a check that failed for the certificate at index ix.
    ///
    /// Unless force is true, nothing happens when neither the current policy nor any usage constraint
    /// on the path requests the check. A failure is absorbed when a matching usage constraint on the
    /// certificate allows the check's status code, or when an exception accepts it (in which case an
    /// "ok" result becomes [`TrustResult::Proceed`]). Otherwise an "ok" result becomes
    /// [`TrustResult::RecoverableTrustFailure`] and the failure is added to the details.
    ///
    /// Returns false only when ix does not identify a certificate in the details, in which case
    /// evaluation of the path should stop.
    pub fn record_check_result(
        &mut self,
        path: &CandidatePath,
        check: &CheckName,
        ix: usize,
        value: bool,
        force: bool,
    ) -> bool {
        if ix >= self.details.len() {
            log_message(
                &TpLogLevels::TpError,
                &format!("No details available for certificate {} while recording {}", ix, check),
            );
            return false;
        }

        if !force && !self.check_is_requested(path, check) {
            return true;
        }

        let codes = allowed_error_codes(check);
        let this: &PolicyVerificationContext<'a> = self;
        let allowed = !codes.is_empty()
            && path.constraints(ix).iter().any(|c| {
                c.allowed_error.map_or(false, |e| codes.contains(&e))
                    && meets_constraint(this, path, ix, c)
            });
        if allowed {
            log_message(
                &TpLogLevels::TpDebug,
                &format!("Usage constraint allows {} failure at index {}", check, ix),
            );
            return true;
        }

        if self.exception_applies(path, check, ix, value) {
            log_message(
                &TpLogLevels::TpDebug,
                &format!("Exception accepts {} failure at index {}", check, ix),
            );
            self.proceed();
            return true;
        }

        if self.result.is_ok() {
            self.result = TrustResult::RecoverableTrustFailure;
        }
        self.details[ix].insert(check.clone(), value);
        true
    }

    /// `set_result` records a failure for a check only if something requested the check.
    pub fn set_result(&mut self, path: &CandidatePath, check: &CheckName, ix: usize, value: bool) -> bool {
        self.record_check_result(path, check, ix, value, false)
    }

    /// `set_result_forced` records a failure for a check whether or not it was requested.
    pub fn set_result_forced(
        &mut self,
        path: &CandidatePath,
        check: &CheckName,
        ix: usize,
        value: bool,
    ) -> bool {
        self.record_check_result(path, check, ix, value, true)
    }

    /// `record_fatal_check` notes the failure of an integrity check (weak or blocked keys, issuance
    /// under a distrusted root). Usage constraints and exceptions do not apply to these checks and
    /// the failure is always added to the details. Callers decide whether to escalate the result.
    pub fn record_fatal_check(&mut self, check: &CheckName, ix: usize, value: bool) -> bool {
        let details = match self.details.get_mut(ix) {
            Some(details) => details,
            None => {
                log_message(
                    &TpLogLevels::TpError,
                    &format!("No details available for certificate {} while recording {}", ix, check),
                );
                return false;
            }
        };
        details.insert(check.clone(), value);
        if self.result.is_ok() {
            self.result = TrustResult::RecoverableTrustFailure;
        }
        true
    }

    /// `reset_for_path` prepares the context to evaluate a new candidate path, starting from the
    /// result and details produced by leaf checks.
    pub fn reset_for_path(&mut self, path: &CandidatePath) {
        let count = path.len();
        self.details = vec![BTreeMap::new(); count];
        self.result = TrustResult::Unspecified;
        if let Some(cache) = &self.leaf_cache {
            self.result = cache.result;
            if let Some(leaf) = self.details.first_mut() {
                *leaf = cache.details.clone();
            }
        }
        self.require_revocation_response = vec![false; count];
        self.optionally_ev = false;
        self.is_ct = false;
        self.policy_index = 0;
    }

    fn dispatch(&mut self, path: &CandidatePath, phase: Phase) {
        let policies = self.policies;
        for (i, policy) in policies.iter().enumerate() {
            self.policy_index = i;
            for check in policy.options.keys() {
                validate_key(self, path, check, phase);
            }
        }
        self.policy_index = 0;
    }

    /// `leaf_checks` runs the leaf checks named by every policy against certificate 0 and returns
    /// the result. The outcome is cached by leaf certificate digest, so evaluating another path with
    /// the same leaf does not repeat the work.
    pub fn leaf_checks(&mut self, path: &CandidatePath) -> TrustResult {
        let leaf = match path.leaf() {
            Some(leaf) => leaf,
            None => {
                log_message(&TpLogLevels::TpError, "Empty candidate path presented for evaluation");
                self.details.clear();
                self.result = TrustResult::FatalTrustFailure;
                return self.result;
            }
        };

        if let Some(cache) = &self.leaf_cache {
            if cache.leaf_sha1.as_slice() == leaf.certificate_sha1() {
                return cache.result;
            }
        }

        self.result = TrustResult::Unspecified;
        self.details = vec![BTreeMap::new(); path.len()];
        self.dispatch(path, Phase::Leaf);

        self.leaf_cache = Some(LeafCache {
            leaf_sha1: leaf.certificate_sha1().to_vec(),
            result: self.result,
            details: self.details[0].clone(),
        });
        self.result
    }

    /// `path_checks` evaluates the candidate path: leaf checks (or their cached outcome), the path
    /// checks named by every policy, id linkage, basic certificate processing, blocked key checks and
    /// usage constraints. The first evaluation of a path also determines its EV and CT status. Returns
    /// the resulting [`TrustResult`].
    pub fn path_checks(&mut self, path: &mut CandidatePath) -> TrustResult {
        if path.is_empty() {
            return self.leaf_checks(path);
        }
        self.leaf_checks(path);
        self.reset_for_path(path);

        self.dispatch(path, Phase::Path);

        id_linkage(self, path);
        basic_certificate_processing(self, path);
        check_blocked_keys(self, path);
        check_usage_constraints(self, path);

        if !path.path_validated {
            let is_ct = is_ct_qualified(self.env, path, self.verify_time);
            let is_ev = self.optionally_ev && is_extended_validation(self.env, path);
            path.is_ct = is_ct;
            path.is_ev = is_ev && is_ct;
            path.path_validated = true;
            log_message(
                &TpLogLevels::TpDebug,
                &format!("Path CT status: {}, EV status: {}", path.is_ct, path.is_ev),
            );
        }
        self.is_ct = path.is_ct;

        let policies = self.policies;
        for (i, policy) in policies.iter().enumerate() {
            if policy.has_option(&CheckName::CtRequired) && !path.is_ct {
                self.policy_index = i;
                if !self.set_result(path, &CheckName::CtRequired, 0, false) {
                    break;
                }
            }
        }
        self.policy_index = 0;

        self.result
    }

    /// `evaluate` applies the environment's anchor sources to the path and then runs
    /// [`path_checks`](PolicyVerificationContext::path_checks).
    pub fn evaluate(&mut self, path: &mut CandidatePath) -> TrustResult {
        self.env.apply_anchor_sources(path);
        self.path_checks(path)
    }
}
