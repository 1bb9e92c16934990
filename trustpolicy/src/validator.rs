//! Trust policy evaluation of candidate certification paths

mod basic_processing;
pub mod candidate_path;
pub mod certificate_transparency;
pub mod check_names;
mod check_registry;
pub mod constraint_matcher;
pub mod extended_validation;
mod leaf_checks;
pub mod name_constraints_set;
mod path_checks;
pub mod policy;
pub mod pvc;
pub mod trust_result;

pub use crate::{
    validator::candidate_path::*, validator::certificate_transparency::*,
    validator::check_names::*, validator::constraint_matcher::*,
    validator::extended_validation::*, validator::name_constraints_set::*, validator::policy::*,
    validator::pvc::*, validator::trust_result::*,
};

pub use crate::validator::check_registry::supported_checks;
