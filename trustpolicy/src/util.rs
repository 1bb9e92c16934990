//! Basic utility functionality supporting trust policy evaluation

pub mod crypto;
pub mod error;
pub mod logging;
pub mod pvc_alg_oids;
pub mod pvc_utilities;

pub use crate::{
    util::crypto::*, util::error::*, util::logging::*, util::pvc_alg_oids::*,
    util::pvc_utilities::*,
};
