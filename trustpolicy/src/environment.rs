//! Callback and trait object switchboard to support policy evaluation

pub mod environment_settings;
pub mod trust_environment;
pub mod trust_environment_traits;

pub use crate::{
    environment::environment_settings::*, environment::trust_environment::*,
    environment::trust_environment_traits::*,
};
