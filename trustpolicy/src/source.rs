//! Sources of certificate facts and trust anchor settings

pub mod certificate_facts;
pub mod parsed_certificate;
pub mod trust_settings;

pub use crate::{
    source::certificate_facts::*, source::parsed_certificate::*, source::trust_settings::*,
};
