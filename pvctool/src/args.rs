//! Arguments for the pvctool utility

use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;

/// `get_now_as_unix_epoch` returns the current time as seconds since the Unix epoch, or zero if the
/// system clock is set before the epoch.
pub fn get_now_as_unix_epoch() -> u64 {
    if let Ok(n) = SystemTime::now().duration_since(UNIX_EPOCH) {
        n.as_secs()
    } else {
        0
    }
}

/// Policy verification tool
#[derive(Parser, Debug, Default)]
#[command(arg_required_else_help(true))]
#[clap(author, version, about, long_about = None)]
pub struct PvcToolArgs {
    /// Full path and filename of a JSON-formatted scenario describing the candidate path, the
    /// policies to apply, anchors, exceptions and stapled SCTs or OCSP responses. Certificate file
    /// names in the scenario are resolved relative to the folder containing the scenario.
    #[clap(short, long, help_heading = "EVALUATION")]
    pub scenario: Option<String>,

    /// Full path and filename of JSON-formatted environment settings (blocked and graylisted keys,
    /// date-constrained roots, EV anchors and trusted CT logs).
    #[clap(long, help_heading = "EVALUATION")]
    pub settings: Option<String>,

    /// Time to use for evaluation expressed as the number of seconds since Unix epoch. Overrides
    /// the time given in the scenario, if any. Defaults to current system time.
    #[clap(short = 'i', long, help_heading = "EVALUATION")]
    pub time_of_interest: Option<u64>,

    /// Emit the evaluation report as JSON instead of text.
    #[clap(long, help_heading = "OUTPUT")]
    pub json: bool,

    /// List the names of the checks policies may request, then exit.
    #[clap(long, help_heading = "OUTPUT")]
    pub list_checks: bool,

    /// Full path and filename of YAML-formatted configuration file for log4rs logging mechanism.
    /// See <https://docs.rs/log4rs/latest/log4rs/> for details.
    #[clap(short, long, help_heading = "COMMON OPTIONS")]
    pub logging_config: Option<String>,
}
