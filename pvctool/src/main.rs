#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

mod args;
mod report;
mod scenario;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use log::{debug, error, LevelFilter};
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use trustpolicy::*;

use crate::args::*;
use crate::report::EvaluationReport;
use crate::scenario::Scenario;

/// Exit status when the path is trusted
const EXIT_TRUSTED: u8 = 0;
/// Exit status when the path is not trusted
const EXIT_NOT_TRUSTED: u8 = 1;
/// Exit status when the inputs could not be processed
const EXIT_ERROR: u8 = 2;

fn configure_logging(args: &PvcToolArgs) {
    if let Some(logging_config) = &args.logging_config {
        if let Err(e) = log4rs::init_file(logging_config, Default::default()) {
            eprintln!(
                "ERROR: failed to configure logging using {} with {:?}. Continuing without logging.",
                logging_config, e
            );
        } else {
            return;
        }
    }

    // if there's no config, prepare one using stderr so reports on stdout stay parseable
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{l}: {m}{n}")))
        .build();
    match Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(LevelFilter::Warn))
    {
        Ok(config) => {
            if let Err(e) = log4rs::init_config(config) {
                eprintln!(
                    "ERROR: failed to configure logging for stderr with {:?}. Continuing without logging.",
                    e
                );
            }
        }
        Err(e) => {
            eprintln!(
                "ERROR: failed to prepare default logging configuration with {:?}. Continuing without logging",
                e
            );
        }
    }
}

fn evaluate(args: &PvcToolArgs, scenario_file: &str) -> Result<EvaluationReport> {
    let scenario_path = Path::new(scenario_file);
    let scenario = Scenario::from_file(scenario_path)?;
    let base = scenario_path.parent().unwrap_or_else(|| Path::new("."));
    let loaded = scenario.load(base)?;

    let mut env = TrustEnvironment::default();
    populate_default_environment(&mut env);
    if let Some(settings) = &args.settings {
        env.apply_settings(&EnvironmentSettings::from_file(Path::new(settings))?)?;
    }
    env.add_anchor_source(Box::new(loaded.anchors.clone()));

    let verify_time = args
        .time_of_interest
        .or(loaded.verify_time)
        .unwrap_or_else(get_now_as_unix_epoch);
    debug!(
        "Evaluating {} certificates against {} policies at {}",
        loaded.certificates.len(),
        loaded.policies.len(),
        verify_time
    );

    let mut pvc =
        PolicyVerificationContext::new(&env, &loaded.policies, verify_time, &loaded.exceptions);
    let mut path = loaded.candidate_path();
    let result = pvc.evaluate(&mut path);
    Ok(EvaluationReport::new(result, &pvc, &path))
}

/// Point of entry for the pvctool application.
fn main() -> ExitCode {
    let args = PvcToolArgs::parse();
    configure_logging(&args);

    if args.list_checks {
        for check in supported_checks() {
            println!("{}", check);
        }
        return ExitCode::from(EXIT_TRUSTED);
    }

    let scenario_file = match &args.scenario {
        Some(s) => s,
        None => {
            eprintln!("ERROR: a scenario file is required. Try again with -h parameter.");
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let report = match evaluate(&args, scenario_file) {
        Ok(report) => report,
        Err(e) => {
            error!("Failed to evaluate {}: {}", scenario_file, e);
            eprintln!("ERROR: failed to evaluate {}: {}", scenario_file, e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    if args.json {
        match report.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("ERROR: failed to serialize report: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
    } else {
        print!("{}", report);
    }

    if report.result.is_ok() {
        ExitCode::from(EXIT_TRUSTED)
    } else {
        ExitCode::from(EXIT_NOT_TRUSTED)
    }
}
