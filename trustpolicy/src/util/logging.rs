//! Logging support

use log::{debug, error, info, warn};

/// Enum that describes level associated with a log message
#[derive(Debug, Eq, PartialEq)]
pub enum TpLogLevels {
    /// Common error logging level
    TpError,
    /// Common info logging level
    TpInfo,
    /// Common warn logging level
    TpWarn,
    /// Common debug logging level
    TpDebug,
}

/// `log_message` forwards a message to the `log` facade at the indicated level. Applications decide
/// where messages go, i.e., `pvctool` configures log4rs.
pub fn log_message(level: &TpLogLevels, message: &str) {
    match level {
        TpLogLevels::TpError => error!("{}", message),
        TpLogLevels::TpWarn => warn!("{}", message),
        TpLogLevels::TpInfo => info!("{}", message),
        TpLogLevels::TpDebug => debug!("{}", message),
    }
}
