//! Error types

use core::fmt;

/// Result type
pub type Result<T> = core::result::Result<T, Error>;

/// Error type
///
/// Errors surface at the edges of the library, i.e., when decoding certificates, SCTs or settings
/// files. Policy checks never return an `Error`; failures are recorded as check results on the
/// [`PolicyVerificationContext`](crate::PolicyVerificationContext) instead.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// NotFound occurs when an action failed because a necessary artifact was not found.
    NotFound,
    /// Unrecognized occurs when an error conditions does not match anything else here.
    Unrecognized,
    /// An artifact did not conform to length requirements
    LengthError,
    /// An artifact could not be parsed
    ParseError,
    /// An algorithm or structure version that is not supported was encountered
    Unsupported,
    /// A signature did not verify using the presented public key
    SignatureVerificationFailure,
    /// A policy option key that is not known to either check registry was encountered
    UnknownCheck(String),
    /// A configuration or policy option value could not be interpreted
    InvalidOption(String),
    /// Asn1Error is used to propagate error information from the x509 crate.
    Asn1Error(der::Error),
    /// A JSON document could not be parsed or generated
    JsonError(String),
    /// Error encapsulates an error derived from [std::io::ErrorKind]
    StdIoError(std::io::ErrorKind),
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Error {
        Error::Asn1Error(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::StdIoError(err.kind())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::JsonError(err.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound => write!(f, "NotFound"),
            Error::Unrecognized => write!(f, "Unrecognized"),
            Error::LengthError => write!(f, "LengthError"),
            Error::ParseError => write!(f, "ParseError"),
            Error::Unsupported => write!(f, "Unsupported"),
            Error::SignatureVerificationFailure => write!(f, "SignatureVerificationFailure"),
            Error::UnknownCheck(key) => write!(f, "UnknownCheck: {}", key),
            Error::InvalidOption(msg) => write!(f, "InvalidOption: {}", msg),
            Error::Asn1Error(err) => write!(f, "Asn1Error: {}", err),
            Error::JsonError(msg) => write!(f, "JsonError: {}", msg),
            Error::StdIoError(err) => write!(f, "StdIoError: {:?}", err),
        }
    }
}

impl std::error::Error for Error {}

#[test]
fn error_test() {
    let s = format!("{}", Error::NotFound);
    assert_eq!("NotFound", s);
    let s = format!("{}", Error::Unrecognized);
    assert_eq!("Unrecognized", s);
    let s = format!("{}", Error::LengthError);
    assert_eq!("LengthError", s);
    let s = format!("{}", Error::ParseError);
    assert_eq!("ParseError", s);
    let s = format!("{}", Error::Unsupported);
    assert_eq!("Unsupported", s);
    let s = format!("{}", Error::SignatureVerificationFailure);
    assert_eq!("SignatureVerificationFailure", s);
    let s = format!("{}", Error::UnknownCheck("Bogus".to_string()));
    assert_eq!("UnknownCheck: Bogus", s);
    let s = format!("{}", Error::InvalidOption("bad digest".to_string()));
    assert_eq!("InvalidOption: bad digest", s);
    let s = format!("{}", Error::StdIoError(std::io::ErrorKind::NotFound));
    assert_eq!("StdIoError: NotFound", s);
    let e: Error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "x").into();
    assert_eq!(Error::StdIoError(std::io::ErrorKind::PermissionDenied), e);
}
