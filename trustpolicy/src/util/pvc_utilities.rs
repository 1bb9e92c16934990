//! Utility functions for comparing names, matching host names and e-mail addresses, handling
//! digests and converting times.

use core::time::Duration;
use std::fs::File;
use std::io::Read;
use std::net::IpAddr;
use std::path::Path;

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use der::asn1::{Ia5String, ObjectIdentifier, PrintableString, TeletexStringRef, Utf8StringRef};
use der::{DateTime, Encode, Tagged};
use subtle_encoding::hex;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::Name;

use crate::util::error::*;

/// Seconds since the Unix epoch of 2006-10-01T00:00:00Z, after which EV roots must satisfy the
/// root profile checks.
pub const TIME_2006_10_01: u64 = 1159660800;
/// Seconds since the Unix epoch of 2011-01-01T00:00:00Z
pub const TIME_2011_01_01: u64 = 1293840000;
/// Seconds since the Unix epoch of 2014-01-01T00:00:00Z
pub const TIME_2014_01_01: u64 = 1388534400;
/// Seconds since the Unix epoch of 2016-01-01T00:00:00Z, after which SHA-1 signatures on EV
/// subordinate CAs are prohibited.
pub const TIME_2016_01_01: u64 = 1451606400;
/// Seconds since the Unix epoch of 2016-07-01T00:00:00Z, after which EV leaf certificates may not
/// be issued directly by a root.
pub const TIME_2016_07_01: u64 = 1467331200;
/// Seconds since the Unix epoch of 2016-10-21T00:00:00Z, the cut-over for date-constrained roots.
pub const TIME_2016_10_21: u64 = 1477008000;

/// `buffer_to_hex` returns an upper case ASCII hex representation of the buffer (without commas,
/// spaces or brackets).
pub fn buffer_to_hex(buffer: &[u8]) -> String {
    let hex = hex::encode_upper(buffer);
    String::from_utf8(hex).unwrap_or_default()
}

/// `hex_to_buffer` decodes a hex string of either case, ignoring embedded spaces and colons.
pub fn hex_to_buffer(s: &str) -> Result<Vec<u8>> {
    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect::<String>()
        .to_lowercase();
    hex::decode(cleaned.as_bytes()).map_err(|_e| Error::InvalidOption(format!("not hex: {}", s)))
}

/// `datetime_from_unix` converts seconds since the Unix epoch to a DateTime.
pub fn datetime_from_unix(secs: u64) -> Result<DateTime> {
    Ok(DateTime::from_unix_duration(Duration::from_secs(secs))?)
}

/// `calendar_months_between` returns the number of whole calendar months between two times
/// expressed as seconds since the Unix epoch. A partial final month is not counted.
pub fn calendar_months_between(start: u64, end: u64) -> Result<u64> {
    if end <= start {
        return Ok(0);
    }
    let s = datetime_from_unix(start)?;
    let e = datetime_from_unix(end)?;
    let mut months = (e.year() as i64 - s.year() as i64) * 12 + (e.month() as i64 - s.month() as i64);
    if e.day() < s.day() {
        months -= 1;
    }
    Ok(months.max(0) as u64)
}

/// `name_to_string` returns a string representation of given Name value.
pub fn name_to_string(name: &Name) -> String {
    name.to_string()
}

/// `get_value_from_rdn` returns the value from AttributeTypeAndValue as a string for use in comparing
/// values where leading whitespace may be a factor. Values that are not a string type are returned
/// as an OID=#hex string.
pub fn get_value_from_rdn(atav: &AttributeTypeAndValue) -> Result<String> {
    if let Some(val) = attribute_string(atav) {
        return Ok(val);
    }
    let val = atav.value.to_der()?;
    Ok(format!("{}=#{}", atav.oid, buffer_to_hex(&val).to_lowercase()))
}

/// `attribute_string` returns the unescaped string value of an attribute when the attribute uses
/// one of the string types commonly found in certificate names.
pub fn attribute_string(atav: &AttributeTypeAndValue) -> Option<String> {
    match atav.value.tag() {
        der::Tag::PrintableString => atav
            .value
            .decode_as()
            .ok()
            .map(|s: PrintableString| s.to_string()),
        der::Tag::Utf8String => atav
            .value
            .decode_as()
            .ok()
            .map(|s: Utf8StringRef<'_>| s.to_string()),
        der::Tag::Ia5String => atav
            .value
            .decode_as()
            .ok()
            .map(|s: Ia5String| s.to_string()),
        der::Tag::TeletexString => atav
            .value
            .decode_as()
            .ok()
            .map(|s: TeletexStringRef<'_>| s.to_string()),
        _ => None,
    }
}

/// `attribute_values` collects the string values of every attribute of the given type in the name,
/// in RDN order.
pub fn attribute_values(name: &Name, oid: &ObjectIdentifier) -> Vec<String> {
    let mut retval = vec![];
    for rdn in name.0.iter() {
        for atav in rdn.0.iter() {
            if atav.oid == *oid {
                if let Some(s) = attribute_string(atav) {
                    retval.push(s);
                }
            }
        }
    }
    retval
}

fn collapse_whitespace(s: &str) -> String {
    lazy_static! {
        static ref WS_RE: Option<Regex> = Regex::new(r"\s+").ok();
    }
    let lower = s.trim().to_lowercase();
    match WS_RE.as_ref() {
        Some(re) => re.replace_all(lower.as_str(), " ").to_string(),
        None => lower,
    }
}

/// [`compare_names`] compares two Name values returning true if they match and false otherwise.
/// Attribute values are compared case-insensitively with leading, trailing and repeated whitespace
/// ignored.
pub fn compare_names(left: &Name, right: &Name) -> bool {
    if left.0.len() != right.0.len() {
        return false;
    }

    for (lrdn, rrdn) in left.0.iter().zip(right.0.iter()) {
        if lrdn.0.len() != rrdn.0.len() {
            return false;
        }
        if lrdn == rrdn {
            continue;
        }

        for (l, r) in lrdn.0.iter().zip(rrdn.0.iter()) {
            if l.oid != r.oid {
                return false;
            }
            let l_val = match get_value_from_rdn(l) {
                Ok(v) => collapse_whitespace(&v),
                Err(_e) => return false,
            };
            let r_val = match get_value_from_rdn(r) {
                Ok(v) => collapse_whitespace(&v),
                Err(_e) => return false,
            };
            if l_val != r_val {
                return false;
            }
        }
    }
    true
}

/// `descended_from_host` returns true if cand is equal to or a subdomain of prev_name. When is_uri
/// is true, a constraint that begins with a period only matches subdomains.
pub(crate) fn descended_from_host(prev_name: &Ia5String, cand: &str, is_uri: bool) -> bool {
    let base = prev_name.to_string().to_lowercase();
    let cand = cand.trim_end_matches('.').to_lowercase();
    if base.is_empty() {
        return true;
    }

    if let Some(stripped) = base.strip_prefix('.') {
        return cand.ends_with(&base) && cand.len() > stripped.len() + 1;
    }
    if cand == base {
        return true;
    }
    if is_uri {
        return false;
    }
    cand.ends_with(&format!(".{}", base))
}

/// `descended_from_rfc822` returns true if new_name is within the rfc822Name constraint prev_name.
///
/// A constraint naming a mailbox matches only that mailbox, a constraint naming a host matches all
/// mailboxes on that host and a constraint beginning with a period matches all mailboxes on
/// subdomains of that domain.
pub(crate) fn descended_from_rfc822(prev_name: &Ia5String, new_name: &str) -> bool {
    let base = prev_name.to_string().to_lowercase();
    let cand = new_name.to_lowercase();

    if base.contains('@') {
        return base == cand;
    }

    let host = match cand.rsplit_once('@') {
        Some((_, host)) => host.to_string(),
        None => cand,
    };
    if base.starts_with('.') {
        host.ends_with(&base)
    } else {
        host == base
    }
}

/// `descended_from_dn` returns true if name is equal to or descended from subtree and false otherwise.
pub(crate) fn descended_from_dn(subtree: &Name, name: &Name, min: u32, max: Option<u32>) -> bool {
    if subtree.0.len() > name.0.len() {
        return false;
    }

    let diff = (name.0.len() - subtree.0.len()) as u32;
    if diff < min {
        return false;
    }
    if let Some(max) = max {
        if diff > max {
            return false;
        }
    }

    for (l, r) in subtree.0.iter().zip(name.0.iter()) {
        if l == r {
            continue;
        }
        if l.0.len() != r.0.len() {
            return false;
        }
        for (la, ra) in l.0.iter().zip(r.0.iter()) {
            if la.oid != ra.oid {
                return false;
            }
            if la.value.value() == ra.value.value() {
                // some issuers use a different character set in a name constraint and subject name
                debug!("Permitting a DN name constraint match despite different character sets");
                continue;
            }
            let lv = get_value_from_rdn(la).map(|v| collapse_whitespace(&v));
            let rv = get_value_from_rdn(ra).map(|v| collapse_whitespace(&v));
            match (lv, rv) {
                (Ok(lv), Ok(rv)) if lv == rv => {
                    debug!("Permitting a DN name constraint match despite different capitalization");
                }
                _ => return false,
            }
        }
    }
    true
}

/// `descended_from_ip` returns true if addr falls within the address/mask pair encoded in subtree
/// (8 octets for IPv4, 32 octets for IPv6).
pub(crate) fn descended_from_ip(subtree: &[u8], addr: &[u8]) -> bool {
    if subtree.len() != addr.len() * 2 {
        return false;
    }
    let (net, mask) = subtree.split_at(addr.len());
    addr.iter()
        .zip(net.iter().zip(mask.iter()))
        .all(|(a, (n, m))| a & m == n & m)
}

/// `normalize_host` lower cases a host name and strips a trailing period.
pub fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_lowercase()
}

/// `ip_address_bytes` returns the network-order octets of host if it is an IPv4 or IPv6 literal.
pub fn ip_address_bytes(host: &str) -> Option<Vec<u8>> {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => Some(v4.octets().to_vec()),
        Ok(IpAddr::V6(v6)) => Some(v6.octets().to_vec()),
        Err(_e) => None,
    }
}

/// `host_matches_pattern` compares a host name against a name from a certificate that may use a
/// wildcard.
///
/// A wildcard is only honored when it is the entire left-most label and the pattern has at least
/// three labels, i.e., `*.example.com` matches `www.example.com` but not `example.com` or
/// `a.b.example.com`, and `*.com` matches nothing.
pub fn host_matches_pattern(pattern: &str, host: &str) -> bool {
    let pattern = normalize_host(pattern);
    let host = normalize_host(host);
    if pattern.is_empty() || host.is_empty() {
        return false;
    }
    if pattern == host {
        return true;
    }

    let plabels: Vec<&str> = pattern.split('.').collect();
    let hlabels: Vec<&str> = host.split('.').collect();
    if plabels[0] != "*" || plabels.len() < 3 || plabels.len() != hlabels.len() {
        return false;
    }
    if plabels[1..].iter().any(|l| l.contains('*')) {
        return false;
    }
    !hlabels[0].is_empty() && plabels[1..] == hlabels[1..]
}

/// `get_file_as_byte_vec` takes a Path containing a file name and returns a vector of bytes containing
/// the contents of that file or an [Error::StdIoError].
pub fn get_file_as_byte_vec(filename: &Path) -> Result<Vec<u8>> {
    let mut f = File::open(filename)?;
    let mut buffer = vec![];
    f.read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// `get_file_as_byte_vec_pem` takes a Path containing a file name and returns a vector of bytes containing
/// the contents of that file. If the file is PEM encoded, it is decoded prior to returning the vector
/// of bytes.
pub fn get_file_as_byte_vec_pem(filename: &Path) -> Result<Vec<u8>> {
    let b = get_file_as_byte_vec(filename)?;
    if b.starts_with(b"-----BEGIN") {
        match pem_rfc7468::decode_vec(&b) {
            Ok((_label, der)) => Ok(der),
            Err(e) => {
                debug!("Failed to decode PEM from {:?}: {}", filename, e);
                Err(Error::ParseError)
            }
        }
    } else {
        Ok(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;
    use x509_cert::name::RdnSequence;

    #[test]
    fn host_matching() {
        assert!(host_matches_pattern("www.example.com", "WWW.Example.com."));
        assert!(host_matches_pattern("*.example.com", "www.example.com"));
        assert!(!host_matches_pattern("*.example.com", "example.com"));
        assert!(!host_matches_pattern("*.example.com", "a.b.example.com"));
        assert!(!host_matches_pattern("*.com", "example.com"));
        assert!(!host_matches_pattern("www.*.com", "www.example.com"));
    }

    #[test]
    fn months() {
        // 2020-01-15 to 2020-11-15
        assert_eq!(10, calendar_months_between(1579046400, 1605398400).unwrap());
        // 2020-01-15 to 2020-11-14
        assert_eq!(9, calendar_months_between(1579046400, 1605312000).unwrap());
        assert_eq!(0, calendar_months_between(1605312000, 1579046400).unwrap());
    }

    #[test]
    fn names_compare_loosely() {
        let l = RdnSequence::from_str("CN=Joe  Smith,O=Example,C=US").unwrap();
        let r = RdnSequence::from_str("CN=joe smith,O=EXAMPLE,C=US").unwrap();
        assert!(compare_names(&l, &r));
        let r = RdnSequence::from_str("CN=Sue,O=Example,C=US").unwrap();
        assert!(!compare_names(&l, &r));
    }

    #[test]
    fn rfc822_constraints() {
        let host = Ia5String::new("example.com").unwrap();
        let domain = Ia5String::new(".example.com").unwrap();
        let mailbox = Ia5String::new("joe@example.com").unwrap();
        assert!(descended_from_rfc822(&host, "joe@example.com"));
        assert!(!descended_from_rfc822(&host, "joe@mail.example.com"));
        assert!(descended_from_rfc822(&domain, "joe@mail.example.com"));
        assert!(!descended_from_rfc822(&domain, "joe@example.com"));
        assert!(descended_from_rfc822(&mailbox, "Joe@Example.com"));
        assert!(!descended_from_rfc822(&mailbox, "sue@example.com"));
    }

    #[test]
    fn ip_constraints() {
        assert!(descended_from_ip(&[10, 0, 0, 0, 255, 0, 0, 0], &[10, 1, 2, 3]));
        assert!(!descended_from_ip(&[10, 0, 0, 0, 255, 0, 0, 0], &[11, 1, 2, 3]));
        assert_eq!(Some(vec![127, 0, 0, 1]), ip_address_bytes("127.0.0.1"));
        assert_eq!(None, ip_address_bytes("www.example.com"));
    }

    #[test]
    fn hex_helpers() {
        assert_eq!(vec![0xAB, 0xCD], hex_to_buffer("ab:CD").unwrap());
        assert_eq!("ABCD", buffer_to_hex(&[0xAB, 0xCD]));
        assert!(hex_to_buffer("xyz").is_err());
    }
}
