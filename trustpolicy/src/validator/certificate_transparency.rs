//! Certificate Transparency (CT) determination per [RFC 6962]
//!
//! Signed certificate timestamps (SCTs) are gathered from three sources: the leaf's embedded SCT
//! list extension, SCTs supplied by the path builder (i.e., from the TLS handshake) and SCTs carried
//! in OCSP responses for the leaf. An SCT counts only if it verifies under a trusted log's key.
//!
//! [RFC 6962]: <https://datatracker.ietf.org/doc/html/rfc6962>

use std::collections::BTreeSet;

use der::asn1::OctetString;
use der::Decode;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_ocsp::{BasicOcspResponse, OcspResponse, OcspResponseStatus};

use crate::environment::trust_environment::TrustEnvironment;
use crate::util::error::*;
use crate::util::logging::*;
use crate::util::pvc_alg_oids::*;
use crate::util::pvc_utilities::calendar_months_between;
use crate::validator::candidate_path::CandidatePath;

/// TLS HashAlgorithm value for SHA-256
pub const SCT_HASH_SHA256: u8 = 4;
/// TLS HashAlgorithm value for SHA-384
pub const SCT_HASH_SHA384: u8 = 5;
/// TLS HashAlgorithm value for SHA-512
pub const SCT_HASH_SHA512: u8 = 6;
/// TLS SignatureAlgorithm value for RSA
pub const SCT_SIGNATURE_RSA: u8 = 1;
/// TLS SignatureAlgorithm value for ECDSA
pub const SCT_SIGNATURE_ECDSA: u8 = 3;

/// Cursor over TLS presentation language encodings
struct TlsReader<'a> {
    data: &'a [u8],
}

impl<'a> TlsReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        TlsReader { data }
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.data.len() < len {
            return Err(Error::LengthError);
        }
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let b = self.read_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_be_bytes(buf))
    }

    fn read_u16_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u16()? as usize;
        self.read_bytes(len)
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn push_u16_prefixed(out: &mut Vec<u8>, data: &[u8]) -> Result<()> {
    let len = u16::try_from(data.len()).map_err(|_e| Error::LengthError)?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(data);
    Ok(())
}

fn push_u24_prefixed(out: &mut Vec<u8>, data: &[u8]) -> Result<()> {
    if data.len() > 0x00ff_ffff {
        return Err(Error::LengthError);
    }
    out.extend_from_slice(&(data.len() as u32).to_be_bytes()[1..]);
    out.extend_from_slice(data);
    Ok(())
}

/// [`Sct`] is a decoded SignedCertificateTimestamp structure.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Sct {
    /// Structure version, 0 for v1
    pub version: u8,
    /// SHA-256 digest of the log's public key
    pub log_id: [u8; 32],
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    /// Opaque CtExtensions
    pub extensions: Vec<u8>,
    /// TLS HashAlgorithm of the signature
    pub hash_algorithm: u8,
    /// TLS SignatureAlgorithm of the signature
    pub signature_algorithm: u8,
    /// Signature bytes
    pub signature: Vec<u8>,
}

impl Sct {
    /// `parse` decodes a single TLS-encoded SCT. Trailing data is rejected.
    pub fn parse(data: &[u8]) -> Result<Sct> {
        let mut r = TlsReader::new(data);
        let version = r.read_u8()?;
        let mut log_id = [0u8; 32];
        log_id.copy_from_slice(r.read_bytes(32)?);
        let timestamp = r.read_u64()?;
        let extensions = r.read_u16_prefixed()?.to_vec();
        let hash_algorithm = r.read_u8()?;
        let signature_algorithm = r.read_u8()?;
        let signature = r.read_u16_prefixed()?.to_vec();
        if !r.is_empty() {
            return Err(Error::LengthError);
        }
        Ok(Sct {
            version,
            log_id,
            timestamp,
            extensions,
            hash_algorithm,
            signature_algorithm,
            signature,
        })
    }

    /// `signature_algorithm_identifier` maps the TLS hash and signature algorithm values to an
    /// X.509 signature algorithm.
    pub fn signature_algorithm_identifier(&self) -> Result<AlgorithmIdentifierOwned> {
        let oid = match (self.signature_algorithm, self.hash_algorithm) {
            (SCT_SIGNATURE_ECDSA, SCT_HASH_SHA256) => PKIXALG_ECDSA_WITH_SHA256,
            (SCT_SIGNATURE_ECDSA, SCT_HASH_SHA384) => PKIXALG_ECDSA_WITH_SHA384,
            (SCT_SIGNATURE_ECDSA, SCT_HASH_SHA512) => PKIXALG_ECDSA_WITH_SHA512,
            (SCT_SIGNATURE_RSA, SCT_HASH_SHA256) => PKIXALG_SHA256_WITH_RSA_ENCRYPTION,
            (SCT_SIGNATURE_RSA, SCT_HASH_SHA384) => PKIXALG_SHA384_WITH_RSA_ENCRYPTION,
            (SCT_SIGNATURE_RSA, SCT_HASH_SHA512) => PKIXALG_SHA512_WITH_RSA_ENCRYPTION,
            _ => return Err(Error::Unsupported),
        };
        Ok(AlgorithmIdentifierOwned {
            oid,
            parameters: None,
        })
    }
}

/// `parse_sct_list` splits a TLS-encoded SignedCertificateTimestampList into the encodings of the
/// individual SCTs.
pub fn parse_sct_list(data: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut outer = TlsReader::new(data);
    let mut r = TlsReader::new(outer.read_u16_prefixed()?);
    if !outer.is_empty() {
        return Err(Error::LengthError);
    }
    let mut retval = vec![];
    while !r.is_empty() {
        retval.push(r.read_u16_prefixed()?.to_vec());
    }
    Ok(retval)
}

/// [`LogEntry`] identifies what an SCT attests to.
#[derive(Clone, Debug)]
pub enum LogEntry<'a> {
    /// A final certificate, given as its DER encoding
    X509(&'a [u8]),
    /// A precertificate, given as the SHA-256 digest of the issuer's SubjectPublicKeyInfo and the
    /// DER-encoded TBSCertificate without the SCT list extension
    Precert {
        /// SHA-256 digest of the issuer's SubjectPublicKeyInfo
        issuer_key_hash: &'a [u8],
        /// Encoded TBSCertificate
        tbs_certificate: &'a [u8],
    },
}

/// `signed_data` returns the digitally-signed structure covered by an SCT's signature.
pub fn signed_data(sct: &Sct, entry: &LogEntry<'_>) -> Result<Vec<u8>> {
    let mut out = vec![sct.version, 0];
    out.extend_from_slice(&sct.timestamp.to_be_bytes());
    match entry {
        LogEntry::X509(cert) => {
            out.extend_from_slice(&0u16.to_be_bytes());
            push_u24_prefixed(&mut out, cert)?;
        }
        LogEntry::Precert {
            issuer_key_hash,
            tbs_certificate,
        } => {
            out.extend_from_slice(&1u16.to_be_bytes());
            out.extend_from_slice(issuer_key_hash);
            push_u24_prefixed(&mut out, tbs_certificate)?;
        }
    }
    push_u16_prefixed(&mut out, &sct.extensions)?;
    Ok(out)
}

/// `scts_from_ocsp_response` returns the encodings of the SCTs carried in the single responses of a
/// DER-encoded OCSP response.
pub fn scts_from_ocsp_response(der: &[u8]) -> Result<Vec<Vec<u8>>> {
    let response = OcspResponse::from_der(der)?;
    if response.response_status != OcspResponseStatus::Successful {
        return Err(Error::NotFound);
    }
    let bytes = response.response_bytes.ok_or(Error::NotFound)?;
    if bytes.response_type != PKIX_OCSP_BASIC {
        return Err(Error::Unsupported);
    }
    let basic = BasicOcspResponse::from_der(bytes.response.as_bytes())?;

    let mut retval = vec![];
    for single in basic.tbs_response_data.responses {
        for ext in single.single_extensions.unwrap_or_default() {
            if ext.extn_id != CT_OCSP_SCT_LIST {
                continue;
            }
            let list = OctetString::from_der(ext.extn_value.as_bytes())?;
            retval.extend(parse_sct_list(list.as_bytes())?);
        }
    }
    Ok(retval)
}

/// An SCT that verified under a trusted log
#[derive(Clone, Debug)]
struct VerifiedSct {
    log_id: Vec<u8>,
    log_expiry: Option<u64>,
    timestamp: u64,
}

impl VerifiedSct {
    /// True if the log is still qualified at verify_time (seconds)
    fn currently_qualified(&self, verify_time: u64) -> bool {
        self.log_expiry.map_or(true, |e| verify_time < e)
    }

    /// True if the log was qualified when the SCT was issued
    fn once_qualified(&self) -> bool {
        self.log_expiry
            .map_or(true, |e| self.timestamp < e.saturating_mul(1000))
    }
}

fn verify_sct(
    env: &TrustEnvironment,
    encoded: &[u8],
    entry: &LogEntry<'_>,
    verify_time: u64,
) -> Option<VerifiedSct> {
    let sct = match Sct::parse(encoded) {
        Ok(sct) => sct,
        Err(e) => {
            log_message(&TpLogLevels::TpDebug, &format!("Ignoring malformed SCT: {}", e));
            return None;
        }
    };
    if sct.version != 0 || sct.timestamp > verify_time.saturating_mul(1000) {
        return None;
    }
    let log = env
        .trusted_logs()
        .iter()
        .find(|log| log.log_id() == sct.log_id)?;
    let alg = sct.signature_algorithm_identifier().ok()?;
    let spki = SubjectPublicKeyInfoOwned::from_der(&log.key_der).ok()?;
    let message = signed_data(&sct, entry).ok()?;
    if env
        .verify_signature_message(&message, &sct.signature, &alg, &spki)
        .is_err()
    {
        log_message(&TpLogLevels::TpDebug, "SCT signature did not verify");
        return None;
    }
    Some(VerifiedSct {
        log_id: sct.log_id.to_vec(),
        log_expiry: log.expiry,
        timestamp: sct.timestamp,
    })
}

/// `required_embedded_logs` returns the number of distinct logs that must have issued embedded SCTs
/// for a certificate with the given lifetime in months.
pub fn required_embedded_logs(lifetime_months: u64) -> usize {
    match lifetime_months {
        0..=14 => 2,
        15..=27 => 3,
        28..=39 => 4,
        _ => 5,
    }
}

/// `is_ct_qualified` returns true if the leaf of the path is backed by enough SCTs from trusted logs.
///
/// The path qualifies when valid SCTs from at least two distinct currently qualified logs are found
/// in any source, or when at least one embedded SCT is from a currently qualified log and the
/// embedded SCTs come from enough distinct logs (qualified when the SCT was issued) given the
/// lifetime of the leaf.
pub fn is_ct_qualified(env: &TrustEnvironment, path: &CandidatePath, verify_time: u64) -> bool {
    let leaf = match path.leaf() {
        Some(leaf) => leaf,
        None => return false,
    };
    if env.trusted_logs().is_empty() {
        return false;
    }

    let mut embedded = vec![];
    if let (Some(list), Some(issuer), Some(tbs)) =
        (leaf.sct_list(), path.certificate(1), leaf.precertificate_tbs())
    {
        let entry = LogEntry::Precert {
            issuer_key_hash: issuer.spki_sha256(),
            tbs_certificate: &tbs,
        };
        match parse_sct_list(list) {
            Ok(scts) => embedded.extend(
                scts.iter()
                    .filter_map(|s| verify_sct(env, s, &entry, verify_time)),
            ),
            Err(e) => log_message(
                &TpLogLevels::TpDebug,
                &format!("Ignoring malformed embedded SCT list: {}", e),
            ),
        }
    }

    let mut external_scts: Vec<Vec<u8>> = path.builder_scts.clone();
    for response in &path.ocsp_responses {
        match scts_from_ocsp_response(response) {
            Ok(scts) => external_scts.extend(scts),
            Err(e) => log_message(
                &TpLogLevels::TpDebug,
                &format!("Ignoring SCTs from OCSP response: {}", e),
            ),
        }
    }
    let entry = LogEntry::X509(leaf.encoded());
    let external: Vec<VerifiedSct> = external_scts
        .iter()
        .filter_map(|s| verify_sct(env, s, &entry, verify_time))
        .collect();

    let current_logs: BTreeSet<&[u8]> = embedded
        .iter()
        .chain(external.iter())
        .filter(|s| s.currently_qualified(verify_time))
        .map(|s| s.log_id.as_slice())
        .collect();
    if current_logs.len() >= 2 {
        return true;
    }

    if !embedded.iter().any(|s| s.currently_qualified(verify_time)) {
        return false;
    }
    let once_logs: BTreeSet<&[u8]> = embedded
        .iter()
        .filter(|s| s.once_qualified())
        .map(|s| s.log_id.as_slice())
        .collect();
    let months = calendar_months_between(leaf.not_before(), leaf.not_after()).unwrap_or(u64::MAX);
    once_logs.len() >= required_embedded_logs(months)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded_sct(log_byte: u8, timestamp: u64) -> Vec<u8> {
        let mut out = vec![0u8];
        out.extend_from_slice(&[log_byte; 32]);
        out.extend_from_slice(&timestamp.to_be_bytes());
        out.extend_from_slice(&[0, 0]); // no extensions
        out.extend_from_slice(&[SCT_HASH_SHA256, SCT_SIGNATURE_ECDSA]);
        out.extend_from_slice(&[0, 3, 0xaa, 0xbb, 0xcc]);
        out
    }

    #[test]
    fn parse_list_and_sct() {
        let a = encoded_sct(1, 1000);
        let b = encoded_sct(2, 2000);
        let mut items = vec![];
        for s in [&a, &b] {
            items.extend_from_slice(&(s.len() as u16).to_be_bytes());
            items.extend_from_slice(s);
        }
        let mut list = (items.len() as u16).to_be_bytes().to_vec();
        list.extend_from_slice(&items);

        let scts = parse_sct_list(&list).unwrap();
        assert_eq!(vec![a.clone(), b], scts);

        let sct = Sct::parse(&a).unwrap();
        assert_eq!([1u8; 32], sct.log_id);
        assert_eq!(1000, sct.timestamp);
        assert_eq!(vec![0xaa, 0xbb, 0xcc], sct.signature);
        assert_eq!(
            PKIXALG_ECDSA_WITH_SHA256,
            sct.signature_algorithm_identifier().unwrap().oid
        );

        let mut truncated = a.clone();
        truncated.pop();
        assert_eq!(Err(Error::LengthError), Sct::parse(&truncated));
        list.push(0);
        assert_eq!(Err(Error::LengthError), parse_sct_list(&list));
    }

    #[test]
    fn signed_data_layout() {
        let sct = Sct::parse(&encoded_sct(7, 0x0102)).unwrap();
        let data = signed_data(&sct, &LogEntry::X509(&[0x30, 0x00])).unwrap();
        assert_eq!(
            vec![0, 0, 0, 0, 0, 0, 0, 0, 0x01, 0x02, 0, 0, 0, 0, 2, 0x30, 0x00, 0, 0],
            data
        );

        let hash = [0x11u8; 32];
        let data = signed_data(
            &sct,
            &LogEntry::Precert {
                issuer_key_hash: &hash,
                tbs_certificate: &[0x30, 0x00],
            },
        )
        .unwrap();
        assert_eq!(&[0, 1], &data[10..12]);
        assert_eq!(&hash, &data[12..44]);
        assert_eq!(&[0, 0, 2, 0x30, 0x00, 0, 0], &data[44..]);
    }

    #[test]
    fn thresholds() {
        assert_eq!(2, required_embedded_logs(10));
        assert_eq!(2, required_embedded_logs(14));
        assert_eq!(3, required_embedded_logs(15));
        assert_eq!(3, required_embedded_logs(27));
        assert_eq!(4, required_embedded_logs(39));
        assert_eq!(5, required_embedded_logs(40));
    }
}
