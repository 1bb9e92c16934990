//! Provides implementations of crypto-related [`TrustEnvironment`] interfaces using libraries from the
//! [Rust Crypto](https://github.com/RustCrypto) project for support.

use der::{asn1::ObjectIdentifier, Encode};
use p256::ecdsa::{
    signature::Verifier as Verifier256, Signature as Signature256, VerifyingKey as VerifyingKey256,
};
use rsa::pkcs1v15;
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::environment::trust_environment::TrustEnvironment;
use crate::util::error::{Error, Result};
use crate::util::logging::{log_message, TpLogLevels};
use crate::util::pvc_alg_oids::*;

/// `sha1_digest` returns the SHA-1 digest of the buffer.
pub fn sha1_digest(buffer: &[u8]) -> Vec<u8> {
    Sha1::digest(buffer).to_vec()
}

/// `sha256_digest` returns the SHA-256 digest of the buffer.
pub fn sha256_digest(buffer: &[u8]) -> Vec<u8> {
    Sha256::digest(buffer).to_vec()
}

/// is_rsa returns true is the presented OID is one of the RSA PKCS #1 v1.5 signature algorithms
/// supported by [`verify_signature_message_rust_crypto`].
pub(crate) fn is_rsa(oid: &ObjectIdentifier) -> bool {
    *oid == PKIXALG_SHA256_WITH_RSA_ENCRYPTION
        || *oid == PKIXALG_SHA384_WITH_RSA_ENCRYPTION
        || *oid == PKIXALG_SHA512_WITH_RSA_ENCRYPTION
}

/// is_ecdsa returns true is the presented OID is one of the ECDSA signature algorithms.
pub(crate) fn is_ecdsa(oid: &ObjectIdentifier) -> bool {
    *oid == PKIXALG_ECDSA_WITH_SHA256
        || *oid == PKIXALG_ECDSA_WITH_SHA384
        || *oid == PKIXALG_ECDSA_WITH_SHA224
        || *oid == PKIXALG_ECDSA_WITH_SHA512
}

/// get_hash_alg_from_sig_alg takes an ObjectIdentifier that notionally contains a signature algorithm,
/// i.e., PKIXALG_SHA256_WITH_RSA_ENCRYPTION or PKIXALG_ECDSA_WITH_SHA256, and returns the indicated hash
/// algorithm.
pub fn get_hash_alg_from_sig_alg(sig_alg: &ObjectIdentifier) -> Result<AlgorithmIdentifierOwned> {
    let oid = if PKIXALG_SHA256_WITH_RSA_ENCRYPTION == *sig_alg || PKIXALG_ECDSA_WITH_SHA256 == *sig_alg
    {
        PKIXALG_SHA256
    } else if PKIXALG_SHA384_WITH_RSA_ENCRYPTION == *sig_alg || PKIXALG_ECDSA_WITH_SHA384 == *sig_alg
    {
        PKIXALG_SHA384
    } else if PKIXALG_SHA224_WITH_RSA_ENCRYPTION == *sig_alg || PKIXALG_ECDSA_WITH_SHA224 == *sig_alg
    {
        PKIXALG_SHA224
    } else if PKIXALG_SHA512_WITH_RSA_ENCRYPTION == *sig_alg || PKIXALG_ECDSA_WITH_SHA512 == *sig_alg
    {
        PKIXALG_SHA512
    } else if PKIXALG_SHA1_WITH_RSA_ENCRYPTION == *sig_alg || PKIXALG_ECDSA_WITH_SHA1 == *sig_alg {
        PKIXALG_SHA1
    } else {
        return Err(Error::Unrecognized);
    };
    Ok(AlgorithmIdentifierOwned {
        oid,
        parameters: None,
    })
}

/// calculate_hash_rust_crypto implements the [`CalculateHash`](crate::CalculateHash) interface
/// for [`TrustEnvironment`] using implementations from the Rust Crypto project.
///
/// It supports [`PKIXALG_SHA1`], [`PKIXALG_SHA224`], [`PKIXALG_SHA256`], [`PKIXALG_SHA384`] and
/// [`PKIXALG_SHA512`].
pub fn calculate_hash_rust_crypto(
    _env: &TrustEnvironment,
    hash_alg: &AlgorithmIdentifierOwned,
    buffer_to_hash: &[u8],
) -> Result<Vec<u8>> {
    match hash_alg.oid {
        PKIXALG_SHA1 => Ok(Sha1::digest(buffer_to_hash).to_vec()),
        PKIXALG_SHA224 => Ok(Sha224::digest(buffer_to_hash).to_vec()),
        PKIXALG_SHA256 => Ok(Sha256::digest(buffer_to_hash).to_vec()),
        PKIXALG_SHA384 => Ok(Sha384::digest(buffer_to_hash).to_vec()),
        PKIXALG_SHA512 => Ok(Sha512::digest(buffer_to_hash).to_vec()),
        _ => Err(Error::Unrecognized),
    }
}

fn get_named_curve_parameter(alg_id: &AlgorithmIdentifierOwned) -> Result<ObjectIdentifier> {
    if let Some(params) = &alg_id.parameters {
        if let Ok(oid) = params.decode_as::<ObjectIdentifier>() {
            return Ok(oid);
        }
    }
    Err(Error::ParseError)
}

fn verify_rsa(
    message_to_verify: &[u8],
    signature: &[u8],
    signature_alg: &AlgorithmIdentifierOwned,
    spki: &SubjectPublicKeyInfoOwned,
) -> Result<()> {
    let enc_spki = spki.to_der()?;
    let rsa = RsaPublicKey::from_public_key_der(&enc_spki).map_err(|_e| Error::ParseError)?;
    let sig = pkcs1v15::Signature::try_from(signature).map_err(|_e| Error::ParseError)?;
    let verified = match signature_alg.oid {
        PKIXALG_SHA256_WITH_RSA_ENCRYPTION => {
            pkcs1v15::VerifyingKey::<Sha256>::new(rsa).verify(message_to_verify, &sig)
        }
        PKIXALG_SHA384_WITH_RSA_ENCRYPTION => {
            pkcs1v15::VerifyingKey::<Sha384>::new(rsa).verify(message_to_verify, &sig)
        }
        PKIXALG_SHA512_WITH_RSA_ENCRYPTION => {
            pkcs1v15::VerifyingKey::<Sha512>::new(rsa).verify(message_to_verify, &sig)
        }
        _ => return Err(Error::Unrecognized),
    };
    verified.map_err(|_e| Error::SignatureVerificationFailure)
}

/// verify_signature_message_rust_crypto implements the [`VerifySignatureMessage`](crate::VerifySignatureMessage)
/// interface for [`TrustEnvironment`] using implementations from the [Rust Crypto](https://github.com/RustCrypto) project.
///
/// RSA PKCS #1 v1.5 signatures with SHA-256, SHA-384 or SHA-512 and ECDSA P-256 signatures with
/// SHA-256 are supported at present.
pub fn verify_signature_message_rust_crypto(
    _env: &TrustEnvironment,
    message_to_verify: &[u8],                 // buffer to verify
    signature: &[u8],                         // signature
    signature_alg: &AlgorithmIdentifierOwned, // signature algorithm
    spki: &SubjectPublicKeyInfoOwned,         // public key
) -> Result<()> {
    if is_rsa(&signature_alg.oid) {
        return verify_rsa(message_to_verify, signature, signature_alg, spki);
    } else if is_ecdsa(&signature_alg.oid) {
        let named_curve = get_named_curve_parameter(&spki.algorithm)?;
        if named_curve != PKIXALG_SECP256R1 || signature_alg.oid != PKIXALG_ECDSA_WITH_SHA256 {
            log_message(
                &TpLogLevels::TpDebug,
                format!(
                    "ECDSA verification with {} over curve {} is not supported",
                    signature_alg.oid, named_curve
                )
                .as_str(),
            );
            return Err(Error::Unsupported);
        }
        let ecdsa = VerifyingKey256::from_sec1_bytes(spki.subject_public_key.raw_bytes())
            .map_err(|_e| Error::ParseError)?;
        let s = Signature256::from_der(signature).map_err(|_e| Error::ParseError)?;
        return ecdsa
            .verify(message_to_verify, &s)
            .map_err(|_e| Error::SignatureVerificationFailure);
    }
    Err(Error::Unrecognized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use der::Decode;
    use p256::ecdsa::{signature::Signer, SigningKey};
    use p256::pkcs8::EncodePublicKey;

    #[test]
    fn ecdsa_p256_round_trip() {
        let env = TrustEnvironment::default();
        let sk = SigningKey::from_slice(&[7u8; 32]).unwrap();
        let spki_der = sk.verifying_key().to_public_key_der().unwrap();
        let spki = SubjectPublicKeyInfoOwned::from_der(spki_der.as_bytes()).unwrap();
        let sig: Signature256 = sk.sign(b"message");
        let alg = AlgorithmIdentifierOwned {
            oid: PKIXALG_ECDSA_WITH_SHA256,
            parameters: None,
        };
        let der_sig = sig.to_der();
        assert!(verify_signature_message_rust_crypto(
            &env,
            b"message",
            der_sig.as_bytes(),
            &alg,
            &spki
        )
        .is_ok());
        assert_eq!(
            Err(Error::SignatureVerificationFailure),
            verify_signature_message_rust_crypto(&env, b"massage", der_sig.as_bytes(), &alg, &spki)
        );
    }

    #[test]
    fn hashes() {
        let env = TrustEnvironment::default();
        let alg = AlgorithmIdentifierOwned {
            oid: PKIXALG_SHA256,
            parameters: None,
        };
        assert_eq!(
            sha256_digest(b"abc"),
            calculate_hash_rust_crypto(&env, &alg, b"abc").unwrap()
        );
        let alg = AlgorithmIdentifierOwned {
            oid: PKIXALG_RSA_ENCRYPTION,
            parameters: None,
        };
        assert!(calculate_hash_rust_crypto(&env, &alg, b"abc").is_err());
        assert_eq!(20, sha1_digest(b"abc").len());
    }
}
