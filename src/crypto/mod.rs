//! Signature normalization and key extraction
//!
//! - ECDSA P-256 DER signatures are canonicalized to the fixed 64-byte
//!   low-S form the on-chain verifier accepts.
//! - WebAuthn attestation / authenticator-data blobs carry a COSE EC2
//!   public key which is extracted as a 65-byte uncompressed point.

use crate::error::{EngineError, EngineResult};
use p256::ecdsa::Signature;
use sha2::{Digest, Sha256};

/// CBOR prefix of a COSE EC2 key: kty=EC2, alg=ES256, crv=P-256,
/// followed by the 32-byte x coordinate
const COSE_KEY_PREFIX: [u8; 10] = [0xa5, 0x01, 0x02, 0x03, 0x26, 0x20, 0x01, 0x21, 0x58, 0x20];

/// CBOR marker separating the x and y coordinates (key -3, 32-byte bytes)
const COSE_Y_MARKER: [u8; 3] = [0x22, 0x58, 0x20];

/// Fixed authenticator-data header: rpIdHash (32) + flags (1) + counter (4)
const AUTH_DATA_HEADER_LEN: usize = 37;
/// Algorithm-identifier block (AAGUID) preceding the credential id
const AAGUID_LEN: usize = 16;

/// SHA-256 digest
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Network identifier: SHA-256 of the network passphrase
pub fn network_id(passphrase: &str) -> [u8; 32] {
    sha256(passphrase.as_bytes())
}

/// Canonicalize a DER-encoded ECDSA P-256 signature into the fixed
/// 64-byte form: 32-byte big-endian r, then 32-byte big-endian s with s
/// reduced to its low-S representative.
///
/// Malformed DER (wrong tag, truncated length, truncated integer) is a
/// fatal signer error, never coerced.
pub fn normalize_der_signature(der: &[u8]) -> EngineResult<[u8; 64]> {
    let signature = Signature::from_der(der)
        .map_err(|e| EngineError::signer_invalid(format!("Malformed DER signature: {}", e)))?;

    // normalize_s returns the flipped signature only when s was high
    let signature = signature.normalize_s().unwrap_or(signature);

    let mut out = [0u8; 64];
    out.copy_from_slice(&signature.to_bytes());
    Ok(out)
}

/// Extract a 65-byte uncompressed public key (`0x04 || X || Y`) from an
/// attestation object or raw COSE key blob.
pub fn public_key_from_attestation(blob: &[u8]) -> EngineResult<[u8; 65]> {
    let prefix_pos = blob
        .windows(COSE_KEY_PREFIX.len())
        .position(|w| w == COSE_KEY_PREFIX)
        .ok_or_else(|| EngineError::invalid_input("missing COSE key prefix"))?;

    let x_start = prefix_pos + COSE_KEY_PREFIX.len();
    let x_end = x_start + 32;
    if blob.len() < x_end {
        return Err(EngineError::invalid_input("insufficient data"));
    }

    let marker_end = x_end + COSE_Y_MARKER.len();
    if blob.len() < marker_end || blob[x_end..marker_end] != COSE_Y_MARKER {
        return Err(EngineError::invalid_input("insufficient data"));
    }

    let y_end = marker_end + 32;
    if blob.len() < y_end {
        return Err(EngineError::invalid_input("insufficient data"));
    }

    let mut key = [0u8; 65];
    key[0] = 0x04;
    key[1..33].copy_from_slice(&blob[x_start..x_end]);
    key[33..65].copy_from_slice(&blob[marker_end..y_end]);
    Ok(key)
}

/// Extract the public key from a full WebAuthn authenticator-data record:
/// fixed 37-byte header, 16-byte algorithm-identifier block, 2-byte
/// big-endian credential-id length, credential id, embedded COSE key.
pub fn public_key_from_authenticator_data(data: &[u8]) -> EngineResult<[u8; 65]> {
    let fixed = AUTH_DATA_HEADER_LEN + AAGUID_LEN + 2;
    if data.len() < fixed {
        return Err(EngineError::invalid_input("insufficient data"));
    }

    let len_off = AUTH_DATA_HEADER_LEN + AAGUID_LEN;
    let cred_id_len = usize::from(u16::from_be_bytes([data[len_off], data[len_off + 1]]));

    let cose_start = fixed + cred_id_len;
    if data.len() < cose_start {
        return Err(EngineError::invalid_input("insufficient data"));
    }

    public_key_from_attestation(&data[cose_start..])
}
