//! Authorization payload builder
//!
//! Computes the exact byte sequence a signer commits to for one
//! invocation tree: a preimage of network id, envelope discriminator,
//! nonce, signature-expiration ledger, and the invocation tree, encoded
//! in fixed field order and hashed with SHA-256. Identical inputs always
//! yield identical bytes; the invocation tree is never reordered.

use super::entry::{AuthEntry, Credentials};
use super::InvocationNode;
use crate::crypto::sha256;
use crate::error::{EngineError, EngineResult};
use crate::xdr;

/// Envelope discriminator for Soroban authorization preimages
pub const ENVELOPE_TYPE_SOROBAN_AUTHORIZATION: u32 = 9;

/// Build the canonical preimage bytes for an authorization entry
pub fn build_payload_preimage(
    entry: &AuthEntry,
    expiration_ledger: u32,
    network_id: &[u8; 32],
) -> EngineResult<Vec<u8>> {
    let Credentials::Address(creds) = &entry.credentials else {
        return Err(EngineError::signing_failed(
            "Source-account credentials carry no signable payload",
        ));
    };

    build_preimage_parts(&entry.invocation, creds.nonce, expiration_ledger, network_id)
}

/// The 32-byte payload hash a signer must sign
pub fn build_payload_hash(
    entry: &AuthEntry,
    expiration_ledger: u32,
    network_id: &[u8; 32],
) -> EngineResult<[u8; 32]> {
    let preimage = build_payload_preimage(entry, expiration_ledger, network_id)?;
    Ok(sha256(&preimage))
}

fn build_preimage_parts(
    invocation: &InvocationNode,
    nonce: i64,
    expiration_ledger: u32,
    network_id: &[u8; 32],
) -> EngineResult<Vec<u8>> {
    let mut preimage = Vec::with_capacity(128);
    preimage.extend_from_slice(network_id);
    preimage.extend_from_slice(&ENVELOPE_TYPE_SOROBAN_AUTHORIZATION.to_be_bytes());
    preimage.extend_from_slice(&nonce.to_be_bytes());
    preimage.extend_from_slice(&expiration_ledger.to_be_bytes());
    xdr::encode_into(&invocation.to_value(), &mut preimage);
    Ok(preimage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::auth::entry::AddressCredentials;
    use crate::xdr::Value;

    fn sample_entry(nonce: i64) -> AuthEntry {
        AuthEntry {
            credentials: Credentials::Address(AddressCredentials {
                address: Address::Contract([7u8; 32]),
                nonce,
                signature_expiration_ledger: 0,
                signature: Value::Void,
            }),
            invocation: InvocationNode::new(
                Address::Contract([1u8; 32]),
                "transfer",
                vec![Value::I64(500)],
            ),
        }
    }

    #[test]
    fn test_payload_hash_deterministic() {
        let entry = sample_entry(42);
        let network_id = [3u8; 32];

        let a = build_payload_hash(&entry, 1000, &network_id).unwrap();
        let b = build_payload_hash(&entry, 1000, &network_id).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_payload_hash_binds_all_fields() {
        let entry = sample_entry(42);
        let network_id = [3u8; 32];
        let base = build_payload_hash(&entry, 1000, &network_id).unwrap();

        // Different nonce
        assert_ne!(base, build_payload_hash(&sample_entry(43), 1000, &network_id).unwrap());

        // Different expiration ledger
        assert_ne!(base, build_payload_hash(&entry, 1001, &network_id).unwrap());

        // Different network
        assert_ne!(base, build_payload_hash(&entry, 1000, &[4u8; 32]).unwrap());

        // Different invocation
        let mut other = sample_entry(42);
        other.invocation.args.push(Value::U32(1));
        assert_ne!(base, build_payload_hash(&other, 1000, &network_id).unwrap());
    }

    #[test]
    fn test_preimage_layout() {
        let entry = sample_entry(1);
        let network_id = [0xAB; 32];
        let preimage = build_payload_preimage(&entry, 7, &network_id).unwrap();

        assert_eq!(&preimage[..32], &network_id);
        assert_eq!(&preimage[32..36], &ENVELOPE_TYPE_SOROBAN_AUTHORIZATION.to_be_bytes());
        assert_eq!(&preimage[36..44], &1i64.to_be_bytes());
        assert_eq!(&preimage[44..48], &7u32.to_be_bytes());
    }

    #[test]
    fn test_source_account_credentials_rejected() {
        let entry = AuthEntry {
            credentials: Credentials::SourceAccount,
            invocation: InvocationNode::new(Address::Contract([1u8; 32]), "noop", vec![]),
        };
        let err = build_payload_hash(&entry, 10, &[0u8; 32]).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::TransactionSigningFailed);
    }
}
