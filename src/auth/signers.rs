//! Signer model
//!
//! The three authorization principal kinds and their canonical value-tree
//! encodings. The canonical encoding doubles as the multi-signer sort key:
//! signature maps order ascending by the binary encoding of each signer's
//! signature key, compared as raw bytes. That ordering is an
//! interoperability contract with the on-chain verifier, not a local
//! choice.

use crate::address::Address;
use crate::crypto::sha256;
use crate::error::{EngineError, EngineResult};
use crate::xdr::{self, Value};

/// Envelope discriminator for contract-id preimages
const ENVELOPE_TYPE_CONTRACT_ID: u32 = 1;

/// Uncompressed SEC1 point length for P-256 keys
const WEBAUTHN_KEY_LEN: usize = 65;
/// Raw Ed25519 public key length
const ED25519_KEY_LEN: usize = 32;

/// An authorization principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signer {
    /// Satisfied by another account/contract's own authorization; no
    /// local signature
    Delegated(Address),
    /// A signature-producing principal validated by a dedicated on-chain
    /// verifier contract
    External(ExternalSigner),
    /// A contextual rule evaluated without a bearer signature
    Policy,
}

/// Key material for an external signer. `key_material` holds the public
/// key, optionally concatenated with an opaque credential id whose
/// presence is inferred from length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalSigner {
    pub verifier: Address,
    pub key_material: Vec<u8>,
}

impl ExternalSigner {
    /// The bare public key (65-byte uncompressed point or 32-byte Ed25519)
    pub fn public_key(&self) -> &[u8] {
        if self.key_material.len() > WEBAUTHN_KEY_LEN {
            &self.key_material[..WEBAUTHN_KEY_LEN]
        } else {
            &self.key_material
        }
    }

    /// Credential id tail, present when key material exceeds 65 bytes
    pub fn credential_id(&self) -> Option<&[u8]> {
        if self.key_material.len() > WEBAUTHN_KEY_LEN {
            Some(&self.key_material[WEBAUTHN_KEY_LEN..])
        } else {
            None
        }
    }
}

impl Signer {
    /// WebAuthn-style external signer: key material is exactly 65 bytes
    /// starting `0x04`, or 65+N bytes where the tail is the credential id.
    pub fn webauthn(verifier: Address, key_material: impl Into<Vec<u8>>) -> EngineResult<Self> {
        let key_material = key_material.into();
        if key_material.len() < WEBAUTHN_KEY_LEN {
            return Err(EngineError::invalid_input(format!(
                "WebAuthn key material must be at least {} bytes, got {}",
                WEBAUTHN_KEY_LEN,
                key_material.len()
            )));
        }
        if key_material[0] != 0x04 {
            return Err(EngineError::invalid_input(format!(
                "WebAuthn public key must start with 0x04, got {:#04x}",
                key_material[0]
            )));
        }
        Ok(Signer::External(ExternalSigner {
            verifier,
            key_material,
        }))
    }

    /// WebAuthn signer from separate public key and credential id
    pub fn webauthn_with_credential(
        verifier: Address,
        public_key: &[u8],
        credential_id: &[u8],
    ) -> EngineResult<Self> {
        if public_key.len() != WEBAUTHN_KEY_LEN {
            return Err(EngineError::invalid_input(format!(
                "WebAuthn public key must be exactly {} bytes, got {}",
                WEBAUTHN_KEY_LEN,
                public_key.len()
            )));
        }
        let mut key_material = public_key.to_vec();
        key_material.extend_from_slice(credential_id);
        Self::webauthn(verifier, key_material)
    }

    /// Ed25519-style external signer: key is exactly 32 bytes
    pub fn ed25519(verifier: Address, public_key: impl Into<Vec<u8>>) -> EngineResult<Self> {
        let public_key = public_key.into();
        if public_key.len() != ED25519_KEY_LEN {
            return Err(EngineError::invalid_input(format!(
                "Ed25519 public key must be exactly {} bytes, got {}",
                ED25519_KEY_LEN,
                public_key.len()
            )));
        }
        Ok(Signer::External(ExternalSigner {
            verifier,
            key_material: public_key,
        }))
    }

    /// Canonical value-tree encoding of this signer
    pub fn to_canonical_value(&self) -> Value {
        match self {
            Signer::Delegated(address) => Value::Vec(vec![
                Value::symbol("Delegated"),
                Value::Address(address.clone()),
            ]),
            Signer::External(ext) => Value::Vec(vec![
                Value::symbol("External"),
                Value::Address(ext.verifier.clone()),
                Value::Bytes(ext.key_material.clone()),
            ]),
            Signer::Policy => Value::Vec(vec![Value::symbol("Default")]),
        }
    }

    /// The signature-key value used both in the credential signature map
    /// and as the multi-signer ordering key. For external signers this is
    /// the key material itself.
    pub fn signature_key(&self) -> Value {
        match self {
            Signer::Delegated(address) => Value::Address(address.clone()),
            Signer::External(ext) => Value::Bytes(ext.key_material.clone()),
            Signer::Policy => Value::Vec(vec![Value::symbol("Default")]),
        }
    }

    /// Binary sort key: the encoded signature key, compared as raw bytes
    pub fn sort_key(&self) -> Vec<u8> {
        xdr::encode(&self.signature_key())
    }
}

/// Derive the contract address bound to a credential before deployment:
/// SHA-256 over (contract-id discriminator, network id, deployer address,
/// salt = SHA-256 of the credential id).
pub fn derive_credential_contract_address(
    network_id: &[u8; 32],
    deployer: &Address,
    credential_id: &[u8],
) -> Address {
    let salt = sha256(credential_id);

    let mut preimage = Vec::with_capacity(128);
    preimage.extend_from_slice(&ENVELOPE_TYPE_CONTRACT_ID.to_be_bytes());
    preimage.extend_from_slice(network_id);
    xdr::encode_into(&Value::Address(deployer.clone()), &mut preimage);
    preimage.extend_from_slice(&salt);

    Address::Contract(sha256(&preimage))
}
