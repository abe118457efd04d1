//! Strkey address codec
//!
//! Account (G...) and contract (C...) addresses are base32-encoded
//! payloads of version byte + 32-byte key + CRC16-XModem checksum.

use crate::error::{EngineError, EngineResult};
use data_encoding::BASE32;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version byte for account public keys (G prefix)
const VERSION_ACCOUNT: u8 = 6 << 3;
/// Version byte for contract addresses (C prefix)
const VERSION_CONTRACT: u8 = 2 << 3;

/// An on-chain principal: an account keyed by an Ed25519 public key, or a
/// deployed contract identified by its 32-byte id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Address {
    Account([u8; 32]),
    Contract([u8; 32]),
}

impl Address {
    /// Parse a strkey string (G... or C...)
    pub fn from_strkey(s: &str) -> EngineResult<Self> {
        let decoded = BASE32
            .decode(s.as_bytes())
            .map_err(|e| EngineError::invalid_address(format!("Base32 decode failed: {}", e)))?;

        // 1 version byte + 32 payload bytes + 2 checksum bytes
        if decoded.len() != 35 {
            return Err(EngineError::invalid_address(format!(
                "Expected 35 decoded bytes, got {}",
                decoded.len()
            )));
        }

        let (payload, checksum) = decoded.split_at(33);
        let expected = crc16_xmodem(payload);
        let actual = u16::from(checksum[0]) | (u16::from(checksum[1]) << 8);
        if expected != actual {
            return Err(EngineError::invalid_address("Checksum mismatch"));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&payload[1..33]);

        match payload[0] {
            VERSION_ACCOUNT => Ok(Address::Account(key)),
            VERSION_CONTRACT => Ok(Address::Contract(key)),
            other => Err(EngineError::invalid_address(format!(
                "Unknown version byte: {:#04x}",
                other
            ))),
        }
    }

    /// Encode back to the strkey form
    pub fn to_strkey(&self) -> String {
        let (version, key) = match self {
            Address::Account(key) => (VERSION_ACCOUNT, key),
            Address::Contract(key) => (VERSION_CONTRACT, key),
        };

        let mut payload = vec![version];
        payload.extend_from_slice(key);

        let checksum = crc16_xmodem(&payload);
        payload.push((checksum & 0xFF) as u8);
        payload.push((checksum >> 8) as u8);

        BASE32.encode(&payload)
    }

    /// The raw 32-byte key (account public key or contract id)
    pub fn key_bytes(&self) -> &[u8; 32] {
        match self {
            Address::Account(key) | Address::Contract(key) => key,
        }
    }

    pub fn is_contract(&self) -> bool {
        matches!(self, Address::Contract(_))
    }

    pub fn is_account(&self) -> bool {
        matches!(self, Address::Account(_))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_strkey())
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_strkey())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_strkey(&s).map_err(serde::de::Error::custom)
    }
}

/// CRC16-XModem checksum
fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_roundtrip() {
        let addr = Address::Account([7u8; 32]);
        let encoded = addr.to_strkey();
        assert!(encoded.starts_with('G'), "account strkey should start with G");

        let decoded = Address::from_strkey(&encoded).unwrap();
        assert_eq!(decoded, addr);
    }

    #[test]
    fn test_contract_roundtrip() {
        let addr = Address::Contract([0xAB; 32]);
        let encoded = addr.to_strkey();
        assert!(encoded.starts_with('C'), "contract strkey should start with C");

        let decoded = Address::from_strkey(&encoded).unwrap();
        assert_eq!(decoded, addr);
        assert!(decoded.is_contract());
    }

    #[test]
    fn test_corrupted_checksum_rejected() {
        let encoded = Address::Account([1u8; 32]).to_strkey();
        // Flip a character in the payload region
        let mut chars: Vec<char> = encoded.chars().collect();
        chars[10] = if chars[10] == 'A' { 'B' } else { 'A' };
        let corrupted: String = chars.into_iter().collect();

        assert!(Address::from_strkey(&corrupted).is_err());
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(Address::from_strkey("GAAA").is_err());
    }
}
