//! Multi-signer directory
//!
//! Extracts the set of signers declared by on-chain authorization rules,
//! answering "who else must sign". Rule records are advisory data that
//! may contain future rule kinds, so malformed or unknown entries are
//! skipped, never fatal.

use crate::address::Address;
use crate::xdr::Value;

/// Uncompressed key length; anything longer carries a credential id tail
const BARE_KEY_LEN: usize = 65;

/// One signer declared by on-chain rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerDescriptor {
    Delegated {
        address: Address,
    },
    External {
        key_bytes: Vec<u8>,
        credential_id: Option<Vec<u8>>,
    },
}

/// Walk a list of authorization-rule records and collect the declared
/// signers, deduplicated by full descriptor equality across rules.
/// Output order is first-seen order.
///
/// Each rule is expected to be a map exposing a "signers" sequence;
/// rules or signer entries that do not match any known shape are skipped.
pub fn parse_signers(rules: &[Value]) -> Vec<SignerDescriptor> {
    let mut descriptors: Vec<SignerDescriptor> = Vec::new();

    for rule in rules {
        let Some(signers) = rule_signers(rule) else {
            continue;
        };

        for signer in signers {
            let Some(descriptor) = parse_signer_value(signer) else {
                continue;
            };
            if !descriptors.contains(&descriptor) {
                descriptors.push(descriptor);
            }
        }
    }

    descriptors
}

/// The "signers" sequence of one rule record, if the rule has the
/// expected shape
fn rule_signers(rule: &Value) -> Option<&[Value]> {
    let Value::Map(entries) = rule else {
        return None;
    };
    entries
        .iter()
        .find(|(key, _)| key.as_symbol() == Some("signers"))
        .and_then(|(_, value)| value.as_vec())
}

fn parse_signer_value(signer: &Value) -> Option<SignerDescriptor> {
    let parts = signer.as_vec()?;
    let tag = parts.first()?.as_symbol()?;

    match tag {
        "Delegated" => {
            let address = parts.get(1)?.as_address()?.clone();
            Some(SignerDescriptor::Delegated { address })
        }
        "External" => {
            let key_bytes = parts.get(2)?.as_bytes()?.to_vec();
            let credential_id = if key_bytes.len() > BARE_KEY_LEN {
                Some(key_bytes[BARE_KEY_LEN..].to_vec())
            } else {
                None
            };
            Some(SignerDescriptor::External {
                key_bytes,
                credential_id,
            })
        }
        // Future rule kinds parse defensively: skip, don't fail
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Signer;

    fn rule(signers: Vec<Value>) -> Value {
        Value::Map(vec![
            (Value::symbol("threshold"), Value::U32(1)),
            (Value::symbol("signers"), Value::Vec(signers)),
        ])
    }

    fn external_value(fill: u8, credential_id: &[u8]) -> Value {
        let mut key = vec![0x04];
        key.extend_from_slice(&[fill; 64]);
        let signer = Signer::webauthn_with_credential(
            Address::Contract([0x55; 32]),
            &key,
            credential_id,
        )
        .unwrap();
        signer.to_canonical_value()
    }

    fn delegated_value(fill: u8) -> Value {
        Signer::Delegated(Address::Account([fill; 32])).to_canonical_value()
    }

    #[test]
    fn test_parse_both_kinds() {
        let rules = vec![rule(vec![delegated_value(1), external_value(2, &[])])];
        let parsed = parse_signers(&rules);

        assert_eq!(parsed.len(), 2);
        assert!(matches!(parsed[0], SignerDescriptor::Delegated { .. }));
        assert!(matches!(
            parsed[1],
            SignerDescriptor::External { credential_id: None, .. }
        ));
    }

    #[test]
    fn test_credential_id_split_from_key_bytes() {
        let rules = vec![rule(vec![external_value(7, &[0x42; 16])])];
        let parsed = parse_signers(&rules);

        let SignerDescriptor::External { key_bytes, credential_id } = &parsed[0] else {
            panic!("expected external descriptor");
        };
        assert_eq!(key_bytes.len(), 81);
        assert_eq!(credential_id.as_deref(), Some(&[0x42; 16][..]));
    }

    #[test]
    fn test_dedup_across_rules_first_seen_order() {
        let shared = external_value(3, &[]);
        let rules = vec![
            rule(vec![shared.clone(), delegated_value(9)]),
            rule(vec![shared, delegated_value(8)]),
        ];
        let parsed = parse_signers(&rules);

        assert_eq!(parsed.len(), 3);
        assert!(matches!(parsed[0], SignerDescriptor::External { .. }));
        assert_eq!(
            parsed[1],
            SignerDescriptor::Delegated { address: Address::Account([9u8; 32]) }
        );
        assert_eq!(
            parsed[2],
            SignerDescriptor::Delegated { address: Address::Account([8u8; 32]) }
        );
    }

    #[test]
    fn test_unknown_and_malformed_entries_skipped() {
        let rules = vec![rule(vec![
            // Unknown tag
            Value::Vec(vec![Value::symbol("Quantum"), Value::U32(1)]),
            // Not a sequence
            Value::U32(7),
            // Delegated without an address
            Value::Vec(vec![Value::symbol("Delegated")]),
            // External without key bytes
            Value::Vec(vec![
                Value::symbol("External"),
                Value::Address(Address::Contract([1u8; 32])),
            ]),
            delegated_value(5),
        ])];

        let parsed = parse_signers(&rules);
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_non_map_rules_skipped() {
        let rules = vec![Value::U32(0), Value::Vec(vec![]), rule(vec![delegated_value(1)])];
        assert_eq!(parse_signers(&rules).len(), 1);
    }
}
