use lumenkit::auth::{sign_auth_entry, AuthEntry, Credentials, InvocationNode, SignatureValue, Signer};
use lumenkit::crypto::normalize_der_signature;
use lumenkit::xdr::{self, Value};
use lumenkit::Address;
use p256::ecdsa::Signature;
use proptest::prelude::*;

fn any_address() -> impl Strategy<Value = Address> {
    prop::array::uniform32(any::<u8>()).prop_flat_map(|bytes| {
        prop_oneof![
            Just(Address::Account(bytes)),
            Just(Address::Contract(bytes)),
        ]
    })
}

fn any_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Void),
        any::<bool>().prop_map(Value::Bool),
        any::<u32>().prop_map(Value::U32),
        any::<u64>().prop_map(Value::U64),
        any::<i64>().prop_map(Value::I64),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(Value::Bytes),
        "[a-zA-Z0-9_]{0,24}".prop_map(Value::Symbol),
        ".{0,24}".prop_map(Value::Str),
        any_address().prop_map(Value::Address),
    ];
    leaf.prop_recursive(4, 32, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Vec),
            prop::collection::vec((inner.clone(), inner), 0..4).prop_map(Value::Map),
        ]
    })
}

fn any_der_signature() -> impl Strategy<Value = Vec<u8>> {
    (prop::array::uniform32(any::<u8>()), prop::array::uniform32(any::<u8>()))
        .prop_filter_map("valid scalar pair", |(r, s)| {
            Signature::from_scalars(r, s).ok().map(|sig| sig.to_der().as_bytes().to_vec())
        })
}

fn webauthn_signer(fill: [u8; 64]) -> Signer {
    let mut key = vec![0x04];
    key.extend_from_slice(&fill);
    Signer::webauthn(Address::Contract([0x55; 32]), key).expect("well-formed key")
}

fn signature_map(entry: &AuthEntry) -> Vec<(Value, Value)> {
    let Credentials::Address(creds) = &entry.credentials else {
        panic!("expected address credentials");
    };
    let Value::Map(entries) = &creds.signature else {
        panic!("expected signature map");
    };
    entries.clone()
}

proptest! {
    #[test]
    fn strkeys_roundtrip(address in any_address()) {
        let encoded = address.to_strkey();
        prop_assert!(encoded.starts_with('G') || encoded.starts_with('C'));
        prop_assert_eq!(encoded.len(), 56);

        let decoded = Address::from_strkey(&encoded).expect("decode own encoding");
        prop_assert_eq!(decoded, address);
    }

    #[test]
    fn corrupted_strkeys_rejected(address in any_address(), position in 1usize..56) {
        let mut encoded = address.to_strkey().into_bytes();
        // Flip to a different base32 alphabet character so the checksum
        // is the only line of defense
        encoded[position] = if encoded[position] == b'A' { b'B' } else { b'A' };
        let corrupted = String::from_utf8(encoded).unwrap();

        if corrupted != address.to_strkey() {
            prop_assert!(Address::from_strkey(&corrupted).is_err());
        }
    }

    #[test]
    fn values_roundtrip_through_codec(value in any_value()) {
        let encoded = xdr::encode(&value);
        prop_assert_eq!(encoded.len() % 4, 0, "encoding is 4-byte aligned");
        let decoded = xdr::decode(&encoded).expect("decode own encoding");
        prop_assert_eq!(decoded, value);
    }

    #[test]
    fn encoding_is_deterministic(value in any_value()) {
        prop_assert_eq!(xdr::encode(&value), xdr::encode(&value.clone()));
    }

    #[test]
    fn normalization_is_low_s_and_idempotent(der in any_der_signature()) {
        let normalized = normalize_der_signature(&der).expect("valid DER input");

        // Re-encoding the normalized form and normalizing again is a
        // fixed point
        let sig = Signature::from_slice(&normalized).expect("compact form parses");
        let renormalized = normalize_der_signature(sig.to_der().as_bytes()).unwrap();
        prop_assert_eq!(renormalized, normalized);
    }

    #[test]
    fn signature_map_order_ignores_call_order(a in any::<[u8; 64]>(), b in any::<[u8; 64]>()) {
        prop_assume!(a != b);

        let entry = AuthEntry::for_address(
            Address::Contract([7u8; 32]),
            1,
            InvocationNode::new(Address::Contract([1u8; 32]), "transfer", vec![Value::I64(5)]),
        );
        let signer_a = webauthn_signer(a);
        let signer_b = webauthn_signer(b);
        let record_a = SignatureValue::Bearer(Value::Bytes(a.to_vec()));
        let record_b = SignatureValue::Bearer(Value::Bytes(b.to_vec()));

        let ab = sign_auth_entry(
            &sign_auth_entry(&entry, &signer_a, record_a.clone(), 100).unwrap(),
            &signer_b,
            record_b.clone(),
            100,
        )
        .unwrap();
        let ba = sign_auth_entry(
            &sign_auth_entry(&entry, &signer_b, record_b, 100).unwrap(),
            &signer_a,
            record_a,
            100,
        )
        .unwrap();

        prop_assert_eq!(signature_map(&ab), signature_map(&ba));

        let keys: Vec<Vec<u8>> = signature_map(&ab).iter().map(|(k, _)| xdr::encode(k)).collect();
        prop_assert!(keys.windows(2).all(|w| w[0] < w[1]), "keys ascend by encoded bytes");
    }
}
