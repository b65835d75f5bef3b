#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::envelope::{self, DecodeError, Envelope, PREFIX_LEN};
    use crate::transaction::{build_message, encode_shortvec};
    use crate::types::{Address, TxSignature};

    proptest! {
        // Codec round-trip
        #[test]
        fn test_envelope_round_trip(
            recipient in any::<[u8; 32]>(),
            nonce in any::<[u8; 24]>(),
            ciphertext in proptest::collection::vec(any::<u8>(), 0..1024)
        ) {
            let env = Envelope::new(recipient, nonce, ciphertext);
            let encoded = env.encode();
            prop_assert!(encoded.len() >= PREFIX_LEN);
            prop_assert_eq!(envelope::decode(&encoded).unwrap(), env);
        }

        // Decoding arbitrary bytes either succeeds or reports a typed error
        #[test]
        fn test_decode_arbitrary_bytes(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            match envelope::decode(&data) {
                Ok(env) => prop_assert_eq!(env.encode(), data),
                Err(DecodeError::Truncated { len }) => prop_assert!(len < PREFIX_LEN),
                Err(_) => prop_assert!(data.len() >= PREFIX_LEN),
            }
        }

        // Encoded length is predictable from the plaintext length
        #[test]
        fn test_encoded_len_matches(plaintext_len in 0usize..2048) {
            let env = Envelope::new([0u8; 32], [0u8; 24], vec![0u8; plaintext_len + 16]);
            prop_assert_eq!(env.encode().len(), envelope::encoded_len_for_plaintext(plaintext_len));
        }

        // Shortvec length grows by one byte per seven bits
        #[test]
        fn test_shortvec_length(value in any::<u16>()) {
            let mut out = Vec::new();
            encode_shortvec(&mut out, value);
            let expected = match value {
                0..=0x7f => 1,
                0x80..=0x3fff => 2,
                _ => 3,
            };
            prop_assert_eq!(out.len(), expected);
            prop_assert_eq!(out.last().map(|b| b & 0x80), Some(0));
        }

        // Message layout is fixed apart from the data
        #[test]
        fn test_message_len(data in proptest::collection::vec(any::<u8>(), 0..1062)) {
            let msg = build_message(&Address::new([1u8; 32]), &Address::new([2u8; 32]), &[3u8; 32], &data);
            let len_prefix = if data.len() < 0x80 { 1 } else { 2 };
            prop_assert_eq!(msg.len(), 3 + 1 + 64 + 32 + 1 + 1 + 1 + len_prefix + data.len());
            prop_assert_eq!(&msg[msg.len() - data.len()..], data.as_slice());
        }

        // Addresses survive base58 formatting
        #[test]
        fn test_address_text_round_trip(bytes in any::<[u8; 32]>()) {
            let addr = Address::new(bytes);
            prop_assert_eq!(addr.to_string().parse::<Address>().unwrap(), addr);
        }

        #[test]
        fn test_signature_from_bytes_is_base58(bytes in proptest::collection::vec(any::<u8>(), 64)) {
            let arr: [u8; 64] = bytes.as_slice().try_into().unwrap();
            let sig = TxSignature::from_bytes(&arr);
            prop_assert_eq!(bs58::decode(sig.as_str()).into_vec().unwrap(), bytes);
        }
    }
}
