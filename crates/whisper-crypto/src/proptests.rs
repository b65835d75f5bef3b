#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;
    use proptest::prelude::*;

    use crate::keys::{derive, derive_public};
    use crate::sealed_box::{open, seal, NONCE_LEN, TAG_LEN};

    proptest! {
        // Conversion determinism
        #[test]
        fn test_derive_determinism(seed in any::<[u8; 32]>()) {
            let a = derive(&SigningKey::from_bytes(&seed)).unwrap();
            let b = derive(&SigningKey::from_bytes(&seed)).unwrap();
            prop_assert_eq!(a.public(), b.public());
            prop_assert_eq!(a.secret().to_bytes(), b.secret().to_bytes());
        }

        // Public-only conversion agrees with the full keypair
        #[test]
        fn test_derive_public_agrees(seed in any::<[u8; 32]>()) {
            let signing = SigningKey::from_bytes(&seed);
            let keypair = derive(&signing).unwrap();
            let public = derive_public(&signing.verifying_key().to_bytes()).unwrap();
            prop_assert_eq!(&public, keypair.public());
        }

        // Seal/open round-trip
        #[test]
        fn test_seal_open_round_trip(
            sender_seed in any::<[u8; 32]>(),
            recipient_seed in any::<[u8; 32]>(),
            nonce in any::<[u8; NONCE_LEN]>(),
            plaintext in proptest::collection::vec(any::<u8>(), 0..512)
        ) {
            let sender = derive(&SigningKey::from_bytes(&sender_seed)).unwrap();
            let recipient = derive(&SigningKey::from_bytes(&recipient_seed)).unwrap();

            let ct = seal(&plaintext, &nonce, recipient.public(), sender.secret()).unwrap();
            prop_assert_eq!(ct.len(), plaintext.len() + TAG_LEN);

            let pt = open(&ct, &nonce, sender.public(), recipient.secret()).unwrap();
            prop_assert_eq!(pt, plaintext);
        }

        // Tamper detection: any single bit flip fails authentication
        #[test]
        fn test_bit_flip_detected(
            sender_seed in any::<[u8; 32]>(),
            recipient_seed in any::<[u8; 32]>(),
            nonce in any::<[u8; NONCE_LEN]>(),
            plaintext in proptest::collection::vec(any::<u8>(), 1..256),
            position in any::<prop::sample::Index>(),
            bit in 0u8..8
        ) {
            let sender = derive(&SigningKey::from_bytes(&sender_seed)).unwrap();
            let recipient = derive(&SigningKey::from_bytes(&recipient_seed)).unwrap();

            let mut ct = seal(&plaintext, &nonce, recipient.public(), sender.secret()).unwrap();
            let i = position.index(ct.len());
            ct[i] ^= 1 << bit;

            prop_assert!(open(&ct, &nonce, sender.public(), recipient.secret()).is_err());
        }
    }
}
