#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::envelope::{open, seal, seal_with_material, seal_with_suite, CipherSuite, SealMaterial};

    fn any_suite() -> impl Strategy<Value = CipherSuite> {
        prop_oneof![
            Just(CipherSuite::OpenSslAes256Cbc),
            Just(CipherSuite::HkdfSha256ChaCha20Poly1305),
        ]
    }

    proptest! {
        #[test]
        fn test_envelope_round_trip(
            suite in any_suite(),
            payload in any::<Vec<u8>>(),
            passphrase in "[ -~]{1,64}",
        ) {
            let sealed = seal_with_suite(suite, &payload, &passphrase).unwrap();
            let opened = open(&sealed, &passphrase).unwrap();
            prop_assert_eq!(opened, payload);
        }

        #[test]
        fn test_wrong_passphrase_never_yields_plaintext(
            payload in any::<Vec<u8>>(),
            p1 in "[a-z0-9-]{1,40}",
            p2 in "[a-z0-9-]{1,40}",
        ) {
            prop_assume!(p1 != p2);
            let sealed = seal(&payload, &p1).unwrap();
            // CBC has no tag; a lucky padding byte can still decode to noise
            if let Ok(opened) = open(&sealed, &p2) {
                prop_assert_ne!(opened, payload);
            }
        }

        #[test]
        fn test_aead_wrong_passphrase_never_opens(
            payload in any::<Vec<u8>>(),
            p1 in "[a-z0-9-]{1,40}",
            p2 in "[a-z0-9-]{1,40}",
        ) {
            prop_assume!(p1 != p2);
            let sealed = seal_with_suite(CipherSuite::HkdfSha256ChaCha20Poly1305, &payload, &p1).unwrap();
            prop_assert!(open(&sealed, &p2).is_err());
        }

        #[test]
        fn test_aead_bit_flip_detected(
            payload in proptest::collection::vec(any::<u8>(), 1..256),
            salt in any::<[u8; 16]>(),
            nonce in any::<[u8; 12]>(),
            flip in any::<prop::sample::Index>(),
        ) {
            use base64::{engine::general_purpose::STANDARD, Engine as _};

            let material = SealMaterial { salt, nonce };
            let sealed = seal_with_material(
                CipherSuite::HkdfSha256ChaCha20Poly1305,
                &payload,
                "tok",
                &material,
            )
            .unwrap();
            let mut raw = STANDARD.decode(sealed).unwrap();
            let i = flip.index(raw.len());
            raw[i] ^= 0x80;
            prop_assert!(open(&STANDARD.encode(raw), "tok").is_err());
        }
    }
}
