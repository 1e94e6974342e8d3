#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;
    use serde_json::Value;

    use crate::codec::{open, seal};
    use crate::pairing::parse_pairing_payload;
    use crate::session::{Session, SessionStore};

    fn json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[ -~]{0,24}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-zA-Z]{1,8}", inner, 0..6)
                    .prop_map(|m: BTreeMap<String, Value>| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn test_codec_round_trip(x in json_value(), token in "[ -~]{1,48}") {
            let sealed = seal(&x, &token).unwrap();
            let back: Value = open(&sealed, &token).unwrap();
            prop_assert_eq!(back, x);
        }

        #[test]
        fn test_codec_wrong_token(x in json_value(), t1 in "[a-f0-9-]{1,36}", t2 in "[a-f0-9-]{1,36}") {
            prop_assume!(t1 != t2);
            let sealed = seal(&x, &t1).unwrap();
            match open::<Value>(&sealed, &t2) {
                Err(e) => prop_assert!(e.is_protocol_error()),
                Ok(v) => prop_assert_ne!(v, x),
            }
        }

        #[test]
        fn test_pairing_parse_trims_token(
            host in "[a-z]{1,12}",
            port in 1u16..,
            token in "[A-Za-z0-9-]{1,36}",
            pad_l in " {0,3}",
            pad_r in " {0,3}",
        ) {
            let raw = format!("http://{host}:{port}?token={pad_l}{token}{pad_r}");
            let s = parse_pairing_payload(&raw).unwrap();
            prop_assert_eq!(s.token(), token.as_str());
            prop_assert_eq!(s.url(), format!("http://{host}:{port}"));
        }

        #[test]
        fn test_pairing_string_parses_back(
            host in "[a-z]{1,12}",
            port in 1u16..,
            token in "[!-~]{1,36}",
        ) {
            let s = Session::new(format!("http://{host}:{port}"), &token).unwrap();
            let back = parse_pairing_payload(&s.pairing_string()).unwrap();
            prop_assert_eq!(back, s);
        }

        #[test]
        fn test_override_never_changes_session(toggles in 0usize..8, token in "[a-z0-9]{1,16}") {
            let store = SessionStore::with_session(Session::new("http://h:9090", &token).unwrap());
            let before = store.snapshot();
            for _ in 0..toggles {
                store.toggle_override();
            }
            prop_assert_eq!(store.get(), before.session);
            prop_assert_eq!(store.generation(), before.generation);
            prop_assert_eq!(store.get_override(), toggles % 2 == 1);
        }
    }
}
