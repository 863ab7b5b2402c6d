//! Canonical JSON encoding used for every on-disk and on-wire hash.
//!
//! `serde_json`'s default `Map` is backed by a `BTreeMap`, so keys are
//! already emitted in sorted order; combined with `to_vec` (compact, no
//! insignificant whitespace) this gives us the consensus-critical canonical
//! form described in `spec.md` §9 for free, as long as no caller enables the
//! `preserve_order` feature on `serde_json` anywhere in the dependency tree.

use serde::Serialize;

/// Serialize `value` to its canonical byte representation.
///
/// # Panics
///
/// Panics if `value`'s `Serialize` implementation is faulty enough to
/// produce non-UTF8 output, which `serde_json` never does for well-formed
/// types; callers may treat this as infallible.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("canonical encoding of a well-formed entity cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_keys_are_sorted() {
        let value = json!({"z": 1, "a": 2, "m": 3});
        let bytes = to_canonical_bytes(&value);
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn has_no_insignificant_whitespace() {
        let value = json!({"a": [1, 2, 3]});
        let bytes = to_canonical_bytes(&value);
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"a":[1,2,3]}"#);
    }
}
