//! Lenient `U256` decoding for snapshot blobs.
//!
//! Accepts decimal strings, `0x` hex strings and plain JSON integers that fit
//! in a `u64`.

use alloy_primitives::U256;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use std::fmt;
use std::str::FromStr;

struct U256Visitor;

impl<'de> Visitor<'de> for U256Visitor {
    type Value = U256;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an unsigned integer or a decimal / 0x string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<U256, E> {
        Ok(U256::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<U256, E> {
        u64::try_from(v)
            .map(U256::from)
            .map_err(|_| E::custom(format!("negative integer {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<U256, E> {
        parse(v).ok_or_else(|| E::custom(format!("invalid integer `{v}`")))
    }
}

/// Parses a decimal or `0x`-prefixed hex string.
pub(crate) fn parse(raw: &str) -> Option<U256> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        if hex.is_empty() {
            return None;
        }
        return U256::from_str_radix(hex, 16).ok();
    }
    U256::from_str(raw).ok()
}

pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(U256Visitor)
}

pub(crate) fn deserialize_vec<'de, D>(deserializer: D) -> Result<Vec<U256>, D::Error>
where
    D: Deserializer<'de>,
{
    struct VecVisitor;

    impl<'de> Visitor<'de> for VecVisitor {
        type Value = Vec<U256>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a list of integers")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<U256>, A::Error> {
            let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(2));
            while let Some(Wrapped(value)) = seq.next_element()? {
                out.push(value);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_seq(VecVisitor)
}

/// Newtype so a bare `U256` can go through the lenient visitor inside
/// containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Wrapped(pub U256);

impl<'de> serde::Deserialize<'de> for Wrapped {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize(deserializer).map(Wrapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(deserialize_with = "super::deserialize")]
        value: U256,
        #[serde(deserialize_with = "super::deserialize_vec")]
        list: Vec<U256>,
    }

    #[test]
    fn accepts_strings_hex_and_numbers() {
        let holder: Holder = serde_json::from_str(
            r#"{"value": "319754866834816685427", "list": ["0x10", 7, "42"]}"#,
        )
        .unwrap();

        assert_eq!(holder.value, U256::from(319_754_866_834_816_685_427u128));
        assert_eq!(holder.list, vec![U256::from(16u8), U256::from(7u8), U256::from(42u8)]);
    }

    #[test]
    fn rejects_negative_and_garbage() {
        assert!(serde_json::from_str::<Holder>(r#"{"value": -1, "list": []}"#).is_err());
        assert!(serde_json::from_str::<Holder>(r#"{"value": "12a", "list": []}"#).is_err());
        assert!(serde_json::from_str::<Holder>(r#"{"value": "", "list": []}"#).is_err());
    }

    #[test]
    fn parse_handles_both_radixes() {
        assert_eq!(parse("0xff"), Some(U256::from(255u16)));
        assert_eq!(parse(" 255 "), Some(U256::from(255u16)));
        assert_eq!(parse("0x"), None);
    }
}
