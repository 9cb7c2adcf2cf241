//! Typed attribute values and items.
//!
//! The JSON wire format uses single-key objects like `{"S": "hello"}` and
//! base64 for binary payloads.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use base64::Engine;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::number::Number;
use super::schema::ScalarType;

/// An item: attribute name to typed value. Names are case-sensitive.
pub type Item = HashMap<String, AttributeValue>;

/// Largest item the service accepts, in bytes.
pub const MAX_ITEM_SIZE_BYTES: usize = 400 * 1024;

/// A typed attribute value. Numbers stay string-encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    S(String),
    N(String),
    B(Vec<u8>),
    Bool(bool),
    Null(bool),
    L(Vec<AttributeValue>),
    M(HashMap<String, AttributeValue>),
    Ss(Vec<String>),
    Ns(Vec<String>),
    Bs(Vec<Vec<u8>>),
}

impl AttributeValue {
    /// Shorthand for a string value.
    pub fn string(value: impl Into<String>) -> Self {
        Self::S(value.into())
    }

    /// Shorthand for a number value.
    pub fn number(value: impl fmt::Display) -> Self {
        Self::N(value.to_string())
    }

    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the wire tag for this value (e.g. "S", "N", "BOOL").
    pub fn type_descriptor(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::B(_) => "B",
            Self::Bool(_) => "BOOL",
            Self::Null(_) => "NULL",
            Self::L(_) => "L",
            Self::M(_) => "M",
            Self::Ss(_) => "SS",
            Self::Ns(_) => "NS",
            Self::Bs(_) => "BS",
        }
    }

    /// Scalar type of the value, if it may be used as a key.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            Self::S(_) => Some(ScalarType::String),
            Self::N(_) => Some(ScalarType::Number),
            Self::B(_) => Some(ScalarType::Binary),
            _ => None,
        }
    }

    /// Converts a scalar into an orderable key. Returns `None` for
    /// non-scalars and numbers that are not finite decimal literals.
    pub fn scalar_key(&self) -> Option<ScalarKey> {
        match self {
            Self::S(s) => Some(ScalarKey::String(s.clone())),
            Self::N(n) => Number::parse(n).map(ScalarKey::Number),
            Self::B(b) => Some(ScalarKey::Binary(b.clone())),
            _ => None,
        }
    }

    /// Approximate stored size of the value in bytes, following the
    /// service's sizing rules.
    pub fn size(&self) -> usize {
        match self {
            Self::S(s) => s.len(),
            Self::N(n) => number_size(n),
            Self::B(b) => b.len(),
            Self::Bool(_) | Self::Null(_) => 1,
            Self::L(values) => 3 + values.iter().map(|v| 1 + v.size()).sum::<usize>(),
            Self::M(map) => {
                3 + map
                    .iter()
                    .map(|(k, v)| 1 + k.len() + v.size())
                    .sum::<usize>()
            }
            Self::Ss(values) => values.iter().map(String::len).sum(),
            Self::Ns(values) => values.iter().map(|n| number_size(n)).sum(),
            Self::Bs(values) => values.iter().map(Vec::len).sum(),
        }
    }
}

fn number_size(n: &str) -> usize {
    let significant = n
        .trim_start_matches(['-', '+'])
        .split(['e', 'E'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .skip_while(|c| *c == '0')
        .count()
        .max(1);
    significant.div_ceil(2) + 1
}

/// Total stored size of an item: attribute names plus values.
pub fn item_size(item: &Item) -> usize {
    item.iter().map(|(name, value)| name.len() + value.size()).sum()
}

/// Compares two values of the same scalar type. Mixed types and
/// non-scalars are incomparable.
pub fn compare_values(left: &AttributeValue, right: &AttributeValue) -> Option<Ordering> {
    match (left.scalar_key()?, right.scalar_key()?) {
        (ScalarKey::String(a), ScalarKey::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
        (ScalarKey::Number(a), ScalarKey::Number(b)) => Some(a.cmp(&b)),
        (ScalarKey::Binary(a), ScalarKey::Binary(b)) => Some(a.cmp(&b)),
        _ => None,
    }
}

/// An orderable key value: strings and binaries by bytes, numbers by
/// exact decimal value.
#[derive(Debug, Clone)]
pub enum ScalarKey {
    String(String),
    Number(Number),
    Binary(Vec<u8>),
}

impl ScalarKey {
    fn rank(&self) -> u8 {
        match self {
            Self::String(_) => 0,
            Self::Number(_) => 1,
            Self::Binary(_) => 2,
        }
    }
}

impl Ord for ScalarKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Self::Number(a), Self::Number(b)) => a.cmp(b),
            (Self::Binary(a), Self::Binary(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for ScalarKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScalarKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScalarKey {}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S(s) => write!(f, "{s}"),
            Self::N(n) => write!(f, "{n}"),
            Self::B(b) => write!(f, "<{} bytes>", b.len()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null(_) => write!(f, "null"),
            Self::L(v) => write!(f, "[{} items]", v.len()),
            Self::M(m) => write!(f, "{{{} keys}}", m.len()),
            Self::Ss(v) => write!(f, "{v:?}"),
            Self::Ns(v) => write!(f, "{v:?}"),
            Self::Bs(v) => write!(f, "<{} binaries>", v.len()),
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let engine = base64::engine::general_purpose::STANDARD;
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::S(s) => map.serialize_entry("S", s)?,
            Self::N(n) => map.serialize_entry("N", n)?,
            Self::B(b) => map.serialize_entry("B", &engine.encode(b))?,
            Self::Bool(b) => map.serialize_entry("BOOL", b)?,
            Self::Null(b) => map.serialize_entry("NULL", b)?,
            Self::L(list) => map.serialize_entry("L", list)?,
            Self::M(m) => map.serialize_entry("M", m)?,
            Self::Ss(v) => map.serialize_entry("SS", v)?,
            Self::Ns(v) => map.serialize_entry("NS", v)?,
            Self::Bs(v) => {
                let encoded: Vec<String> = v.iter().map(|b| engine.encode(b)).collect();
                map.serialize_entry("BS", &encoded)?
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(AttributeValueVisitor)
    }
}

struct AttributeValueVisitor;

impl<'de> Visitor<'de> for AttributeValueVisitor {
    type Value = AttributeValue;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an attribute value object with exactly one type key")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
        let engine = base64::engine::general_purpose::STANDARD;
        let Some(key) = map.next_key::<String>()? else {
            return Err(de::Error::custom("attribute value must have exactly one key"));
        };

        let value = match key.as_str() {
            "S" => AttributeValue::S(map.next_value()?),
            "N" => AttributeValue::N(map.next_value()?),
            "B" => {
                let encoded: String = map.next_value()?;
                AttributeValue::B(engine.decode(encoded).map_err(de::Error::custom)?)
            }
            "BOOL" => AttributeValue::Bool(map.next_value()?),
            "NULL" => AttributeValue::Null(map.next_value()?),
            "L" => AttributeValue::L(map.next_value()?),
            "M" => AttributeValue::M(map.next_value()?),
            "SS" => AttributeValue::Ss(map.next_value()?),
            "NS" => AttributeValue::Ns(map.next_value()?),
            "BS" => {
                let encoded: Vec<String> = map.next_value()?;
                let decoded = encoded
                    .iter()
                    .map(|e| engine.decode(e))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(de::Error::custom)?;
                AttributeValue::Bs(decoded)
            }
            other => {
                return Err(de::Error::unknown_field(
                    other,
                    &["S", "N", "B", "BOOL", "NULL", "L", "M", "SS", "NS", "BS"],
                ));
            }
        };

        if map.next_key::<String>()?.is_some() {
            return Err(de::Error::custom("attribute value must have exactly one key"));
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_string_value() {
        let json = serde_json::to_string(&AttributeValue::string("Albert")).unwrap();
        assert_eq!(json, r#"{"S":"Albert"}"#);
    }

    #[test]
    fn test_serialize_nested_list() {
        let value = AttributeValue::L(vec![
            AttributeValue::string("a"),
            AttributeValue::number(1),
            AttributeValue::Bool(true),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"L":[{"S":"a"},{"N":"1"},{"BOOL":true}]}"#);
    }

    #[test]
    fn test_deserialize_binary_from_base64() {
        let value: AttributeValue = serde_json::from_str(r#"{"B":"aGk="}"#).unwrap();
        assert_eq!(value, AttributeValue::B(b"hi".to_vec()));
    }

    #[test]
    fn test_deserialize_rejects_two_tags() {
        let result: Result<AttributeValue, _> = serde_json::from_str(r#"{"S":"a","N":"1"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_rejects_unknown_tag() {
        let result: Result<AttributeValue, _> = serde_json::from_str(r#"{"X":"a"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_numbers_compare_numerically() {
        let nine = AttributeValue::number(9);
        let ten = AttributeValue::number(10);
        assert_eq!(compare_values(&nine, &ten), Some(Ordering::Less));
        assert_eq!(
            compare_values(&AttributeValue::number("1.0"), &AttributeValue::number(1)),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn test_strings_compare_by_bytes() {
        let upper = AttributeValue::string("Z");
        let lower = AttributeValue::string("a");
        assert_eq!(compare_values(&upper, &lower), Some(Ordering::Less));
    }

    #[test]
    fn test_mixed_types_are_incomparable() {
        assert_eq!(
            compare_values(&AttributeValue::string("1"), &AttributeValue::number(1)),
            None
        );
        assert_eq!(
            compare_values(&AttributeValue::Bool(true), &AttributeValue::Bool(true)),
            None
        );
    }

    #[test]
    fn test_scalar_key_ordering() {
        let key = |n: &str| AttributeValue::number(n).scalar_key().unwrap();
        let mut keys = vec![key("10"), key("2"), key("-1.5")];
        keys.sort();
        assert_eq!(keys, vec![key("-1.5"), key("2.0"), key("10")]);
    }

    #[test]
    fn test_large_number_keys_keep_identity() {
        let low = AttributeValue::number("12345678901234567890");
        let high = AttributeValue::number("12345678901234567891");
        assert_ne!(low.scalar_key(), high.scalar_key());
        assert_eq!(compare_values(&low, &high), Some(Ordering::Less));
    }

    #[test]
    fn test_non_finite_numbers_have_no_key() {
        assert!(AttributeValue::number("NaN").scalar_key().is_none());
        assert!(AttributeValue::number("inf").scalar_key().is_none());
    }

    #[test]
    fn test_item_size() {
        let mut item = Item::new();
        item.insert("UserId".to_string(), AttributeValue::string("Albert"));
        item.insert("NoteId".to_string(), AttributeValue::number(1));
        // "UserId" (6) + "Albert" (6) + "NoteId" (6) + number (1 digit -> 2)
        assert_eq!(item_size(&item), 20);
    }

    #[test]
    fn test_number_size_ignores_sign_and_leading_zeros() {
        assert_eq!(AttributeValue::number("-0012345").size(), 4);
        assert_eq!(AttributeValue::number("0").size(), 2);
    }
}
