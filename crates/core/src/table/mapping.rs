//! Explicit mapping between domain types and items.

use std::str::FromStr;

use crate::error::{Error, Result};

use super::item::{AttributeValue, Item};
use super::schema::{KeyAttribute, TableSchema};

/// Primary-key declaration of an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityKey {
    pub partition_key: KeyAttribute,
    pub sort_key: Option<KeyAttribute>,
}

impl EntityKey {
    /// Checks that the declaration agrees with a table schema.
    pub fn check_against(&self, entity: &str, schema: &TableSchema) -> Result<()> {
        if self.partition_key != schema.partition_key || self.sort_key != schema.sort_key {
            return Err(Error::schema(
                &schema.table_name,
                format!(
                    "entity '{entity}' declares key ({}) but the table key is ({})",
                    describe(&self.partition_key, self.sort_key.as_ref()),
                    describe(&schema.partition_key, schema.sort_key.as_ref()),
                ),
            ));
        }
        Ok(())
    }
}

fn describe(pk: &KeyAttribute, sk: Option<&KeyAttribute>) -> String {
    match sk {
        Some(sk) => format!(
            "{}: {}, {}: {}",
            pk.name,
            pk.attribute_type.tag(),
            sk.name,
            sk.attribute_type.tag()
        ),
        None => format!("{}: {}", pk.name, pk.attribute_type.tag()),
    }
}

/// A domain type stored as an item.
pub trait Entity: Sized + Send + Sync {
    /// Name used in diagnostics.
    const NAME: &'static str;

    /// Primary key attributes the entity writes.
    fn key() -> EntityKey;

    fn to_item(&self) -> Item;

    fn from_item(item: &Item) -> Result<Self>;
}

// ============================================================================
// Attribute readers
// ============================================================================

/// Reads a required string attribute.
pub fn get_string(item: &Item, key: &str) -> Result<String> {
    match item.get(key) {
        Some(AttributeValue::S(s)) => Ok(s.clone()),
        Some(other) => Err(mistyped(key, "S", other)),
        None => Err(missing(key)),
    }
}

/// Reads an optional string attribute.
pub fn get_optional_string(item: &Item, key: &str) -> Result<Option<String>> {
    match item.get(key) {
        None | Some(AttributeValue::Null(_)) => Ok(None),
        Some(AttributeValue::S(s)) => Ok(Some(s.clone())),
        Some(other) => Err(mistyped(key, "S", other)),
    }
}

/// Reads a required number attribute and parses it.
pub fn get_number<T: FromStr>(item: &Item, key: &str) -> Result<T> {
    match item.get(key) {
        Some(AttributeValue::N(n)) => n
            .parse()
            .map_err(|_| Error::validation(key, format!("'{n}' is not a valid number"))),
        Some(other) => Err(mistyped(key, "N", other)),
        None => Err(missing(key)),
    }
}

/// Reads a required boolean attribute.
pub fn get_bool(item: &Item, key: &str) -> Result<bool> {
    let value = item.get(key).ok_or_else(|| missing(key))?;
    value.as_bool().ok_or_else(|| mistyped(key, "BOOL", value))
}

fn missing(key: &str) -> Error {
    Error::validation(key, "missing required attribute")
}

fn mistyped(key: &str, expected: &str, found: &AttributeValue) -> Error {
    Error::validation(
        key,
        format!("expected {expected}, found {}", found.type_descriptor()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::schema::ScalarType;

    fn item() -> Item {
        Item::from([
            ("UserId".to_string(), AttributeValue::string("Albert")),
            ("NoteId".to_string(), AttributeValue::number(7)),
            ("Pinned".to_string(), AttributeValue::Bool(true)),
        ])
    }

    #[test]
    fn test_get_string() {
        assert_eq!(get_string(&item(), "UserId").unwrap(), "Albert");
        assert!(matches!(
            get_string(&item(), "NoteId"),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_get_string_missing_field() {
        let err = get_string(&item(), "Title").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error on 'Title': missing required attribute"
        );
    }

    #[test]
    fn test_get_optional_string() {
        assert_eq!(get_optional_string(&item(), "Title").unwrap(), None);
        assert_eq!(
            get_optional_string(&item(), "UserId").unwrap().as_deref(),
            Some("Albert")
        );
    }

    #[test]
    fn test_get_number_and_bool() {
        assert_eq!(get_number::<i64>(&item(), "NoteId").unwrap(), 7);
        assert!(get_number::<i64>(&item(), "UserId").is_err());
        assert!(get_bool(&item(), "Pinned").unwrap());
    }

    #[test]
    fn test_entity_key_check() {
        let schema = TableSchema::new("Notes", KeyAttribute::new("UserId", ScalarType::String))
            .with_sort_key(KeyAttribute::new("NoteId", ScalarType::Number));
        let key = EntityKey {
            partition_key: KeyAttribute::new("UserId", ScalarType::String),
            sort_key: Some(KeyAttribute::new("NoteId", ScalarType::Number)),
        };
        assert!(key.check_against("Note", &schema).is_ok());

        let wrong = EntityKey {
            partition_key: KeyAttribute::new("UserId", ScalarType::String),
            sort_key: Some(KeyAttribute::new("NoteId", ScalarType::String)),
        };
        assert!(matches!(
            wrong.check_against("Note", &schema),
            Err(Error::Schema { .. })
        ));
    }
}
