//! Table schema configuration (Functional Core - pure data).

use std::collections::HashSet;

use crate::error::{Error, Result};

use super::item::{item_size, AttributeValue, Item, ScalarKey, MAX_ITEM_SIZE_BYTES};
use super::number::Number;

/// Maximum number of local secondary indexes per table.
pub const MAX_LOCAL_INDEXES: usize = 5;

/// Scalar types allowed for key attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Number,
    Binary,
}

impl ScalarType {
    /// Wire tag for the type ("S", "N" or "B").
    pub fn tag(&self) -> &'static str {
        match self {
            Self::String => "S",
            Self::Number => "N",
            Self::Binary => "B",
        }
    }
}

/// A key attribute definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    pub name: String,
    pub attribute_type: ScalarType,
}

impl KeyAttribute {
    pub fn new(name: impl Into<String>, attribute_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
        }
    }
}

/// Which attributes an index copies from the base table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    KeysOnly,
    Include(Vec<String>),
}

/// Local secondary index: same partition key as the table, alternate sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIndex {
    pub name: String,
    pub sort_key: KeyAttribute,
    pub projection: Projection,
}

impl LocalIndex {
    pub fn new(name: impl Into<String>, sort_key: KeyAttribute, projection: Projection) -> Self {
        Self {
            name: name.into(),
            sort_key,
            projection,
        }
    }
}

/// Key attributes a read is evaluated against: the base table or one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySchema<'a> {
    pub partition_key: &'a KeyAttribute,
    pub sort_key: Option<&'a KeyAttribute>,
    pub index: Option<&'a LocalIndex>,
}

/// Table schema: partition key, optional sort key and local indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table_name: String,
    pub partition_key: KeyAttribute,
    pub sort_key: Option<KeyAttribute>,
    pub local_indexes: Vec<LocalIndex>,
}

impl TableSchema {
    /// Creates a schema with only a partition key.
    pub fn new(table_name: impl Into<String>, partition_key: KeyAttribute) -> Self {
        Self {
            table_name: table_name.into(),
            partition_key,
            sort_key: None,
            local_indexes: Vec::new(),
        }
    }

    /// Sets the sort key.
    pub fn with_sort_key(mut self, sort_key: KeyAttribute) -> Self {
        self.sort_key = Some(sort_key);
        self
    }

    /// Adds a local secondary index.
    pub fn with_local_index(mut self, index: LocalIndex) -> Self {
        self.local_indexes.push(index);
        self
    }

    /// Sets the table name.
    pub fn with_table_name(mut self, name: &str) -> Self {
        self.table_name = name.to_string();
        self
    }

    /// Looks up a local index by name.
    pub fn index(&self, name: &str) -> Option<&LocalIndex> {
        self.local_indexes.iter().find(|i| i.name == name)
    }

    /// Resolves the key schema for the base table (`None`) or a named index.
    pub fn key_schema(&self, index_name: Option<&str>) -> Result<KeySchema<'_>> {
        match index_name {
            None => Ok(KeySchema {
                partition_key: &self.partition_key,
                sort_key: self.sort_key.as_ref(),
                index: None,
            }),
            Some(name) => {
                let index = self.index(name).ok_or_else(|| {
                    Error::schema(
                        &self.table_name,
                        format!("index '{name}' is not defined on this table"),
                    )
                })?;
                Ok(KeySchema {
                    partition_key: &self.partition_key,
                    sort_key: Some(&index.sort_key),
                    index: Some(index),
                })
            }
        }
    }

    /// Names of the base-table key attributes.
    pub fn key_names(&self) -> Vec<&str> {
        let mut names = vec![self.partition_key.name.as_str()];
        if let Some(sk) = &self.sort_key {
            names.push(sk.name.as_str());
        }
        names
    }

    /// Checks the schema invariants.
    pub fn validate(&self) -> Result<()> {
        let table = self.table_name.as_str();
        validate_resource_name(table, "table", table)?;
        validate_attribute_name(table, &self.partition_key.name)?;

        if let Some(sk) = &self.sort_key {
            validate_attribute_name(table, &sk.name)?;
            if sk.name == self.partition_key.name {
                return Err(Error::schema(
                    table,
                    "sort key must differ from the partition key",
                ));
            }
        }

        if self.local_indexes.len() > MAX_LOCAL_INDEXES {
            return Err(Error::schema(
                table,
                format!(
                    "{} local secondary indexes declared, the limit is {MAX_LOCAL_INDEXES}",
                    self.local_indexes.len()
                ),
            ));
        }

        let mut seen = HashSet::new();
        for index in &self.local_indexes {
            validate_resource_name(table, "index", &index.name)?;
            if !seen.insert(index.name.as_str()) {
                return Err(Error::schema(
                    table,
                    format!("index '{}' is declared more than once", index.name),
                ));
            }

            let Some(base_sk) = &self.sort_key else {
                return Err(Error::schema(
                    table,
                    format!(
                        "index '{}' requires the table to declare a sort key",
                        index.name
                    ),
                ));
            };

            validate_attribute_name(table, &index.sort_key.name)?;
            if index.sort_key.name == self.partition_key.name
                || index.sort_key.name == base_sk.name
            {
                return Err(Error::schema(
                    table,
                    format!(
                        "index '{}' must use a sort key distinct from the table keys",
                        index.name
                    ),
                ));
            }

            // The same attribute cannot be declared with two types.
            if let Some(other) = self.local_indexes.iter().find(|o| {
                o.sort_key.name == index.sort_key.name
                    && o.sort_key.attribute_type != index.sort_key.attribute_type
            }) {
                return Err(Error::schema(
                    table,
                    format!(
                        "attribute '{}' has conflicting types in indexes '{}' and '{}'",
                        index.sort_key.name, index.name, other.name
                    ),
                ));
            }

            if let Projection::Include(attributes) = &index.projection {
                if attributes.is_empty() {
                    return Err(Error::schema(
                        table,
                        format!("index '{}' includes no attributes", index.name),
                    ));
                }
                if let Some(key) = attributes.iter().find(|a| {
                    **a == self.partition_key.name
                        || **a == base_sk.name
                        || **a == index.sort_key.name
                }) {
                    return Err(Error::schema(
                        table,
                        format!(
                            "index '{}' lists key attribute '{key}' as a projected attribute",
                            index.name
                        ),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Checks an item against the schema: required keys, declared types and
    /// the item size limit.
    pub fn validate_item(&self, item: &Item) -> Result<()> {
        let table = self.table_name.as_str();
        check_key_attribute(table, item, &self.partition_key, true)?;
        if let Some(sk) = &self.sort_key {
            check_key_attribute(table, item, sk, true)?;
        }
        for index in &self.local_indexes {
            check_key_attribute(table, item, &index.sort_key, false)?;
        }

        if item.keys().any(String::is_empty) {
            return Err(Error::validation(table, "attribute names must not be empty"));
        }

        let size = item_size(item);
        if size > MAX_ITEM_SIZE_BYTES {
            return Err(Error::validation(
                table,
                format!("item is {size} bytes, the limit is {MAX_ITEM_SIZE_BYTES}"),
            ));
        }

        Ok(())
    }

    /// Checks that `key` holds exactly the base-table key attributes.
    pub fn validate_key(&self, key: &Item) -> Result<()> {
        let table = self.table_name.as_str();
        check_key_attribute(table, key, &self.partition_key, true)?;
        if let Some(sk) = &self.sort_key {
            check_key_attribute(table, key, sk, true)?;
        }
        let expected = self.key_names();
        if let Some(extra) = key.keys().find(|k| !expected.contains(&k.as_str())) {
            return Err(Error::validation(
                table,
                format!("key contains non-key attribute '{extra}'"),
            ));
        }
        Ok(())
    }

    /// Extracts the base-table key attributes from an item.
    pub fn key_of(&self, item: &Item) -> Item {
        self.key_names()
            .into_iter()
            .filter_map(|name| item.get(name).map(|v| (name.to_string(), v.clone())))
            .collect()
    }

    /// Orderable primary key of an item. `None` when a key attribute is
    /// missing or not a scalar.
    pub fn primary_key(&self, item: &Item) -> Option<PrimaryKey> {
        let partition = item.get(&self.partition_key.name)?.scalar_key()?;
        let sort = match &self.sort_key {
            Some(sk) => Some(item.get(&sk.name)?.scalar_key()?),
            None => None,
        };
        Some((partition, sort))
    }
}

/// Partition key value plus the optional sort key value.
pub type PrimaryKey = (ScalarKey, Option<ScalarKey>);

fn check_key_attribute(
    table: &str,
    item: &Item,
    key: &KeyAttribute,
    required: bool,
) -> Result<()> {
    let Some(value) = item.get(&key.name) else {
        if required {
            return Err(Error::validation(
                table,
                format!("missing key attribute '{}'", key.name),
            ));
        }
        return Ok(());
    };

    if value.scalar_type() != Some(key.attribute_type) {
        return Err(Error::validation(
            table,
            format!(
                "attribute '{}' must be of type {}, found {}",
                key.name,
                key.attribute_type.tag(),
                value.type_descriptor()
            ),
        ));
    }

    match value {
        AttributeValue::S(s) if s.is_empty() => Err(Error::validation(
            table,
            format!("key attribute '{}' must not be empty", key.name),
        )),
        AttributeValue::B(b) if b.is_empty() => Err(Error::validation(
            table,
            format!("key attribute '{}' must not be empty", key.name),
        )),
        AttributeValue::N(n) if Number::parse(n).is_none() => Err(Error::validation(
            table,
            format!("key attribute '{}' is not a finite decimal number: '{n}'", key.name),
        )),
        _ => Ok(()),
    }
}

fn validate_resource_name(table: &str, kind: &str, name: &str) -> Result<()> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !(3..=255).contains(&name.len()) || !valid_chars {
        return Err(Error::schema(
            table,
            format!("{kind} name '{name}' must be 3-255 characters of [A-Za-z0-9_.-]"),
        ));
    }
    Ok(())
}

fn validate_attribute_name(table: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::schema(table, "key attribute names must not be empty"));
    }
    Ok(())
}
