//! Key conditions and non-key filters, with local evaluation.
//!
//! Evaluation mirrors what the remote does so the simulated data service and
//! client-side checks agree with it.

use std::cmp::Ordering;

use crate::error::{Error, Result};

use super::item::{compare_values, AttributeValue, Item};
use super::schema::{KeySchema, ScalarType};

/// Comparison applied to the sort key of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum SortCondition {
    Eq(AttributeValue),
    Lt(AttributeValue),
    Le(AttributeValue),
    Gt(AttributeValue),
    Ge(AttributeValue),
    Between(AttributeValue, AttributeValue),
    BeginsWith(AttributeValue),
}

impl SortCondition {
    /// Operands in the order they appear in the expression.
    pub fn operands(&self) -> Vec<&AttributeValue> {
        match self {
            Self::Eq(v)
            | Self::Lt(v)
            | Self::Le(v)
            | Self::Gt(v)
            | Self::Ge(v)
            | Self::BeginsWith(v) => vec![v],
            Self::Between(low, high) => vec![low, high],
        }
    }

    pub fn matches(&self, value: &AttributeValue) -> bool {
        let cmp = |operand: &AttributeValue| compare_values(value, operand);
        match self {
            Self::Eq(v) => cmp(v) == Some(Ordering::Equal),
            Self::Lt(v) => cmp(v) == Some(Ordering::Less),
            Self::Le(v) => matches!(cmp(v), Some(Ordering::Less | Ordering::Equal)),
            Self::Gt(v) => cmp(v) == Some(Ordering::Greater),
            Self::Ge(v) => matches!(cmp(v), Some(Ordering::Greater | Ordering::Equal)),
            Self::Between(low, high) => {
                matches!(cmp(low), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(cmp(high), Some(Ordering::Less | Ordering::Equal))
            }
            Self::BeginsWith(prefix) => begins_with(value, prefix),
        }
    }
}

/// Partition-key equality plus an optional sort-key condition.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCondition {
    pub partition_key: String,
    pub partition_value: AttributeValue,
    pub sort: Option<(String, SortCondition)>,
}

impl KeyCondition {
    /// Equality on the partition key.
    pub fn partition(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            partition_key: name.into(),
            partition_value: value,
            sort: None,
        }
    }

    /// Narrows the condition with a sort-key comparison.
    pub fn with_sort(mut self, name: impl Into<String>, condition: SortCondition) -> Self {
        self.sort = Some((name.into(), condition));
        self
    }

    /// Checks the condition against the base table or index key schema.
    pub fn validate(&self, resource: &str, keys: &KeySchema<'_>) -> Result<()> {
        if self.partition_key != keys.partition_key.name {
            return Err(Error::schema(
                resource,
                format!(
                    "key condition must test partition key '{}', not '{}'",
                    keys.partition_key.name, self.partition_key
                ),
            ));
        }
        check_operand_type(
            resource,
            &self.partition_key,
            keys.partition_key.attribute_type,
            &self.partition_value,
        )?;

        let Some((name, condition)) = &self.sort else {
            return Ok(());
        };
        let Some(sort_key) = keys.sort_key else {
            return Err(Error::schema(
                resource,
                format!("sort condition on '{name}' but the key schema has no sort key"),
            ));
        };
        if *name != sort_key.name {
            return Err(Error::schema(
                resource,
                format!(
                    "sort condition must test '{}', not '{name}'",
                    sort_key.name
                ),
            ));
        }
        if let SortCondition::BeginsWith(_) = condition {
            if sort_key.attribute_type == ScalarType::Number {
                return Err(Error::schema(
                    resource,
                    format!("begins_with is not supported on number sort key '{name}'"),
                ));
            }
        }
        for operand in condition.operands() {
            check_operand_type(resource, name, sort_key.attribute_type, operand)?;
        }
        if let SortCondition::Between(low, high) = condition {
            if compare_values(low, high) == Some(Ordering::Greater) {
                return Err(Error::schema(
                    resource,
                    format!("between bounds on '{name}' are reversed"),
                ));
            }
        }
        Ok(())
    }

    /// Whether an item satisfies the condition.
    pub fn matches(&self, item: &Item) -> bool {
        let partition_ok = item
            .get(&self.partition_key)
            .is_some_and(|v| compare_values(v, &self.partition_value) == Some(Ordering::Equal));
        if !partition_ok {
            return false;
        }
        match &self.sort {
            None => true,
            Some((name, condition)) => item.get(name).is_some_and(|v| condition.matches(v)),
        }
    }
}

fn check_operand_type(
    resource: &str,
    name: &str,
    expected: ScalarType,
    operand: &AttributeValue,
) -> Result<()> {
    if operand.scalar_type() != Some(expected) {
        return Err(Error::schema(
            resource,
            format!(
                "condition on '{name}' compares a {} with a {} operand",
                expected.tag(),
                operand.type_descriptor()
            ),
        ));
    }
    Ok(())
}

/// Comparison operators usable in filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Predicate over non-key attributes, applied after items are read.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare(String, Comparator, AttributeValue),
    Between(String, AttributeValue, AttributeValue),
    BeginsWith(String, AttributeValue),
    Contains(String, AttributeValue),
    Exists(String),
    NotExists(String),
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn eq(name: impl Into<String>, value: AttributeValue) -> Self {
        Self::Compare(name.into(), Comparator::Eq, value)
    }

    pub fn and(self, other: Filter) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Filter) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Attribute names the filter reads.
    pub fn attributes(&self) -> Vec<&str> {
        match self {
            Self::Compare(name, ..)
            | Self::Between(name, ..)
            | Self::BeginsWith(name, _)
            | Self::Contains(name, _)
            | Self::Exists(name)
            | Self::NotExists(name) => vec![name.as_str()],
            Self::And(left, right) | Self::Or(left, right) => {
                let mut names = left.attributes();
                names.extend(right.attributes());
                names
            }
            Self::Not(inner) => inner.attributes(),
        }
    }

    /// Evaluates the filter against an item.
    pub fn evaluate(&self, item: &Item) -> bool {
        match self {
            Self::Compare(name, op, operand) => {
                // A missing attribute fails every comparison, including `<>`.
                let Some(value) = item.get(name) else {
                    return false;
                };
                let ord = compare_values(value, operand);
                match op {
                    Comparator::Eq => match ord {
                        Some(ord) => ord == Ordering::Equal,
                        None => value == operand,
                    },
                    Comparator::Ne => match ord {
                        Some(ord) => ord != Ordering::Equal,
                        None => value != operand,
                    },
                    Comparator::Lt => ord == Some(Ordering::Less),
                    Comparator::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
                    Comparator::Gt => ord == Some(Ordering::Greater),
                    Comparator::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
                }
            }
            Self::Between(name, low, high) => item.get(name).is_some_and(|v| {
                SortCondition::Between(low.clone(), high.clone()).matches(v)
            }),
            Self::BeginsWith(name, prefix) => {
                item.get(name).is_some_and(|v| begins_with(v, prefix))
            }
            Self::Contains(name, operand) => item.get(name).is_some_and(|v| contains(v, operand)),
            Self::Exists(name) => item.contains_key(name),
            Self::NotExists(name) => !item.contains_key(name),
            Self::And(left, right) => left.evaluate(item) && right.evaluate(item),
            Self::Or(left, right) => left.evaluate(item) || right.evaluate(item),
            Self::Not(inner) => !inner.evaluate(item),
        }
    }
}

fn begins_with(value: &AttributeValue, prefix: &AttributeValue) -> bool {
    match (value, prefix) {
        (AttributeValue::S(v), AttributeValue::S(p)) => v.starts_with(p.as_str()),
        (AttributeValue::B(v), AttributeValue::B(p)) => v.starts_with(p),
        _ => false,
    }
}

fn contains(value: &AttributeValue, operand: &AttributeValue) -> bool {
    match (value, operand) {
        (AttributeValue::S(v), AttributeValue::S(o)) => v.contains(o.as_str()),
        (AttributeValue::B(v), AttributeValue::B(o)) => {
            o.is_empty() || v.windows(o.len()).any(|w| w == o.as_slice())
        }
        (AttributeValue::Ss(set), AttributeValue::S(o)) => set.contains(o),
        (AttributeValue::Ns(set), AttributeValue::N(_)) => set.iter().any(|n| {
            compare_values(&AttributeValue::N(n.clone()), operand) == Some(Ordering::Equal)
        }),
        (AttributeValue::Bs(set), AttributeValue::B(o)) => set.contains(o),
        (AttributeValue::L(list), _) => list.contains(operand),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::schema::{KeyAttribute, LocalIndex, Projection, TableSchema};

    fn schema() -> TableSchema {
        TableSchema::new("Notes", KeyAttribute::new("UserId", ScalarType::String))
            .with_sort_key(KeyAttribute::new("NoteId", ScalarType::Number))
            .with_local_index(LocalIndex::new(
                "Favorite-LSI",
                KeyAttribute::new("Favorite", ScalarType::String),
                Projection::All,
            ))
    }

    fn note(id: i64, favorite: &str) -> Item {
        Item::from([
            ("UserId".to_string(), AttributeValue::string("Albert")),
            ("NoteId".to_string(), AttributeValue::number(id)),
            ("Favorite".to_string(), AttributeValue::string(favorite)),
        ])
    }

    #[test]
    fn test_sort_condition_matching() {
        let two = AttributeValue::number(2);
        assert!(SortCondition::Gt(AttributeValue::number(1)).matches(&two));
        assert!(!SortCondition::Gt(AttributeValue::number(2)).matches(&two));
        assert!(SortCondition::Ge(AttributeValue::number(2)).matches(&two));
        assert!(SortCondition::Between(AttributeValue::number(1), AttributeValue::number(3))
            .matches(&two));
        assert!(!SortCondition::Lt(AttributeValue::string("3")).matches(&two));
    }

    #[test]
    fn test_key_condition_matches_item() {
        let cond = KeyCondition::partition("UserId", AttributeValue::string("Albert"))
            .with_sort("NoteId", SortCondition::Gt(AttributeValue::number(1)));
        assert!(!cond.matches(&note(1, "No")));
        assert!(cond.matches(&note(2, "Yes")));
    }

    #[test]
    fn test_key_condition_validates_against_index() {
        let schema = schema();
        let index_keys = schema.key_schema(Some("Favorite-LSI")).unwrap();
        let cond = KeyCondition::partition("UserId", AttributeValue::string("Albert"))
            .with_sort("Favorite", SortCondition::Eq(AttributeValue::string("Yes")));
        assert!(cond.validate("Notes", &index_keys).is_ok());

        let base_keys = schema.key_schema(None).unwrap();
        assert!(matches!(
            cond.validate("Notes", &base_keys),
            Err(Error::Schema { .. })
        ));
    }

    #[test]
    fn test_key_condition_rejects_wrong_partition_key() {
        let schema = schema();
        let keys = schema.key_schema(None).unwrap();
        let cond = KeyCondition::partition("NoteId", AttributeValue::number(1));
        assert!(cond.validate("Notes", &keys).is_err());
    }

    #[test]
    fn test_key_condition_rejects_operand_type() {
        let schema = schema();
        let keys = schema.key_schema(None).unwrap();
        let cond = KeyCondition::partition("UserId", AttributeValue::string("Albert"))
            .with_sort("NoteId", SortCondition::Gt(AttributeValue::string("1")));
        assert!(cond.validate("Notes", &keys).is_err());
    }

    #[test]
    fn test_begins_with_rejected_on_number_sort_key() {
        let schema = schema();
        let keys = schema.key_schema(None).unwrap();
        let cond = KeyCondition::partition("UserId", AttributeValue::string("Albert"))
            .with_sort("NoteId", SortCondition::BeginsWith(AttributeValue::number(1)));
        assert!(cond.validate("Notes", &keys).is_err());
    }

    #[test]
    fn test_reversed_between_rejected() {
        let schema = schema();
        let keys = schema.key_schema(None).unwrap();
        let cond = KeyCondition::partition("UserId", AttributeValue::string("Albert")).with_sort(
            "NoteId",
            SortCondition::Between(AttributeValue::number(5), AttributeValue::number(1)),
        );
        assert!(cond.validate("Notes", &keys).is_err());
    }

    #[test]
    fn test_filter_evaluation() {
        let item = note(2, "Yes");
        assert!(Filter::eq("Favorite", AttributeValue::string("Yes")).evaluate(&item));
        assert!(!Filter::eq("Favorite", AttributeValue::string("No")).evaluate(&item));
        assert!(Filter::Exists("NoteId".to_string()).evaluate(&item));
        assert!(Filter::NotExists("Body".to_string()).evaluate(&item));
        assert!(
            Filter::Compare("Favorite".to_string(), Comparator::Ne, AttributeValue::string("No"))
                .evaluate(&item)
        );
        assert!(
            !Filter::Compare("Body".to_string(), Comparator::Ne, AttributeValue::string("x"))
                .evaluate(&item)
        );
        assert!(!Filter::Compare(
            "Body".to_string(),
            Comparator::Eq,
            AttributeValue::string("x")
        )
        .evaluate(&item));
    }

    #[test]
    fn test_filter_combinators() {
        let item = note(2, "Yes");
        let yes = Filter::eq("Favorite", AttributeValue::string("Yes"));
        let big = Filter::Compare("NoteId".to_string(), Comparator::Gt, AttributeValue::number(5));
        assert!(!yes.clone().and(big.clone()).evaluate(&item));
        assert!(yes.or(big.clone()).evaluate(&item));
        assert!(big.negate().evaluate(&item));
    }

    #[test]
    fn test_filter_attributes() {
        let filter = Filter::eq("Favorite", AttributeValue::string("Yes"))
            .or(Filter::Exists("Body".to_string()).negate());
        assert_eq!(filter.attributes(), vec!["Favorite", "Body"]);
    }

    #[test]
    fn test_filter_contains() {
        let mut item = note(1, "No");
        item.insert(
            "Tags".to_string(),
            AttributeValue::Ss(vec!["work".to_string(), "home".to_string()]),
        );
        assert!(Filter::Contains("Tags".to_string(), AttributeValue::string("work")).evaluate(&item));
        assert!(Filter::Contains("UserId".to_string(), AttributeValue::string("lb")).evaluate(&item));
        assert!(!Filter::Contains("Tags".to_string(), AttributeValue::string("gym")).evaluate(&item));
    }

    #[test]
    fn test_filter_begins_with() {
        let item = note(1, "No");
        assert!(Filter::BeginsWith("UserId".to_string(), AttributeValue::string("Al")).evaluate(&item));
        assert!(!Filter::BeginsWith("UserId".to_string(), AttributeValue::string("al")).evaluate(&item));
    }
}
