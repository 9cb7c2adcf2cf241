//! Renders key conditions and filters into the remote's expression syntax.
//!
//! Attribute names become `#nN` placeholders and values become `:vN`, so
//! reserved words and arbitrary names never need escaping.

use std::collections::HashMap;

use super::condition::{Filter, KeyCondition, SortCondition};
use super::item::AttributeValue;

/// Placeholder maps shared by every expression of one request.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExpressionContext {
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
    name_lookup: HashMap<String, String>,
}

impl ExpressionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder for an attribute name, reused when the name repeats.
    pub fn name(&mut self, attribute: &str) -> String {
        if let Some(placeholder) = self.name_lookup.get(attribute) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names
            .insert(placeholder.clone(), attribute.to_string());
        self.name_lookup
            .insert(attribute.to_string(), placeholder.clone());
        placeholder
    }

    /// Placeholder for a value. Values are never deduplicated.
    pub fn value(&mut self, value: &AttributeValue) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value.clone());
        placeholder
    }

    /// Renders a key condition expression.
    pub fn key_condition(&mut self, condition: &KeyCondition) -> String {
        let pk = self.name(&condition.partition_key);
        let pv = self.value(&condition.partition_value);
        let mut expression = format!("{pk} = {pv}");

        if let Some((name, sort)) = &condition.sort {
            let sk = self.name(name);
            let rendered = match sort {
                SortCondition::Eq(v) => format!("{sk} = {}", self.value(v)),
                SortCondition::Lt(v) => format!("{sk} < {}", self.value(v)),
                SortCondition::Le(v) => format!("{sk} <= {}", self.value(v)),
                SortCondition::Gt(v) => format!("{sk} > {}", self.value(v)),
                SortCondition::Ge(v) => format!("{sk} >= {}", self.value(v)),
                SortCondition::Between(low, high) => {
                    let low = self.value(low);
                    let high = self.value(high);
                    format!("{sk} BETWEEN {low} AND {high}")
                }
                SortCondition::BeginsWith(prefix) => {
                    format!("begins_with({sk}, {})", self.value(prefix))
                }
            };
            expression.push_str(" AND ");
            expression.push_str(&rendered);
        }

        expression
    }

    /// Renders a filter expression.
    pub fn filter(&mut self, filter: &Filter) -> String {
        match filter {
            Filter::Compare(name, op, value) => {
                let n = self.name(name);
                let v = self.value(value);
                format!("{n} {} {v}", op.symbol())
            }
            Filter::Between(name, low, high) => {
                let n = self.name(name);
                let low = self.value(low);
                let high = self.value(high);
                format!("{n} BETWEEN {low} AND {high}")
            }
            Filter::BeginsWith(name, prefix) => {
                let n = self.name(name);
                format!("begins_with({n}, {})", self.value(prefix))
            }
            Filter::Contains(name, operand) => {
                let n = self.name(name);
                format!("contains({n}, {})", self.value(operand))
            }
            Filter::Exists(name) => format!("attribute_exists({})", self.name(name)),
            Filter::NotExists(name) => format!("attribute_not_exists({})", self.name(name)),
            Filter::And(left, right) => {
                format!("({}) AND ({})", self.filter(left), self.filter(right))
            }
            Filter::Or(left, right) => {
                format!("({}) OR ({})", self.filter(left), self.filter(right))
            }
            Filter::Not(inner) => format!("NOT ({})", self.filter(inner)),
        }
    }
}
