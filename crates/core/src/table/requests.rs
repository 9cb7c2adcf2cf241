//! Read and write request shapes, and what the remote returns for them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::condition::{Filter, KeyCondition};
use super::item::Item;
use super::schema::TableSchema;
use super::types::Consistency;

/// Largest number of requests a single batch write may carry.
pub const MAX_BATCH_WRITE_REQUESTS: usize = 25;

/// A query against the base table or one of its local indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub index_name: Option<String>,
    pub key_condition: KeyCondition,
    pub filter: Option<Filter>,
    pub consistency: Consistency,
    pub return_consumed_capacity: bool,
    pub page_size: Option<u32>,
    pub scan_forward: bool,
}

impl QueryRequest {
    pub fn new(key_condition: KeyCondition, consistency: Consistency) -> Self {
        Self {
            index_name: None,
            key_condition,
            filter: None,
            consistency,
            return_consumed_capacity: false,
            page_size: None,
            scan_forward: true,
        }
    }

    /// Evaluates the key condition against an index instead of the table.
    pub fn on_index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_consumed_capacity(mut self) -> Self {
        self.return_consumed_capacity = true;
        self
    }

    /// Caps the number of items the remote evaluates per page.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Returns items in descending sort-key order.
    pub fn descending(mut self) -> Self {
        self.scan_forward = false;
        self
    }
}

/// A full read of the table or an index.
///
/// Capacity is charged for every item read. A filter only shrinks the
/// result set.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub index_name: Option<String>,
    pub filter: Option<Filter>,
    pub consistency: Consistency,
    pub return_consumed_capacity: bool,
    pub page_size: Option<u32>,
}

impl ScanRequest {
    pub fn new(consistency: Consistency) -> Self {
        Self {
            index_name: None,
            filter: None,
            consistency,
            return_consumed_capacity: false,
            page_size: None,
        }
    }

    pub fn on_index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_consumed_capacity(mut self) -> Self {
        self.return_consumed_capacity = true;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

/// One entry of a batch write, in the remote's wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteRequest {
    #[serde(rename = "PutRequest")]
    Put {
        #[serde(rename = "Item")]
        item: Item,
    },
    #[serde(rename = "DeleteRequest")]
    Delete {
        #[serde(rename = "Key")]
        key: Item,
    },
}

impl WriteRequest {
    pub fn put(item: Item) -> Self {
        Self::Put { item }
    }

    pub fn delete(key: Item) -> Self {
        Self::Delete { key }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Put { .. } => "put",
            Self::Delete { .. } => "delete",
        }
    }

    /// The primary key this request targets.
    pub fn key(&self, schema: &TableSchema) -> Item {
        match self {
            Self::Put { item } => schema.key_of(item),
            Self::Delete { key } => key.clone(),
        }
    }

    /// Validates the put item or the delete key against the schema.
    pub fn validate(&self, schema: &TableSchema) -> Result<()> {
        match self {
            Self::Put { item } => schema.validate_item(item),
            Self::Delete { key } => schema.validate_key(key),
        }
    }
}

/// Batch-write document: table name to an ordered list of write requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchPayload(pub BTreeMap<String, Vec<WriteRequest>>);

impl BatchPayload {
    /// Parses a payload from its JSON form.
    pub fn from_json(resource: &str, json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::schema(resource, format!("malformed batch payload: {e}"))
        })
    }

    /// Requests addressed to `table`, or an empty slice.
    pub fn requests_for(&self, table: &str) -> &[WriteRequest] {
        self.0.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// One response page of a paginated read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
    pub scanned_count: usize,
    pub consumed_capacity: Option<f64>,
    pub last_evaluated_key: Option<Item>,
}

/// Result of a point lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetItemOutput {
    pub item: Option<Item>,
    pub consumed_capacity: Option<f64>,
}

/// Result of a query or scan followed to completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadOutput {
    pub items: Vec<Item>,
    pub scanned_count: usize,
    /// Total units charged, present only when the request asked for it.
    pub consumed_capacity: Option<f64>,
}

impl ReadOutput {
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Folds one page into the running totals.
    pub fn absorb(&mut self, page: Page) {
        self.items.extend(page.items);
        self.scanned_count += page.scanned_count;
        if let Some(units) = page.consumed_capacity {
            *self.consumed_capacity.get_or_insert(0.0) += units;
        }
    }
}

pub type QueryOutput = ReadOutput;
pub type ScanOutput = ReadOutput;

/// Result of a batch write: the requests the remote declined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteOutput {
    pub unprocessed: Vec<WriteRequest>,
    pub consumed_capacity: Option<f64>,
}

impl BatchWriteOutput {
    pub fn is_complete(&self) -> bool {
        self.unprocessed.is_empty()
    }
}
