use async_trait::async_trait;

use crate::error::ServiceError;

use super::item::Item;
use super::requests::{BatchWriteOutput, GetItemOutput, Page, QueryRequest, ScanRequest, WriteRequest};
use super::schema::TableSchema;
use super::types::{CapacityMode, Consistency, TableDescription, TableStatus};

/// Result type for remote data-service calls.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Request/response contract of the remote key-value store.
///
/// Implementations issue exactly one remote call per method and never retry.
#[async_trait]
pub trait DataService: Send + Sync {
    /// Creates a table and returns the status the remote reports.
    async fn create_table(
        &self,
        schema: &TableSchema,
        capacity: CapacityMode,
    ) -> ServiceResult<TableStatus>;

    /// Describes a table. `None` once the table is gone.
    async fn describe_table(&self, table: &str) -> ServiceResult<Option<TableDescription>>;

    /// Writes an item, replacing any item with the same primary key.
    async fn put_item(&self, table: &str, item: Item) -> ServiceResult<()>;

    /// Point lookup by full primary key. Always reports consumed capacity.
    async fn get_item(
        &self,
        table: &str,
        key: Item,
        consistency: Consistency,
    ) -> ServiceResult<GetItemOutput>;

    /// Fetches one page of a query, starting after `exclusive_start_key`.
    async fn query(
        &self,
        table: &str,
        request: &QueryRequest,
        exclusive_start_key: Option<Item>,
    ) -> ServiceResult<Page>;

    /// Fetches one page of a scan, starting after `exclusive_start_key`.
    async fn scan(
        &self,
        table: &str,
        request: &ScanRequest,
        exclusive_start_key: Option<Item>,
    ) -> ServiceResult<Page>;

    /// Applies up to 25 writes. Declined entries come back as unprocessed.
    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> ServiceResult<BatchWriteOutput>;

    /// Changes the capacity mode of an active table.
    async fn update_table(&self, table: &str, capacity: CapacityMode) -> ServiceResult<TableStatus>;

    /// Starts deleting a table.
    async fn delete_table(&self, table: &str) -> ServiceResult<TableStatus>;
}
