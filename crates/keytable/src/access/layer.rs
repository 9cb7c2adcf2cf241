use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use keytable_core::credentials::{Clock, Credential, SystemClock};
use keytable_core::table::{
    BatchWriteOutput, CapacityMode, Consistency, DataService, GetItemOutput, Item, Page,
    QueryOutput, QueryRequest, ReadOutput, ScanOutput, ScanRequest, TableDescription,
    TableSchema, TableStatus, WriteRequest,
};
use keytable_core::{Error, Result, ServiceError};

use crate::wait::{poll_until, Backoff, PollError};

use super::batch::check_batch;

/// Client-side access layer for one table.
///
/// The schema is validated once at construction and shared read-only. Every
/// remote call first checks the optional credential against the clock, so an
/// expired credential never reaches the network.
pub struct TableAccessLayer {
    service: Arc<dyn DataService>,
    schema: Arc<TableSchema>,
    credential: Option<Credential>,
    clock: Arc<dyn Clock>,
    backoff: Backoff,
    deleted: AtomicBool,
}

impl TableAccessLayer {
    /// Creates a layer for `schema`. Fails with [`Error::Schema`] on an
    /// invalid schema.
    pub fn new(service: Arc<dyn DataService>, schema: TableSchema) -> Result<Self> {
        schema.validate()?;
        Ok(Self {
            service,
            schema: Arc::new(schema),
            credential: None,
            clock: Arc::new(SystemClock),
            backoff: Backoff::default(),
            deleted: AtomicBool::new(false),
        })
    }

    /// Checks this credential's validity window before every remote call.
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Polling schedule for `wait_active` and `wait_deleted`.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    pub fn table_name(&self) -> &str {
        &self.schema.table_name
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Issues the create request and returns the reported status.
    pub async fn create_table(&self, capacity: CapacityMode) -> Result<TableStatus> {
        const OP: &str = "CreateTable";
        self.schema.validate()?;
        capacity.validate(self.table_name())?;
        self.authorize(OP)?;

        tracing::debug!(table = %self.table_name(), %capacity, indexes = self.schema.local_indexes.len(), "creating table");
        let status = self
            .service
            .create_table(&self.schema, capacity)
            .await
            .map_err(|e| self.remote(OP, e))?;

        self.deleted.store(false, Ordering::Release);
        tracing::info!(table = %self.table_name(), %status, "create table accepted");
        Ok(status)
    }

    /// Waits until the table reports `ACTIVE`.
    pub async fn wait_active(&self, timeout: Duration) -> Result<TableDescription> {
        const OP: &str = "WaitActive";
        let table = self.table_name();

        let description = poll_until(timeout, self.backoff, move || async move {
            match self.describe_remote(OP).await? {
                Some(d) if d.status == TableStatus::Active => Ok(Some(d)),
                other => {
                    tracing::debug!(table = %table, status = ?other.map(|d| d.status), "table not active yet");
                    Ok(None)
                }
            }
        })
        .await
        .map_err(|e| self.wait_error(OP, e))?;

        tracing::info!(table = %table, "table is active");
        Ok(description)
    }

    /// Waits until the table no longer exists.
    pub async fn wait_deleted(&self, timeout: Duration) -> Result<()> {
        const OP: &str = "WaitDeleted";
        let table = self.table_name();

        poll_until(timeout, self.backoff, move || async move {
            match self.describe_remote(OP).await? {
                None => Ok(Some(())),
                Some(d) => {
                    tracing::debug!(table = %table, status = %d.status, "table still present");
                    Ok(None)
                }
            }
        })
        .await
        .map_err(|e| self.wait_error(OP, e))?;

        tracing::info!(table = %table, "table is gone");
        Ok(())
    }

    /// Current description of the table, `None` once it is gone.
    pub async fn describe(&self) -> Result<Option<TableDescription>> {
        self.describe_remote("DescribeTable").await
    }

    /// Changes the capacity mode. The remote rejects this unless the table
    /// is `ACTIVE`.
    pub async fn update_capacity(&self, capacity: CapacityMode) -> Result<TableStatus> {
        const OP: &str = "UpdateTable";
        self.preflight(OP)?;
        capacity.validate(self.table_name())?;

        let status = self
            .service
            .update_table(self.table_name(), capacity)
            .await
            .map_err(|e| self.remote(OP, e))?;

        tracing::info!(table = %self.table_name(), %capacity, %status, "capacity update accepted");
        Ok(status)
    }

    /// Starts deleting the table. Data operations on this layer fail with
    /// [`Error::TableGone`] afterwards.
    pub async fn delete_table(&self) -> Result<TableStatus> {
        const OP: &str = "DeleteTable";
        self.preflight(OP)?;

        let status = self
            .service
            .delete_table(self.table_name())
            .await
            .map_err(|e| self.remote(OP, e))?;

        self.deleted.store(true, Ordering::Release);
        tracing::info!(table = %self.table_name(), %status, "delete table accepted");
        Ok(status)
    }

    // ========================================================================
    // Items
    // ========================================================================

    /// Writes an item, replacing any item with the same primary key.
    pub async fn put_item(&self, item: Item) -> Result<()> {
        const OP: &str = "PutItem";
        self.ensure_not_deleted(OP)?;
        self.schema.validate_item(&item)?;
        self.authorize(OP)?;

        tracing::debug!(table = %self.table_name(), attributes = item.len(), "put item");
        self.service
            .put_item(self.table_name(), item)
            .await
            .map_err(|e| self.remote(OP, e))
    }

    /// Point lookup. `key` must hold exactly the primary key attributes.
    pub async fn get_item(&self, key: Item, consistency: Consistency) -> Result<GetItemOutput> {
        const OP: &str = "GetItem";
        self.ensure_not_deleted(OP)?;
        self.schema.validate_key(&key)?;
        self.authorize(OP)?;

        tracing::debug!(table = %self.table_name(), ?consistency, "get item");
        self.service
            .get_item(self.table_name(), key, consistency)
            .await
            .map_err(|e| self.remote(OP, e))
    }

    /// Applies up to 25 writes and returns exactly the requests the remote
    /// declined. An empty batch makes no remote call.
    pub async fn batch_write(&self, requests: Vec<WriteRequest>) -> Result<BatchWriteOutput> {
        const OP: &str = "BatchWriteItem";
        self.ensure_not_deleted(OP)?;
        check_batch(&self.schema, &requests)?;
        if requests.is_empty() {
            return Ok(BatchWriteOutput::default());
        }
        self.authorize(OP)?;

        let submitted = requests.len();
        tracing::debug!(table = %self.table_name(), requests = submitted, "batch write");
        let output = self
            .service
            .batch_write(self.table_name(), requests)
            .await
            .map_err(|e| self.remote(OP, e))?;

        if !output.unprocessed.is_empty() {
            tracing::warn!(
                table = %self.table_name(),
                submitted,
                unprocessed = output.unprocessed.len(),
                "batch write left requests unprocessed"
            );
        }
        Ok(output)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Runs a query to completion.
    ///
    /// With `index_name` set the key condition is checked against that
    /// index's key schema. Strongly consistent reads report twice the
    /// capacity of eventually consistent ones.
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryOutput> {
        collect(self.query_pages(request)).await
    }

    /// Lazily fetches query pages. Each stream starts from the first page,
    /// so the same request can be run again at will.
    pub fn query_pages<'a>(
        &'a self,
        request: &QueryRequest,
    ) -> impl Stream<Item = Result<Page>> + Send + 'a {
        const OP: &str = "Query";
        let request = request.clone();
        async_stream::try_stream! {
            self.check_query(&request)?;
            let mut start_key = None;
            loop {
                self.preflight(OP)?;
                let page = self
                    .service
                    .query(self.table_name(), &request, start_key.take())
                    .await
                    .map_err(|e| self.remote(OP, e))?;
                tracing::debug!(
                    table = %self.table_name(),
                    index = ?request.index_name,
                    items = page.items.len(),
                    scanned = page.scanned_count,
                    "query page"
                );
                let next = page.last_evaluated_key.clone();
                yield page;
                match next {
                    Some(key) => start_key = Some(key),
                    None => break,
                }
            }
        }
    }

    /// Reads every item of the table or index, then applies the filter.
    ///
    /// Capacity is charged for every item read: a filter reduces the result
    /// count, never the consumed capacity.
    pub async fn scan(&self, request: &ScanRequest) -> Result<ScanOutput> {
        collect(self.scan_pages(request)).await
    }

    /// Lazily fetches scan pages.
    pub fn scan_pages<'a>(
        &'a self,
        request: &ScanRequest,
    ) -> impl Stream<Item = Result<Page>> + Send + 'a {
        const OP: &str = "Scan";
        let request = request.clone();
        async_stream::try_stream! {
            if let Some(index) = &request.index_name {
                self.schema.key_schema(Some(index))?;
            }
            let mut start_key = None;
            loop {
                self.preflight(OP)?;
                let page = self
                    .service
                    .scan(self.table_name(), &request, start_key.take())
                    .await
                    .map_err(|e| self.remote(OP, e))?;
                tracing::debug!(
                    table = %self.table_name(),
                    index = ?request.index_name,
                    items = page.items.len(),
                    scanned = page.scanned_count,
                    "scan page"
                );
                let next = page.last_evaluated_key.clone();
                yield page;
                match next {
                    Some(key) => start_key = Some(key),
                    None => break,
                }
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn check_query(&self, request: &QueryRequest) -> Result<()> {
        let keys = self.schema.key_schema(request.index_name.as_deref())?;
        request.key_condition.validate(self.table_name(), &keys)?;

        if let Some(filter) = &request.filter {
            let key_names = [
                Some(keys.partition_key.name.as_str()),
                keys.sort_key.map(|k| k.name.as_str()),
            ];
            if let Some(name) = filter
                .attributes()
                .into_iter()
                .find(|a| key_names.contains(&Some(*a)))
            {
                return Err(Error::schema(
                    self.table_name(),
                    format!("query filter cannot reference key attribute '{name}'"),
                ));
            }
        }
        if request.page_size == Some(0) {
            return Err(Error::schema(self.table_name(), "page size must be positive"));
        }
        Ok(())
    }

    async fn describe_remote(&self, operation: &'static str) -> Result<Option<TableDescription>> {
        self.authorize(operation)?;
        self.service
            .describe_table(self.table_name())
            .await
            .map_err(|e| Error::Remote {
                operation,
                resource: self.table_name().to_string(),
                source: e,
            })
    }

    fn preflight(&self, operation: &'static str) -> Result<()> {
        self.ensure_not_deleted(operation)?;
        self.authorize(operation)
    }

    fn ensure_not_deleted(&self, operation: &'static str) -> Result<()> {
        if self.deleted.load(Ordering::Acquire) {
            return Err(Error::TableGone {
                operation,
                table: self.table_name().to_string(),
            });
        }
        Ok(())
    }

    fn authorize(&self, operation: &'static str) -> Result<()> {
        match &self.credential {
            Some(credential) => {
                credential.ensure_valid(operation, self.table_name(), self.clock.now())
            }
            None => Ok(()),
        }
    }

    fn remote(&self, operation: &'static str, err: ServiceError) -> Error {
        Error::from_table_service(operation, self.table_name(), err)
    }

    fn wait_error(&self, operation: &'static str, err: PollError<Error>) -> Error {
        match err {
            PollError::TimedOut { waited, attempts } => {
                tracing::warn!(table = %self.table_name(), attempts, ?waited, "{operation} timed out");
                Error::Timeout {
                    operation,
                    resource: self.table_name().to_string(),
                    waited,
                }
            }
            PollError::Probe(e) => e,
        }
    }
}

async fn collect(pages: impl Stream<Item = Result<Page>>) -> Result<ReadOutput> {
    let mut pages = pin!(pages);
    let mut output = ReadOutput::default();
    while let Some(page) = pages.next().await {
        output.absorb(page?);
    }
    Ok(output)
}
