//! In-memory data service.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use keytable_core::table::{
    item_size, read_units, read_units_for, write_units, BatchWriteOutput, CapacityMode,
    Consistency, DataService, Filter, GetItemOutput, Item, LocalIndex, Page, PrimaryKey,
    Projection, QueryRequest, ScanRequest, ServiceResult, TableDescription, TableSchema,
    TableStatus, WriteRequest, MAX_BATCH_WRITE_REQUESTS,
};
use keytable_core::ServiceError;

/// Largest response page, in bytes of items read.
const MAX_PAGE_BYTES: usize = 1024 * 1024;

/// Simulated remote data service.
///
/// State lives behind `Arc<RwLock<_>>`, so clones share the same tables.
/// Lifecycle transitions (`CREATING`, `UPDATING`, `DELETING`) settle after a
/// configurable number of describe polls, or never.
#[derive(Debug, Clone)]
pub struct InMemoryDataService {
    state: Arc<RwLock<State>>,
}

#[derive(Debug)]
struct State {
    tables: HashMap<String, SimTable>,
    settle_after: Option<u32>,
    throttle_next_batch: usize,
    calls: u64,
}

#[derive(Debug)]
struct SimTable {
    schema: TableSchema,
    capacity: CapacityMode,
    status: TableStatus,
    /// Describe polls left before a transient status settles.
    polls_left: Option<u32>,
    items: BTreeMap<PrimaryKey, Item>,
}

impl SimTable {
    fn new(schema: TableSchema, capacity: CapacityMode, settle_after: Option<u32>) -> Self {
        Self {
            schema,
            capacity,
            status: TableStatus::Creating,
            polls_left: settle_after,
            items: BTreeMap::new(),
        }
    }

    fn ensure_active(&self) -> ServiceResult<()> {
        match self.status {
            TableStatus::Active => Ok(()),
            TableStatus::Deleting => Err(not_found(&self.schema.table_name)),
            status => Err(ServiceError::InUse(format!(
                "table {} is {status}",
                self.schema.table_name
            ))),
        }
    }

    fn describe(&self) -> TableDescription {
        TableDescription {
            table_name: self.schema.table_name.clone(),
            status: self.status,
            capacity_mode: self.capacity,
            item_count: self.items.len() as u64,
        }
    }

    /// Items visible through the base table or an index, in key order.
    fn view(&self, index_name: Option<&str>) -> ServiceResult<Vec<Item>> {
        let Some(name) = index_name else {
            return Ok(self.items.values().cloned().collect());
        };
        let index = self.schema.index(name).ok_or_else(|| {
            ServiceError::Invalid(format!(
                "The table does not have the specified index: {name}"
            ))
        })?;

        // Local indexes are sparse: items without the index sort key are absent.
        let mut items: Vec<(PrimaryKey, Item)> = self
            .items
            .iter()
            .filter(|(_, item)| item.contains_key(&index.sort_key.name))
            .map(|(key, item)| (key.clone(), project(&self.schema, index, item)))
            .collect();
        items.sort_by(|(a_key, a), (b_key, b)| {
            let a_sort = a.get(&index.sort_key.name).and_then(|v| v.scalar_key());
            let b_sort = b.get(&index.sort_key.name).and_then(|v| v.scalar_key());
            (&a_key.0, a_sort, &a_key.1).cmp(&(&b_key.0, b_sort, &b_key.1))
        });
        Ok(items.into_iter().map(|(_, item)| item).collect())
    }
}

fn project(schema: &TableSchema, index: &LocalIndex, item: &Item) -> Item {
    let mut keep: Vec<&str> = schema.key_names();
    keep.push(index.sort_key.name.as_str());
    match &index.projection {
        Projection::All => return item.clone(),
        Projection::KeysOnly => {}
        Projection::Include(extra) => keep.extend(extra.iter().map(String::as_str)),
    }
    item.iter()
        .filter(|(name, _)| keep.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn not_found(table: &str) -> ServiceError {
    ServiceError::NotFound(format!("Requested resource not found: Table: {table} not found"))
}

struct PageRequest<'a> {
    schema: &'a TableSchema,
    index_sort_key: Option<&'a str>,
    start_key: Option<Item>,
    limit: Option<u32>,
    filter: Option<&'a Filter>,
    consistency: Consistency,
    report_capacity: bool,
}

/// Cuts one page out of an ordered candidate list.
///
/// The limit and the page byte bound apply to items read; the filter runs
/// afterwards and never changes the capacity charged.
fn paginate(candidates: Vec<Item>, request: PageRequest<'_>) -> Page {
    let schema = request.schema;
    let begin = match &request.start_key {
        None => 0,
        Some(start) => {
            let target = schema.primary_key(start);
            candidates
                .iter()
                .position(|item| schema.primary_key(item) == target)
                .map_or(candidates.len(), |p| p + 1)
        }
    };

    let limit = request.limit.map_or(usize::MAX, |l| l as usize);
    let mut read = Vec::new();
    let mut bytes = 0;
    for item in &candidates[begin..] {
        if read.len() >= limit || bytes >= MAX_PAGE_BYTES {
            break;
        }
        bytes += item_size(item);
        read.push(item.clone());
    }

    let more = begin + read.len() < candidates.len();
    let last_evaluated_key = match read.last() {
        Some(last) if more => {
            let mut key = schema.key_of(last);
            if let Some(name) = request.index_sort_key {
                if let Some(value) = last.get(name) {
                    key.insert(name.to_string(), value.clone());
                }
            }
            Some(key)
        }
        _ => None,
    };

    let consumed_capacity = request
        .report_capacity
        .then(|| read_units_for(&read, request.consistency));
    let scanned_count = read.len();
    let items = read
        .into_iter()
        .filter(|item| request.filter.map_or(true, |f| f.evaluate(item)))
        .collect();

    Page {
        items,
        scanned_count,
        consumed_capacity,
        last_evaluated_key,
    }
}

impl Default for InMemoryDataService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDataService {
    /// Transient statuses settle on the second describe poll.
    pub fn new() -> Self {
        Self::with_settle(Some(1))
    }

    /// Transient statuses settle after `polls` describe polls.
    pub fn settling_after(polls: u32) -> Self {
        Self::with_settle(Some(polls))
    }

    /// Transient statuses never settle: a created table stays `CREATING`.
    pub fn never_settling() -> Self {
        Self::with_settle(None)
    }

    fn with_settle(settle_after: Option<u32>) -> Self {
        Self {
            state: Arc::new(RwLock::new(State {
                tables: HashMap::new(),
                settle_after,
                throttle_next_batch: 0,
                calls: 0,
            })),
        }
    }

    /// Registers a table that is already `ACTIVE`. Not counted as a call.
    pub async fn insert_active_table(&self, schema: TableSchema, capacity: CapacityMode) {
        let mut state = self.state.write().await;
        let mut table = SimTable::new(schema, capacity, None);
        table.status = TableStatus::Active;
        state
            .tables
            .insert(table.schema.table_name.clone(), table);
    }

    /// The next batch write declines its last `count` requests.
    pub async fn throttle_next_batch(&self, count: usize) {
        self.state.write().await.throttle_next_batch = count;
    }

    /// Number of remote calls served so far.
    pub async fn calls(&self) -> u64 {
        self.state.read().await.calls
    }

    /// Current status without counting as a describe poll.
    pub async fn peek_status(&self, table: &str) -> Option<TableStatus> {
        self.state.read().await.tables.get(table).map(|t| t.status)
    }
}

#[async_trait]
impl DataService for InMemoryDataService {
    async fn create_table(
        &self,
        schema: &TableSchema,
        capacity: CapacityMode,
    ) -> ServiceResult<TableStatus> {
        let mut state = self.state.write().await;
        state.calls += 1;

        schema
            .validate()
            .map_err(|e| ServiceError::Invalid(e.to_string()))?;
        if state.tables.contains_key(&schema.table_name) {
            return Err(ServiceError::InUse(format!(
                "Table already exists: {}",
                schema.table_name
            )));
        }

        let table = SimTable::new(schema.clone(), capacity, state.settle_after);
        let status = table.status;
        state.tables.insert(schema.table_name.clone(), table);
        Ok(status)
    }

    async fn describe_table(&self, table: &str) -> ServiceResult<Option<TableDescription>> {
        let mut state = self.state.write().await;
        state.calls += 1;

        let Some(sim) = state.tables.get_mut(table) else {
            return Ok(None);
        };

        if sim.status != TableStatus::Active {
            match sim.polls_left {
                Some(0) => {
                    if sim.status == TableStatus::Deleting {
                        state.tables.remove(table);
                        return Ok(None);
                    }
                    sim.status = TableStatus::Active;
                    sim.polls_left = None;
                }
                Some(n) => sim.polls_left = Some(n - 1),
                None => {}
            }
        }

        Ok(Some(sim.describe()))
    }

    async fn put_item(&self, table: &str, item: Item) -> ServiceResult<()> {
        let mut state = self.state.write().await;
        state.calls += 1;

        let sim = state.tables.get_mut(table).ok_or_else(|| not_found(table))?;
        sim.ensure_active()?;
        sim.schema
            .validate_item(&item)
            .map_err(|e| ServiceError::Invalid(e.to_string()))?;
        let key = sim
            .schema
            .primary_key(&item)
            .ok_or_else(|| ServiceError::Invalid("missing key attributes".to_string()))?;
        sim.items.insert(key, item);
        Ok(())
    }

    async fn get_item(
        &self,
        table: &str,
        key: Item,
        consistency: Consistency,
    ) -> ServiceResult<GetItemOutput> {
        let mut state = self.state.write().await;
        state.calls += 1;

        let sim = state.tables.get(table).ok_or_else(|| not_found(table))?;
        sim.ensure_active()?;
        let key = sim
            .schema
            .primary_key(&key)
            .ok_or_else(|| ServiceError::Invalid("missing key attributes".to_string()))?;
        let item = sim.items.get(&key).cloned();
        let bytes = item.as_ref().map_or(0, item_size);

        Ok(GetItemOutput {
            item,
            consumed_capacity: Some(read_units(bytes, consistency)),
        })
    }

    async fn query(
        &self,
        table: &str,
        request: &QueryRequest,
        exclusive_start_key: Option<Item>,
    ) -> ServiceResult<Page> {
        let mut state = self.state.write().await;
        state.calls += 1;

        let sim = state.tables.get(table).ok_or_else(|| not_found(table))?;
        sim.ensure_active()?;
        let keys = sim
            .schema
            .key_schema(request.index_name.as_deref())
            .map_err(|e| ServiceError::Invalid(e.to_string()))?;
        request
            .key_condition
            .validate(table, &keys)
            .map_err(|e| ServiceError::Invalid(e.to_string()))?;

        let mut candidates: Vec<Item> = sim
            .view(request.index_name.as_deref())?
            .into_iter()
            .filter(|item| request.key_condition.matches(item))
            .collect();
        if !request.scan_forward {
            candidates.reverse();
        }

        Ok(paginate(
            candidates,
            PageRequest {
                schema: &sim.schema,
                index_sort_key: keys.index.map(|i| i.sort_key.name.as_str()),
                start_key: exclusive_start_key,
                limit: request.page_size,
                filter: request.filter.as_ref(),
                consistency: request.consistency,
                report_capacity: request.return_consumed_capacity,
            },
        ))
    }

    async fn scan(
        &self,
        table: &str,
        request: &ScanRequest,
        exclusive_start_key: Option<Item>,
    ) -> ServiceResult<Page> {
        let mut state = self.state.write().await;
        state.calls += 1;

        let sim = state.tables.get(table).ok_or_else(|| not_found(table))?;
        sim.ensure_active()?;
        let index_sort_key = match &request.index_name {
            Some(name) => sim.schema.index(name).map(|i| i.sort_key.name.as_str()),
            None => None,
        };
        let candidates = sim.view(request.index_name.as_deref())?;

        Ok(paginate(
            candidates,
            PageRequest {
                schema: &sim.schema,
                index_sort_key,
                start_key: exclusive_start_key,
                limit: request.page_size,
                filter: request.filter.as_ref(),
                consistency: request.consistency,
                report_capacity: request.return_consumed_capacity,
            },
        ))
    }

    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> ServiceResult<BatchWriteOutput> {
        let mut state = self.state.write().await;
        state.calls += 1;

        if requests.len() > MAX_BATCH_WRITE_REQUESTS {
            return Err(ServiceError::Invalid(format!(
                "Too many items requested for the BatchWriteItem call: {}",
                requests.len()
            )));
        }
        let declined = std::mem::take(&mut state.throttle_next_batch).min(requests.len());

        let sim = state.tables.get_mut(table).ok_or_else(|| not_found(table))?;
        sim.ensure_active()?;
        for request in &requests {
            request
                .validate(&sim.schema)
                .map_err(|e| ServiceError::Invalid(e.to_string()))?;
        }

        let mut processed = requests;
        let unprocessed = processed.split_off(processed.len() - declined);
        let mut units = 0.0;
        for request in processed {
            let key = sim
                .schema
                .primary_key(&request.key(&sim.schema))
                .ok_or_else(|| ServiceError::Invalid("missing key attributes".to_string()))?;
            match request {
                WriteRequest::Put { item } => {
                    units += write_units(item_size(&item));
                    sim.items.insert(key, item);
                }
                WriteRequest::Delete { .. } => {
                    let removed = sim.items.remove(&key);
                    units += write_units(removed.as_ref().map_or(0, item_size));
                }
            }
        }

        Ok(BatchWriteOutput {
            unprocessed,
            consumed_capacity: Some(units),
        })
    }

    async fn update_table(&self, table: &str, capacity: CapacityMode) -> ServiceResult<TableStatus> {
        let mut state = self.state.write().await;
        state.calls += 1;
        let settle_after = state.settle_after;

        let sim = state.tables.get_mut(table).ok_or_else(|| not_found(table))?;
        if sim.status != TableStatus::Active {
            return Err(ServiceError::InUse(format!(
                "Attempt to change a resource which is still in use: table {table} is {}",
                sim.status
            )));
        }
        sim.capacity = capacity;
        sim.status = TableStatus::Updating;
        sim.polls_left = settle_after;
        Ok(sim.status)
    }

    async fn delete_table(&self, table: &str) -> ServiceResult<TableStatus> {
        let mut state = self.state.write().await;
        state.calls += 1;
        let settle_after = state.settle_after;

        let sim = state.tables.get_mut(table).ok_or_else(|| not_found(table))?;
        if sim.status != TableStatus::Active {
            return Err(ServiceError::InUse(format!(
                "Attempt to change a resource which is still in use: table {table} is {}",
                sim.status
            )));
        }
        sim.status = TableStatus::Deleting;
        sim.polls_left = settle_after;
        Ok(sim.status)
    }
}
