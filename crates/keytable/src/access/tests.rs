use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::TryStreamExt;
use keytable_core::table::{
    AttributeValue, CapacityMode, Consistency, Filter, Item, KeyAttribute, KeyCondition,
    LocalIndex, Projection, QueryRequest, ScalarType, ScanRequest, SortCondition, TableSchema,
    TableStatus, WriteRequest,
};
use keytable_core::{Error, ServiceError};

use super::TableAccessLayer;
use crate::storage::InMemoryDataService;
use crate::wait::Backoff;

fn schema() -> TableSchema {
    TableSchema::new("Notes", KeyAttribute::new("UserId", ScalarType::String))
        .with_sort_key(KeyAttribute::new("NoteId", ScalarType::Number))
        .with_local_index(LocalIndex::new(
            "Favorite-LSI",
            KeyAttribute::new("Favorite", ScalarType::String),
            Projection::All,
        ))
}

fn note(user: &str, id: i64, favorite: &str) -> Item {
    Item::from([
        ("UserId".to_string(), AttributeValue::string(user)),
        ("NoteId".to_string(), AttributeValue::number(id)),
        ("Favorite".to_string(), AttributeValue::string(favorite)),
    ])
}

fn key(user: &str, id: i64) -> Item {
    Item::from([
        ("UserId".to_string(), AttributeValue::string(user)),
        ("NoteId".to_string(), AttributeValue::number(id)),
    ])
}

async fn active_layer() -> (InMemoryDataService, TableAccessLayer) {
    let service = InMemoryDataService::new();
    service
        .insert_active_table(schema(), CapacityMode::default())
        .await;
    let layer = TableAccessLayer::new(Arc::new(service.clone()), schema()).unwrap();
    (service, layer)
}

async fn albert_notes() -> (InMemoryDataService, TableAccessLayer) {
    let (service, layer) = active_layer().await;
    layer.put_item(note("Albert", 1, "No")).await.unwrap();
    layer.put_item(note("Albert", 2, "Yes")).await.unwrap();
    (service, layer)
}

fn albert() -> KeyCondition {
    KeyCondition::partition("UserId", AttributeValue::string("Albert"))
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn test_query_by_sort_key_condition() {
    let (_, layer) = albert_notes().await;
    let request = QueryRequest::new(
        albert().with_sort("NoteId", SortCondition::Gt(AttributeValue::number(1))),
        Consistency::Strong,
    );
    let output = layer.query(&request).await.unwrap();
    assert_eq!(output.items, vec![note("Albert", 2, "Yes")]);
}

#[tokio::test]
async fn test_query_local_index() {
    let (_, layer) = albert_notes().await;
    let request = QueryRequest::new(
        albert().with_sort("Favorite", SortCondition::Eq(AttributeValue::string("Yes"))),
        Consistency::Eventual,
    )
    .on_index("Favorite-LSI");
    let output = layer.query(&request).await.unwrap();
    assert_eq!(output.items, vec![note("Albert", 2, "Yes")]);
}

#[tokio::test]
async fn test_put_then_query_returns_exactly_that_item() {
    let (_, layer) = active_layer().await;
    layer.put_item(note("Albert", 7, "Yes")).await.unwrap();
    layer.put_item(note("Albert", 7, "Yes")).await.unwrap();

    let request = QueryRequest::new(
        albert().with_sort("NoteId", SortCondition::Eq(AttributeValue::number(7))),
        Consistency::Strong,
    );
    let output = layer.query(&request).await.unwrap();
    assert_eq!(output.count(), 1);
    assert_eq!(output.items[0], note("Albert", 7, "Yes"));
}

#[tokio::test]
async fn test_get_item_requires_exact_key() {
    let (_, layer) = albert_notes().await;
    let output = layer
        .get_item(key("Albert", 2), Consistency::Strong)
        .await
        .unwrap();
    assert_eq!(output.item, Some(note("Albert", 2, "Yes")));

    let err = layer
        .get_item(note("Albert", 2, "Yes"), Consistency::Strong)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
}

#[tokio::test]
async fn test_strong_read_costs_twice_eventual() {
    let (_, layer) = albert_notes().await;
    let eventual = QueryRequest::new(albert(), Consistency::Eventual).with_consumed_capacity();
    let strong = QueryRequest::new(albert(), Consistency::Strong).with_consumed_capacity();

    let eventual = layer.query(&eventual).await.unwrap().consumed_capacity.unwrap();
    let strong = layer.query(&strong).await.unwrap().consumed_capacity.unwrap();
    assert_eq!(strong, 2.0 * eventual);
}

#[tokio::test]
async fn test_capacity_reported_only_when_requested() {
    let (_, layer) = albert_notes().await;
    let output = layer
        .query(&QueryRequest::new(albert(), Consistency::Eventual))
        .await
        .unwrap();
    assert_eq!(output.consumed_capacity, None);
}

#[tokio::test]
async fn test_scan_filter_does_not_reduce_capacity() {
    let (_, layer) = albert_notes().await;
    let plain = ScanRequest::new(Consistency::Strong).with_consumed_capacity();
    let filtered = plain
        .clone()
        .with_filter(Filter::eq("Favorite", AttributeValue::string("Yes")));

    let plain = layer.scan(&plain).await.unwrap();
    let filtered = layer.scan(&filtered).await.unwrap();
    assert_eq!(plain.count(), 2);
    assert_eq!(filtered.count(), 1);
    assert_eq!(filtered.scanned_count, plain.scanned_count);
    assert_eq!(filtered.consumed_capacity, plain.consumed_capacity);
}

#[tokio::test]
async fn test_index_query_capacity_independent_of_table_size() {
    let (_, layer) = albert_notes().await;
    let request = QueryRequest::new(
        albert().with_sort("Favorite", SortCondition::Eq(AttributeValue::string("Yes"))),
        Consistency::Strong,
    )
    .on_index("Favorite-LSI")
    .with_consumed_capacity();
    let scan = ScanRequest::new(Consistency::Strong)
        .with_filter(Filter::eq("Favorite", AttributeValue::string("Yes")))
        .with_consumed_capacity();

    let before = layer.query(&request).await.unwrap().consumed_capacity;
    let scan_before = layer.scan(&scan).await.unwrap().consumed_capacity.unwrap();

    for id in 0..20 {
        let mut item = note("Bob", id, "Yes");
        item.insert("Body".to_string(), AttributeValue::string("x".repeat(2048)));
        layer.put_item(item).await.unwrap();
    }

    let after = layer.query(&request).await.unwrap().consumed_capacity;
    let scan_after = layer.scan(&scan).await.unwrap().consumed_capacity.unwrap();
    assert_eq!(before, after);
    assert!(scan_after > scan_before);
}

#[tokio::test]
async fn test_query_pages_can_be_rerun() {
    let (_, layer) = albert_notes().await;
    let request = QueryRequest::new(albert(), Consistency::Eventual).with_page_size(1);

    let first: Vec<_> = layer.query_pages(&request).try_collect().await.unwrap();
    let second: Vec<_> = layer.query_pages(&request).try_collect().await.unwrap();
    assert!(first.len() >= 2);
    assert_eq!(first, second);

    let output = layer.query(&request).await.unwrap();
    assert_eq!(output.count(), 2);
}

#[tokio::test]
async fn test_descending_query() {
    let (_, layer) = albert_notes().await;
    let request = QueryRequest::new(albert(), Consistency::Eventual).descending();
    let output = layer.query(&request).await.unwrap();
    assert_eq!(
        output.items,
        vec![note("Albert", 2, "Yes"), note("Albert", 1, "No")]
    );
}

#[tokio::test]
async fn test_unknown_index_is_schema_error() {
    let (service, layer) = albert_notes().await;
    let calls = service.calls().await;
    let request = QueryRequest::new(albert(), Consistency::Eventual).on_index("Missing-LSI");
    let err = layer.query(&request).await.unwrap_err();
    assert!(matches!(err, Error::Schema { .. }));

    let err = layer
        .scan(&ScanRequest::new(Consistency::Eventual).on_index("Missing-LSI"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Schema { .. }));
    assert_eq!(service.calls().await, calls);
}

#[tokio::test]
async fn test_query_rejects_bad_key_condition() {
    let (_, layer) = albert_notes().await;
    let wrong_sort = QueryRequest::new(
        albert().with_sort("Favorite", SortCondition::Eq(AttributeValue::string("Yes"))),
        Consistency::Eventual,
    );
    assert!(matches!(
        layer.query(&wrong_sort).await.unwrap_err(),
        Error::Schema { .. }
    ));

    let key_filter = QueryRequest::new(albert(), Consistency::Eventual)
        .with_filter(Filter::eq("NoteId", AttributeValue::number(1)));
    assert!(matches!(
        layer.query(&key_filter).await.unwrap_err(),
        Error::Schema { .. }
    ));
}

// ============================================================================
// Writes
// ============================================================================

#[tokio::test]
async fn test_put_item_validation() {
    let (service, layer) = active_layer().await;
    let calls = service.calls().await;

    let mut missing_sort = note("Albert", 1, "No");
    missing_sort.remove("NoteId");
    let err = layer.put_item(missing_sort).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    let mut mistyped = note("Albert", 1, "No");
    mistyped.insert("NoteId".to_string(), AttributeValue::string("one"));
    let err = layer.put_item(mistyped).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    assert_eq!(service.calls().await, calls);
}

#[tokio::test]
async fn test_batch_over_limit_rejected_before_remote() {
    let (service, layer) = active_layer().await;
    let calls = service.calls().await;

    let requests = (0..26)
        .map(|id| WriteRequest::put(note("Albert", id, "No")))
        .collect();
    let err = layer.batch_write(requests).await.unwrap_err();
    assert!(matches!(err, Error::Schema { .. }));
    assert_eq!(service.calls().await, calls);
}

#[tokio::test]
async fn test_batch_duplicates_rejected_before_remote() {
    let (service, layer) = active_layer().await;
    let calls = service.calls().await;

    let requests = vec![
        WriteRequest::put(note("Albert", 1, "No")),
        WriteRequest::delete(key("Albert", 1)),
    ];
    let err = layer.batch_write(requests).await.unwrap_err();
    assert!(matches!(err, Error::Schema { .. }));
    assert_eq!(service.calls().await, calls);
}

#[tokio::test]
async fn test_batch_keeps_keys_distinct_beyond_float_precision() {
    let (_, layer) = active_layer().await;
    let wide = |id: &str| {
        Item::from([
            ("UserId".to_string(), AttributeValue::string("Albert")),
            ("NoteId".to_string(), AttributeValue::number(id)),
        ])
    };

    let output = layer
        .batch_write(vec![
            WriteRequest::put(wide("12345678901234567890")),
            WriteRequest::put(wide("12345678901234567891")),
        ])
        .await
        .unwrap();
    assert!(output.is_complete());

    let stored = layer
        .query(&QueryRequest::new(albert(), Consistency::Strong))
        .await
        .unwrap();
    let ids: Vec<_> = stored
        .items
        .iter()
        .filter_map(|item| item.get("NoteId").and_then(AttributeValue::as_n))
        .collect();
    assert_eq!(ids, vec!["12345678901234567890", "12345678901234567891"]);
}

#[tokio::test]
async fn test_empty_batch_is_noop() {
    let (service, layer) = active_layer().await;
    let calls = service.calls().await;
    let output = layer.batch_write(Vec::new()).await.unwrap();
    assert!(output.is_complete());
    assert_eq!(service.calls().await, calls);
}

#[tokio::test]
async fn test_throttled_batch_returns_unprocessed() {
    let (service, layer) = active_layer().await;
    service.throttle_next_batch(1).await;

    let requests: Vec<_> = (1..=3)
        .map(|id| WriteRequest::put(note("Albert", id, "No")))
        .collect();
    let output = layer.batch_write(requests.clone()).await.unwrap();
    assert_eq!(output.unprocessed, vec![requests[2].clone()]);

    let stored = layer
        .query(&QueryRequest::new(albert(), Consistency::Strong))
        .await
        .unwrap();
    assert_eq!(stored.count(), 2);

    let retry = layer.batch_write(output.unprocessed).await.unwrap();
    assert!(retry.is_complete());
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_create_then_wait_active() {
    let service = InMemoryDataService::settling_after(2);
    let layer = TableAccessLayer::new(Arc::new(service), schema())
        .unwrap()
        .with_backoff(Backoff::new(Duration::from_millis(5), Duration::from_millis(20)));

    let status = layer.create_table(CapacityMode::OnDemand).await.unwrap();
    assert_eq!(status, TableStatus::Creating);

    let description = layer.wait_active(Duration::from_secs(5)).await.unwrap();
    assert_eq!(description.status, TableStatus::Active);
    assert_eq!(description.capacity_mode, CapacityMode::OnDemand);
}

#[tokio::test]
async fn test_wait_active_times_out_on_stuck_table() {
    let service = InMemoryDataService::never_settling();
    let layer = TableAccessLayer::new(Arc::new(service), schema()).unwrap();
    layer.create_table(CapacityMode::default()).await.unwrap();

    let started = Instant::now();
    let err = layer.wait_active(Duration::from_secs(1)).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(
        err,
        Error::Timeout {
            operation: "WaitActive",
            ..
        }
    ));
    assert!(elapsed >= Duration::from_secs(1), "gave up after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "waited {elapsed:?}");
}

#[tokio::test]
async fn test_wait_deleted_times_out_on_stuck_table() {
    let service = InMemoryDataService::never_settling();
    service
        .insert_active_table(schema(), CapacityMode::default())
        .await;
    let layer = TableAccessLayer::new(Arc::new(service.clone()), schema()).unwrap();
    assert_eq!(layer.delete_table().await.unwrap(), TableStatus::Deleting);

    let started = Instant::now();
    let err = layer.wait_deleted(Duration::from_secs(1)).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(
        err,
        Error::Timeout {
            operation: "WaitDeleted",
            ..
        }
    ));
    assert!(elapsed >= Duration::from_secs(1), "gave up after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "waited {elapsed:?}");
    assert_eq!(service.peek_status("Notes").await, Some(TableStatus::Deleting));
}

#[tokio::test]
async fn test_create_rejects_invalid_capacity() {
    let service = InMemoryDataService::new();
    let layer = TableAccessLayer::new(Arc::new(service.clone()), schema()).unwrap();
    let err = layer
        .create_table(CapacityMode::provisioned(0, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Schema { .. }));
    assert_eq!(service.calls().await, 0);
}

#[tokio::test]
async fn test_create_existing_table_is_remote_error() {
    let (_, layer) = active_layer().await;
    let err = layer.create_table(CapacityMode::default()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Remote {
            source: ServiceError::InUse(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_update_capacity_while_creating_is_remote_error() {
    let service = InMemoryDataService::never_settling();
    let layer = TableAccessLayer::new(Arc::new(service), schema()).unwrap();
    layer.create_table(CapacityMode::default()).await.unwrap();

    let err = layer
        .update_capacity(CapacityMode::OnDemand)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Remote {
            operation: "UpdateTable",
            ..
        }
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_update_capacity_on_active_table() {
    let (service, layer) = active_layer().await;
    let status = layer
        .update_capacity(CapacityMode::provisioned(5, 5))
        .await
        .unwrap();
    assert_eq!(status, TableStatus::Updating);
    assert_eq!(service.peek_status("Notes").await, Some(TableStatus::Updating));
}

#[tokio::test]
async fn test_operations_after_delete_are_table_gone() {
    let (service, layer) = albert_notes().await;
    let layer = layer.with_backoff(Backoff::new(
        Duration::from_millis(5),
        Duration::from_millis(20),
    ));
    assert_eq!(layer.delete_table().await.unwrap(), TableStatus::Deleting);
    layer.wait_deleted(Duration::from_secs(5)).await.unwrap();
    assert_eq!(layer.describe().await.unwrap(), None);

    let calls = service.calls().await;
    let err = layer.put_item(note("Albert", 3, "No")).await.unwrap_err();
    assert!(matches!(err, Error::TableGone { operation: "PutItem", .. }));

    let err = layer
        .query(&QueryRequest::new(albert(), Consistency::Eventual))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TableGone { operation: "Query", .. }));

    let err = layer
        .batch_write(vec![WriteRequest::delete(key("Albert", 1))])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TableGone { .. }));
    assert_eq!(service.calls().await, calls);
}

#[tokio::test]
async fn test_missing_remote_table_is_table_gone() {
    let layer =
        TableAccessLayer::new(Arc::new(InMemoryDataService::new()), schema()).unwrap();
    let err = layer.put_item(note("Albert", 1, "No")).await.unwrap_err();
    assert!(matches!(err, Error::TableGone { .. }));
}
