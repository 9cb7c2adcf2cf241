//! DynamoDB data service.
//!
//! Implements [`DataService`] with one SDK call per method. Retries and waits
//! belong to the access layer.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, LocalSecondaryIndex,
    ProvisionedThroughput, ReturnConsumedCapacity,
};
use aws_sdk_dynamodb::Client;

use keytable_core::credentials::Credential;
use keytable_core::table::{
    BatchWriteOutput, CapacityMode, Consistency, DataService, ExpressionContext, GetItemOutput,
    Item, KeyAttribute, Page, QueryRequest, ScanRequest, ServiceResult, TableDescription,
    TableSchema, TableStatus, WriteRequest,
};
use keytable_core::ServiceError;

use super::conversions::{
    capacity_units, from_sdk_item, from_sdk_items, from_sdk_key, from_sdk_write, projection,
    scalar_attribute_type, table_description, table_status, to_sdk_item, to_sdk_value,
    to_sdk_write, SdkItem,
};
use crate::aws::{load_sdk_config, service_error};
use crate::config::AwsConfig;

/// DynamoDB-backed data service.
#[derive(Debug, Clone)]
pub struct DynamoDbDataService {
    client: Client,
}

impl DynamoDbDataService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client for `config`. With a credential, every call is signed
    /// with it instead of the ambient identity.
    pub async fn connect(config: &AwsConfig, credential: Option<&Credential>) -> Self {
        let sdk_config = load_sdk_config(config, credential).await;
        let dynamodb_config = aws_sdk_dynamodb::config::Builder::from(&sdk_config).build();
        Self::new(Client::from_conf(dynamodb_config))
    }
}

fn invalid(err: impl std::fmt::Display) -> ServiceError {
    ServiceError::Invalid(err.to_string())
}

fn key_element(attribute: &KeyAttribute, key_type: KeyType) -> ServiceResult<KeySchemaElement> {
    KeySchemaElement::builder()
        .attribute_name(&attribute.name)
        .key_type(key_type)
        .build()
        .map_err(invalid)
}

fn throughput(capacity: CapacityMode) -> ServiceResult<(BillingMode, Option<ProvisionedThroughput>)> {
    match capacity {
        CapacityMode::Provisioned {
            read_capacity_units,
            write_capacity_units,
        } => {
            let throughput = ProvisionedThroughput::builder()
                .read_capacity_units(read_capacity_units)
                .write_capacity_units(write_capacity_units)
                .build()
                .map_err(invalid)?;
            Ok((BillingMode::Provisioned, Some(throughput)))
        }
        CapacityMode::OnDemand => Ok((BillingMode::PayPerRequest, None)),
    }
}

fn page_limit(page_size: Option<u32>) -> Option<i32> {
    page_size.map(|n| i32::try_from(n).unwrap_or(i32::MAX))
}

fn return_capacity(requested: bool) -> Option<ReturnConsumedCapacity> {
    requested.then_some(ReturnConsumedCapacity::Total)
}

/// Placeholder maps in SDK form, omitted when empty.
fn expression_maps(ctx: ExpressionContext) -> (Option<HashMap<String, String>>, Option<SdkItem>) {
    let names = (!ctx.names.is_empty()).then_some(ctx.names);
    let values = (!ctx.values.is_empty()).then(|| {
        ctx.values
            .into_iter()
            .map(|(placeholder, value)| (placeholder, to_sdk_value(value)))
            .collect()
    });
    (names, values)
}

fn scanned(count: i32) -> usize {
    usize::try_from(count).unwrap_or_default()
}

#[async_trait]
impl DataService for DynamoDbDataService {
    async fn create_table(
        &self,
        schema: &TableSchema,
        capacity: CapacityMode,
    ) -> ServiceResult<TableStatus> {
        let mut request = self.client.create_table().table_name(&schema.table_name);

        let mut defined = HashSet::new();
        let attributes = std::iter::once(&schema.partition_key)
            .chain(schema.sort_key.as_ref())
            .chain(schema.local_indexes.iter().map(|index| &index.sort_key));
        for attribute in attributes {
            if defined.insert(attribute.name.as_str()) {
                request = request.attribute_definitions(
                    AttributeDefinition::builder()
                        .attribute_name(&attribute.name)
                        .attribute_type(scalar_attribute_type(attribute.attribute_type))
                        .build()
                        .map_err(invalid)?,
                );
            }
        }

        request = request.key_schema(key_element(&schema.partition_key, KeyType::Hash)?);
        if let Some(sort_key) = &schema.sort_key {
            request = request.key_schema(key_element(sort_key, KeyType::Range)?);
        }

        for index in &schema.local_indexes {
            request = request.local_secondary_indexes(
                LocalSecondaryIndex::builder()
                    .index_name(&index.name)
                    .key_schema(key_element(&schema.partition_key, KeyType::Hash)?)
                    .key_schema(key_element(&index.sort_key, KeyType::Range)?)
                    .projection(projection(&index.projection))
                    .build()
                    .map_err(invalid)?,
            );
        }

        let (billing_mode, provisioned) = throughput(capacity)?;
        let output = request
            .billing_mode(billing_mode)
            .set_provisioned_throughput(provisioned)
            .send()
            .await
            .map_err(service_error)?;

        table_status(
            output
                .table_description()
                .and_then(|table| table.table_status()),
        )
    }

    async fn describe_table(&self, table: &str) -> ServiceResult<Option<TableDescription>> {
        let output = match self.client.describe_table().table_name(table).send().await {
            Ok(output) => output,
            Err(err) => {
                return match service_error(err) {
                    ServiceError::NotFound(_) => Ok(None),
                    other => Err(other),
                }
            }
        };

        output.table().map(table_description).transpose()
    }

    async fn put_item(&self, table: &str, item: Item) -> ServiceResult<()> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(to_sdk_item(item)))
            .send()
            .await
            .map_err(service_error)?;
        Ok(())
    }

    async fn get_item(
        &self,
        table: &str,
        key: Item,
        consistency: Consistency,
    ) -> ServiceResult<GetItemOutput> {
        let output = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(to_sdk_item(key)))
            .consistent_read(consistency.is_strong())
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await
            .map_err(service_error)?;

        Ok(GetItemOutput {
            consumed_capacity: capacity_units(output.consumed_capacity.iter()),
            item: output.item.map(from_sdk_item).transpose()?,
        })
    }

    async fn query(
        &self,
        table: &str,
        request: &QueryRequest,
        exclusive_start_key: Option<Item>,
    ) -> ServiceResult<Page> {
        let mut ctx = ExpressionContext::new();
        let key_condition = ctx.key_condition(&request.key_condition);
        let filter = request.filter.as_ref().map(|filter| ctx.filter(filter));
        let (names, values) = expression_maps(ctx);

        let output = self
            .client
            .query()
            .table_name(table)
            .set_index_name(request.index_name.clone())
            .key_condition_expression(key_condition)
            .set_filter_expression(filter)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .consistent_read(request.consistency.is_strong())
            .scan_index_forward(request.scan_forward)
            .set_limit(page_limit(request.page_size))
            .set_exclusive_start_key(exclusive_start_key.map(to_sdk_item))
            .set_return_consumed_capacity(return_capacity(request.return_consumed_capacity))
            .send()
            .await
            .map_err(service_error)?;

        Ok(Page {
            scanned_count: scanned(output.scanned_count),
            consumed_capacity: capacity_units(output.consumed_capacity.iter()),
            items: from_sdk_items(output.items)?,
            last_evaluated_key: from_sdk_key(output.last_evaluated_key)?,
        })
    }

    async fn scan(
        &self,
        table: &str,
        request: &ScanRequest,
        exclusive_start_key: Option<Item>,
    ) -> ServiceResult<Page> {
        let mut ctx = ExpressionContext::new();
        let filter = request.filter.as_ref().map(|filter| ctx.filter(filter));
        let (names, values) = expression_maps(ctx);

        let output = self
            .client
            .scan()
            .table_name(table)
            .set_index_name(request.index_name.clone())
            .set_filter_expression(filter)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .consistent_read(request.consistency.is_strong())
            .set_limit(page_limit(request.page_size))
            .set_exclusive_start_key(exclusive_start_key.map(to_sdk_item))
            .set_return_consumed_capacity(return_capacity(request.return_consumed_capacity))
            .send()
            .await
            .map_err(service_error)?;

        Ok(Page {
            scanned_count: scanned(output.scanned_count),
            consumed_capacity: capacity_units(output.consumed_capacity.iter()),
            items: from_sdk_items(output.items)?,
            last_evaluated_key: from_sdk_key(output.last_evaluated_key)?,
        })
    }

    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> ServiceResult<BatchWriteOutput> {
        let requests = requests
            .into_iter()
            .map(to_sdk_write)
            .collect::<ServiceResult<Vec<_>>>()?;

        let output = self
            .client
            .batch_write_item()
            .request_items(table, requests)
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await
            .map_err(service_error)?;

        let unprocessed = output
            .unprocessed_items
            .and_then(|mut tables| tables.remove(table))
            .unwrap_or_default()
            .into_iter()
            .map(from_sdk_write)
            .collect::<ServiceResult<Vec<_>>>()?;

        Ok(BatchWriteOutput {
            unprocessed,
            consumed_capacity: capacity_units(output.consumed_capacity.iter().flatten()),
        })
    }

    async fn update_table(&self, table: &str, capacity: CapacityMode) -> ServiceResult<TableStatus> {
        let (billing_mode, provisioned) = throughput(capacity)?;
        let output = self
            .client
            .update_table()
            .table_name(table)
            .billing_mode(billing_mode)
            .set_provisioned_throughput(provisioned)
            .send()
            .await
            .map_err(service_error)?;

        table_status(
            output
                .table_description()
                .and_then(|table| table.table_status()),
        )
    }

    async fn delete_table(&self, table: &str) -> ServiceResult<TableStatus> {
        let output = self
            .client
            .delete_table()
            .table_name(table)
            .send()
            .await
            .map_err(service_error)?;

        table_status(
            output
                .table_description()
                .and_then(|table| table.table_status()),
        )
    }
}
