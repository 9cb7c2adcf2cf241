//! DynamoDB attribute and shape conversions.
//!
//! Pure functions between the SDK types and `keytable_core::table` types.
//! These are testable in isolation without DynamoDB access.

use std::collections::HashMap;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{
    self as sdk, AttributeValue as SdkValue, ConsumedCapacity, ScalarAttributeType,
};
use keytable_core::table::{
    AttributeValue, CapacityMode, Item, Projection, ScalarType, TableDescription, TableStatus,
    WriteRequest,
};
use keytable_core::ServiceError;

pub type SdkItem = HashMap<String, SdkValue>;

// ============================================================================
// Attribute values
// ============================================================================

pub fn to_sdk_value(value: AttributeValue) -> SdkValue {
    match value {
        AttributeValue::S(s) => SdkValue::S(s),
        AttributeValue::N(n) => SdkValue::N(n),
        AttributeValue::B(b) => SdkValue::B(Blob::new(b)),
        AttributeValue::Bool(b) => SdkValue::Bool(b),
        AttributeValue::Null(n) => SdkValue::Null(n),
        AttributeValue::L(values) => SdkValue::L(values.into_iter().map(to_sdk_value).collect()),
        AttributeValue::M(map) => SdkValue::M(to_sdk_item(map)),
        AttributeValue::Ss(values) => SdkValue::Ss(values),
        AttributeValue::Ns(values) => SdkValue::Ns(values),
        AttributeValue::Bs(values) => SdkValue::Bs(values.into_iter().map(Blob::new).collect()),
    }
}

pub fn from_sdk_value(value: SdkValue) -> Result<AttributeValue, ServiceError> {
    Ok(match value {
        SdkValue::S(s) => AttributeValue::S(s),
        SdkValue::N(n) => AttributeValue::N(n),
        SdkValue::B(b) => AttributeValue::B(b.into_inner()),
        SdkValue::Bool(b) => AttributeValue::Bool(b),
        SdkValue::Null(n) => AttributeValue::Null(n),
        SdkValue::L(values) => AttributeValue::L(
            values
                .into_iter()
                .map(from_sdk_value)
                .collect::<Result<_, _>>()?,
        ),
        SdkValue::M(map) => AttributeValue::M(from_sdk_item(map)?),
        SdkValue::Ss(values) => AttributeValue::Ss(values),
        SdkValue::Ns(values) => AttributeValue::Ns(values),
        SdkValue::Bs(values) => {
            AttributeValue::Bs(values.into_iter().map(Blob::into_inner).collect())
        }
        other => {
            return Err(ServiceError::Invalid(format!(
                "unsupported attribute value type: {other:?}"
            )))
        }
    })
}

pub fn to_sdk_item(item: Item) -> SdkItem {
    item.into_iter()
        .map(|(name, value)| (name, to_sdk_value(value)))
        .collect()
}

pub fn from_sdk_item(item: SdkItem) -> Result<Item, ServiceError> {
    item.into_iter()
        .map(|(name, value)| Ok((name, from_sdk_value(value)?)))
        .collect()
}

pub fn from_sdk_items(items: Option<Vec<SdkItem>>) -> Result<Vec<Item>, ServiceError> {
    items
        .unwrap_or_default()
        .into_iter()
        .map(from_sdk_item)
        .collect()
}

/// SDK maps come back empty rather than absent in a few responses.
pub fn from_sdk_key(key: Option<SdkItem>) -> Result<Option<Item>, ServiceError> {
    match key {
        Some(key) if !key.is_empty() => Ok(Some(from_sdk_item(key)?)),
        _ => Ok(None),
    }
}

// ============================================================================
// Schema and table shapes
// ============================================================================

pub fn scalar_attribute_type(attribute_type: ScalarType) -> ScalarAttributeType {
    match attribute_type {
        ScalarType::String => ScalarAttributeType::S,
        ScalarType::Number => ScalarAttributeType::N,
        ScalarType::Binary => ScalarAttributeType::B,
    }
}

pub fn projection(projection: &Projection) -> sdk::Projection {
    match projection {
        Projection::All => sdk::Projection::builder()
            .projection_type(sdk::ProjectionType::All)
            .build(),
        Projection::KeysOnly => sdk::Projection::builder()
            .projection_type(sdk::ProjectionType::KeysOnly)
            .build(),
        Projection::Include(attributes) => sdk::Projection::builder()
            .projection_type(sdk::ProjectionType::Include)
            .set_non_key_attributes(Some(attributes.clone()))
            .build(),
    }
}

pub fn table_status(status: Option<&sdk::TableStatus>) -> Result<TableStatus, ServiceError> {
    let raw = status.map(sdk::TableStatus::as_str).unwrap_or("<missing>");
    TableStatus::parse(raw)
        .ok_or_else(|| ServiceError::Invalid(format!("unexpected table status '{raw}'")))
}

pub fn table_description(table: &sdk::TableDescription) -> Result<TableDescription, ServiceError> {
    let on_demand = table
        .billing_mode_summary()
        .and_then(|summary| summary.billing_mode())
        .is_some_and(|mode| *mode == sdk::BillingMode::PayPerRequest);

    let capacity_mode = match (on_demand, table.provisioned_throughput()) {
        (false, Some(throughput)) => CapacityMode::provisioned(
            throughput.read_capacity_units().unwrap_or_default(),
            throughput.write_capacity_units().unwrap_or_default(),
        ),
        _ => CapacityMode::OnDemand,
    };

    Ok(TableDescription {
        table_name: table.table_name().unwrap_or_default().to_string(),
        status: table_status(table.table_status())?,
        capacity_mode,
        item_count: table
            .item_count()
            .and_then(|count| u64::try_from(count).ok())
            .unwrap_or_default(),
    })
}

/// Total units across the consumed-capacity entries of a response.
pub fn capacity_units<'a>(
    consumed: impl IntoIterator<Item = &'a ConsumedCapacity>,
) -> Option<f64> {
    consumed
        .into_iter()
        .filter_map(ConsumedCapacity::capacity_units)
        .reduce(|total, units| total + units)
}

// ============================================================================
// Batch writes
// ============================================================================

pub fn to_sdk_write(request: WriteRequest) -> Result<sdk::WriteRequest, ServiceError> {
    let built = match request {
        WriteRequest::Put { item } => {
            let put = sdk::PutRequest::builder()
                .set_item(Some(to_sdk_item(item)))
                .build()
                .map_err(|e| ServiceError::Invalid(e.to_string()))?;
            sdk::WriteRequest::builder().put_request(put).build()
        }
        WriteRequest::Delete { key } => {
            let delete = sdk::DeleteRequest::builder()
                .set_key(Some(to_sdk_item(key)))
                .build()
                .map_err(|e| ServiceError::Invalid(e.to_string()))?;
            sdk::WriteRequest::builder().delete_request(delete).build()
        }
    };
    Ok(built)
}

pub fn from_sdk_write(request: sdk::WriteRequest) -> Result<WriteRequest, ServiceError> {
    if let Some(put) = request.put_request {
        return Ok(WriteRequest::put(from_sdk_item(put.item)?));
    }
    if let Some(delete) = request.delete_request {
        return Ok(WriteRequest::delete(from_sdk_item(delete.key)?));
    }
    Err(ServiceError::Invalid(
        "unprocessed write request carried neither a put nor a delete".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note() -> Item {
        HashMap::from([
            ("UserId".to_string(), AttributeValue::string("Albert")),
            ("NoteId".to_string(), AttributeValue::number(2)),
            ("Body".to_string(), AttributeValue::B(vec![0, 1, 2])),
            (
                "Tags".to_string(),
                AttributeValue::L(vec![AttributeValue::Bool(true), AttributeValue::Null(true)]),
            ),
        ])
    }

    #[test]
    fn test_item_survives_sdk_conversion() {
        let item = note();
        let sdk_item = to_sdk_item(item.clone());
        assert_eq!(sdk_item["UserId"], SdkValue::S("Albert".to_string()));
        assert_eq!(sdk_item["NoteId"], SdkValue::N("2".to_string()));
        assert_eq!(from_sdk_item(sdk_item).unwrap(), item);
    }

    #[test]
    fn test_empty_last_evaluated_key_is_none() {
        assert_eq!(from_sdk_key(Some(HashMap::new())).unwrap(), None);
        assert_eq!(from_sdk_key(None).unwrap(), None);
    }

    #[test]
    fn test_table_status_parse() {
        assert_eq!(
            table_status(Some(&sdk::TableStatus::Active)).unwrap(),
            TableStatus::Active
        );
        assert!(table_status(Some(&sdk::TableStatus::Archived)).is_err());
        assert!(table_status(None).is_err());
    }

    #[test]
    fn test_include_projection_carries_attributes() {
        let rendered = projection(&Projection::Include(vec!["Title".to_string()]));
        assert_eq!(
            rendered.projection_type(),
            Some(&sdk::ProjectionType::Include)
        );
        assert_eq!(rendered.non_key_attributes(), ["Title".to_string()]);
    }

    #[test]
    fn test_write_request_round_trip() {
        let key: Item = HashMap::from([
            ("UserId".to_string(), AttributeValue::string("Albert")),
            ("NoteId".to_string(), AttributeValue::number(1)),
        ]);
        let sdk_request = to_sdk_write(WriteRequest::delete(key.clone())).unwrap();
        assert!(sdk_request.delete_request().is_some());
        assert_eq!(
            from_sdk_write(sdk_request).unwrap(),
            WriteRequest::delete(key)
        );
    }

    #[test]
    fn test_capacity_units_sum() {
        let entries = [
            ConsumedCapacity::builder().capacity_units(1.5).build(),
            ConsumedCapacity::builder().build(),
            ConsumedCapacity::builder().capacity_units(0.5).build(),
        ];
        assert_eq!(capacity_units(&entries), Some(2.0));
        assert_eq!(capacity_units(&Vec::<ConsumedCapacity>::new()), None);
    }
}
