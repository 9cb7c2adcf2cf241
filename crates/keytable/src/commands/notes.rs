//! The notes table the commands operate on.

use keytable_core::table::{
    AttributeValue, BatchPayload, Item, KeyAttribute, LocalIndex, Projection, ScalarType,
    TableSchema, WriteRequest,
};

pub const FAVORITE_INDEX: &str = "Favorite-LSI";

/// `UserId` (S) / `NoteId` (N) with a local index on `Favorite` (S).
pub fn schema(table_name: &str) -> TableSchema {
    TableSchema::new(table_name, KeyAttribute::new("UserId", ScalarType::String))
        .with_sort_key(KeyAttribute::new("NoteId", ScalarType::Number))
        .with_local_index(LocalIndex::new(
            FAVORITE_INDEX,
            KeyAttribute::new("Favorite", ScalarType::String),
            Projection::All,
        ))
}

pub fn note(user_id: &str, note_id: u32, favorite: &str, body: &str) -> Item {
    Item::from([
        ("UserId".to_string(), AttributeValue::string(user_id)),
        ("NoteId".to_string(), AttributeValue::number(note_id)),
        ("Favorite".to_string(), AttributeValue::string(favorite)),
        ("Body".to_string(), AttributeValue::string(body)),
    ])
}

pub fn samples() -> Vec<Item> {
    vec![
        note("Albert", 1, "No", "Buy milk"),
        note("Albert", 2, "Yes", "Call the bank"),
        note("Albert", 3, "No", "Renew passport"),
        note("Marie", 1, "Yes", "Measure the sample"),
        note("Marie", 2, "No", "Order reagents"),
    ]
}

/// Sample notes as a batch-write payload for `table_name`.
pub fn sample_payload(table_name: &str) -> BatchPayload {
    let requests = samples().into_iter().map(WriteRequest::put).collect();
    BatchPayload([(table_name.to_string(), requests)].into_iter().collect())
}

/// One-line rendering of an item for terminal output.
pub fn describe(item: &Item) -> String {
    let text = |name: &str| {
        item.get(name)
            .and_then(|v| v.as_s().or_else(|| v.as_n()))
            .unwrap_or("-")
            .to_string()
    };
    format!(
        "{}#{} favorite={} body={}",
        text("UserId"),
        text("NoteId"),
        text("Favorite"),
        text("Body")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_satisfy_schema() {
        let schema = schema("Notes");
        schema.validate().unwrap();
        for item in samples() {
            schema.validate_item(&item).unwrap();
        }
    }

    #[test]
    fn test_sample_payload_targets_table() {
        let payload = sample_payload("Notes");
        assert_eq!(payload.requests_for("Notes").len(), samples().len());
        assert!(payload.requests_for("Other").is_empty());
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            describe(&note("Albert", 2, "Yes", "Call the bank")),
            "Albert#2 favorite=Yes body=Call the bank"
        );
    }
}
