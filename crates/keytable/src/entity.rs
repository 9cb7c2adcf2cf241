use std::marker::PhantomData;

use keytable_core::table::{Consistency, Entity, Item, QueryRequest, ScanRequest};
use keytable_core::Result;

use crate::access::TableAccessLayer;

/// Typed view over a [`TableAccessLayer`] for one [`Entity`] type.
///
/// Construction checks that the entity's declared key matches the table key,
/// so a mismatched mapping fails before any item is written.
pub struct EntityTable<T> {
    layer: TableAccessLayer,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> EntityTable<T> {
    pub fn new(layer: TableAccessLayer) -> Result<Self> {
        T::key().check_against(T::NAME, layer.schema())?;
        Ok(Self {
            layer,
            _entity: PhantomData,
        })
    }

    pub fn layer(&self) -> &TableAccessLayer {
        &self.layer
    }

    pub async fn put(&self, entity: &T) -> Result<()> {
        self.layer.put_item(entity.to_item()).await
    }

    pub async fn get(&self, key: Item, consistency: Consistency) -> Result<Option<T>> {
        let output = self.layer.get_item(key, consistency).await?;
        output.item.as_ref().map(T::from_item).transpose()
    }

    pub async fn query(&self, request: &QueryRequest) -> Result<Vec<T>> {
        let output = self.layer.query(request).await?;
        output.items.iter().map(T::from_item).collect()
    }

    pub async fn scan(&self, request: &ScanRequest) -> Result<Vec<T>> {
        let output = self.layer.scan(request).await?;
        output.items.iter().map(T::from_item).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use keytable_core::table::{
        get_number, get_optional_string, get_string, AttributeValue, CapacityMode, EntityKey,
        KeyAttribute, KeyCondition, ScalarType, TableSchema,
    };
    use keytable_core::Error;

    use super::*;
    use crate::storage::InMemoryDataService;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        user_id: String,
        note_id: u32,
        title: String,
        favorite: Option<String>,
    }

    impl Entity for Note {
        const NAME: &'static str = "Note";

        fn key() -> EntityKey {
            EntityKey {
                partition_key: KeyAttribute::new("UserId", ScalarType::String),
                sort_key: Some(KeyAttribute::new("NoteId", ScalarType::Number)),
            }
        }

        fn to_item(&self) -> Item {
            let mut item = HashMap::from([
                ("UserId".to_string(), AttributeValue::string(&self.user_id)),
                ("NoteId".to_string(), AttributeValue::number(self.note_id)),
                ("Title".to_string(), AttributeValue::string(&self.title)),
            ]);
            if let Some(favorite) = &self.favorite {
                item.insert("Favorite".to_string(), AttributeValue::string(favorite));
            }
            item
        }

        fn from_item(item: &Item) -> Result<Self> {
            Ok(Self {
                user_id: get_string(item, "UserId")?,
                note_id: get_number(item, "NoteId")?,
                title: get_string(item, "Title")?,
                favorite: get_optional_string(item, "Favorite")?,
            })
        }
    }

    fn schema() -> TableSchema {
        TableSchema::new("Notes", KeyAttribute::new("UserId", ScalarType::String))
            .with_sort_key(KeyAttribute::new("NoteId", ScalarType::Number))
    }

    async fn notes() -> EntityTable<Note> {
        let service = InMemoryDataService::new();
        service
            .insert_active_table(schema(), CapacityMode::default())
            .await;
        EntityTable::new(TableAccessLayer::new(Arc::new(service), schema()).unwrap()).unwrap()
    }

    fn note(note_id: u32, favorite: Option<&str>) -> Note {
        Note {
            user_id: "Albert".to_string(),
            note_id,
            title: format!("note {note_id}"),
            favorite: favorite.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let table = notes().await;
        let expected = note(1, Some("Yes"));
        table.put(&expected).await.unwrap();

        let key = HashMap::from([
            ("UserId".to_string(), AttributeValue::string("Albert")),
            ("NoteId".to_string(), AttributeValue::number(1)),
        ]);
        let found = table.get(key, Consistency::Strong).await.unwrap();
        assert_eq!(found, Some(expected));
    }

    #[tokio::test]
    async fn test_query_returns_typed_entities() {
        let table = notes().await;
        table.put(&note(1, None)).await.unwrap();
        table.put(&note(2, Some("Yes"))).await.unwrap();

        let request = QueryRequest::new(
            KeyCondition::partition("UserId", AttributeValue::string("Albert")),
            Consistency::Eventual,
        );
        let found = table.query(&request).await.unwrap();
        assert_eq!(found, vec![note(1, None), note(2, Some("Yes"))]);

        let found = table.scan(&ScanRequest::new(Consistency::Eventual)).await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn test_mismatched_key_is_schema_error() {
        let other = TableSchema::new("Notes", KeyAttribute::new("UserId", ScalarType::String));
        let layer = TableAccessLayer::new(Arc::new(InMemoryDataService::new()), other).unwrap();
        let err = EntityTable::<Note>::new(layer).err().unwrap();
        assert!(matches!(err, Error::Schema { .. }));
    }
}
