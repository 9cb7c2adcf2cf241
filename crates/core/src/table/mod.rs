mod capacity;
mod condition;
mod expression;
mod item;
mod mapping;
mod number;
mod requests;
mod schema;
mod traits;
mod types;

pub use capacity::{read_units, read_units_for, write_units, READ_UNIT_BYTES, WRITE_UNIT_BYTES};
pub use condition::{Comparator, Filter, KeyCondition, SortCondition};
pub use expression::ExpressionContext;
pub use item::{compare_values, item_size, AttributeValue, Item, ScalarKey, MAX_ITEM_SIZE_BYTES};
pub use mapping::{
    get_bool, get_number, get_optional_string, get_string, Entity, EntityKey,
};
pub use number::{Number, MAX_PRECISION};
pub use requests::{
    BatchPayload, BatchWriteOutput, GetItemOutput, Page, QueryOutput, QueryRequest, ReadOutput,
    ScanOutput, ScanRequest, WriteRequest, MAX_BATCH_WRITE_REQUESTS,
};
pub use schema::{
    KeyAttribute, KeySchema, LocalIndex, PrimaryKey, Projection, ScalarType, TableSchema,
    MAX_LOCAL_INDEXES,
};
pub use traits::{DataService, ServiceResult};
pub use types::{CapacityMode, Consistency, TableDescription, TableStatus};
