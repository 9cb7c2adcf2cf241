//! DynamoDB storage backend.
//!
//! Implements [`keytable_core::table::DataService`] using `aws-sdk-dynamodb`.

mod conversions;
mod service;

pub use service::DynamoDbDataService;
