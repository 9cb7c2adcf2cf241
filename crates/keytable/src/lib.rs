//! Table access layer and credential broker for a hosted key-value store.
//!
//! The pure model (schemas, items, conditions, capacity arithmetic,
//! credentials and the error taxonomy) lives in `keytable_core`. This crate
//! adds the shell: the access layer, the broker, the bounded wait primitive
//! and the DynamoDB/STS backends next to their in-memory simulations.

pub mod access;
pub mod aws;
pub mod broker;
pub mod config;
pub mod entity;
pub mod identity;
pub mod storage;
pub mod wait;

pub use access::TableAccessLayer;
pub use broker::CredentialBroker;
pub use config::{AwsConfig, Config};
pub use entity::EntityTable;
pub use keytable_core::{Error, Result, ServiceError};
