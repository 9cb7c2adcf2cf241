//! Data-service backends.
//!
//! - [`dynamodb`]: the hosted service through `aws-sdk-dynamodb`.
//! - [`inmemory`]: a simulated remote for tests and offline demos. It keeps
//!   the remote's observable behaviour: lifecycle transitions settle over
//!   several describe polls, reads paginate and report capacity, and batch
//!   entries can be declined.

pub mod dynamodb;
pub mod inmemory;

pub use dynamodb::DynamoDbDataService;
pub use inmemory::InMemoryDataService;
