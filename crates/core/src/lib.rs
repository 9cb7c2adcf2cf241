//! Core types for keytable.
//!
//! Everything in this crate is pure: schema modelling, item validation,
//! condition evaluation, expression rendering, capacity arithmetic and the
//! credential value type. Remote calls live behind the [`table::DataService`]
//! and [`credentials::IdentityService`] traits, implemented by the `keytable`
//! crate.

pub mod credentials;
pub mod error;
pub mod table;

pub use error::{Error, Result, ServiceError};
