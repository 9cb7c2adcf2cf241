//! Identity-service backends.

mod inmemory;
mod sts;

pub use inmemory::StaticIdentityService;
pub use sts::StsIdentityService;
