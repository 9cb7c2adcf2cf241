use async_trait::async_trait;

use crate::error::ServiceError;

use super::types::{AssumeRoleRequest, SessionCredentials};

/// Remote identity service that grants temporary sessions for a role.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Requests a session for the role. One remote call, no retries.
    async fn assume_role(
        &self,
        request: &AssumeRoleRequest,
    ) -> Result<SessionCredentials, ServiceError>;
}
