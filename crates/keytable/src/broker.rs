//! Credential broker: exchanges an account/role pair for a time-bounded
//! credential through an [`IdentityService`].

use std::sync::Arc;
use std::time::Duration;

use keytable_core::credentials::{
    AssumeRoleRequest, Clock, Credential, IdentityService, RoleArn, SystemClock,
};
use keytable_core::{Error, Result, ServiceError};

const OP: &str = "AssumeRole";

/// Obtains session credentials for a role.
///
/// The broker keeps nothing: each call returns a fresh credential and the
/// secret parts are never logged.
pub struct CredentialBroker<I> {
    identity: I,
    clock: Arc<dyn Clock>,
}

impl<I: IdentityService> CredentialBroker<I> {
    pub fn new(identity: I) -> Self {
        Self {
            identity,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Assumes `role_name` in `account_id` for the service's default lifetime.
    pub async fn assume_role(&self, account_id: &str, role_name: &str) -> Result<Credential> {
        self.assume_role_for(account_id, role_name, None).await
    }

    /// Assumes a role with an explicit session lifetime.
    ///
    /// Fails with [`Error::Validation`] on a malformed account id, role name
    /// or duration, with [`Error::Authorization`] when the caller may not
    /// assume the role, and with [`Error::Remote`] for anything else the
    /// identity service reports.
    pub async fn assume_role_for(
        &self,
        account_id: &str,
        role_name: &str,
        duration: Option<Duration>,
    ) -> Result<Credential> {
        let role_arn = RoleArn::new(account_id, role_name)?;
        let mut request = AssumeRoleRequest::new(role_arn, session_name());
        if let Some(duration) = duration {
            request = request.with_duration(duration)?;
        }
        let arn = request.role_arn.as_str();

        tracing::debug!(role_arn = %arn, session = %request.session_name, "assuming role");
        let issued_at = self.clock.now();
        let session = self
            .identity
            .assume_role(&request)
            .await
            .map_err(|e| Error::from_identity_service(OP, arn, e))?;

        let credential = Credential::new(session, issued_at).map_err(|session| Error::Remote {
            operation: OP,
            resource: arn.to_string(),
            source: ServiceError::Invalid(format!(
                "credential expires at {}, not after its issue time {issued_at}",
                session.expiration
            )),
        })?;

        tracing::info!(
            role_arn = %arn,
            access_key_id = %credential.access_key_id(),
            expires_at = %credential.expires_at(),
            "role assumed"
        );
        Ok(credential)
    }
}

fn session_name() -> String {
    format!("keytable-{}", uuid::Uuid::new_v4().simple())
}
