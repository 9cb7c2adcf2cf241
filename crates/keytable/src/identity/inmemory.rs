//! Simulated identity service.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;

use keytable_core::credentials::{AssumeRoleRequest, Clock, IdentityService, SessionCredentials};
use keytable_core::ServiceError;

/// Grants sessions for an allow-list of role ARNs.
///
/// Sessions last the requested duration, or `default_lifetime`. The lifetime
/// may be set to zero or negative to simulate a misbehaving remote.
pub struct StaticIdentityService {
    allowed: HashSet<String>,
    default_lifetime: TimeDelta,
    clock: Arc<dyn Clock>,
    issued: AtomicU64,
}

impl StaticIdentityService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            allowed: HashSet::new(),
            default_lifetime: TimeDelta::hours(1),
            clock,
            issued: AtomicU64::new(0),
        }
    }

    /// Allows assuming `role_arn`.
    pub fn allow(mut self, role_arn: impl Into<String>) -> Self {
        self.allowed.insert(role_arn.into());
        self
    }

    pub fn with_default_lifetime(mut self, lifetime: TimeDelta) -> Self {
        self.default_lifetime = lifetime;
        self
    }

    /// Number of sessions granted so far.
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl IdentityService for StaticIdentityService {
    async fn assume_role(
        &self,
        request: &AssumeRoleRequest,
    ) -> Result<SessionCredentials, ServiceError> {
        if !self.allowed.contains(request.role_arn.as_str()) {
            return Err(ServiceError::AccessDenied(format!(
                "not authorized to perform sts:AssumeRole on resource: {}",
                request.role_arn
            )));
        }

        let lifetime = match request.duration {
            Some(duration) => TimeDelta::from_std(duration)
                .map_err(|e| ServiceError::Invalid(e.to_string()))?,
            None => self.default_lifetime,
        };
        let serial = self.issued.fetch_add(1, Ordering::Relaxed) + 1;

        Ok(SessionCredentials {
            access_key_id: format!("ASIASIMULATED{serial:07}"),
            secret_access_key: format!("simulated-secret-{serial}"),
            session_token: format!("simulated-token-{}-{serial}", request.session_name),
            expiration: self.clock.now() + lifetime,
        })
    }
}
