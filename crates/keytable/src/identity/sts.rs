//! AWS STS identity service.

use async_trait::async_trait;
use aws_sdk_sts::Client;
use chrono::{DateTime, Utc};

use keytable_core::credentials::{AssumeRoleRequest, IdentityService, SessionCredentials};
use keytable_core::ServiceError;

use crate::aws::{load_sdk_config, service_error};
use crate::config::AwsConfig;

/// Identity service backed by `sts:AssumeRole`, called with the ambient
/// identity of the process.
#[derive(Debug, Clone)]
pub struct StsIdentityService {
    client: Client,
}

impl StsIdentityService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from the default provider chain.
    pub async fn connect(config: &AwsConfig) -> Self {
        let sdk_config = load_sdk_config(config, None).await;
        Self::new(Client::new(&sdk_config))
    }
}

#[async_trait]
impl IdentityService for StsIdentityService {
    async fn assume_role(
        &self,
        request: &AssumeRoleRequest,
    ) -> Result<SessionCredentials, ServiceError> {
        let duration_seconds = request
            .duration
            .map(|d| i32::try_from(d.as_secs()))
            .transpose()
            .map_err(|e| ServiceError::Invalid(e.to_string()))?;

        let output = self
            .client
            .assume_role()
            .role_arn(request.role_arn.as_str())
            .role_session_name(&request.session_name)
            .set_duration_seconds(duration_seconds)
            .send()
            .await
            .map_err(service_error)?;

        let credentials = output.credentials().ok_or_else(|| {
            ServiceError::Transport("AssumeRole response carried no credentials".to_string())
        })?;
        let expiration = credentials.expiration();
        let expiration =
            DateTime::<Utc>::from_timestamp(expiration.secs(), expiration.subsec_nanos())
                .ok_or_else(|| {
                    ServiceError::Transport(format!(
                        "AssumeRole returned an unrepresentable expiry ({} s)",
                        expiration.secs()
                    ))
                })?;

        Ok(SessionCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
            expiration,
        })
    }
}
