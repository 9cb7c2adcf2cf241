//! Shared AWS SDK setup (Imperative Shell).

use std::fmt::Debug;
use std::time::SystemTime;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_dynamodb::config::Credentials;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use keytable_core::credentials::Credential;
use keytable_core::ServiceError;

use crate::config::AwsConfig;

/// Loads SDK settings for `config`.
///
/// With `credential` set, that credential is the only one the clients use;
/// otherwise the default provider chain applies.
pub async fn load_sdk_config(config: &AwsConfig, credential: Option<&Credential>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()));

    if let Some(endpoint) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    if let Some(credential) = credential {
        loader = loader.credentials_provider(Credentials::new(
            credential.access_key_id(),
            credential.secret_access_key(),
            Some(credential.session_token().to_string()),
            Some(SystemTime::from(credential.expires_at())),
            "keytable-broker",
        ));
    }

    loader.load().await
}

/// Classifies an SDK failure by the service error code, or as a transport
/// fault when the request never got a service response.
pub fn service_error<E, R>(err: SdkError<E, R>) -> ServiceError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    if let Some(service_err) = err.as_service_error() {
        return ServiceError::from_code(service_err.code(), service_err.message());
    }
    ServiceError::Transport(DisplayErrorContext(&err).to_string())
}
