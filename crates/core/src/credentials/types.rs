use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::validation::{validate_account_id, validate_duration, validate_role_name};

/// Fully qualified role identifier: `arn:aws:iam::<account>:role/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoleArn(String);

impl RoleArn {
    /// Validates both parts and builds the ARN.
    pub fn new(account_id: &str, role_name: &str) -> Result<Self> {
        validate_account_id(account_id)?;
        validate_role_name(role_name)?;
        Ok(Self(format!("arn:aws:iam::{account_id}:role/{role_name}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the broker sends to the identity service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleRequest {
    pub role_arn: RoleArn,
    pub session_name: String,
    pub duration: Option<Duration>,
}

impl AssumeRoleRequest {
    pub fn new(role_arn: RoleArn, session_name: impl Into<String>) -> Self {
        Self {
            role_arn,
            session_name: session_name.into(),
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Result<Self> {
        validate_duration(self.role_arn.as_str(), duration)?;
        self.duration = Some(duration);
        Ok(self)
    }
}

/// What the identity service returns for a granted session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// A time-bounded credential set.
///
/// Valid from `issued_at` (inclusive) until `expires_at` (exclusive). The
/// `Debug` output never contains the secret or the token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Credential {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    issued_at: DateTime<Utc>,
    #[serde(rename = "Expiration")]
    expires_at: DateTime<Utc>,
}

impl Credential {
    /// Builds a credential. Fails when the expiry is not after the issue time.
    pub fn new(
        session: SessionCredentials,
        issued_at: DateTime<Utc>,
    ) -> std::result::Result<Self, SessionCredentials> {
        if session.expiration <= issued_at {
            return Err(session);
        }
        Ok(Self {
            access_key_id: session.access_key_id,
            secret_access_key: session.secret_access_key,
            session_token: session.session_token,
            issued_at,
            expires_at: session.expiration,
        })
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.issued_at <= now && now < self.expires_at
    }

    /// Fails with [`Error::Authorization`] outside the validity window.
    pub fn ensure_valid(
        &self,
        operation: &'static str,
        resource: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if now < self.issued_at {
            return Err(Error::Authorization {
                operation,
                resource: resource.to_string(),
                message: format!("credential is not valid before {}", self.issued_at),
            });
        }
        if now >= self.expires_at {
            return Err(Error::Authorization {
                operation,
                resource: resource.to_string(),
                message: format!("credential expired at {}", self.expires_at),
            });
        }
        Ok(())
    }

    /// Reads a credentials document.
    pub fn from_json(resource: &str, json: &str) -> Result<Self> {
        let credential: Self = serde_json::from_str(json).map_err(|e| {
            Error::validation(resource, format!("malformed credentials document: {e}"))
        })?;
        if credential.expires_at <= credential.issued_at {
            return Err(Error::validation(
                resource,
                "credential expiry is not after its issue time",
            ));
        }
        Ok(credential)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
