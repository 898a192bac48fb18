use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ChainError;

pub mod credentials;
pub mod identity;
pub mod roles;
pub mod session;
pub mod sts;

/// AWS credentials structure
///
/// Long-term identity keys carry no session. Temporary credentials always
/// carry both a session token and its expiration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session: Option<Session>,
}

/// Session token of temporary credentials, with its expiration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub expiration: DateTime<Utc>,
}

impl Credentials {
    pub fn long_term(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session: None,
        }
    }

    pub fn temporary(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
        expiration: DateTime<Utc>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session: Some(Session {
                token: session_token.into(),
                expiration,
            }),
        }
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.session.as_ref().map(|s| s.expiration)
    }

    /// Drop any session, keeping only the key pair
    pub fn into_long_term(self) -> Self {
        Self {
            session: None,
            ..self
        }
    }
}

/// Resolves named profiles to their long-term credentials
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn resolve(&self, profile: &str) -> Result<Credentials, ChainError>;
}

/// The two AWS STS operations the chain consumes
#[async_trait]
pub trait SecurityTokenService: Send + Sync {
    /// GetSessionToken with an MFA device
    async fn get_session_token(
        &self,
        identity: &Credentials,
        mfa_serial: &str,
        token_code: &str,
    ) -> Result<Credentials, ChainError>;

    /// AssumeRole, called with already-temporary credentials
    async fn assume_role(
        &self,
        caller: &Credentials,
        role_arn: &str,
        session_name: &str,
        duration_seconds: i32,
    ) -> Result<Credentials, ChainError>;
}
