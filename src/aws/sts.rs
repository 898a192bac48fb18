use std::time::SystemTime;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sts::{
    Client as StsClient,
    config::{Builder as StsConfigBuilder, Credentials as SdkCredentials},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
};
use aws_smithy_types::DateTime as SmithyDateTime;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{Credentials, SecurityTokenService};
use crate::{
    constants::{CREDENTIALS_PROVIDER_NAME, DEFAULT_AWS_REGION},
    error::{ChainError, Stage},
};

/// STS error codes meaning the caller was refused rather than the request
/// failing in transit
const ACCESS_DENIED_CODES: &[&str] = &["AccessDenied", "InvalidClientTokenId", "ExpiredToken"];

/// STS error codes meaning the request itself was malformed
const INVALID_REQUEST_CODES: &[&str] = &["ValidationError", "MalformedPolicyDocument"];

/// AWS STS backed by the Rust SDK. Each call signs with the credentials it
/// is given, not with the default provider chain.
#[derive(Debug, Clone)]
pub struct StsService {
    sdk_config: SdkConfig,
}

impl StsService {
    /// Load shared SDK settings (region, retry, timeouts)
    /// Region priority: explicit -> ENV vars -> profile -> DEFAULT_AWS_REGION
    pub async fn load(profile: &str, region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).profile_name(profile);
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let loaded = loader.load().await;

        let sdk_config = match loaded.region() {
            Some(region) => {
                info!("Using region: {}", region);
                loaded
            }
            None => {
                info!(
                    "No region configured, using default {} for STS",
                    DEFAULT_AWS_REGION
                );
                loaded
                    .into_builder()
                    .region(Region::new(DEFAULT_AWS_REGION))
                    .build()
            }
        };

        Self { sdk_config }
    }

    fn client_for(&self, creds: &Credentials) -> StsClient {
        let expiry = creds.expiration().map(SystemTime::from);
        let provider = SdkCredentials::new(
            creds.access_key_id.clone(),
            creds.secret_access_key.clone(),
            creds.session_token().map(str::to_string),
            expiry,
            CREDENTIALS_PROVIDER_NAME,
        );

        let config = StsConfigBuilder::from(&self.sdk_config)
            .credentials_provider(provider)
            .build();
        StsClient::from_conf(config)
    }
}

#[async_trait]
impl SecurityTokenService for StsService {
    async fn get_session_token(
        &self,
        identity: &Credentials,
        mfa_serial: &str,
        token_code: &str,
    ) -> Result<Credentials, ChainError> {
        info!("Calling AWS STS GetSessionToken");
        debug!("MFA serial: {}", mfa_serial);

        let response = self
            .client_for(identity)
            .get_session_token()
            .serial_number(mfa_serial)
            .token_code(token_code)
            .send()
            .await
            .map_err(|e| classify(Stage::SessionEstablishment, e))?;

        let sts_creds = response.credentials().ok_or_else(|| {
            ChainError::transport(Stage::SessionEstablishment, "AWS STS returned no credentials")
        })?;

        to_credentials(
            Stage::SessionEstablishment,
            sts_creds.access_key_id(),
            sts_creds.secret_access_key(),
            sts_creds.session_token(),
            sts_creds.expiration(),
        )
    }

    async fn assume_role(
        &self,
        caller: &Credentials,
        role_arn: &str,
        session_name: &str,
        duration_seconds: i32,
    ) -> Result<Credentials, ChainError> {
        info!("Calling AWS STS AssumeRole");
        debug!("Role ARN: {}", role_arn);
        debug!("Session name: {}", session_name);
        debug!("Duration: {} seconds", duration_seconds);

        let response = self
            .client_for(caller)
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .duration_seconds(duration_seconds)
            .send()
            .await
            .map_err(|e| classify(Stage::RoleAssumption, e))?;

        let sts_creds = response.credentials().ok_or_else(|| {
            ChainError::transport(Stage::RoleAssumption, "AWS STS returned no credentials")
        })?;

        to_credentials(
            Stage::RoleAssumption,
            sts_creds.access_key_id(),
            sts_creds.secret_access_key(),
            sts_creds.session_token(),
            sts_creds.expiration(),
        )
    }
}

fn to_credentials(
    stage: Stage,
    access_key_id: &str,
    secret_access_key: &str,
    session_token: &str,
    expiration: &SmithyDateTime,
) -> Result<Credentials, ChainError> {
    let expiration = to_utc(expiration).ok_or_else(|| {
        ChainError::transport(stage, format!("AWS STS returned invalid expiration {expiration:?}"))
    })?;
    Ok(Credentials::temporary(
        access_key_id,
        secret_access_key,
        session_token,
        expiration,
    ))
}

/// Expirations are kept at second granularity
fn to_utc(value: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), 0)
}

fn classify<E, R>(stage: Stage, err: SdkError<E, R>) -> ChainError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    let code = match &err {
        SdkError::ServiceError(service) => service.err().code(),
        _ => None,
    };

    match code {
        Some(code) if ACCESS_DENIED_CODES.contains(&code) => match stage {
            Stage::SessionEstablishment => ChainError::authentication(stage, message),
            _ => ChainError::configuration(stage, message),
        },
        Some(code) if INVALID_REQUEST_CODES.contains(&code) => {
            ChainError::configuration(stage, message)
        }
        _ => ChainError::transport(stage, message),
    }
}
