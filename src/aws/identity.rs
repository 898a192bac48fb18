use std::path::PathBuf;

use async_trait::async_trait;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_credential_types::provider::ProvideCredentials;
use aws_runtime::env_config::file::{EnvConfigFileKind, EnvConfigFiles};
use tracing::{debug, info};

use super::{CredentialSource, Credentials};
use crate::error::{ChainError, Stage};

/// Long-term credentials read from the AWS shared config and credentials files
#[derive(Debug, Clone)]
pub struct ProfileCredentialSource {
    credentials_file: PathBuf,
}

impl ProfileCredentialSource {
    pub fn new(credentials_file: impl Into<PathBuf>) -> Self {
        Self {
            credentials_file: credentials_file.into(),
        }
    }

    fn profile_files(&self) -> EnvConfigFiles {
        EnvConfigFiles::builder()
            .include_default_config_file(true)
            .with_file(EnvConfigFileKind::Credentials, &self.credentials_file)
            .build()
    }
}

#[async_trait]
impl CredentialSource for ProfileCredentialSource {
    async fn resolve(&self, profile: &str) -> Result<Credentials, ChainError> {
        info!("Resolving long-term credentials for profile: {}", profile);
        debug!("Credentials file: {}", self.credentials_file.display());

        let provider = ProfileFileCredentialsProvider::builder()
            .profile_name(profile)
            .profile_files(self.profile_files())
            .build();

        let resolved = provider.provide_credentials().await.map_err(|e| {
            ChainError::configuration(
                Stage::IdentityResolution,
                format!("cannot load credentials for profile '{profile}': {e}"),
            )
        })?;

        // Only the key pair is exported for the identity
        Ok(Credentials::long_term(
            resolved.access_key_id(),
            resolved.secret_access_key(),
        ))
    }
}
