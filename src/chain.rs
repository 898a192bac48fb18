//! Credential chain orchestration.
//!
//! One run walks `Start -> IdentityResolved -> SessionEstablished ->
//! RolesAssumed -> Aggregated -> Flushed`. Any failure aborts the run, and
//! nothing before `Flushed` touches the destination store.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{
    aws::{
        CredentialSource, SecurityTokenService,
        credentials::{self, CredentialStore},
        roles::{self, RoleRequest},
        session,
    },
    constants::{DEFAULT_PROFILE, IDENTITY_PROFILE},
    error::ChainError,
};

/// Everything a run needs from configuration, already validated
#[derive(Debug, Clone)]
pub struct ChainSpec<'a> {
    pub identity_profile: &'a str,
    pub mfa_serial: &'a str,
    pub roles: &'a [RoleRequest],
}

/// What a successful run wrote
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub store: CredentialStore,
    pub session_name: String,
}

impl ChainOutcome {
    pub fn session_expiration(&self) -> Option<DateTime<Utc>> {
        self.store
            .get(DEFAULT_PROFILE)
            .and_then(|creds| creds.expiration())
    }
}

pub struct Chain<'a> {
    source: &'a dyn CredentialSource,
    sts: &'a dyn SecurityTokenService,
}

impl<'a> Chain<'a> {
    pub fn new(source: &'a dyn CredentialSource, sts: &'a dyn SecurityTokenService) -> Self {
        Self { source, sts }
    }

    /// Build the full credential store in memory without writing it
    pub async fn assemble(
        &self,
        spec: &ChainSpec<'_>,
        token_code: &str,
        started_at: DateTime<Utc>,
    ) -> Result<ChainOutcome, ChainError> {
        let identity = self.source.resolve(spec.identity_profile).await?;
        info!("Identity profile {} resolved", spec.identity_profile);

        let session = session::establish(self.sts, &identity, spec.mfa_serial, token_code).await?;

        let session_name = roles::session_name(started_at);
        let assumed = roles::assume_all(self.sts, &session, spec.roles, &session_name).await?;

        let mut store = CredentialStore::new();
        store.insert(IDENTITY_PROFILE, identity.into_long_term());
        store.insert(DEFAULT_PROFILE, session);
        for (name, creds) in assumed {
            if store.get(&name).is_some() {
                warn!("Profile {} configured more than once, keeping the last", name);
            }
            store.insert(name, creds);
        }

        Ok(ChainOutcome {
            store,
            session_name,
        })
    }

    /// Run the chain and replace the store at `destination` with the result
    pub async fn run(
        &self,
        spec: &ChainSpec<'_>,
        token_code: &str,
        destination: &Path,
        started_at: DateTime<Utc>,
    ) -> Result<ChainOutcome, ChainError> {
        let outcome = self
            .assemble(spec, token_code, started_at)
            .await
            .inspect_err(|e| warn!("Chain aborted during {}: {}", e.stage(), e))?;

        credentials::write_store(destination, &outcome.store).await?;
        Ok(outcome)
    }
}
