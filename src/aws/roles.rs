use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use serde::Deserialize;
use tracing::{debug, info};

use super::{Credentials, SecurityTokenService};
use crate::{
    constants::{MAX_CONCURRENT_ASSUMPTIONS, ROLE_CHAINING_DURATION_SECONDS, SESSION_NAME_FORMAT},
    error::ChainError,
};

/// A role to assume and the store profile it is written under
///
/// Names are expected to be unique within one run; duplicates are not
/// rejected and the later one overwrites the earlier in the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoleRequest {
    pub name: String,
    #[serde(rename = "arn")]
    pub role_arn: String,
}

impl RoleRequest {
    pub fn new(name: impl Into<String>, role_arn: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role_arn: role_arn.into(),
        }
    }
}

/// Role session name shared by every role assumed in one run
pub fn session_name(started_at: DateTime<Utc>) -> String {
    started_at.format(SESSION_NAME_FORMAT).to_string()
}

/// Assume every requested role using the session credentials as caller.
///
/// Calls run concurrently, at most `MAX_CONCURRENT_ASSUMPTIONS` at a time,
/// and results come back in request order. When several roles fail, the
/// error returned is the one for the earliest of them in request order,
/// wrapped with its role name. Calls still in flight are dropped once that
/// error surfaces; no partial result is ever returned.
///
/// Every call requests one hour, the role chaining ceiling. Deriving each
/// role from the long-term identity instead would allow longer sessions
/// but is not done here.
pub async fn assume_all(
    sts: &dyn SecurityTokenService,
    session: &Credentials,
    requests: &[RoleRequest],
    session_name: &str,
) -> Result<Vec<(String, Credentials)>, ChainError> {
    info!(
        "Assuming {} roles as session {}",
        requests.len(),
        session_name
    );

    stream::iter(requests)
        .map(|request| async move {
            debug!("Assuming role {} ({})", request.name, request.role_arn);
            let creds = sts
                .assume_role(
                    session,
                    &request.role_arn,
                    session_name,
                    ROLE_CHAINING_DURATION_SECONDS,
                )
                .await
                .map_err(|e| ChainError::role(&request.name, e))?;
            info!("Assumed role {}", request.name);
            Ok::<_, ChainError>((request.name.clone(), creds))
        })
        .buffered(MAX_CONCURRENT_ASSUMPTIONS)
        .try_collect()
        .await
}
