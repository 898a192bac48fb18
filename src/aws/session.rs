use tracing::info;

use super::{Credentials, SecurityTokenService};
use crate::error::{ChainError, Stage};

/// Exchange long-term identity keys plus a current MFA code for session
/// credentials. The session lifetime is the STS default for the identity.
pub async fn establish(
    sts: &dyn SecurityTokenService,
    identity: &Credentials,
    mfa_serial: &str,
    token_code: &str,
) -> Result<Credentials, ChainError> {
    info!("Establishing MFA session with device {}", mfa_serial);

    let session = sts
        .get_session_token(identity, mfa_serial, token_code)
        .await?;

    if session.session.is_none() {
        return Err(ChainError::transport(
            Stage::SessionEstablishment,
            "AWS STS returned session credentials without a session token",
        ));
    }

    if let Some(expiration) = session.expiration() {
        info!("MFA session valid until {}", expiration);
    }
    Ok(session)
}
