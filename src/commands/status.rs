use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use crate::{
    aws::{Credentials, credentials},
    cli::Paths,
    constants::DEFAULT_PROFILE,
};

#[derive(Debug, Clone, Args)]
pub struct StatusCommand {
    #[arg(default_value = DEFAULT_PROFILE, help = "Profile in the credentials store")]
    pub profile: String,
}

impl StatusCommand {
    pub async fn execute(self, paths: &Paths) -> Result<()> {
        let creds = credentials::load_profile(&paths.credentials_file, &self.profile)
            .await
            .with_context(|| format!("Failed to read profile '{}'", self.profile))?;

        println!("{}", describe(&self.profile, &creds, Utc::now()));
        Ok(())
    }
}

fn describe(profile: &str, creds: &Credentials, now: DateTime<Utc>) -> String {
    match creds.expiration() {
        None => format!("[{profile}] long-term credentials, no expiration"),
        Some(expiration) if expiration <= now => format!(
            "[{profile}] expired at {}",
            credentials::format_expiration(&expiration)
        ),
        Some(expiration) => {
            let remaining = expiration - now;
            format!(
                "[{profile}] valid until {} ({}h{:02}m left)",
                credentials::format_expiration(&expiration),
                remaining.num_hours(),
                remaining.num_minutes() % 60
            )
        }
    }
}
