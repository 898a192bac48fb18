use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use dialoguer::{Input, theme::ColorfulTheme};
use tracing::info;

use crate::{
    aws::{credentials::format_expiration, identity::ProfileCredentialSource, sts::StsService},
    chain::Chain,
    cli::Paths,
    config,
};

const TOKEN_CODE_LENGTH: usize = 6;

#[derive(Debug, Clone, Args)]
pub struct AssumeCommand {
    #[arg(
        short = 't',
        long,
        value_parser = parse_token_code,
        help = "Current MFA code; prompted for when omitted"
    )]
    pub token_code: Option<String>,
}

impl AssumeCommand {
    pub async fn execute(self, paths: &Paths) -> Result<()> {
        let config = config::load(&paths.config_file).await?;
        info!(
            "Assuming {} roles for identity profile: {}",
            config.roles.len(),
            config.identity_profile
        );

        let token_code = match self.token_code {
            Some(code) => code,
            None => prompt_token_code()?,
        };

        let source = ProfileCredentialSource::new(&paths.credentials_file);
        let sts = StsService::load(&config.identity_profile, config.region.as_deref()).await;

        let outcome = Chain::new(&source, &sts)
            .run(
                &config.chain_spec(),
                &token_code,
                &paths.credentials_file,
                Utc::now(),
            )
            .await
            .context("Failed to assume roles")?;

        println!(
            "\nAWS credentials saved to {} (session {}):",
            paths.credentials_file.display(),
            outcome.session_name
        );
        for name in outcome.store.names() {
            println!("  [{name}]");
        }
        if let Some(expiration) = outcome.session_expiration() {
            println!(
                "MFA session will expire at: {}",
                format_expiration(&expiration)
            );
        }

        Ok(())
    }
}

fn is_valid_token_code(input: &str) -> bool {
    input.len() == TOKEN_CODE_LENGTH && input.chars().all(|c| c.is_ascii_digit())
}

fn parse_token_code(input: &str) -> Result<String, String> {
    if is_valid_token_code(input) {
        Ok(input.to_string())
    } else {
        Err(format!("MFA code must be {TOKEN_CODE_LENGTH} digits"))
    }
}

fn prompt_token_code() -> Result<String> {
    Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt("MFA token code")
        .validate_with(|input: &String| parse_token_code(input).map(|_| ()))
        .interact_text()
        .context("Failed to read MFA token code")
}
