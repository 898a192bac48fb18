use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::{aws::roles::RoleRequest, chain::ChainSpec};

/// Contents of `~/.config/multirole/config.toml`
///
/// ```toml
/// identity_profile = "work"
/// mfa_serial = "arn:aws:iam::000000000000:mfa/me"
///
/// [[profile]]
/// name = "prod"
/// arn = "arn:aws:iam::111111111111:role/Prod"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub identity_profile: String,
    pub mfa_serial: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(rename = "profile", default)]
    pub roles: Vec<RoleRequest>,
}

impl Config {
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Invalid config file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.identity_profile.is_empty() {
            bail!("identity_profile must not be empty");
        }
        if self.mfa_serial.is_empty() {
            bail!("mfa_serial must not be empty");
        }
        if self.roles.is_empty() {
            bail!("No roles configured. Add at least one [[profile]] entry");
        }
        if let Some(role) = self.roles.iter().find(|r| r.name.is_empty()) {
            bail!("Role {} has an empty name", role.role_arn);
        }
        Ok(())
    }

    pub fn chain_spec(&self) -> ChainSpec<'_> {
        ChainSpec {
            identity_profile: &self.identity_profile,
            mfa_serial: &self.mfa_serial,
            roles: &self.roles,
        }
    }
}

pub async fn load(path: &Path) -> Result<Config> {
    debug!("Loading config from {}", path.display());

    let contents = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    Config::from_toml(&contents)
        .with_context(|| format!("Failed to load config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
identity_profile = "work"
mfa_serial = "arn:aws:iam::000:mfa/me"

[[profile]]
name = "prod"
arn = "arn:aws:iam::111:role/Prod"

[[profile]]
name = "dev"
arn = "arn:aws:iam::222:role/Dev"
"#;

    #[test]
    fn test_config_from_toml() {
        let config = Config::from_toml(SAMPLE).unwrap();

        assert_eq!(config.identity_profile, "work");
        assert_eq!(config.mfa_serial, "arn:aws:iam::000:mfa/me");
        assert_eq!(config.region, None);
        assert_eq!(
            config.roles,
            vec![
                RoleRequest::new("prod", "arn:aws:iam::111:role/Prod"),
                RoleRequest::new("dev", "arn:aws:iam::222:role/Dev"),
            ]
        );
    }

    #[test]
    fn test_config_with_region() {
        let contents = format!("region = \"eu-west-1\"\n{SAMPLE}");
        let config = Config::from_toml(&contents).unwrap();
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_config_keeps_duplicate_names() {
        let contents = format!(
            "{SAMPLE}\n[[profile]]\nname = \"prod\"\narn = \"arn:aws:iam::333:role/Prod\"\n"
        );
        let config = Config::from_toml(&contents).unwrap();
        assert_eq!(config.roles.len(), 3);
    }

    #[test]
    fn test_config_requires_roles() {
        let contents = "identity_profile = \"work\"\nmfa_serial = \"arn:aws:iam::000:mfa/me\"\n";
        let err = Config::from_toml(contents).unwrap_err();
        assert!(err.to_string().contains("No roles configured"));
    }

    #[test]
    fn test_config_requires_identity_profile() {
        let contents = "mfa_serial = \"arn:aws:iam::000:mfa/me\"\n";
        assert!(Config::from_toml(contents).is_err());
    }

    #[test]
    fn test_config_rejects_empty_role_name() {
        let contents =
            format!("{SAMPLE}\n[[profile]]\nname = \"\"\narn = \"arn:aws:iam::444:role/X\"\n");
        let err = Config::from_toml(&contents).unwrap_err();
        assert!(err.to_string().contains("empty name"));
    }

    #[test]
    fn test_chain_spec_borrows_config() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let spec = config.chain_spec();
        assert_eq!(spec.identity_profile, "work");
        assert_eq!(spec.roles.len(), 2);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("config.toml")).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = load(&path).await.unwrap();
        assert_eq!(config.roles[0].name, "prod");
    }
}
