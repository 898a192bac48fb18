use std::{env, path::PathBuf};

/// Configuration directory name under `~/.config`
pub const CONFIG_DIR_NAME: &str = "multirole";

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable overriding the configuration file path
pub const CONFIG_FILE_ENV: &str = "MULTIROLE_CONFIG";

/// AWS configuration directory name
pub const AWS_CONFIG_DIR_NAME: &str = ".aws";

/// AWS shared credentials file name
pub const AWS_CREDENTIALS_FILE_NAME: &str = "credentials";

/// Environment variable overriding the shared credentials file path
pub const AWS_CREDENTIALS_FILE_ENV: &str = "AWS_SHARED_CREDENTIALS_FILE";

/// Default AWS region for STS operations when no region is configured
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Duration requested for every chained role assumption.
/// AWS caps role chaining at one hour.
pub const ROLE_CHAINING_DURATION_SECONDS: i32 = 3600;

/// Maximum number of AssumeRole calls in flight at once
pub const MAX_CONCURRENT_ASSUMPTIONS: usize = 4;

/// Store entry holding the identity's long-term keys
pub const IDENTITY_PROFILE: &str = "identity";

/// Store entry holding the MFA session credentials
pub const DEFAULT_PROFILE: &str = "default";

/// Role session name layout, UTC at second granularity
pub const SESSION_NAME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Provider name attached to credentials handed to the SDK
pub const CREDENTIALS_PROVIDER_NAME: &str = "multirole";

fn home_dir() -> Option<PathBuf> {
    dirs::home_dir().or_else(|| {
        env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .ok()
            .map(PathBuf::from)
    })
}

/// Get the multirole config file path
/// Always resolves to ~/.config/multirole/config.toml, on all platforms
pub fn default_config_path() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".config").join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Get the AWS credentials file path
pub fn default_aws_credentials_path() -> Option<PathBuf> {
    home_dir().map(|home| {
        home.join(AWS_CONFIG_DIR_NAME)
            .join(AWS_CREDENTIALS_FILE_NAME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_default_config_path() {
        if let Some(path) = default_config_path() {
            let path_str = path.to_string_lossy();
            assert!(path_str.contains(CONFIG_DIR_NAME));
            assert!(path_str.ends_with(CONFIG_FILE_NAME));
        }
    }

    #[test]
    #[serial]
    fn test_default_aws_credentials_path() {
        if let Some(path) = default_aws_credentials_path() {
            let path_str = path.to_string_lossy();
            assert!(path_str.contains(AWS_CONFIG_DIR_NAME));
            assert!(path_str.ends_with(AWS_CREDENTIALS_FILE_NAME));
        }
    }

    #[test]
    fn test_role_chaining_duration_is_one_hour() {
        assert_eq!(ROLE_CHAINING_DURATION_SECONDS, 60 * 60);
    }
}
