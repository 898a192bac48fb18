//! Credentials store codec.
//!
//! The store is an ini-style file of stanzas, one per profile:
//!
//! ```text
//! [default]
//! aws_access_key_id = ASIA...
//! aws_secret_access_key = ...
//! aws_session_token = ...
//! awsmfa_expiration = 2019-07-03T08:36:31+00:00
//! ```
//!
//! Stanzas are separated by a blank line. Writes replace the whole file.

use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDateTime, Utc};
use ini::{EscapePolicy, Ini, LineSeparator, ParseOption, Properties, WriteOption};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info};

use super::Credentials;
use crate::error::{ChainError, StoreError};

pub const ACCESS_KEY_ID_KEY: &str = "aws_access_key_id";
pub const SECRET_ACCESS_KEY_KEY: &str = "aws_secret_access_key";
pub const SESSION_TOKEN_KEY: &str = "aws_session_token";
pub const EXPIRATION_KEY: &str = "awsmfa_expiration";

/// Expiration layout, always UTC
pub const EXPIRATION_FORMAT: &str = "%Y-%m-%dT%H:%M:%S+00:00";

/// Ordered profile name to credentials mapping, built in memory for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialStore {
    entries: Vec<(String, Credentials)>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a profile. An existing profile of the same name keeps its
    /// position and takes the new credentials.
    pub fn insert(&mut self, name: impl Into<String>, credentials: Credentials) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = credentials,
            None => self.entries.push((name, credentials)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Credentials> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, creds)| creds)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Credentials)> {
        self.entries.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn format_expiration(expiration: &DateTime<Utc>) -> String {
    expiration.format(EXPIRATION_FORMAT).to_string()
}

pub fn parse_expiration(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, EXPIRATION_FORMAT).map(|t| t.and_utc())
}

/// Build the ini document for a store, one section per entry in order
pub fn to_ini(store: &CredentialStore) -> Ini {
    let mut ini = Ini::new();
    for (name, creds) in store.iter() {
        let mut section = ini.with_section(Some(name));
        section
            .set(ACCESS_KEY_ID_KEY, creds.access_key_id.as_str())
            .set(SECRET_ACCESS_KEY_KEY, creds.secret_access_key.as_str());
        if let Some(session) = &creds.session {
            section
                .set(SESSION_TOKEN_KEY, session.token.as_str())
                .set(EXPIRATION_KEY, format_expiration(&session.expiration));
        }
    }
    ini
}

/// Serialize a whole store. Values are written verbatim, matching `decode`
/// which reads them without quote or escape handling.
pub fn encode(store: &CredentialStore) -> io::Result<String> {
    let options = WriteOption {
        escape_policy: EscapePolicy::Nothing,
        line_separator: LineSeparator::CR,
        kv_separator: " = ",
    };
    let mut buf = Vec::new();
    to_ini(store).write_to_opt(&mut buf, options)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Recover one profile from store contents. When the profile appears more
/// than once the last stanza wins.
pub fn decode(contents: &str, profile: &str) -> Result<Credentials, StoreError> {
    let options = ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    };
    let ini = Ini::load_from_str_opt(contents, options)?;

    let section = ini
        .section_all(Some(profile))
        .last()
        .ok_or_else(|| StoreError::ProfileNotFound(profile.to_string()))?;

    credentials_from_section(profile, section)
}

fn last_value<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get_all(key).last()
}

fn credentials_from_section(
    profile: &str,
    section: &Properties,
) -> Result<Credentials, StoreError> {
    let required = |key: &'static str| {
        last_value(section, key)
            .map(str::to_string)
            .ok_or_else(|| StoreError::MissingKey {
                profile: profile.to_string(),
                key,
            })
    };

    let access_key_id = required(ACCESS_KEY_ID_KEY)?;
    let secret_access_key = required(SECRET_ACCESS_KEY_KEY)?;

    let token = last_value(section, SESSION_TOKEN_KEY).filter(|v| !v.is_empty());
    let expiration = last_value(section, EXPIRATION_KEY).filter(|v| !v.is_empty());

    match (token, expiration) {
        (None, None) => Ok(Credentials::long_term(access_key_id, secret_access_key)),
        (Some(token), Some(value)) => {
            let expiration =
                parse_expiration(value).map_err(|source| StoreError::InvalidExpiration {
                    profile: profile.to_string(),
                    value: value.to_string(),
                    source,
                })?;
            Ok(Credentials::temporary(
                access_key_id,
                secret_access_key,
                token,
                expiration,
            ))
        }
        (Some(_), None) => Err(StoreError::IncompleteSession {
            profile: profile.to_string(),
            present: SESSION_TOKEN_KEY,
            missing: EXPIRATION_KEY,
        }),
        (None, Some(_)) => Err(StoreError::IncompleteSession {
            profile: profile.to_string(),
            present: EXPIRATION_KEY,
            missing: SESSION_TOKEN_KEY,
        }),
    }
}

/// Load one profile from the credentials store at `path`
pub async fn load_profile(path: &Path, profile: &str) -> Result<Credentials, StoreError> {
    let contents = fs::read_to_string(path)
        .await
        .map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    decode(&contents, profile)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staged = OsString::from(path.as_os_str());
    staged.push(".tmp");
    PathBuf::from(staged)
}

/// Write `contents` to a fresh staging file that only the owner can read.
/// A stale staging file is removed first so it never lends its mode.
async fn stage(staged: &Path, contents: &[u8]) -> io::Result<()> {
    match fs::remove_file(staged).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(staged).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}

/// Replace the credentials store at `path` with `store`.
///
/// The encoded store is written to a sibling file which is then renamed
/// over the destination, so a failure leaves the previous store untouched.
/// Assumes no other writer touches the store during the run.
pub async fn write_store(path: &Path, store: &CredentialStore) -> Result<(), ChainError> {
    let persistence = |source| ChainError::persistence(path, source);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(persistence)?;
    }

    let contents = encode(store).map_err(persistence)?;
    let staged = staging_path(path);
    debug!("Staging credentials store at {}", staged.display());

    let result = async {
        stage(&staged, contents.as_bytes()).await?;
        fs::rename(&staged, path).await
    }
    .await;

    if let Err(source) = result {
        let _ = fs::remove_file(&staged).await;
        return Err(persistence(source));
    }

    info!(
        "Credentials store written to {} ({} profiles)",
        path.display(),
        store.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn expiration() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 7, 3, 8, 36, 31).unwrap()
    }

    fn sample_store() -> CredentialStore {
        let mut store = CredentialStore::new();
        store.insert("identity", Credentials::long_term("AKIAID", "idsecret"));
        store.insert(
            "default",
            Credentials::temporary("ASIADEF", "defsecret", "deftoken", expiration()),
        );
        store.insert(
            "prod",
            Credentials::temporary("ASIAPROD", "prodsecret", "prod/token+==", expiration()),
        );
        store
    }

    #[test]
    fn test_encode_layout() {
        let encoded = encode(&sample_store()).unwrap();
        let expected = "\
[identity]
aws_access_key_id = AKIAID
aws_secret_access_key = idsecret

[default]
aws_access_key_id = ASIADEF
aws_secret_access_key = defsecret
aws_session_token = deftoken
awsmfa_expiration = 2019-07-03T08:36:31+00:00

[prod]
aws_access_key_id = ASIAPROD
aws_secret_access_key = prodsecret
aws_session_token = prod/token+==
awsmfa_expiration = 2019-07-03T08:36:31+00:00
";
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_encode_writes_values_verbatim() {
        let mut store = CredentialStore::new();
        store.insert(
            "dev",
            Credentials::temporary("ASIA", "a\\b/c+d=", "tok=en\\n", expiration()),
        );
        let encoded = encode(&store).unwrap();

        assert!(encoded.contains("aws_secret_access_key = a\\b/c+d=\n"));
        assert!(encoded.contains("aws_session_token = tok=en\\n\n"));
        assert_eq!(decode(&encoded, "dev").unwrap(), *store.get("dev").unwrap());
    }

    #[test]
    fn test_decode_each_entry_matches_encoded() {
        let store = sample_store();
        let encoded = encode(&store).unwrap();

        for (name, expected) in store.iter() {
            let decoded = decode(&encoded, name).unwrap();
            assert_eq!(&decoded, expected, "profile {name}");
        }
    }

    #[test]
    fn test_decode_long_term_has_no_session() {
        let decoded = decode(&encode(&sample_store()).unwrap(), "identity").unwrap();
        assert!(decoded.session.is_none());
    }

    #[test]
    fn test_decode_last_stanza_wins() {
        let contents = "\
[dev]
aws_access_key_id = FIRST
aws_secret_access_key = first

[dev]
aws_access_key_id = SECOND
aws_secret_access_key = second
";
        let decoded = decode(contents, "dev").unwrap();
        assert_eq!(decoded.access_key_id, "SECOND");
        assert_eq!(decoded.secret_access_key, "second");
    }

    #[test]
    fn test_decode_missing_profile() {
        let result = decode(&encode(&sample_store()).unwrap(), "staging");
        assert!(matches!(result, Err(StoreError::ProfileNotFound(name)) if name == "staging"));
    }

    #[test]
    fn test_decode_missing_secret() {
        let contents = "[dev]\naws_access_key_id = AKIA\n";
        let result = decode(contents, "dev");
        assert!(matches!(
            result,
            Err(StoreError::MissingKey { key: SECRET_ACCESS_KEY_KEY, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_malformed_expiration() {
        let contents = "\
[dev]
aws_access_key_id = ASIA
aws_secret_access_key = secret
aws_session_token = token
awsmfa_expiration = 2019-07-03 08:36:31
";
        let err = decode(contents, "dev").unwrap_err();
        assert!(matches!(err, StoreError::InvalidExpiration { .. }));
        assert!(err.to_string().contains("timestamp parse error in profile 'dev'"));
    }

    #[test]
    fn test_decode_rejects_token_without_expiration() {
        let contents = "\
[dev]
aws_access_key_id = ASIA
aws_secret_access_key = secret
aws_session_token = token
";
        let result = decode(contents, "dev");
        assert!(matches!(
            result,
            Err(StoreError::IncompleteSession { missing: EXPIRATION_KEY, .. })
        ));
    }

    #[test]
    fn test_expiration_format_roundtrip() {
        let formatted = format_expiration(&expiration());
        assert_eq!(formatted, "2019-07-03T08:36:31+00:00");
        assert_eq!(parse_expiration(&formatted).unwrap(), expiration());
    }

    #[test]
    fn test_store_insert_replaces_in_place() {
        let mut store = sample_store();
        store.insert("default", Credentials::long_term("AKIANEW", "new"));

        assert_eq!(store.len(), 3);
        assert_eq!(
            store.names().collect::<Vec<_>>(),
            vec!["identity", "default", "prod"]
        );
        assert_eq!(store.get("default").unwrap().access_key_id, "AKIANEW");
    }

    #[tokio::test]
    async fn test_write_store_replaces_file_and_restricts_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials");

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "[old]\naws_access_key_id = OLD\naws_secret_access_key = old\n",
        )
        .unwrap();

        write_store(&path, &sample_store()).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, encode(&sample_store()).unwrap());
        assert!(!written.contains("[old]"));
        assert!(!staging_path(&path).exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_store_ignores_stale_staging_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials");
        let staged = staging_path(&path);

        std::fs::write(&staged, "leftover from an interrupted run").unwrap();
        std::fs::set_permissions(&staged, std::fs::Permissions::from_mode(0o644)).unwrap();

        write_store(&path, &sample_store()).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!staged.exists());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            encode(&sample_store()).unwrap()
        );
    }

    #[tokio::test]
    async fn test_write_store_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("credentials");

        write_store(&path, &sample_store()).await.unwrap();

        let loaded = load_profile(&path, "prod").await.unwrap();
        assert_eq!(loaded.access_key_id, "ASIAPROD");
    }

    #[tokio::test]
    async fn test_load_profile_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_profile(&dir.path().join("missing"), "default").await;
        assert!(matches!(result, Err(StoreError::Read { .. })));
    }
}
