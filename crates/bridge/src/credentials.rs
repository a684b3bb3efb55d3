//! Object-store credentials loaded from a properties file
//!
//! File format (Java properties style):
//!
//! ```text
//! accessKey = AKIA...
//! secretKey = ...
//! # optional
//! sessionToken = ...
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use secrecy::SecretString;

use crate::error::{BridgeError, Result};

/// Resolved object-store credentials
pub struct Credentials {
    pub access_key: String,
    pub secret_key: SecretString,
    pub session_token: Option<SecretString>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"[REDACTED]")
            .field("has_session_token", &self.session_token.is_some())
            .finish()
    }
}

/// Loads credentials from a location named by a profile
pub trait CredentialsProvider: Send + Sync {
    fn credentials(&self, location: &str) -> Result<Credentials>;
}

/// Reads `accessKey`/`secretKey`/`sessionToken` from a properties file
#[derive(Debug, Default, Clone, Copy)]
pub struct PropertiesFileCredentials;

impl PropertiesFileCredentials {
    /// Parse properties text into credentials
    pub fn parse(content: &str) -> Result<Credentials> {
        let props = parse_properties(content);
        let required = |key: &str| {
            props
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| BridgeError::Config(format!("credentials file has no '{key}'")))
        };

        Ok(Credentials {
            access_key: required("accessKey")?,
            secret_key: SecretString::new(required("secretKey")?),
            session_token: props
                .get("sessionToken")
                .filter(|v| !v.is_empty())
                .map(|v| SecretString::new(v.clone())),
        })
    }
}

impl CredentialsProvider for PropertiesFileCredentials {
    fn credentials(&self, location: &str) -> Result<Credentials> {
        let content = std::fs::read_to_string(Path::new(location))?;
        Self::parse(&content)
    }
}

/// Minimal Java-properties reader: `key=value` or `key: value`, `#`/`!` comments
fn parse_properties(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let idx = line.find(['=', ':'])?;
            Some((line[..idx].trim().to_string(), line[idx + 1..].trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_parse_with_session_token() {
        let creds = PropertiesFileCredentials::parse(
            "# aws\naccessKey=AK2\nsecretKey = SK2\n! comment\nsessionToken: TK2\n",
        )
        .unwrap();
        assert_eq!(creds.access_key, "AK2");
        assert_eq!(creds.secret_key.expose_secret(), "SK2");
        assert_eq!(creds.session_token.unwrap().expose_secret(), "TK2");
    }

    #[test]
    fn test_parse_without_session_token() {
        let creds = PropertiesFileCredentials::parse("accessKey=A\nsecretKey=S\nsessionToken=\n").unwrap();
        assert!(creds.session_token.is_none());
    }

    #[test]
    fn test_parse_missing_secret() {
        let err = PropertiesFileCredentials::parse("accessKey=A\n").unwrap_err();
        assert!(err.to_string().contains("secretKey"));
    }

    #[test]
    fn test_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.props");
        std::fs::write(&path, "accessKey=A\nsecretKey=s3cr3t\n").unwrap();

        let creds = PropertiesFileCredentials
            .credentials(path.to_str().unwrap())
            .unwrap();
        assert_eq!(creds.access_key, "A");
        assert!(!format!("{creds:?}").contains("s3cr3t"));
    }

    #[test]
    fn test_missing_file() {
        let err = PropertiesFileCredentials.credentials("/nonexistent/c.props").unwrap_err();
        assert!(matches!(err, BridgeError::Io(_)));
    }
}
