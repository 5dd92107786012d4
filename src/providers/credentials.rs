//! Credential store and round-robin selection
//!
//! Credentials are loaded once at startup from a JSON object mapping a
//! human-readable name to an access token. The object order is the pool order.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Fatal configuration problems, raised before any record is processed
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Credential pool is empty")]
    EmptyPool,

    #[error("Failed to read credential store {path}: {source}")]
    CredentialStore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid credential store: {0}")]
    InvalidStore(String),

    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),

    #[error("Missing setting: {0}")]
    MissingSetting(&'static str),
}

/// A named access token for one account on the remote platform
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    name: String,
    secret: String,
}

impl Credential {
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Credential {
            name: name.into(),
            secret: secret.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Fixed, ordered set of credentials
#[derive(Debug, Clone, Default)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
}

impl CredentialPool {
    pub fn new(credentials: Vec<Credential>) -> Self {
        CredentialPool { credentials }
    }

    /// Parse a `{"name": "secret", ...}` document, keeping document order
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigurationError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| ConfigurationError::InvalidStore(e.to_string()))?;

        let object = value.as_object().ok_or_else(|| {
            ConfigurationError::InvalidStore("expected a JSON object of name -> token".to_string())
        })?;

        let credentials = object
            .iter()
            .map(|(name, secret)| match secret.as_str() {
                Some(secret) => Ok(Credential::new(name.as_str(), secret)),
                None => Err(ConfigurationError::InvalidStore(format!(
                    "token for '{}' is not a string",
                    name
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CredentialPool::new(credentials))
    }

    /// Load the credential store from disk
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigurationError> {
        let raw = std::fs::read_to_string(path).map_err(|source| {
            ConfigurationError::CredentialStore {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::from_json_str(&raw)
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.credentials.iter().map(|c| c.name())
    }

    /// Round-robin selection: `index mod len`
    pub fn select(&self, index: usize) -> Result<&Credential, ConfigurationError> {
        if self.credentials.is_empty() {
            return Err(ConfigurationError::EmptyPool);
        }
        Ok(&self.credentials[index % self.credentials.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn pool() -> CredentialPool {
        CredentialPool::from_json_str(r#"{"shop-b": "tok-b", "shop-a": "tok-a", "shop-c": "tok-c"}"#)
            .unwrap()
    }

    #[test]
    fn test_select_is_round_robin() {
        let pool = pool();
        let n = pool.len();
        for i in 0..10 {
            assert_eq!(pool.select(i).unwrap(), pool.select(i + n).unwrap());
        }
    }

    #[test]
    fn test_document_order_is_pool_order() {
        let pool = pool();
        let names: Vec<_> = pool.names().collect();
        assert_eq!(names, vec!["shop-b", "shop-a", "shop-c"]);
        assert_eq!(pool.select(1).unwrap().secret(), "tok-a");
    }

    #[test]
    fn test_empty_pool_fails() {
        let pool = CredentialPool::from_json_str("{}").unwrap();
        assert!(matches!(pool.select(0), Err(ConfigurationError::EmptyPool)));
    }

    #[test]
    fn test_non_string_token_rejected() {
        let err = CredentialPool::from_json_str(r#"{"a": 12}"#).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidStore(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = CredentialPool::from_json_file(Path::new("/nonexistent/tokens.json")).unwrap_err();
        assert!(matches!(err, ConfigurationError::CredentialStore { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"main": "shpat_123"}}"#).unwrap();

        let pool = CredentialPool::from_json_file(file.path()).unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.select(7).unwrap().name(), "main");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let credential = Credential::new("main", "shpat_secret");
        let rendered = format!("{:?}", credential);
        assert!(!rendered.contains("shpat_secret"));
        assert!(rendered.contains("main"));
    }
}
