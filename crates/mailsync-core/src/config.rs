//! Engine configuration, read from a JSON file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mailsync_oauth::{OAuthClient, Provider};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sync::DEFAULT_IMAP_PORT;
use crate::{Error, Result};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "MAILSYNC_CONFIG";

/// Redirect URI the OAuth callback listener is expected to serve.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:9498/callback";

/// Engine settings. Every field has a default, so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the database.
    pub data_dir: PathBuf,
    /// Database file name inside `data_dir`.
    pub database_file: String,
    /// Seconds between mailbox list syncs.
    pub mailbox_interval_secs: u64,
    /// Seconds between message syncs.
    pub message_interval_secs: u64,
    /// Seconds the cached mailbox list is served without asking the server.
    pub mailbox_ttl_secs: u64,
    /// Page size used when a listing gives none.
    pub page_size: u32,
    /// IMAP port used when an account's address has none.
    pub imap_port: u16,
    /// Seconds to wait for the OAuth redirect.
    pub oauth_timeout_secs: u64,
    /// OAuth client registration; without it only password logins work.
    pub oauth: Option<OAuthSettings>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("mailsync"),
            database_file: "mailsync.db".to_string(),
            mailbox_interval_secs: 300,
            message_interval_secs: 300,
            mailbox_ttl_secs: 300,
            page_size: 10,
            imap_port: DEFAULT_IMAP_PORT,
            oauth_timeout_secs: 300,
            oauth: None,
        }
    }
}

impl EngineConfig {
    /// Reads `path`, or returns the defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Reads the file named by `explicit`, else by `MAILSYNC_CONFIG`, else
    /// `config.json` in the user's config directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file exists but is invalid.
    pub fn load_from_env(explicit: Option<PathBuf>) -> Result<Self> {
        let path = explicit
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .unwrap_or_else(Self::default_path);
        Self::load(&path)
    }

    /// `<config dir>/mailsync/config.json`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mailsync")
            .join("config.json")
    }

    /// Full path of the database file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    /// Mailbox loop period.
    #[must_use]
    pub const fn mailbox_interval(&self) -> Duration {
        Duration::from_secs(self.mailbox_interval_secs)
    }

    /// Message loop period.
    #[must_use]
    pub const fn message_interval(&self) -> Duration {
        Duration::from_secs(self.message_interval_secs)
    }

    /// Mailbox list TTL.
    #[must_use]
    pub const fn mailbox_ttl(&self) -> Duration {
        Duration::from_secs(self.mailbox_ttl_secs)
    }

    /// How long to wait for the OAuth redirect.
    #[must_use]
    pub const fn oauth_timeout(&self) -> Duration {
        Duration::from_secs(self.oauth_timeout_secs)
    }
}

/// OAuth client registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthSettings {
    /// Client id issued by the provider.
    pub client_id: String,
    /// Client secret, for confidential clients.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Registered redirect URI.
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    /// Requested scopes; empty means the provider's defaults.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Custom authorize endpoint. Microsoft's is used when unset.
    #[serde(default)]
    pub auth_url: Option<String>,
    /// Custom token endpoint. Microsoft's is used when unset.
    #[serde(default)]
    pub token_url: Option<String>,
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

impl OAuthSettings {
    /// The provider these settings point at.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if only one custom endpoint is set or an
    /// endpoint is not a valid URL.
    pub fn provider(&self) -> Result<Provider> {
        let provider = match (&self.auth_url, &self.token_url) {
            (None, None) => Provider::microsoft()?,
            (Some(auth), Some(token)) => Provider::new("Custom", auth, token)?,
            _ => {
                return Err(Error::Config(
                    "auth_url and token_url must be set together".to_string(),
                ));
            }
        };
        provider.validate()?;
        Ok(provider)
    }

    /// Builds the OAuth client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty client id or a bad provider.
    pub fn client(&self) -> Result<OAuthClient> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Config("oauth.client_id is empty".to_string()));
        }

        let mut client = OAuthClient::new(&self.client_id, self.provider()?)
            .with_redirect_uri(&self.redirect_uri);
        if let Some(secret) = &self.client_secret {
            client = client.with_client_secret(secret);
        }
        Ok(client)
    }

    /// Scopes to request, `None` for the provider's defaults.
    #[must_use]
    pub fn requested_scopes(&self) -> Option<&[String]> {
        (!self.scopes.is_empty()).then_some(self.scopes.as_slice())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.imap_port, 993);
        assert_eq!(config.mailbox_interval(), Duration::from_secs(300));
        assert_eq!(config.mailbox_ttl(), Duration::from_secs(300));
        assert!(config.database_path().ends_with("mailsync/mailsync.db"));
        assert!(config.oauth.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{ "page_size": 25, "oauth": { "client_id": "abc" } }"#,
        )
        .unwrap();

        assert_eq!(config.page_size, 25);
        assert_eq!(config.message_interval_secs, 300);
        let oauth = config.oauth.unwrap();
        assert_eq!(oauth.redirect_uri, DEFAULT_REDIRECT_URI);
        assert!(oauth.requested_scopes().is_none());
        assert_eq!(oauth.client().unwrap().client_id, "abc");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = EngineConfig::load(Path::new("/nonexistent/mailsync/config.json")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_invalid_file_is_error() {
        let path = std::env::temp_dir().join(format!("mailsync-config-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();

        let err = EngineConfig::load(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, Error::Serde(_)));
    }

    #[test]
    fn test_oauth_settings_validation() {
        let mut settings = OAuthSettings {
            client_id: "id".into(),
            client_secret: Some("secret".into()),
            redirect_uri: DEFAULT_REDIRECT_URI.into(),
            scopes: vec!["mail".into()],
            auth_url: Some("https://auth.example.com/authorize".into()),
            token_url: None,
        };
        assert!(matches!(settings.provider(), Err(Error::Config(_))));

        settings.token_url = Some("https://auth.example.com/token".into());
        let client = settings.client().unwrap();
        assert_eq!(client.provider.name, "Custom");
        assert_eq!(client.client_secret.as_deref(), Some("secret"));
        assert_eq!(settings.requested_scopes().unwrap(), ["mail".to_string()]);

        settings.token_url = Some("http://auth.example.com/token".into());
        assert!(matches!(settings.client(), Err(Error::Config(_))));

        settings.client_id = " ".into();
        assert!(matches!(settings.client(), Err(Error::Config(_))));
    }
}
