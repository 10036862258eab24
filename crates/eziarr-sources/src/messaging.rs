//! Messaging-platform source.
//!
//! The platform protocol itself lives behind [`MessagingClient`]; this module
//! owns credential lookup and the single shared connection. A
//! [`MessagingSession`] creates its client at most once, on first use, through
//! the configured [`MessagingConnector`], and hands out the same instance
//! afterwards.
//!
//! Logging in takes two calls: [`MessagingSession::send_login_code`] asks the
//! platform to send a code to a phone, and [`MessagingSession::complete_login`]
//! signs in with that code (plus the account password when two-step
//! verification is on) and saves the resulting session string in settings.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use eziarr_core::defaults;
use eziarr_core::setting_keys;
use eziarr_core::{Error, Result, SettingsRepository};

use crate::downloader::{prepare_target, DownloadTarget};

/// A channel the logged-in account can read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub title: String,
    pub username: Option<String>,
}

/// A message carrying a downloadable document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHit {
    pub id: i64,
    pub channel: String,
    pub filename: String,
    pub size: i64,
    /// Unix timestamp in seconds.
    pub date: i64,
    pub message_text: String,
}

/// API credentials read from settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagingCredentials {
    pub api_id: i64,
    pub api_hash: String,
    /// Saved login session, empty before the first login.
    pub session: String,
}

/// Result of signing in with a phone code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignIn {
    /// Logged in; `session` restores the login on the next connect.
    Authorized { session: String },
    /// The account has two-step verification and needs its password.
    PasswordNeeded,
}

/// Outcome of [`MessagingSession::complete_login`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    LoggedIn,
    PasswordNeeded,
}

/// Connected platform client.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Whether the session is logged in.
    async fn check_authorization(&self) -> Result<bool>;

    /// Send a login code to `phone`; returns the phone-code hash.
    async fn send_code(&self, phone: &str) -> Result<String>;

    /// Sign in with the code sent to `phone`.
    async fn sign_in(&self, phone: &str, phone_code_hash: &str, code: &str) -> Result<SignIn>;

    /// Finish a sign-in that returned [`SignIn::PasswordNeeded`]; returns the
    /// session string.
    async fn check_password(&self, password: &str) -> Result<String>;

    /// Up to `limit` dialogs, channels only.
    async fn dialogs(&self, limit: usize) -> Result<Vec<Channel>>;

    /// Messages with documents in `channel` matching `query`.
    async fn search(&self, channel: &str, query: &str, limit: usize) -> Result<Vec<MessageHit>>;

    /// Write the media of message `message_id` to `target.file`.
    async fn download_media(&self, channel: &str, message_id: i64, target: &DownloadTarget) -> Result<()>;
}

/// Opens a connected [`MessagingClient`].
#[async_trait]
pub trait MessagingConnector: Send + Sync {
    async fn connect(&self, credentials: &MessagingCredentials) -> Result<Arc<dyn MessagingClient>>;
}

/// Lazily connected, shared messaging client.
pub struct MessagingSession {
    settings: Arc<dyn SettingsRepository>,
    connector: Option<Arc<dyn MessagingConnector>>,
    client: OnceCell<Arc<dyn MessagingClient>>,
}

impl MessagingSession {
    pub fn new(
        settings: Arc<dyn SettingsRepository>,
        connector: Option<Arc<dyn MessagingConnector>>,
    ) -> Self {
        Self {
            settings,
            connector,
            client: OnceCell::new(),
        }
    }

    /// Read the API id and hash from settings.
    pub async fn credentials(&self) -> Result<MessagingCredentials> {
        let api_id = self
            .settings
            .get(setting_keys::TELEGRAM_API_ID)
            .await?
            .and_then(|v| match v {
                JsonValue::Number(n) => n.as_i64(),
                JsonValue::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .filter(|id| *id != 0);
        let api_hash = self
            .settings
            .get(setting_keys::TELEGRAM_API_HASH)
            .await?
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty());

        let (Some(api_id), Some(api_hash)) = (api_id, api_hash) else {
            return Err(Error::Config(
                "messaging API id and hash are not configured in settings".into(),
            ));
        };

        let session = self
            .settings
            .get(setting_keys::TELEGRAM_SESSION)
            .await?
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        Ok(MessagingCredentials {
            api_id,
            api_hash,
            session,
        })
    }

    /// The shared client, connecting on first use.
    ///
    /// A failed connection is not cached; the next call tries again.
    pub async fn client(&self) -> Result<Arc<dyn MessagingClient>> {
        self.client
            .get_or_try_init(|| async {
                let connector = self.connector.clone().ok_or_else(|| {
                    Error::Config("no messaging connector is available".into())
                })?;
                let credentials = self.credentials().await?;
                let client = connector.connect(&credentials).await?;
                info!(subsystem = "sources", component = "messaging", "Messaging client connected");
                Ok::<_, Error>(client)
            })
            .await
            .cloned()
    }

    /// Connection state and readable channels, sorted by title.
    ///
    /// An unconfigured session reports `(false, [])` instead of failing.
    pub async fn status(&self) -> Result<(bool, Vec<Channel>)> {
        let client = match self.client().await {
            Ok(client) => client,
            Err(Error::Config(reason)) => {
                warn!(subsystem = "sources", component = "messaging", reason = %reason, "Messaging not configured");
                return Ok((false, Vec::new()));
            }
            Err(e) => return Err(e),
        };

        if !client.check_authorization().await? {
            return Ok((false, Vec::new()));
        }
        let mut channels = client.dialogs(defaults::MESSAGING_DIALOG_LIMIT).await?;
        channels.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
        Ok((true, channels))
    }

    /// Ask the platform to send a login code to `phone`.
    pub async fn send_login_code(&self, phone: &str) -> Result<()> {
        let phone = phone.trim();
        if phone.is_empty() {
            return Err(Error::InvalidInput("phone number is required".into()));
        }
        let hash = self.client().await?.send_code(phone).await?;

        let mut pending = Map::new();
        pending.insert(setting_keys::TELEGRAM_LOGIN_HASH.into(), hash.into());
        pending.insert(setting_keys::TELEGRAM_LOGIN_PHONE.into(), phone.into());
        self.settings.set_many(&pending).await?;
        info!(subsystem = "sources", component = "messaging", "Login code sent");
        Ok(())
    }

    /// Sign in with the code from [`send_login_code`](Self::send_login_code)
    /// and save the session. Without `password`, an account with two-step
    /// verification yields [`LoginOutcome::PasswordNeeded`].
    pub async fn complete_login(&self, code: &str, password: Option<&str>) -> Result<LoginOutcome> {
        let (Some(hash), Some(phone)) = (
            self.text_setting(setting_keys::TELEGRAM_LOGIN_HASH).await?,
            self.text_setting(setting_keys::TELEGRAM_LOGIN_PHONE).await?,
        ) else {
            return Err(Error::InvalidInput("no login code has been requested".into()));
        };

        let client = self.client().await?;
        let session = match client.sign_in(&phone, &hash, code.trim()).await? {
            SignIn::Authorized { session } => session,
            SignIn::PasswordNeeded => match password.filter(|p| !p.is_empty()) {
                Some(password) => client.check_password(password).await?,
                None => {
                    info!(subsystem = "sources", component = "messaging", "Login needs two-step password");
                    return Ok(LoginOutcome::PasswordNeeded);
                }
            },
        };

        let mut saved = Map::new();
        saved.insert(setting_keys::TELEGRAM_SESSION.into(), session.into());
        saved.insert(setting_keys::TELEGRAM_LOGIN_HASH.into(), "".into());
        saved.insert(setting_keys::TELEGRAM_LOGIN_PHONE.into(), "".into());
        self.settings.set_many(&saved).await?;
        info!(subsystem = "sources", component = "messaging", "Messaging login complete, session saved");
        Ok(LoginOutcome::LoggedIn)
    }

    /// Non-empty string value of `key`.
    async fn text_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .settings
            .get(key)
            .await?
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty()))
    }

    async fn authorized(&self) -> Result<Arc<dyn MessagingClient>> {
        let client = self.client().await?;
        if !client.check_authorization().await? {
            return Err(Error::Config("messaging session is not authorized".into()));
        }
        Ok(client)
    }

    /// Search `channel` for documents matching `query`.
    pub async fn search(&self, channel: &str, query: &str) -> Result<Vec<MessageHit>> {
        self.authorized()
            .await?
            .search(channel, query, defaults::MESSAGING_SEARCH_LIMIT)
            .await
    }

    /// Download the media of a message into the downloads root.
    pub async fn download(
        &self,
        root: &std::path::Path,
        channel: &str,
        message_id: i64,
        filename: &str,
    ) -> Result<DownloadTarget> {
        let client = self.authorized().await?;
        let target = prepare_target(root, filename).await?;
        info!(
            subsystem = "sources",
            component = "messaging",
            channel,
            message_id,
            file = %target.file.display(),
            "Downloading message media"
        );
        client.download_media(channel, message_id, &target).await?;
        Ok(target)
    }
}
