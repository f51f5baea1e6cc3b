//! Configuration manager for paedia.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::AppState;
use crate::error::Result;
use crate::notification::telegram::{self, TelegramClient};
use crate::notification::whatsapp::WhatsAppClient;
use crate::notification::{Channels, TelegramSender, WhatsAppSender};
use crate::revalidate::{LogRevalidator, Revalidator, WebhookRevalidator};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Domain name of current instance.
    pub url: String,
    support: Option<String>,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to PostgreSQL configuration.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to outbound notification channels.
    #[serde(default, skip_serializing)]
    pub notifications: Notifications,
    /// Related to front-end cache invalidation.
    #[serde(skip_serializing)]
    pub revalidation: Option<Revalidation>,
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

/// Outbound channels.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notifications {
    /// Request timeout of every channel, in seconds.
    pub timeout: Option<u64>,
    pub whatsapp: WhatsApp,
    pub telegram: Telegram,
}

/// WhatsApp Cloud API configuration.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsApp {
    pub enabled: bool,
    /// Messages endpoint, including the phone number ID.
    pub api_url: Option<String>,
    pub token: Option<String>,
    /// Membership secretary number, alerted on every submission.
    pub secretary_number: Option<String>,
}

/// Telegram Bot API configuration.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Telegram {
    pub enabled: bool,
    pub api_url: Option<String>,
    pub bot_token: Option<String>,
    pub secretary_chat_id: Option<String>,
    /// Public channel receiving every submission.
    pub channel: Option<String>,
    /// Applicant chat template. `{id}` is replaced by the user ID.
    pub applicant_chat_id: Option<String>,
}

/// Front-end revalidation hook.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revalidation {
    pub url: String,
    pub secret: Option<String>,
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

fn flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl Notifications {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Build the enabled channel clients.
    pub fn channels(&self) -> Result<Channels> {
        let mut channels = Channels::default();

        if self.whatsapp.enabled {
            match (&self.whatsapp.api_url, &self.whatsapp.token) {
                (Some(api_url), Some(token)) => {
                    let client: Arc<dyn WhatsAppSender> =
                        Arc::new(WhatsAppClient::new(api_url, token, self.timeout())?);
                    channels.whatsapp = Some(client);
                    channels.secretary_whatsapp = self.whatsapp.secretary_number.clone();
                },
                _ => tracing::warn!("whatsapp enabled without `api_url` or `token`, channel disabled"),
            }
        }

        if self.telegram.enabled {
            match &self.telegram.bot_token {
                Some(bot_token) => {
                    let api_url = self
                        .telegram
                        .api_url
                        .as_deref()
                        .unwrap_or(telegram::DEFAULT_API_URL);
                    let client: Arc<dyn TelegramSender> =
                        Arc::new(TelegramClient::new(api_url, bot_token, self.timeout())?);
                    channels.telegram = Some(client);
                    channels.secretary_chat_id = self.telegram.secretary_chat_id.clone();
                    channels.notifications_channel = self.telegram.channel.clone();
                    channels.applicant_chat_id = self.telegram.applicant_chat_id.clone();
                },
                None => tracing::warn!("telegram enabled without `bot_token`, channel disabled"),
            }
        }

        Ok(channels)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    fn normalize_url(&self, url: &str) -> std::result::Result<String, url::ParseError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.to_string())
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location, then applies environment overrides.
    pub fn read(self) -> std::result::Result<Arc<Self>, url::ParseError> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        let mut config = match File::open(file_path) {
            Ok(file) => match serde_yaml::from_reader::<_, Configuration>(file) {
                Ok(config) => config,
                Err(err) => self.error(err),
            },
            Err(err) => self.error(err),
        };

        // set app version.
        config.version = VERSION.to_owned();

        // normalize URLs.
        if !config.url.is_empty() {
            config.url = self.normalize_url(&config.url)?;
        }
        config.support = config
            .support
            .map(|s| self.normalize_url(&s))
            .transpose()?;
        if let Some(revalidation) = config.revalidation.as_mut() {
            revalidation.url = self.normalize_url(&revalidation.url)?;
        }

        config.apply_env(|key| std::env::var(key).ok());

        Ok(Arc::new(config))
    }

    /// Override notification settings with environment variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let whatsapp = &mut self.notifications.whatsapp;
        if let Some(enabled) = lookup("WHATSAPP_NOTIFICATIONS_ENABLED") {
            whatsapp.enabled = flag(&enabled);
        }
        if let Some(number) = lookup("MEMBERSHIP_SECRETARY_WHATSAPP") {
            whatsapp.secretary_number = Some(number);
        }
        if let Some(token) = lookup("WHATSAPP_API_TOKEN") {
            whatsapp.token = Some(token);
        }

        let telegram = &mut self.notifications.telegram;
        if let Some(enabled) = lookup("TELEGRAM_NOTIFICATIONS_ENABLED") {
            telegram.enabled = flag(&enabled);
        }
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            telegram.bot_token = Some(token);
        }
        if let Some(chat_id) = lookup("MEMBERSHIP_SECRETARY_TELEGRAM_CHAT_ID") {
            telegram.secretary_chat_id = Some(chat_id);
        }
        if let Some(channel) = lookup("MEMBERSHIP_NOTIFICATIONS_CHANNEL") {
            telegram.channel = Some(channel);
        }
        if let Some(template) = lookup("APPLICANT_TELEGRAM_CHAT_ID") {
            telegram.applicant_chat_id = Some(template);
        }
    }

    /// Revalidation hook, or a logging one when none is configured.
    pub fn revalidator(&self) -> Result<Arc<dyn Revalidator>> {
        Ok(match &self.revalidation {
            Some(hook) => Arc::new(WebhookRevalidator::new(
                &hook.url,
                hook.secret.clone(),
                self.notifications.timeout(),
            )?),
            None => Arc::new(LogRevalidator),
        })
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found or invalid");
        Self {
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const YAML: &str = r#"
name: paedia
url: members.example.org
postgres:
  address: localhost:5432
notifications:
  timeout: 5
  whatsapp:
    enabled: false
    api_url: https://graph.facebook.com/v19.0/1234/messages
    token: secret
  telegram:
    enabled: true
    bot_token: "123:abc"
    channel: paedia_members
revalidation:
  url: front.example.org/api/revalidate
"#;

    #[test]
    fn test_parse_yaml() {
        let config: Configuration = serde_yaml::from_str(YAML).unwrap();
        assert_eq!(config.name, "paedia");
        assert_eq!(config.notifications.timeout(), Duration::from_secs(5));
        assert!(config.notifications.telegram.enabled);
        assert_eq!(config.notifications.telegram.channel.as_deref(), Some("paedia_members"));
        assert_eq!(
            config.normalize_url(&config.url).unwrap(),
            "https://members.example.org/"
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut config: Configuration = serde_yaml::from_str(YAML).unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("WHATSAPP_NOTIFICATIONS_ENABLED", "true"),
            ("MEMBERSHIP_SECRETARY_WHATSAPP", "+966500000009"),
            ("TELEGRAM_NOTIFICATIONS_ENABLED", "0"),
            ("APPLICANT_TELEGRAM_CHAT_ID", "applicant-{id}"),
        ]);
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        let notifications = &config.notifications;
        assert!(notifications.whatsapp.enabled);
        assert_eq!(
            notifications.whatsapp.secretary_number.as_deref(),
            Some("+966500000009")
        );
        assert!(!notifications.telegram.enabled);
        assert_eq!(
            notifications.telegram.applicant_chat_id.as_deref(),
            Some("applicant-{id}")
        );
        assert_eq!(notifications.telegram.bot_token.as_deref(), Some("123:abc"));
    }

    #[test]
    fn test_channels_follow_flags() {
        let config: Configuration = serde_yaml::from_str(YAML).unwrap();
        let channels = config.notifications.channels().unwrap();
        assert!(channels.whatsapp.is_none());
        assert!(channels.telegram.is_some());
        assert_eq!(channels.notifications_channel.as_deref(), Some("paedia_members"));

        let channels = Notifications::default().channels().unwrap();
        assert!(channels.whatsapp.is_none());
        assert!(channels.telegram.is_none());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = Configuration::default()
            .path(PathBuf::from("does/not/exist.yaml"))
            .read();
        assert!(config.is_ok());
    }
}
