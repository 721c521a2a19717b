//! Remote system configuration: Chatwoot helpdesk and WhatsApp gateway.

use std::time::Duration;

use application::ApplicationError;
use domain::InboxId;
use integration_chatwoot::ChatwootClientConfig;
use integration_whatsapp::WhatsAppClientConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const fn default_request_timeout() -> u64 {
    15
}

fn redacted(secret: Option<&SecretString>) -> Option<&'static str> {
    secret.map(|_| "[REDACTED]")
}

fn required_secret(secret: Option<&SecretString>, key: &str) -> Result<String, ApplicationError> {
    secret
        .map(|s| s.expose_secret().trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApplicationError::Configuration(format!("{key} is required")))
}

// ==============================
// Chatwoot
// ==============================

/// Chatwoot helpdesk configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ChatwootAppConfig {
    /// Installation URL, e.g. `https://app.chatwoot.com`
    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub account_id: u64,

    /// Inbox served by this bridge instance
    #[serde(default)]
    pub inbox_id: u64,

    /// API access token (sensitive - uses SecretString)
    #[serde(default, skip_serializing)]
    pub api_token: Option<SecretString>,

    /// Control-plane request timeout in seconds (default: 15)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ChatwootAppConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            account_id: 0,
            inbox_id: 0,
            api_token: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl std::fmt::Debug for ChatwootAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatwootAppConfig")
            .field("base_url", &self.base_url)
            .field("account_id", &self.account_id)
            .field("inbox_id", &self.inbox_id)
            .field("api_token", &redacted(self.api_token.as_ref()))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl ChatwootAppConfig {
    pub const fn inbox_id(&self) -> InboxId {
        InboxId::new(self.inbox_id)
    }

    pub(crate) fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.base_url.trim().is_empty() {
            problems.push("chatwoot.base_url is required".to_string());
        }
        if self.account_id == 0 {
            problems.push("chatwoot.account_id is required".to_string());
        }
        if self.inbox_id == 0 {
            problems.push("chatwoot.inbox_id is required".to_string());
        }
        if required_secret(self.api_token.as_ref(), "chatwoot.api_token").is_err() {
            problems.push("chatwoot.api_token is required".to_string());
        }
        problems
    }

    /// Client configuration with the token exposed
    pub fn to_client_config(&self) -> Result<ChatwootClientConfig, ApplicationError> {
        Ok(ChatwootClientConfig {
            base_url: self.base_url.clone(),
            account_id: self.account_id,
            api_token: required_secret(self.api_token.as_ref(), "chatwoot.api_token")?,
            timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }
}

// ==============================
// WhatsApp
// ==============================

/// WhatsApp gateway configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct WhatsAppAppConfig {
    /// Gateway base URL (default: https://graph.facebook.com)
    #[serde(default = "default_whatsapp_base_url")]
    pub base_url: String,

    /// API version (default: v18.0)
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Phone number ID of the business number
    #[serde(default)]
    pub phone_number_id: Option<String>,

    /// Graph API access token (sensitive - uses SecretString)
    #[serde(default, skip_serializing)]
    pub access_token: Option<SecretString>,

    /// Request timeout in seconds (default: 15)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_whatsapp_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_api_version() -> String {
    "v18.0".to_string()
}

impl Default for WhatsAppAppConfig {
    fn default() -> Self {
        Self {
            base_url: default_whatsapp_base_url(),
            api_version: default_api_version(),
            phone_number_id: None,
            access_token: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl std::fmt::Debug for WhatsAppAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppAppConfig")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("phone_number_id", &self.phone_number_id)
            .field("access_token", &redacted(self.access_token.as_ref()))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl WhatsAppAppConfig {
    fn phone_number_id(&self) -> Option<&str> {
        self.phone_number_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub(crate) fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.phone_number_id().is_none() {
            problems.push("whatsapp.phone_number_id is required".to_string());
        }
        if required_secret(self.access_token.as_ref(), "whatsapp.access_token").is_err() {
            problems.push("whatsapp.access_token is required".to_string());
        }
        problems
    }

    /// Client configuration with the token exposed
    pub fn to_client_config(&self) -> Result<WhatsAppClientConfig, ApplicationError> {
        let phone_number_id = self.phone_number_id().ok_or_else(|| {
            ApplicationError::Configuration("whatsapp.phone_number_id is required".to_string())
        })?;

        Ok(WhatsAppClientConfig {
            base_url: self.base_url.clone(),
            api_version: self.api_version.clone(),
            phone_number_id: phone_number_id.to_string(),
            access_token: required_secret(self.access_token.as_ref(), "whatsapp.access_token")?,
            timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }
}
