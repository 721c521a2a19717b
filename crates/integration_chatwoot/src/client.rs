//! Chatwoot application API client
//!
//! Account-scoped v1 endpoints for contacts, conversations and messages.
//! Authentication uses the `api_access_token` header.

use std::time::Duration;

use reqwest::{
    Client, RequestBuilder, Response, StatusCode,
    multipart::{Form, Part},
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::models::{
    AttachmentUpload, ChatwootContact, ChatwootConversation, ChatwootMessage,
    CreateContactRequest, CreateConversationRequest, CreateMessageRequest, CreatedContact,
    ListPayload, SinglePayload, ToggleStatusResult,
};

const AUTH_HEADER: &str = "api_access_token";
const DUPLICATE_MARKER: &str = "already been taken";

/// Chatwoot API errors
#[derive(Debug, Error)]
pub enum ChatwootError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Missing configuration: {0}")]
    Configuration(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl ChatwootError {
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }

    /// Uniqueness violation on create (phone number or identifier in use)
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Api { status: 422, message } if message.contains(DUPLICATE_MARKER))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(e) if e.is_timeout())
    }

    /// Network failures, throttling and server errors
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Chatwoot client configuration
#[derive(Debug, Clone)]
pub struct ChatwootClientConfig {
    /// Installation URL, e.g. `https://app.chatwoot.com`
    pub base_url: String,
    pub account_id: u64,
    /// User or bot access token
    pub api_token: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ChatwootClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            account_id: 0,
            api_token: String::new(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Chatwoot application API client
#[derive(Debug, Clone)]
pub struct ChatwootClient {
    client: Client,
    config: ChatwootClientConfig,
    account_url: String,
}

impl ChatwootClient {
    /// Create a new Chatwoot client
    pub fn new(config: ChatwootClientConfig) -> Result<Self, ChatwootError> {
        if config.base_url.is_empty() {
            return Err(ChatwootError::Configuration(
                "base_url is required".to_string(),
            ));
        }
        if config.api_token.is_empty() {
            return Err(ChatwootError::Configuration(
                "api_token is required".to_string(),
            ));
        }
        if config.account_id == 0 {
            return Err(ChatwootError::Configuration(
                "account_id is required".to_string(),
            ));
        }

        let account_url = format!(
            "{}/api/v1/accounts/{}",
            config.base_url.trim_end_matches('/'),
            config.account_id
        );

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            config,
            account_url,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.account_url)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTH_HEADER, &self.config.api_token)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ChatwootError> {
        let response = self.authed(request).send().await?;
        let response = check_status(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ChatwootError::InvalidResponse(e.to_string()))
    }

    /// Exact phone-number match over any of `phones`
    #[instrument(skip(self), fields(variants = phones.len()))]
    pub async fn filter_contacts(
        &self,
        phones: &[String],
    ) -> Result<Vec<ChatwootContact>, ChatwootError> {
        if phones.is_empty() {
            return Ok(Vec::new());
        }

        let last = phones.len() - 1;
        let conditions: Vec<serde_json::Value> = phones
            .iter()
            .enumerate()
            .map(|(i, phone)| {
                let chain = (i != last).then_some("OR");
                serde_json::json!({
                    "attribute_key": "phone_number",
                    "filter_operator": "equal_to",
                    "values": [format!("+{}", phone.trim_start_matches('+'))],
                    "query_operator": chain,
                })
            })
            .collect();

        let result: ListPayload<ChatwootContact> = self
            .execute(
                self.client
                    .post(self.url("contacts/filter"))
                    .json(&serde_json::json!({ "payload": conditions })),
            )
            .await?;

        debug!(found = result.payload.len(), "Filtered contacts");
        Ok(result.payload)
    }

    /// Free-text contact search (name, phone, email, identifier)
    #[instrument(skip(self))]
    pub async fn search_contacts(&self, query: &str) -> Result<Vec<ChatwootContact>, ChatwootError> {
        let result: ListPayload<ChatwootContact> = self
            .execute(
                self.client
                    .get(self.url("contacts/search"))
                    .query(&[("q", query)]),
            )
            .await?;

        debug!(found = result.payload.len(), "Searched contacts");
        Ok(result.payload)
    }

    #[instrument(skip(self))]
    pub async fn get_contact(&self, contact_id: u64) -> Result<ChatwootContact, ChatwootError> {
        let result: SinglePayload<ChatwootContact> = self
            .execute(self.client.get(self.url(&format!("contacts/{contact_id}"))))
            .await?;
        Ok(result.payload)
    }

    #[instrument(skip(self, request), fields(identifier = %request.identifier))]
    pub async fn create_contact(
        &self,
        request: &CreateContactRequest,
    ) -> Result<ChatwootContact, ChatwootError> {
        let result: SinglePayload<CreatedContact> = self
            .execute(self.client.post(self.url("contacts")).json(request))
            .await?;

        debug!(contact_id = result.payload.contact.id, "Created contact");
        Ok(result.payload.contact)
    }

    #[instrument(skip(self))]
    pub async fn list_contact_conversations(
        &self,
        contact_id: u64,
    ) -> Result<Vec<ChatwootConversation>, ChatwootError> {
        let result: ListPayload<ChatwootConversation> = self
            .execute(
                self.client
                    .get(self.url(&format!("contacts/{contact_id}/conversations"))),
            )
            .await?;
        Ok(result.payload)
    }

    #[instrument(skip(self))]
    pub async fn get_conversation(
        &self,
        conversation_id: u64,
    ) -> Result<ChatwootConversation, ChatwootError> {
        self.execute(
            self.client
                .get(self.url(&format!("conversations/{conversation_id}"))),
        )
        .await
    }

    #[instrument(skip(self, request), fields(contact_id = request.contact_id, inbox_id = request.inbox_id))]
    pub async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> Result<ChatwootConversation, ChatwootError> {
        let conversation: ChatwootConversation = self
            .execute(self.client.post(self.url("conversations")).json(request))
            .await?;

        debug!(conversation_id = conversation.id, "Created conversation");
        Ok(conversation)
    }

    /// Set a conversation's status, returning the status the server reports
    #[instrument(skip(self))]
    pub async fn toggle_status(
        &self,
        conversation_id: u64,
        status: &str,
    ) -> Result<String, ChatwootError> {
        let result: SinglePayload<ToggleStatusResult> = self
            .execute(
                self.client
                    .post(self.url(&format!("conversations/{conversation_id}/toggle_status")))
                    .json(&serde_json::json!({ "status": status })),
            )
            .await?;

        Ok(result
            .payload
            .current_status
            .unwrap_or_else(|| status.to_string()))
    }

    #[instrument(skip(self, request), fields(message_type = request.message_type.as_str()))]
    pub async fn create_message(
        &self,
        conversation_id: u64,
        request: &CreateMessageRequest,
    ) -> Result<ChatwootMessage, ChatwootError> {
        self.execute(
            self.client
                .post(self.url(&format!("conversations/{conversation_id}/messages")))
                .json(request),
        )
        .await
    }

    /// Create a message carrying one file, as multipart form data
    #[instrument(skip(self, request, attachment), fields(file_name = %attachment.file_name, size = attachment.data.len()))]
    pub async fn create_message_with_attachment(
        &self,
        conversation_id: u64,
        request: &CreateMessageRequest,
        attachment: AttachmentUpload,
    ) -> Result<ChatwootMessage, ChatwootError> {
        let file_part = Part::bytes(attachment.data)
            .file_name(attachment.file_name)
            .mime_str(&attachment.mime_type)
            .map_err(|e| ChatwootError::Configuration(format!("Invalid MIME type: {e}")))?;

        let mut form = Form::new()
            .text("content", request.content.clone())
            .text("message_type", request.message_type.as_str())
            .text("private", request.private.to_string())
            .part("attachments[]", file_part);

        if let Some(source_id) = &request.source_id {
            form = form.text("source_id", source_id.clone());
        }

        self.execute(
            self.client
                .post(self.url(&format!("conversations/{conversation_id}/messages")))
                .multipart(form),
        )
        .await
    }

    /// Check if the helpdesk is reachable with the configured token
    #[instrument(skip(self))]
    pub async fn is_available(&self) -> bool {
        self.authed(self.client.get(self.url("inboxes")))
            .send()
            .await
            .is_ok_and(|res| res.status().is_success())
    }
}

async fn check_status(response: Response) -> Result<Response, ChatwootError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(api_error(status, &body))
}

/// Chatwoot reports errors as `{"message": ...}`, `{"error": ...}` or
/// `{"errors": [...]}` depending on the endpoint
fn api_error(status: StatusCode, body: &str) -> ChatwootError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("error"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
                .or_else(|| {
                    value.get("errors").and_then(|e| e.as_array()).map(|errors| {
                        errors
                            .iter()
                            .map(|e| e.as_str().map_or_else(|| e.to_string(), str::to_string))
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                })
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body.chars().take(200).collect()
            }
        });

    ChatwootError::Api {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ChatwootClientConfig {
        ChatwootClientConfig {
            base_url: "https://helpdesk.example.com/".to_string(),
            account_id: 3,
            api_token: "token".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn client_creation_requires_token() {
        let result = ChatwootClient::new(ChatwootClientConfig {
            api_token: String::new(),
            ..test_config()
        });
        assert!(matches!(result, Err(ChatwootError::Configuration(_))));
    }

    #[test]
    fn client_creation_requires_account() {
        let result = ChatwootClient::new(ChatwootClientConfig {
            account_id: 0,
            ..test_config()
        });
        assert!(matches!(result, Err(ChatwootError::Configuration(_))));
    }

    #[test]
    fn urls_are_account_scoped() {
        let client = ChatwootClient::new(test_config()).unwrap();
        assert_eq!(
            client.url("contacts/search"),
            "https://helpdesk.example.com/api/v1/accounts/3/contacts/search"
        );
    }

    #[test]
    fn duplicate_errors_are_detected() {
        let err = api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message":"Phone number has already been taken"}"#,
        );
        assert!(err.is_duplicate());
        assert!(!err.is_transient());
    }

    #[test]
    fn other_validation_errors_are_not_duplicates() {
        let err = api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"errors":["Name can't be blank"]}"#,
        );
        assert!(!err.is_duplicate());
        assert!(err.to_string().contains("can't be blank"));
    }

    #[test]
    fn not_found_is_detected() {
        let err = api_error(StatusCode::NOT_FOUND, r#"{"error":"Resource could not be found"}"#);
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn server_errors_are_transient() {
        assert!(api_error(StatusCode::INTERNAL_SERVER_ERROR, "").is_transient());
        assert!(api_error(StatusCode::TOO_MANY_REQUESTS, "slow down").is_transient());
        assert!(!api_error(StatusCode::UNAUTHORIZED, "").is_transient());
    }
}
