//! Integration tests for WhatsApp client using WireMock
//!
//! These tests mock the Graph-style gateway to verify request shapes and
//! response handling without making actual API calls.

use std::time::Duration;

use integration_whatsapp::{
    OutgoingMedia, OutgoingMediaType, WhatsAppClient, WhatsAppClientConfig, WhatsAppError,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, body_string_contains, header, method, path},
};

// =============================================================================
// Test Helpers
// =============================================================================

fn test_config(base_url: &str) -> WhatsAppClientConfig {
    WhatsAppClientConfig {
        base_url: base_url.to_string(),
        api_version: "v18.0".to_string(),
        phone_number_id: "123456789".to_string(),
        access_token: "test_access_token".to_string(),
        timeout: Duration::from_secs(5),
    }
}

fn client_for(server: &MockServer) -> WhatsAppClient {
    WhatsAppClient::new(test_config(&server.uri())).unwrap()
}

/// Sample success response for a message send
fn send_message_success_response() -> serde_json::Value {
    serde_json::json!({
        "messaging_product": "whatsapp",
        "contacts": [{
            "input": "5511987654321",
            "wa_id": "5511987654321"
        }],
        "messages": [{
            "id": "wamid.HBgNNDkxMjM0NTY3ODkwFQIAERgSMEQ3RkE2NTYxQTY5MTlBMjJBAA=="
        }]
    })
}

/// Sample API error response
fn api_error_response(code: i32, message: &str) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "code": code,
            "message": message,
            "type": "OAuthException",
            "fbtrace_id": "AbcDefGhiJkL"
        }
    })
}

// =============================================================================
// Send Message Tests
// =============================================================================

mod send_message_tests {
    use super::*;

    #[tokio::test]
    async fn sends_text_with_bearer_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v18.0/123456789/messages"))
            .and(header("authorization", "Bearer test_access_token"))
            .and(body_partial_json(serde_json::json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": "5511987654321",
                "type": "text",
                "text": { "body": "Hello" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(send_message_success_response()))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server)
            .send_text("+55 11 98765-4321", "Hello")
            .await
            .unwrap();

        assert!(response.message_id().unwrap().starts_with("wamid."));
    }

    #[tokio::test]
    async fn sends_to_groups_with_group_recipient_type() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v18.0/123456789/messages"))
            .and(body_partial_json(serde_json::json!({
                "recipient_type": "group",
                "to": "120363025246125486@g.us"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(send_message_success_response()))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .send_text("120363025246125486@g.us", "hi all")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn invalid_recipient_is_rejected_before_sending() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = client_for(&server).send_text("+12", "Hello").await;
        assert!(matches!(result, Err(WhatsAppError::InvalidRecipient(_))));
    }

    #[tokio::test]
    async fn api_errors_carry_status_and_code() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v18.0/123456789/messages"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(api_error_response(131_030, "Recipient not in allowed list")),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send_text("5511987654321", "Hello")
            .await
            .unwrap_err();

        match err {
            WhatsAppError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code, 131_030);
                assert!(message.contains("allowed list"));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send_text("5511987654321", "Hello")
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn slow_gateway_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(send_message_success_response())
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = WhatsAppClient::new(WhatsAppClientConfig {
            timeout: Duration::from_millis(200),
            ..test_config(&server.uri())
        })
        .unwrap();

        let err = client.send_text("5511987654321", "Hello").await.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.is_transient());
    }
}

// =============================================================================
// Media Tests
// =============================================================================

mod media_tests {
    use super::*;

    #[tokio::test]
    async fn sends_image_with_caption() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v18.0/123456789/messages"))
            .and(body_partial_json(serde_json::json!({
                "type": "image",
                "image": { "id": "media-1", "caption": "look" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(send_message_success_response()))
            .expect(1)
            .mount(&server)
            .await;

        let media = OutgoingMedia {
            media_type: OutgoingMediaType::Image,
            media_id: "media-1".to_string(),
            caption: Some("look".to_string()),
            file_name: Some("photo.jpg".to_string()),
        };

        client_for(&server)
            .send_media("5511987654321", &media)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn sends_document_with_filename() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v18.0/123456789/messages"))
            .and(body_partial_json(serde_json::json!({
                "type": "document",
                "document": { "id": "doc-1", "filename": "invoice.pdf" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(send_message_success_response()))
            .expect(1)
            .mount(&server)
            .await;

        let media = OutgoingMedia {
            media_type: OutgoingMediaType::Document,
            media_id: "doc-1".to_string(),
            caption: None,
            file_name: Some("invoice.pdf".to_string()),
        };

        client_for(&server)
            .send_media("5511987654321", &media)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn uploads_media_as_multipart() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v18.0/123456789/media"))
            .and(header("authorization", "Bearer test_access_token"))
            .and(body_string_contains("messaging_product"))
            .and(body_string_contains("voice.ogg"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "up-42" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let media_id = client_for(&server)
            .upload_media(b"OggS".to_vec(), "audio/ogg", "voice.ogg")
            .await
            .unwrap();

        assert_eq!(media_id, "up-42");
    }

    #[tokio::test]
    async fn downloads_media_in_two_steps() {
        let server = MockServer::start().await;
        let cdn_url = format!("{}/cdn/media-7", server.uri());

        Mock::given(method("GET"))
            .and(path("/v18.0/media-7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": cdn_url,
                "mime_type": "image/png",
                "file_size": 4
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/cdn/media-7"))
            .and(header("authorization", "Bearer test_access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
            .expect(1)
            .mount(&server)
            .await;

        let media = client_for(&server).download_media("media-7").await.unwrap();
        assert_eq!(media.bytes, vec![0x89, b'P', b'N', b'G']);
        assert_eq!(media.mime_type, "image/png");
    }

    #[tokio::test]
    async fn unknown_media_is_an_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v18.0/missing"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(api_error_response(100, "Media not found")),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .download_media("missing")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_transient());
    }
}

// =============================================================================
// Availability Tests
// =============================================================================

mod availability_tests {
    use super::*;

    #[tokio::test]
    async fn available_when_phone_number_resolves() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v18.0/123456789"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "123456789" })))
            .mount(&server)
            .await;

        assert!(client_for(&server).is_available().await);
    }

    #[tokio::test]
    async fn unavailable_on_auth_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        assert!(!client_for(&server).is_available().await);
    }
}
