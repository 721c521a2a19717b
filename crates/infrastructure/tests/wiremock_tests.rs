//! Integration tests for infrastructure crate
//!
//! Tests cover:
//! - Inbound bridging against a mocked Chatwoot installation
//! - Agent replies against a mocked WhatsApp Cloud API
//! - Media batches with a failing item

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::{sync::Arc, time::Duration};

use application::{
    ApplicationError, BridgeConfig, BridgeOutcome, BridgeService, ConversationPolicy,
    ConversationResolver, IdentityResolver, InboundMessage, MessageDirection, OutboundReply,
};
use domain::{ChatId, ContactId, ConversationId, InboxId, MediaItem, WhatsAppIdentity};
use infrastructure::{
    ChatwootHelpdeskAdapter, HttpMediaFetcher, InMemoryChatMappingStore, MediaPipeline,
    MediaPipelineConfig, ResolutionCache, ResolutionCacheConfig, RetryConfig,
    WhatsAppMessageSourceAdapter,
};
use integration_chatwoot::ChatwootClientConfig;
use integration_whatsapp::WhatsAppClientConfig;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

const ACCOUNT: &str = "/api/v1/accounts/1";
const INBOX: u64 = 4;
const PHONE: &str = "5511987654321";

struct Harness {
    service: BridgeService,
    mappings: Arc<InMemoryChatMappingStore>,
}

fn harness(chatwoot: &MockServer, whatsapp: &MockServer) -> Harness {
    let helpdesk = Arc::new(
        ChatwootHelpdeskAdapter::new(ChatwootClientConfig {
            base_url: chatwoot.uri(),
            account_id: 1,
            api_token: "cw-token".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
        .with_read_retry(RetryConfig::disabled()),
    );
    let gateway = Arc::new(
        WhatsAppMessageSourceAdapter::new(WhatsAppClientConfig {
            base_url: whatsapp.uri(),
            phone_number_id: "1055".to_string(),
            access_token: "wa-token".to_string(),
            ..WhatsAppClientConfig::default()
        })
        .unwrap(),
    );
    let fetcher = Arc::new(HttpMediaFetcher::new(Duration::from_secs(5)).unwrap());

    let cache = Arc::new(ResolutionCache::new(&ResolutionCacheConfig::default()));
    let mappings = Arc::new(InMemoryChatMappingStore::new());

    let pipeline = MediaPipeline::new(
        helpdesk.clone(),
        gateway.clone(),
        fetcher,
        MediaPipelineConfig {
            workers: 2,
            stagger: Duration::from_millis(10),
            ..MediaPipelineConfig::default()
        },
    );

    let inbox_id = InboxId::new(INBOX);
    let service = BridgeService::new(
        IdentityResolver::new(helpdesk.clone(), cache.clone(), inbox_id),
        ConversationResolver::new(
            helpdesk.clone(),
            mappings.clone(),
            cache,
            ConversationPolicy::default(),
        ),
        helpdesk,
        gateway,
        Arc::new(pipeline),
        BridgeConfig {
            inbox_id,
            sign_agent_messages: true,
        },
    );

    Harness { service, mappings }
}

fn text_message(id: &str, text: &str) -> InboundMessage {
    InboundMessage {
        message_id: id.to_string(),
        chat_id: ChatId::new(PHONE).unwrap(),
        chat: WhatsAppIdentity::Phone(PHONE.to_string()),
        chat_name: "Maria".to_string(),
        participant_name: None,
        avatar_url: None,
        from_me: false,
        text: Some(text.to_string()),
        media: Vec::new(),
    }
}

/// Chatwoot with no contacts, accepting one contact and one conversation
async fn mount_empty_helpdesk(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("{ACCOUNT}/contacts/filter")))
        .and(header("api_access_token", "cw-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "payload": [] })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{ACCOUNT}/contacts/search")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "payload": [] })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("{ACCOUNT}/contacts")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "payload": {
                "contact": { "id": 30, "name": "Maria", "phone_number": "+5511987654321", "identifier": PHONE }
            }
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{ACCOUNT}/contacts/30/conversations")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "payload": [] })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("{ACCOUNT}/conversations")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 12,
            "inbox_id": INBOX,
            "status": "open",
            "contact_inbox": { "contact_id": 30, "source_id": PHONE }
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_messages(server: &MockServer, conversation: u64, times: u64) {
    Mock::given(method("POST"))
        .and(path(format!("{ACCOUNT}/conversations/{conversation}/messages")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 900,
            "message_type": "incoming"
        })))
        .expect(times)
        .mount(server)
        .await;
}

mod inbound_tests {
    use super::*;

    #[tokio::test]
    async fn new_phone_creates_contact_and_conversation() {
        let chatwoot = MockServer::start().await;
        let whatsapp = MockServer::start().await;
        mount_empty_helpdesk(&chatwoot).await;
        mount_messages(&chatwoot, 12, 1).await;

        let h = harness(&chatwoot, &whatsapp);
        let outcome = h
            .service
            .handle_inbound(text_message("wamid.1", "Olá"), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            BridgeOutcome::Delivered {
                conversation_id: ConversationId::new(12),
                messages: 1,
            }
        );

        h.service.conversations().flush_mapping_writes().await;
        assert_eq!(h.mappings.len(), 1);
    }

    #[tokio::test]
    async fn second_message_reuses_contact_and_conversation() {
        let chatwoot = MockServer::start().await;
        let whatsapp = MockServer::start().await;
        mount_empty_helpdesk(&chatwoot).await;
        mount_messages(&chatwoot, 12, 2).await;

        let h = harness(&chatwoot, &whatsapp);
        h.service
            .handle_inbound(text_message("wamid.1", "primeira"), CancellationToken::new())
            .await
            .unwrap();
        h.service.conversations().flush_mapping_writes().await;

        let outcome = h
            .service
            .handle_inbound(text_message("wamid.2", "segunda"), CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            BridgeOutcome::Delivered { conversation_id, .. } if conversation_id == ConversationId::new(12)
        ));
        // Creation mocks verify `.expect(1)` when the server drops
    }

    #[tokio::test]
    async fn failing_item_does_not_stop_the_batch() {
        let chatwoot = MockServer::start().await;
        let whatsapp = MockServer::start().await;
        let files = MockServer::start().await;
        mount_empty_helpdesk(&chatwoot).await;
        // Text plus the four items that download
        mount_messages(&chatwoot, 12, 5).await;

        for n in [1, 2, 4, 5] {
            Mock::given(method("GET"))
                .and(path(format!("/files/{n}.pdf")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("content-type", "application/pdf")
                        .set_body_bytes(b"%PDF-1.4".to_vec()),
                )
                .mount(&files)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/files/3.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&files)
            .await;

        let mut message = text_message("wamid.3", "segue os boletos");
        message.media = (1..=5)
            .map(|n| {
                MediaItem::from_url(
                    format!("{}/files/{n}.pdf", files.uri()),
                    format!("{n}.pdf"),
                    "application/pdf",
                )
            })
            .collect();

        let h = harness(&chatwoot, &whatsapp);
        let err = h
            .service
            .handle_inbound(message, CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            ApplicationError::MediaDispatch {
                failed,
                total,
                first,
            } => {
                assert_eq!(failed, 1);
                assert_eq!(total, 5);
                assert_eq!(first.index, 2);
            },
            other => panic!("expected media dispatch error, got {other:?}"),
        }
    }
}

mod outbound_tests {
    use super::*;

    #[tokio::test]
    async fn agent_reply_is_sent_to_the_contact() {
        let chatwoot = MockServer::start().await;
        let whatsapp = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v18.0/1055/messages"))
            .and(header("authorization", "Bearer wa-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messaging_product": "whatsapp",
                "contacts": [{ "input": PHONE, "wa_id": PHONE }],
                "messages": [{ "id": "wamid.out" }]
            })))
            .expect(1)
            .mount(&whatsapp)
            .await;

        let h = harness(&chatwoot, &whatsapp);
        let outcome = h
            .service
            .handle_outbound(
                OutboundReply {
                    message_id: 77,
                    conversation_id: ConversationId::new(12),
                    inbox_id: InboxId::new(INBOX),
                    direction: MessageDirection::Outgoing,
                    private: false,
                    content: Some("Seu pedido saiu".to_string()),
                    agent_name: Some("Ana".to_string()),
                    contact_id: Some(ContactId::new(30)),
                    recipient: Some(WhatsAppIdentity::Phone(PHONE.to_string())),
                    attachments: Vec::new(),
                },
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            BridgeOutcome::Delivered {
                conversation_id: ConversationId::new(12),
                messages: 1,
            }
        );
    }

    #[tokio::test]
    async fn private_notes_never_reach_whatsapp() {
        let chatwoot = MockServer::start().await;
        let whatsapp = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&whatsapp)
            .await;

        let h = harness(&chatwoot, &whatsapp);
        let outcome = h
            .service
            .handle_outbound(
                OutboundReply {
                    message_id: 78,
                    conversation_id: ConversationId::new(12),
                    inbox_id: InboxId::new(INBOX),
                    direction: MessageDirection::Outgoing,
                    private: true,
                    content: Some("nota interna".to_string()),
                    agent_name: None,
                    contact_id: None,
                    recipient: Some(WhatsAppIdentity::Phone(PHONE.to_string())),
                    attachments: Vec::new(),
                },
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(matches!(outcome, BridgeOutcome::Skipped(_)));
    }
}
