//! Bridge assembly
//!
//! Builds the adapters, resolvers and media pipeline from an [`AppConfig`]
//! and owns the background tasks they need.

use std::{fmt, sync::Arc, time::Duration};

use application::{
    ApplicationError, BridgeService, ChatMappingStore, ConversationResolver, IdentityResolver,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    adapters::{
        ChatwootHelpdeskAdapter, HttpMediaFetcher, MediaPipeline, WhatsAppMessageSourceAdapter,
    },
    cache::{ResolutionCache, SweeperHandle},
    config::AppConfig,
    persistence::{SqliteChatMappingStore, create_pool},
};

/// A running bridge: the service plus the tasks that keep it healthy
pub struct BridgeRuntime {
    service: Arc<BridgeService>,
    cache: Arc<ResolutionCache>,
    sweeper: SweeperHandle,
    cancel: CancellationToken,
}

impl fmt::Debug for BridgeRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeRuntime")
            .field("service", &self.service)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl BridgeRuntime {
    /// Validate `config`, connect every adapter and start the cache sweeper
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(config: &AppConfig) -> Result<Self, ApplicationError> {
        config.validate()?;

        let helpdesk = Arc::new(
            ChatwootHelpdeskAdapter::new(config.chatwoot.to_client_config()?)
                .map_err(|e| ApplicationError::Configuration(format!("chatwoot: {e}")))?
                .with_read_retry(config.retry.to_retry_config()),
        );
        let gateway = Arc::new(
            WhatsAppMessageSourceAdapter::new(config.whatsapp.to_client_config()?)
                .map_err(|e| ApplicationError::Configuration(format!("whatsapp: {e}")))?,
        );

        let fetcher = HttpMediaFetcher::new(config.media.item_timeout())?;
        let fetcher = match config.media.max_download_bytes {
            Some(max) => fetcher.with_max_bytes(max),
            None => fetcher,
        };

        let pipeline = MediaPipeline::new(
            helpdesk.clone(),
            gateway.clone(),
            Arc::new(fetcher),
            config
                .media
                .to_pipeline_config(&config.circuit_breaker),
        );

        let pool = create_pool(&config.database)?;
        let mappings: Arc<dyn ChatMappingStore> = Arc::new(SqliteChatMappingStore::new(Arc::new(pool)));

        let cache = Arc::new(ResolutionCache::new(
            &config.cache.to_resolution_cache_config(),
        ));
        let cancel = CancellationToken::new();
        let sweeper = cache.spawn_sweeper(cancel.child_token());

        let inbox_id = config.chatwoot.inbox_id();
        let service = BridgeService::new(
            IdentityResolver::new(helpdesk.clone(), cache.clone(), inbox_id),
            ConversationResolver::new(
                helpdesk.clone(),
                mappings,
                cache.clone(),
                config.bridge.conversation_policy(),
            ),
            helpdesk,
            gateway,
            Arc::new(pipeline),
            config.bridge.bridge_config(inbox_id),
        );

        info!(
            inbox_id = %inbox_id,
            media_workers = config.media.workers,
            database = %config.database.path,
            "Bridge started"
        );

        Ok(Self {
            service: Arc::new(service),
            cache,
            sweeper,
            cancel,
        })
    }

    pub fn service(&self) -> Arc<BridgeService> {
        Arc::clone(&self.service)
    }

    pub const fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    /// Token handed to event handlers; cancelled on shutdown
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Cancel in-flight work, then wait for mapping writes and the sweeper
    ///
    /// Mapping writes get at most `grace` to land.
    pub async fn shutdown(self, grace: Duration) {
        self.cancel.cancel();

        let flush = self.service.conversations().flush_mapping_writes();
        if tokio::time::timeout(grace, flush).await.is_err() {
            warn!(grace_ms = grace.as_millis(), "Mapping writes still pending at shutdown");
        }

        self.sweeper.shutdown().await;
        info!("Bridge stopped");
    }
}

#[cfg(test)]
mod tests {
    use application::ResolutionCachePort;
    use config::{File, FileFormat};

    use super::*;

    fn app_config(extra: &str) -> AppConfig {
        let toml = format!(
            r#"
            [chatwoot]
            base_url = "http://127.0.0.1:9"
            account_id = 1
            inbox_id = 4
            api_token = "cw-token"

            [whatsapp]
            base_url = "http://127.0.0.1:9"
            phone_number_id = "1055"
            access_token = "wa-token"

            [database]
            path = ":memory:"

            {extra}
            "#
        );
        AppConfig::load_from(File::from_str(&toml, FileFormat::Toml)).unwrap()
    }

    #[tokio::test]
    async fn starts_and_stops() {
        let runtime = BridgeRuntime::start(&app_config("")).unwrap();
        let token = runtime.cancellation();
        assert!(!token.is_cancelled());
        assert_eq!(runtime.cache().stats().contacts, 0);

        runtime.shutdown(Duration::from_secs(1)).await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let err = BridgeRuntime::start(&AppConfig::default()).unwrap_err();
        assert!(matches!(err, ApplicationError::Configuration(_)));
    }

    #[tokio::test]
    async fn zero_workers_is_rejected() {
        let result = BridgeRuntime::start(&app_config("[media]\nworkers = 0"));
        assert!(matches!(result, Err(ApplicationError::Configuration(_))));
    }
}
