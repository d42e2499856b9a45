use std::sync::Arc;
use std::time::Duration;

use replyhint_agent::{build_generation_client, ClientBuildError, GenerationClient};
use replyhint_core::config::{AppConfig, ConfigError};
#[cfg(test)]
use replyhint_core::config::LoadOptions;
use replyhint_core::notifications::{
    spawn_eviction_sweeper, InMemoryNotificationStore, NotificationStore,
};
use replyhint_slack::{
    default_dispatcher, EventDispatcher, SignatureVerifier, SlackApi, SlackWebClient,
    SuggestionPipeline, SuggestionWorker,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::webhook::WebhookState;

const SLACK_API_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Application {
    pub config: AppConfig,
    pub dispatcher: Arc<EventDispatcher>,
    pub worker: Arc<SuggestionWorker>,
    pub store: Arc<dyn NotificationStore>,
    pub verifier: SignatureVerifier,
    pub shutdown: CancellationToken,
    pub sweeper: JoinHandle<()>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("generation client setup failed: {0}")]
    GenerationClient(#[from] ClientBuildError),
    #[error("slack client setup failed: {0}")]
    SlackClient(#[source] reqwest::Error),
}

impl Application {
    pub fn webhook_state(&self) -> WebhookState {
        WebhookState::new(self.verifier.clone(), self.dispatcher.clone())
    }

    /// Drains the worker within the configured grace period, then stops the
    /// sweeper.
    pub async fn shutdown(self) -> usize {
        let abandoned = self.worker.shutdown(self.config.server.graceful_shutdown()).await;
        self.shutdown.cancel();
        let _ = self.sweeper.await;
        let tracked_notifications = self.store.len().await;
        info!(
            event_name = "system.bootstrap.stopped",
            correlation_id = "shutdown",
            abandoned,
            tracked_notifications,
            "application stopped"
        );
        abandoned
    }
}

/// `main` loads the config itself first because logging depends on it.
#[cfg(test)]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let generator = build_generation_client(&config.llm)?;
    info!(
        event_name = "system.bootstrap.generation_client_ready",
        correlation_id = "bootstrap",
        provider = generator.provider_name(),
        model = %config.llm.model,
        "generation client initialized"
    );

    let slack = SlackWebClient::new(
        config.slack.bot_token.clone(),
        &config.slack.api_base_url,
        SLACK_API_TIMEOUT,
    )
    .map_err(BootstrapError::SlackClient)?;

    Ok(assemble(config, generator, Arc::new(slack)))
}

/// Wires the store, worker and dispatcher around the given outbound clients.
pub fn assemble(
    config: AppConfig,
    generator: Arc<dyn GenerationClient>,
    slack: Arc<dyn SlackApi>,
) -> Application {
    let suggestions = &config.suggestions;
    let store: Arc<dyn NotificationStore> =
        Arc::new(InMemoryNotificationStore::new(suggestions.notification_ttl()));
    let shutdown = CancellationToken::new();
    let sweeper =
        spawn_eviction_sweeper(store.clone(), suggestions.sweep_interval(), shutdown.clone());

    let pipeline =
        SuggestionPipeline::new(generator, slack, store.clone(), suggestions.fallback_text.clone());
    let worker = Arc::new(SuggestionWorker::start(
        Arc::new(pipeline),
        suggestions.worker_concurrency,
        suggestions.queue_capacity,
    ));
    let dispatcher = Arc::new(default_dispatcher(worker.clone()));
    let verifier = SignatureVerifier::new(config.slack.signing_secret.clone());

    info!(
        event_name = "system.bootstrap.worker_started",
        correlation_id = "bootstrap",
        worker_concurrency = suggestions.worker_concurrency,
        queue_capacity = suggestions.queue_capacity,
        notification_ttl_secs = suggestions.notification_ttl_secs,
        handlers = dispatcher.handler_count(),
        "suggestion worker started"
    );

    Application { config, dispatcher, worker, store, verifier, shutdown, sweeper }
}

#[cfg(test)]
mod tests {
    use replyhint_core::config::{ConfigOverrides, LlmProvider, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn overrides() -> ConfigOverrides {
        ConfigOverrides {
            llm_provider: Some(LlmProvider::Gemini),
            llm_api_key: Some("test-google-key".to_owned()),
            slack_bot_token: Some("xoxb-test".to_owned()),
            slack_signing_secret: Some("test-signing-secret".to_owned()),
            ..ConfigOverrides::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_with_app_level_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                slack_bot_token: Some("xapp-1-not-a-bot-token".to_owned()),
                ..overrides()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.bot_token"), "unexpected message: {message}");
    }

    #[tokio::test]
    async fn bootstrap_wires_all_handlers_and_shuts_down_cleanly() {
        let app = bootstrap(LoadOptions { overrides: overrides(), ..LoadOptions::default() })
            .await
            .expect("bootstrap should succeed with valid overrides");

        assert_eq!(app.dispatcher.handler_count(), 3);
        assert_eq!(app.store.len().await, 0);
        assert!(!app.worker.is_shutting_down());

        let worker = app.worker.clone();
        assert_eq!(app.shutdown().await, 0);
        assert!(worker.is_shutting_down());
    }
}
