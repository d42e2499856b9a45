use std::sync::Arc;

use chrono::Utc;
use replyhint_agent::GenerationClient;
use replyhint_core::domain::{DismissRequest, NotificationId, NotificationIdMinter, SuggestionRequest};
use replyhint_core::errors::LifecycleError;
use replyhint_core::flows::{FlowAction, FlowEvent, FlowRun};
use replyhint_core::notifications::NotificationStore;
use tracing::{error, info, warn};

use crate::api::SlackApi;
use crate::blocks::{dismissal_confirmation, plain_notice, render_suggestions};

/// How a queued job ended. Nothing else leaves the worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Suggestions (or the apology) were posted and are tracked under this id.
    Delivered { notification_id: NotificationId },
    /// The main post failed and the plain apology went out instead.
    FallbackDelivered,
    /// Both posts failed, or the job never ran to completion.
    Dropped,
    Dismissed { notification_id: NotificationId },
    /// Dismiss click for an unknown id or from someone else; nothing happened.
    DismissIgnored,
}

/// Everything a job needs to talk to the outside world.
pub struct SuggestionPipeline {
    generator: Arc<dyn GenerationClient>,
    slack: Arc<dyn SlackApi>,
    store: Arc<dyn NotificationStore>,
    minter: NotificationIdMinter,
    fallback_text: String,
}

impl SuggestionPipeline {
    pub fn new(
        generator: Arc<dyn GenerationClient>,
        slack: Arc<dyn SlackApi>,
        store: Arc<dyn NotificationStore>,
        fallback_text: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            slack,
            store,
            minter: NotificationIdMinter::new(),
            fallback_text: fallback_text.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    /// generate -> render -> post -> register. A failed post gets exactly one
    /// fallback attempt.
    pub async fn deliver_suggestions(
        &self,
        request: &SuggestionRequest,
        run: &mut FlowRun,
    ) -> DeliveryOutcome {
        let correlation_id = run.correlation_id().to_owned();

        let content = match self.generator.generate(&request.message_text).await {
            Ok(content) => content,
            Err(error) => {
                let error = LifecycleError::from(error);
                warn!(
                    event_name = "suggestion.generation.failed",
                    correlation_id = %correlation_id,
                    provider = self.generator.provider_name(),
                    error_class = error.class(),
                    error = %error,
                    "generation failed, posting apology"
                );
                self.fallback_text.clone()
            }
        };

        let notification_id =
            self.minter.mint(&request.channel_id, request.message_ts.as_deref(), Utc::now());
        let message = render_suggestions(&content, Some(&notification_id));

        match self
            .slack
            .post_ephemeral(
                &request.channel_id,
                &request.user_id,
                request.thread_ts.as_deref(),
                &message,
            )
            .await
        {
            Ok(_) => {
                let actions = advance(run, FlowEvent::NotificationPosted);
                // Registering also schedules expiry; the tracker TTL starts here.
                if actions.contains(&FlowAction::RegisterNotification) {
                    self.register(&notification_id, request, &correlation_id).await;
                }
                info!(
                    event_name = "suggestion.delivered",
                    correlation_id = %correlation_id,
                    channel_id = %request.channel_id,
                    notification_id = %notification_id,
                    threaded = request.thread_ts.is_some(),
                    "suggestions posted"
                );
                DeliveryOutcome::Delivered { notification_id }
            }
            Err(error) => {
                let actions = advance(run, FlowEvent::DeliveryFailed);
                let error = LifecycleError::from(error);
                warn!(
                    event_name = "suggestion.delivery.failed",
                    correlation_id = %correlation_id,
                    channel_id = %request.channel_id,
                    error_class = error.class(),
                    error = %error,
                    "posting suggestions failed"
                );
                if actions.contains(&FlowAction::PostFallback) {
                    self.post_fallback(request, &correlation_id).await
                } else {
                    DeliveryOutcome::Dropped
                }
            }
        }
    }

    async fn register(
        &self,
        notification_id: &NotificationId,
        request: &SuggestionRequest,
        correlation_id: &str,
    ) {
        if let Err(error) =
            self.store.register(notification_id.clone(), request.notification_record()).await
        {
            let error = LifecycleError::from(error);
            error!(
                event_name = "tracker.register_failed",
                correlation_id = %correlation_id,
                notification_id = %notification_id,
                error_class = error.class(),
                error = %error,
                "posted notification could not be tracked"
            );
        }
    }

    async fn post_fallback(&self, request: &SuggestionRequest, correlation_id: &str) -> DeliveryOutcome {
        let notice = plain_notice(&self.fallback_text);
        match self
            .slack
            .post_ephemeral(&request.channel_id, &request.user_id, request.thread_ts.as_deref(), &notice)
            .await
        {
            Ok(_) => {
                info!(
                    event_name = "suggestion.fallback.delivered",
                    correlation_id = %correlation_id,
                    channel_id = %request.channel_id,
                    "fallback apology posted"
                );
                DeliveryOutcome::FallbackDelivered
            }
            Err(error) => {
                error!(
                    event_name = "suggestion.dropped",
                    correlation_id = %correlation_id,
                    channel_id = %request.channel_id,
                    error = %error,
                    "fallback post failed, dropping"
                );
                DeliveryOutcome::Dropped
            }
        }
    }

    /// Only the user the notification was posted for may dismiss it.
    pub async fn dismiss(&self, request: &DismissRequest, correlation_id: &str) -> DeliveryOutcome {
        let notification_id = &request.notification_id;

        let Some(record) = self.store.resolve(notification_id).await else {
            warn!(
                event_name = "tracker.miss",
                correlation_id = %correlation_id,
                notification_id = %notification_id,
                "dismiss for unknown or already dismissed notification"
            );
            return DeliveryOutcome::DismissIgnored;
        };

        if record.user_id != request.user_id {
            warn!(
                event_name = "tracker.dismiss_refused",
                correlation_id = %correlation_id,
                notification_id = %notification_id,
                owner = %record.user_id,
                requested_by = %request.user_id,
                "dismiss from a different user ignored"
            );
            return DeliveryOutcome::DismissIgnored;
        }

        if self.store.dismiss(notification_id).await.is_none() {
            warn!(
                event_name = "tracker.miss",
                correlation_id = %correlation_id,
                notification_id = %notification_id,
                "notification was dismissed concurrently"
            );
            return DeliveryOutcome::DismissIgnored;
        }

        if let Some(response_url) = request.response_url.as_deref() {
            if let Err(error) = self.slack.delete_original(response_url).await {
                warn!(
                    event_name = "tracker.delete_original_failed",
                    correlation_id = %correlation_id,
                    notification_id = %notification_id,
                    error = %error,
                    "suggestion message could not be removed"
                );
            }
        }

        if let Err(error) = self
            .slack
            .post_ephemeral(
                &record.channel_id,
                &record.user_id,
                record.thread_ts.as_deref(),
                &dismissal_confirmation(),
            )
            .await
        {
            warn!(
                event_name = "tracker.dismiss_confirmation_failed",
                correlation_id = %correlation_id,
                notification_id = %notification_id,
                error = %error,
                "dismissed, but confirmation could not be posted"
            );
        } else {
            info!(
                event_name = "tracker.dismissed",
                correlation_id = %correlation_id,
                notification_id = %notification_id,
                "notification dismissed"
            );
        }

        DeliveryOutcome::Dismissed { notification_id: notification_id.clone() }
    }
}

/// Applies `event` and returns the actions the transition asks for. A rejected
/// transition asks for nothing.
pub(crate) fn advance(run: &mut FlowRun, event: FlowEvent) -> Vec<FlowAction> {
    match run.apply(event) {
        Ok(outcome) => outcome.actions,
        Err(error) => {
            warn!(
                event_name = "suggestion.flow.invalid_transition",
                correlation_id = %run.correlation_id(),
                error = %error,
                "flow transition rejected"
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use replyhint_agent::GenerationClient;
    use replyhint_core::domain::SuggestionRequest;
    use replyhint_core::errors::{DeliveryError, GenerationError};
    use replyhint_core::flows::{FlowEvent, FlowRun, FlowState};
    use replyhint_core::notifications::{InMemoryNotificationStore, NotificationStore};
    use tokio::sync::Mutex;

    use super::{DeliveryOutcome, SuggestionPipeline};
    use crate::api::{PostedMessage, SlackApi};
    use crate::blocks::MessageTemplate;

    struct FixedGenerator;

    #[async_trait]
    impl GenerationClient for FixedGenerator {
        async fn generate(&self, _message_text: &str) -> Result<String, GenerationError> {
            Ok("1. 承知しました。".to_owned())
        }

        fn provider_name(&self) -> &'static str {
            "fixed"
        }
    }

    struct ScriptedSlack {
        fail_posts: bool,
        attempts: Mutex<usize>,
    }

    #[async_trait]
    impl SlackApi for ScriptedSlack {
        async fn post_ephemeral(
            &self,
            _channel_id: &str,
            _user_id: &str,
            _thread_ts: Option<&str>,
            _message: &MessageTemplate,
        ) -> Result<PostedMessage, DeliveryError> {
            *self.attempts.lock().await += 1;
            if self.fail_posts {
                return Err(DeliveryError::Api {
                    method: "chat.postEphemeral",
                    error: "channel_not_found".to_owned(),
                });
            }
            Ok(PostedMessage { message_ts: None })
        }

        async fn post_message(
            &self,
            _channel_id: &str,
            _thread_ts: Option<&str>,
            _text: &str,
        ) -> Result<PostedMessage, DeliveryError> {
            Ok(PostedMessage { message_ts: None })
        }

        async fn delete_original(&self, _response_url: &str) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    fn pipeline(fail_posts: bool) -> (SuggestionPipeline, Arc<ScriptedSlack>, Arc<InMemoryNotificationStore>) {
        let slack = Arc::new(ScriptedSlack { fail_posts, attempts: Mutex::new(0) });
        let store = Arc::new(InMemoryNotificationStore::new(Duration::from_secs(120)));
        let pipeline =
            SuggestionPipeline::new(Arc::new(FixedGenerator), slack.clone(), store.clone(), "sorry");
        (pipeline, slack, store)
    }

    fn request() -> SuggestionRequest {
        SuggestionRequest {
            message_text: "Can we ship Friday?".to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            message_ts: Some("1730000000.0001".to_owned()),
            thread_ts: None,
        }
    }

    fn dispatched_run() -> FlowRun {
        let mut run = FlowRun::start("req-1");
        run.apply(FlowEvent::FieldsValidated).expect("validated");
        run.apply(FlowEvent::JobQueued).expect("dispatched");
        run
    }

    #[tokio::test]
    async fn posted_notification_is_registered_and_completes_the_run() {
        let (pipeline, _, store) = pipeline(false);
        let mut run = dispatched_run();

        let outcome = pipeline.deliver_suggestions(&request(), &mut run).await;

        let DeliveryOutcome::Delivered { notification_id } = outcome else {
            panic!("expected delivery");
        };
        assert!(store.resolve(&notification_id).await.is_some());
        assert_eq!(run.state(), FlowState::Completed);
    }

    #[tokio::test]
    async fn registration_follows_the_transition_actions() {
        let (pipeline, _, store) = pipeline(false);
        let mut run = FlowRun::start("req-2");

        let outcome = pipeline.deliver_suggestions(&request(), &mut run).await;

        assert!(matches!(outcome, DeliveryOutcome::Delivered { .. }));
        assert_eq!(store.len().await, 0);
        assert_eq!(run.state(), FlowState::Received);
    }

    #[tokio::test]
    async fn fallback_is_posted_only_when_the_failed_transition_asks_for_it() {
        let (dispatched, dispatched_slack, _) = pipeline(true);
        let mut run = dispatched_run();

        let outcome = dispatched.deliver_suggestions(&request(), &mut run).await;

        assert_eq!(outcome, DeliveryOutcome::Dropped);
        assert_eq!(*dispatched_slack.attempts.lock().await, 2);
        assert_eq!(run.state(), FlowState::Failed);

        let (stray, stray_slack, _) = pipeline(true);
        let mut stray_run = FlowRun::start("req-3");

        let outcome = stray.deliver_suggestions(&request(), &mut stray_run).await;

        assert_eq!(outcome, DeliveryOutcome::Dropped);
        assert_eq!(*stray_slack.attempts.lock().await, 1);
    }
}
