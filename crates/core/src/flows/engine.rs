use thiserror::Error;
use tracing::debug;

use crate::flows::states::{FlowAction, FlowEvent, FlowState, TransitionOutcome};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: FlowState, event: FlowEvent },
}

/// Lifecycle of one suggestion trigger:
/// `Received -> Validated -> Dispatched -> (Completed | Failed)`, with
/// `Received -> Dropped` for malformed payloads and `Validated -> Failed` when
/// the worker refuses the job.
#[derive(Clone, Copy, Debug, Default)]
pub struct SuggestionFlow;

impl SuggestionFlow {
    pub fn initial_state(&self) -> FlowState {
        FlowState::Received
    }

    pub fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        use FlowAction::{
            AcknowledgePlatform, EnqueueGeneration, LogAndDrop, PostFallback,
            RegisterNotification, ScheduleExpiry,
        };
        use FlowEvent::{
            DeliveryFailed, FieldsValidated, JobQueued, JobRefused, NotificationPosted,
            RequiredFieldMissing,
        };
        use FlowState::{Completed, Dispatched, Dropped, Failed, Received, Validated};

        let (to, actions) = match (current, event) {
            (Received, FieldsValidated) => (Validated, vec![AcknowledgePlatform]),
            (Received, RequiredFieldMissing) => (Dropped, vec![LogAndDrop]),
            (Validated, JobQueued) => (Dispatched, vec![EnqueueGeneration]),
            (Validated, JobRefused) => (Failed, vec![LogAndDrop]),
            (Dispatched, NotificationPosted) => {
                (Completed, vec![RegisterNotification, ScheduleExpiry])
            }
            (Dispatched, DeliveryFailed) => (Failed, vec![PostFallback]),
            _ => {
                return Err(FlowTransitionError::InvalidTransition {
                    state: *current,
                    event: *event,
                });
            }
        };

        Ok(TransitionOutcome { from: *current, to, event: *event, actions })
    }
}

/// Tracks the state of a single trigger as it moves from the dispatcher into
/// the worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowRun {
    correlation_id: String,
    state: FlowState,
}

impl FlowRun {
    pub fn start(correlation_id: impl Into<String>) -> Self {
        Self { correlation_id: correlation_id.into(), state: SuggestionFlow.initial_state() }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn apply(&mut self, event: FlowEvent) -> Result<TransitionOutcome, FlowTransitionError> {
        let outcome = SuggestionFlow.transition(&self.state, &event)?;
        debug!(
            event_name = "suggestion.flow.transition",
            correlation_id = %self.correlation_id,
            from = ?outcome.from,
            to = ?outcome.to,
            event = ?outcome.event,
            "suggestion flow transition applied"
        );
        self.state = outcome.to;
        Ok(outcome)
    }
}
