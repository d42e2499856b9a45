pub mod engine;
pub mod states;

pub use engine::{FlowRun, FlowTransitionError, SuggestionFlow};
pub use states::{FlowAction, FlowEvent, FlowState, TransitionOutcome};
