pub mod branch;
pub mod coordinator;
pub mod errors;
pub mod scripts;
pub mod state_machine;
pub mod types;

pub use branch::{BranchContext, QueueKeyStrategy};
pub use coordinator::{TransferOrchestrator, WorkflowSettings};
pub use errors::{OrchestratorError, StateError};
pub use state_machine::{Directive, TransferEvent, TransferStateMachine};
pub use types::{
    InboundCall, InboundResponse, InboundRoute, LegEnded, LegEndedOutcome, OperatingMode, Phase,
    Session, SessionSnapshot, TriggerEvent, TriggerOutcome,
};
