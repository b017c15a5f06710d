// Warm Transfer Library - emergency call-leg orchestration
// This exposes the core components for testing and integration

pub mod branch_config;
pub mod config;
pub mod markup;
pub mod orchestrator;
pub mod provider;
pub mod server;
pub mod shutdown;
pub mod telemetry;

// Re-export key types for easy access
pub use branch_config::{
    AdminBranchConfig, BranchConfigError, BranchConfigResolver, BranchSettings, StaticBranchConfig,
};
pub use config::WarmTransferConfig;
pub use markup::{MarkupError, Verb, VoiceResponse};
pub use orchestrator::{
    BranchContext, InboundCall, InboundResponse, InboundRoute, LegEnded, LegEndedOutcome,
    OperatingMode, OrchestratorError, Phase, Session, SessionSnapshot, StateError,
    TransferOrchestrator, TriggerEvent, TriggerOutcome, WorkflowSettings,
};
pub use provider::{
    CallProvider, OutboundCall, PlacedCall, ProviderCredentials, ProviderError, TwilioClient,
};
pub use server::{build_orchestrator, router, serve, AppState};
pub use shutdown::ShutdownCoordinator;
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry};
