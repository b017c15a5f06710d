// Transfer orchestrator - drives the workflow state machine from webhook events
//
// The lock guards only the state check and mutation. Placements happen after the
// lock is released, using the session snapshot carried by the directive, and their
// result is fed back as a follow-up event keyed by session id.

use chrono::TimeDelta;
use statig::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn, Instrument};

use super::branch::BranchContext;
use super::errors::{OrchestratorError, StateError};
use super::scripts;
use super::state_machine::{describe, Directive, Outbox, TransferEvent, TransferStateMachine};
use super::types::{
    normalize_phone, InboundCall, InboundResponse, InboundRoute, LegEnded, LegEndedOutcome,
    OperatingMode, Session, SessionSnapshot, TriggerEvent, TriggerOutcome,
};
use crate::branch_config::{BranchConfigResolver, BranchSettings};
use crate::provider::{CallProvider, OutboundCall, PlacedCall, ProviderCredentials, ProviderError};
use crate::telemetry::{create_workflow_span, generate_correlation_id};

/// Tunables for one orchestrator instance.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub mode: OperatingMode,
    /// Upper bound on a single placement request.
    pub placement_timeout: Duration,
    /// Age after which an active session may be superseded by a new trigger.
    pub session_ttl: Duration,
    pub hold_music_url: String,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            mode: OperatingMode::Normal,
            placement_timeout: Duration::from_secs(10),
            session_ttl: Duration::from_secs(30 * 60),
            hold_music_url: scripts::DEFAULT_HOLD_MUSIC.to_string(),
        }
    }
}

pub struct TransferOrchestrator {
    machine: Arc<Mutex<StateMachine<TransferStateMachine>>>,
    provider: Arc<dyn CallProvider>,
    resolver: Arc<dyn BranchConfigResolver>,
    branch: BranchContext,
    settings: WorkflowSettings,
}

impl TransferOrchestrator {
    pub fn new(
        branch: BranchContext,
        settings: WorkflowSettings,
        provider: Arc<dyn CallProvider>,
        resolver: Arc<dyn BranchConfigResolver>,
    ) -> Self {
        let session_ttl = TimeDelta::from_std(settings.session_ttl).unwrap_or(TimeDelta::MAX);
        let machine = TransferStateMachine::new(session_ttl).state_machine();

        Self {
            machine: Arc::new(Mutex::new(machine)),
            provider,
            resolver,
            branch,
            settings,
        }
    }

    pub fn mode(&self) -> OperatingMode {
        self.settings.mode
    }

    pub fn branch(&self) -> &BranchContext {
        &self.branch
    }

    /// Start a workflow: open a session and ring the technician with the briefing.
    pub async fn on_trigger(&self, event: TriggerEvent) -> Result<TriggerOutcome, OrchestratorError> {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span("trigger", &self.branch.branch_id, &correlation_id);
        self.trigger(event).instrument(span).await
    }

    /// Route a customer call: park it in the session queue or turn it away.
    pub async fn on_inbound_call(&self, call: InboundCall) -> Result<InboundResponse, OrchestratorError> {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span("inbound_call", &self.branch.branch_id, &correlation_id);
        self.inbound_call(call).instrument(span).await
    }

    /// Handle the technician hanging up the notification leg.
    ///
    /// Never fails: errors on the bridge path are logged and reported in the
    /// outcome, since the provider only expects an acknowledgment.
    pub async fn on_tech_leg_ended(&self, leg: LegEnded) -> LegEndedOutcome {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span("tech_leg_ended", &self.branch.branch_id, &correlation_id);
        self.tech_leg_ended(leg).instrument(span).await
    }

    async fn trigger(&self, event: TriggerEvent) -> Result<TriggerOutcome, OrchestratorError> {
        info!(
            technician = ?event.technician_address,
            address = ?event.address,
            description = ?event.description,
            "Trigger received"
        );

        if self.settings.mode.is_testing() {
            info!("Testing mode: trigger logged, no call placed");
            return Ok(TriggerOutcome::TestMode);
        }

        let settings = self.resolver.resolve(&self.branch.branch_id).await?;
        let technician = technician_destination(&event, &settings)?;

        let session = Session::open(&self.branch, technician);
        tracing::Span::current().record("session.id", session.id.as_str());

        let callback = self.branch.completion_callback(&session)?;
        let markup = scripts::technician_briefing(
            event.address.as_deref(),
            event.description.as_deref(),
        )
        .render()?;

        let session = match self.dispatch(TransferEvent::Trigger { session }).await {
            Some(Directive::PlaceNotification(session)) => session,
            Some(Directive::RejectTrigger { active_session_id }) => {
                warn!(active_session_id = %active_session_id, "Trigger rejected, emergency already in progress");
                return Err(StateError::SessionActive {
                    session_id: active_session_id,
                }
                .into());
            }
            other => {
                error!(directive = ?other, "Unexpected directive for trigger");
                return Err(StateError::Unhandled { event: "trigger" }.into());
            }
        };

        let call = OutboundCall {
            to: session.technician_address.clone(),
            from: settings.caller_number.clone(),
            markup,
            status_callback: Some(callback),
        };

        match self.place(&settings.credentials, call).await {
            Ok(placed) => {
                info!(
                    session_id = %session.id,
                    call_sid = %placed.call_sid,
                    "Notification call started"
                );
                self.dispatch(TransferEvent::NotificationPlaced {
                    session_id: session.id.clone(),
                    leg_id: placed.call_sid.clone(),
                })
                .await;
                Ok(TriggerOutcome::Placed {
                    session_id: session.id,
                    call_sid: placed.call_sid,
                })
            }
            Err(err) => {
                error!(session_id = %session.id, error = %err, "Failed to call technician");
                self.dispatch(TransferEvent::NotificationFailed {
                    session_id: session.id,
                })
                .await;
                Err(err.into())
            }
        }
    }

    async fn inbound_call(&self, call: InboundCall) -> Result<InboundResponse, OrchestratorError> {
        info!(caller = ?call.caller, call_sid = ?call.call_sid, "Customer calling in");

        if self.settings.mode.is_testing() {
            return Ok(InboundResponse {
                route: InboundRoute::TestMode,
                markup: scripts::test_mode_greeting().render()?,
            });
        }

        let route = match self
            .dispatch(TransferEvent::CustomerArrived {
                caller: call.caller.clone(),
            })
            .await
        {
            Some(Directive::Hold { queue_key }) if !queue_key.trim().is_empty() => {
                InboundRoute::Hold { queue_key }
            }
            Some(Directive::NoActiveEmergency) => InboundRoute::NoActiveEmergency,
            other => {
                warn!(directive = ?other, "No usable queue for inbound call, turning caller away");
                InboundRoute::NoActiveEmergency
            }
        };

        let markup = match &route {
            InboundRoute::Hold { queue_key } => {
                scripts::hold_in_queue(queue_key, &self.settings.hold_music_url).render()?
            }
            InboundRoute::NoActiveEmergency | InboundRoute::TestMode => {
                scripts::no_active_emergency().render()?
            }
        };

        Ok(InboundResponse { route, markup })
    }

    async fn tech_leg_ended(&self, leg: LegEnded) -> LegEndedOutcome {
        info!(
            leg_id = ?leg.leg_id,
            session_id = ?leg.session_id,
            technician = ?leg.technician_address,
            "Technician notification call ended"
        );

        if self.settings.mode.is_testing() {
            return LegEndedOutcome::TestMode;
        }

        match self
            .dispatch(TransferEvent::TechLegEnded {
                leg_id: leg.leg_id.clone(),
                session_id: leg.session_id.clone(),
            })
            .await
        {
            Some(Directive::PlaceBridge(session)) => {
                tracing::Span::current().record("session.id", session.id.as_str());
                if let Some(echoed) = leg.technician_address.as_deref() {
                    if echoed != session.technician_address {
                        warn!(
                            echoed = %echoed,
                            technician = %session.technician_address,
                            "Callback technician differs from session technician"
                        );
                    }
                }
                self.bridge(session).await
            }
            Some(Directive::WorkflowEnded { session_id }) => {
                info!(session_id = %session_id, "No customer waiting. Emergency workflow ended.");
                LegEndedOutcome::WorkflowEnded { session_id }
            }
            None => {
                debug!("No workflow action for leg-ended callback");
                LegEndedOutcome::Ignored
            }
            Some(other) => {
                warn!(directive = ?other, "Unexpected directive for leg-ended callback");
                LegEndedOutcome::Ignored
            }
        }
    }

    /// State as seen under the lock.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let machine = self.machine.lock().await;
        let (phase, session) = describe(machine.state());
        SessionSnapshot {
            phase,
            session: session.cloned(),
            completed_workflows: machine.inner().completed_workflows(),
        }
    }

    /// Log what a shutdown abandons. Sessions are not persisted.
    pub async fn report_on_shutdown(&self) {
        let snapshot = self.snapshot().await;
        match snapshot.session {
            Some(session) if session.customer_waiting => error!(
                session_id = %session.id,
                queue_key = %session.queue_key,
                "Shutting down with a customer parked in queue; the customer will be stranded"
            ),
            Some(session) => warn!(
                session_id = %session.id,
                "Shutting down with an active emergency session; it will be lost"
            ),
            None => info!("No active emergency at shutdown"),
        }
    }

    async fn bridge(&self, session: Session) -> LegEndedOutcome {
        info!(
            session_id = %session.id,
            queue_key = %session.queue_key,
            "Customer is waiting. Initiating bridge call to technician."
        );

        let result = self.place_bridge(&session).await;

        self.dispatch(TransferEvent::BridgeResolved {
            session_id: session.id.clone(),
            succeeded: result.is_ok(),
        })
        .await;

        match result {
            Ok(placed) => {
                info!(
                    session_id = %session.id,
                    call_sid = %placed.call_sid,
                    technician = %session.technician_address,
                    queue_key = %session.queue_key,
                    "Connecting technician to queue"
                );
                LegEndedOutcome::Bridged {
                    session_id: session.id,
                    call_sid: placed.call_sid,
                }
            }
            Err(err) => {
                error!(
                    session_id = %session.id,
                    queue_key = %session.queue_key,
                    technician = %session.technician_address,
                    error = %err,
                    "Failed to bridge call; customer remains parked in queue"
                );
                LegEndedOutcome::BridgeFailed {
                    session_id: session.id,
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn place_bridge(&self, session: &Session) -> Result<PlacedCall, OrchestratorError> {
        let settings = self.resolver.resolve(&self.branch.branch_id).await?;
        let markup = scripts::bridge_to_queue(&session.queue_key).render()?;

        let call = OutboundCall {
            to: session.technician_address.clone(),
            from: settings.caller_number,
            markup,
            status_callback: None,
        };

        Ok(self.place(&settings.credentials, call).await?)
    }

    async fn place(
        &self,
        credentials: &ProviderCredentials,
        call: OutboundCall,
    ) -> Result<PlacedCall, ProviderError> {
        let timeout = self.settings.placement_timeout;
        tokio::time::timeout(timeout, self.provider.place_call(credentials, call))
            .await
            .map_err(|_| ProviderError::Timeout(timeout))?
    }

    async fn dispatch(&self, event: TransferEvent) -> Option<Directive> {
        let mut machine = self.machine.lock().await;
        let mut outbox = Outbox::default();
        machine.handle_with_context(&event, &mut outbox);
        outbox.take()
    }
}

impl std::fmt::Debug for TransferOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferOrchestrator")
            .field("machine", &"Arc<Mutex<StateMachine<TransferStateMachine>>>")
            .field("branch", &self.branch)
            .field("settings", &self.settings)
            .finish()
    }
}

fn technician_destination(
    event: &TriggerEvent,
    settings: &BranchSettings,
) -> Result<String, OrchestratorError> {
    let raw = event
        .technician_address
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or(settings.default_technician_address.as_deref())
        .ok_or_else(|| {
            OrchestratorError::Configuration(
                "no technician phone number in the trigger and no branch default".to_string(),
            )
        })?;

    normalize_phone(raw)
}
