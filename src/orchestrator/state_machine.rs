// Warm transfer workflow state machine
//
// Pure state: handlers never perform I/O. Each handled event leaves at most one
// directive in the outbox; the coordinator carries it out after releasing the lock
// and reports the result back as a follow-up event.

use chrono::{DateTime, TimeDelta, Utc};
use statig::prelude::*;
use tracing::{debug, error, info, warn};

use super::types::{Phase, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    Trigger { session: Session },
    CustomerArrived { caller: Option<String> },
    NotificationPlaced { session_id: String, leg_id: String },
    NotificationFailed { session_id: String },
    TechLegEnded {
        leg_id: Option<String>,
        session_id: Option<String>,
    },
    BridgeResolved { session_id: String, succeeded: bool },
}

/// What the coordinator must do after an event was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    PlaceNotification(Session),
    RejectTrigger { active_session_id: String },
    Hold { queue_key: String },
    NoActiveEmergency,
    PlaceBridge(Session),
    WorkflowEnded { session_id: String },
}

#[derive(Debug, Default)]
pub struct Outbox {
    directive: Option<Directive>,
}

impl Outbox {
    fn issue(&mut self, directive: Directive) {
        debug_assert!(self.directive.is_none(), "one directive per event");
        self.directive = Some(directive);
    }

    pub fn take(&mut self) -> Option<Directive> {
        self.directive.take()
    }
}

pub struct TransferStateMachine {
    session_ttl: TimeDelta,
    completed_workflows: u64,
}

impl TransferStateMachine {
    pub fn new(session_ttl: TimeDelta) -> Self {
        Self {
            session_ttl,
            completed_workflows: 0,
        }
    }

    /// Workflows that have returned to idle since startup.
    pub fn completed_workflows(&self) -> u64 {
        self.completed_workflows
    }

    fn is_stale(&self, session: &Session, now: DateTime<Utc>) -> bool {
        now - session.created_at >= self.session_ttl
    }

    fn finish(&mut self, session: &Session, reason: &str) {
        self.completed_workflows += 1;
        info!(
            session_id = %session.id,
            queue_key = %session.queue_key,
            reason = reason,
            "Emergency session reset to idle"
        );
    }
}

#[state_machine(initial = "State::idle()", state(derive(Debug, Clone, PartialEq, Eq)))]
impl TransferStateMachine {
    #[state]
    fn idle(&mut self, context: &mut Outbox, event: &TransferEvent) -> Outcome<State> {
        match event {
            TransferEvent::Trigger { session } => {
                info!(
                    session_id = %session.id,
                    queue_key = %session.queue_key,
                    "Emergency session opened"
                );
                context.issue(Directive::PlaceNotification(session.clone()));
                Transition(State::notifying(session.clone()))
            }
            TransferEvent::CustomerArrived { caller } => {
                info!(caller = ?caller, "Inbound call with no active emergency");
                context.issue(Directive::NoActiveEmergency);
                Handled
            }
            TransferEvent::TechLegEnded { leg_id, session_id } => {
                debug!(leg_id = ?leg_id, session_id = ?session_id, "Leg ended with no active session, ignoring");
                Handled
            }
            _ => Handled,
        }
    }

    #[state]
    fn notifying(
        &mut self,
        context: &mut Outbox,
        session: &mut Session,
        event: &TransferEvent,
    ) -> Outcome<State> {
        match event {
            TransferEvent::Trigger { session: incoming } => {
                if self.is_stale(session, incoming.created_at) {
                    if session.customer_waiting {
                        error!(
                            stale_session_id = %session.id,
                            queue_key = %session.queue_key,
                            session_id = %incoming.id,
                            "Superseding stale session with a customer parked; customer is stranded in queue"
                        );
                    } else {
                        warn!(
                            stale_session_id = %session.id,
                            session_id = %incoming.id,
                            "Superseding stale emergency session"
                        );
                    }
                    self.finish(session, "superseded");
                    context.issue(Directive::PlaceNotification(incoming.clone()));
                    return Transition(State::notifying(incoming.clone()));
                }
                context.issue(Directive::RejectTrigger {
                    active_session_id: session.id.clone(),
                });
                Handled
            }
            TransferEvent::CustomerArrived { caller } => {
                session.customer_waiting = true;
                info!(
                    session_id = %session.id,
                    caller = ?caller,
                    queue_key = %session.queue_key,
                    "Customer placed in queue"
                );
                context.issue(Directive::Hold {
                    queue_key: session.queue_key.clone(),
                });
                Handled
            }
            TransferEvent::NotificationPlaced { session_id, leg_id } if *session_id == session.id => {
                session.notification_leg = Some(leg_id.clone());
                Handled
            }
            TransferEvent::NotificationFailed { session_id } if *session_id == session.id => {
                if session.customer_waiting {
                    error!(
                        session_id = %session.id,
                        queue_key = %session.queue_key,
                        "Notification failed while a customer is parked; customer is stranded in queue"
                    );
                }
                self.finish(session, "notification_failed");
                Transition(State::idle())
            }
            TransferEvent::TechLegEnded { leg_id, session_id } => {
                if !belongs_to(session, leg_id.as_deref(), session_id.as_deref()) {
                    warn!(
                        session_id = %session.id,
                        callback_session = ?session_id,
                        ended_leg = ?leg_id,
                        notification_leg = ?session.notification_leg,
                        "Leg-ended callback for another session ignored"
                    );
                    return Handled;
                }

                if session.customer_waiting {
                    info!(session_id = %session.id, "Customer is waiting, bridging technician");
                    context.issue(Directive::PlaceBridge(session.clone()));
                    Transition(State::bridging(session.clone()))
                } else {
                    self.finish(session, "no_customer_waiting");
                    context.issue(Directive::WorkflowEnded {
                        session_id: session.id.clone(),
                    });
                    Transition(State::idle())
                }
            }
            _ => Handled,
        }
    }

    #[state]
    fn bridging(
        &mut self,
        context: &mut Outbox,
        session: &mut Session,
        event: &TransferEvent,
    ) -> Outcome<State> {
        match event {
            TransferEvent::Trigger { .. } => {
                context.issue(Directive::RejectTrigger {
                    active_session_id: session.id.clone(),
                });
                Handled
            }
            TransferEvent::CustomerArrived { caller } => {
                info!(
                    session_id = %session.id,
                    caller = ?caller,
                    "Customer joined queue while bridge is being placed"
                );
                context.issue(Directive::Hold {
                    queue_key: session.queue_key.clone(),
                });
                Handled
            }
            TransferEvent::TechLegEnded { leg_id, .. } => {
                debug!(session_id = %session.id, leg_id = ?leg_id, "Duplicate leg-ended callback ignored");
                Handled
            }
            TransferEvent::BridgeResolved { session_id, succeeded } if *session_id == session.id => {
                let reason = if *succeeded { "bridged" } else { "bridge_failed" };
                self.finish(session, reason);
                Transition(State::idle())
            }
            _ => Handled,
        }
    }
}

/// Whether a leg-ended callback refers to `session`. Absent identifiers match.
fn belongs_to(session: &Session, leg_id: Option<&str>, session_id: Option<&str>) -> bool {
    let same_session = session_id.map_or(true, |id| id == session.id);
    let same_leg = match (leg_id, session.notification_leg.as_deref()) {
        (Some(ended), Some(expected)) => ended == expected,
        _ => true,
    };
    same_session && same_leg
}

/// Phase and session carried by a state.
pub fn describe(state: &State) -> (Phase, Option<&Session>) {
    match state {
        State::Idle {} => (Phase::Idle, None),
        State::Notifying { session } => (Phase::Notifying, Some(session)),
        State::Bridging { session } => (Phase::Bridging, Some(session)),
    }
}
