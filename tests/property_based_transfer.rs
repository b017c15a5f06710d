// Property-Based Testing for the warm transfer workflow
// Randomized callback orderings must never leave the session record inconsistent

mod fixtures;

use fixtures::{orchestrator, RecordingProvider};
use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::sync::Arc;
use tokio_test::block_on;
use warm_transfer::{
    InboundCall, LegEnded, OperatingMode, Phase, TransferOrchestrator, TriggerEvent,
    TriggerOutcome,
};

#[derive(Debug, Clone, Arbitrary)]
enum Callback {
    Trigger {
        #[proptest(strategy = "technician_strategy()")]
        technician: Option<String>,
    },
    CustomerCall,
    /// Completion callback naming an earlier placed session, or carrying no identifiers.
    LegEnded {
        #[proptest(strategy = "proptest::option::of(0usize..8)")]
        earlier: Option<usize>,
    },
}

fn technician_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("+15551230000".to_string())),
        Just(Some("(555) 123-4444".to_string())),
        Just(Some("not a phone".to_string())),
    ]
}

/// Sessions placed so far, as (session id, notification call sid).
#[derive(Debug, Default)]
struct Placed(Vec<(String, String)>);

impl Placed {
    fn callback(&self, earlier: Option<usize>) -> LegEnded {
        match earlier {
            Some(index) if !self.0.is_empty() => {
                let (session_id, leg_id) = &self.0[index % self.0.len()];
                LegEnded {
                    leg_id: Some(leg_id.clone()),
                    session_id: Some(session_id.clone()),
                    ..Default::default()
                }
            }
            _ => LegEnded::default(),
        }
    }
}

async fn deliver(orchestrator: &TransferOrchestrator, placed: &mut Placed, callback: &Callback) {
    match callback {
        Callback::Trigger { technician } => {
            let outcome = orchestrator
                .on_trigger(TriggerEvent {
                    technician_address: technician.clone(),
                    ..Default::default()
                })
                .await;
            if let Ok(TriggerOutcome::Placed { session_id, call_sid }) = outcome {
                placed.0.push((session_id, call_sid));
            }
        }
        Callback::CustomerCall => {
            let _ = orchestrator.on_inbound_call(InboundCall::default()).await;
        }
        Callback::LegEnded { earlier } => {
            orchestrator.on_tech_leg_ended(placed.callback(*earlier)).await;
        }
    }
}

proptest! {
    #[test]
    fn prop_waiting_customer_implies_active_session(
        callbacks in prop::collection::vec(any::<Callback>(), 1..40)
    ) {
        let provider = Arc::new(RecordingProvider::new());
        let orchestrator = orchestrator(provider.clone(), OperatingMode::Normal);

        let mut placed = Placed::default();

        for callback in &callbacks {
            let before = block_on(orchestrator.snapshot());
            let named = match callback {
                Callback::LegEnded { earlier } => placed.callback(*earlier).session_id,
                _ => None,
            };

            block_on(deliver(&orchestrator, &mut placed, callback));
            let snapshot = block_on(orchestrator.snapshot());

            // A callback naming any other session leaves the active one alone.
            if let (Some(active), Some(named)) = (&before.session, &named) {
                if active.id != *named {
                    prop_assert_eq!(&snapshot.session, &before.session);
                }
            }

            prop_assert!(!snapshot.customer_waiting() || snapshot.is_active());
            prop_assert_eq!(snapshot.phase == Phase::Idle, !snapshot.is_active());
            // Handlers always run to completion, so no bridge is left in flight.
            prop_assert_ne!(snapshot.phase, Phase::Bridging);
        }

        prop_assert!(provider.bridges().len() <= provider.notifications().len());
    }

    #[test]
    fn prop_repeated_leg_ended_resets_once(
        customer_waiting in any::<bool>(),
        deliveries in 2usize..5,
    ) {
        let provider = Arc::new(RecordingProvider::new());
        let orchestrator = orchestrator(provider.clone(), OperatingMode::Normal);

        let mut placed = Placed::default();
        block_on(deliver(&orchestrator, &mut placed, &Callback::Trigger {
            technician: Some("+15551230000".to_string()),
        }));
        if customer_waiting {
            block_on(deliver(&orchestrator, &mut placed, &Callback::CustomerCall));
        }
        let placements_before = provider.placement_count();

        for _ in 0..deliveries {
            block_on(deliver(&orchestrator, &mut placed, &Callback::LegEnded {
                earlier: Some(0),
            }));
        }

        let snapshot = block_on(orchestrator.snapshot());
        prop_assert_eq!(snapshot.completed_workflows, 1);
        prop_assert!(!snapshot.is_active());
        prop_assert_eq!(
            provider.placement_count() - placements_before,
            usize::from(customer_waiting)
        );
    }

    #[test]
    fn prop_testing_mode_never_places(
        callbacks in prop::collection::vec(any::<Callback>(), 1..20)
    ) {
        let provider = Arc::new(RecordingProvider::new());
        let orchestrator = orchestrator(provider.clone(), OperatingMode::Testing);

        let mut placed = Placed::default();
        for callback in &callbacks {
            block_on(deliver(&orchestrator, &mut placed, callback));
        }

        prop_assert_eq!(provider.placement_count(), 0);
        prop_assert!(!block_on(orchestrator.snapshot()).is_active());
    }
}
