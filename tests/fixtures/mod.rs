// Test fixtures: in-memory calling provider and orchestrator builders
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use warm_transfer::{
    BranchContext, BranchSettings, CallProvider, OperatingMode, OutboundCall, PlacedCall,
    ProviderCredentials, ProviderError, StaticBranchConfig, TransferOrchestrator, WorkflowSettings,
};

pub const PUBLIC_URL: &str = "https://responder.example.com";
pub const CALLER_NUMBER: &str = "+15550001111";
pub const DEFAULT_TECHNICIAN: &str = "+15557776666";

/// Provider that records every placement and answers with sequential call ids.
///
/// Failures queued with [`fail_next`](Self::fail_next) are returned in order.
/// When gated, bridge placements (no status callback) wait for [`release_bridge`](Self::release_bridge).
#[derive(Default)]
pub struct RecordingProvider {
    calls: Mutex<Vec<OutboundCall>>,
    failures: Mutex<VecDeque<ProviderError>>,
    bridge_gate: Option<Arc<Semaphore>>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            bridge_gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn fail_next(&self, error: ProviderError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn release_bridge(&self) {
        if let Some(gate) = &self.bridge_gate {
            gate.add_permits(1);
        }
    }

    pub fn calls(&self) -> Vec<OutboundCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn placement_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn notifications(&self) -> Vec<OutboundCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.status_callback.is_some())
            .collect()
    }

    pub fn bridges(&self) -> Vec<OutboundCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.status_callback.is_none())
            .collect()
    }
}

#[async_trait]
impl CallProvider for RecordingProvider {
    async fn place_call(
        &self,
        _credentials: &ProviderCredentials,
        call: OutboundCall,
    ) -> Result<PlacedCall, ProviderError> {
        let is_bridge = call.status_callback.is_none();
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call);
            calls.len()
        };

        if is_bridge {
            if let Some(gate) = &self.bridge_gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
        }

        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        Ok(PlacedCall {
            call_sid: format!("CA{index:04}"),
        })
    }
}

pub fn branch_settings() -> BranchSettings {
    BranchSettings {
        credentials: ProviderCredentials {
            account_sid: "AC-test".to_string(),
            auth_token: "token-test".to_string(),
        },
        caller_number: CALLER_NUMBER.to_string(),
        default_technician_address: Some(DEFAULT_TECHNICIAN.to_string()),
    }
}

pub fn settings(mode: OperatingMode) -> WorkflowSettings {
    WorkflowSettings {
        mode,
        placement_timeout: Duration::from_secs(5),
        ..WorkflowSettings::default()
    }
}

pub fn orchestrator_with(
    provider: Arc<RecordingProvider>,
    branch: BranchContext,
    settings: WorkflowSettings,
) -> TransferOrchestrator {
    TransferOrchestrator::new(
        branch,
        settings,
        provider,
        Arc::new(StaticBranchConfig::new(Some(branch_settings()))),
    )
}

/// Single-tenant orchestrator in the given mode, sharing `provider`.
pub fn orchestrator(provider: Arc<RecordingProvider>, mode: OperatingMode) -> TransferOrchestrator {
    orchestrator_with(
        provider,
        BranchContext::single_tenant(Some(PUBLIC_URL.to_string())),
        settings(mode),
    )
}
