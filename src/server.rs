//! Webhook HTTP server.
//!
//! Translates provider and trigger webhooks into orchestrator calls. The
//! leg-ended callback always answers 200, whatever happened on the bridge path.

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, instrument};

use crate::branch_config::{AdminBranchConfig, BranchConfigResolver, StaticBranchConfig};
use crate::config::WarmTransferConfig;
use crate::orchestrator::branch::LEG_ENDED_PATH;
use crate::orchestrator::{
    BranchContext, InboundCall, LegEnded, OrchestratorError, StateError, TransferOrchestrator,
    TriggerEvent, TriggerOutcome, WorkflowSettings,
};
use crate::provider::{CallProvider, TwilioClient};
use crate::shutdown::ShutdownCoordinator;

/// Application state shared across routes.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TransferOrchestrator>,
}

/// Form fields the provider posts with an inbound call.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InboundCallForm {
    pub call_sid: Option<String>,
    pub from: Option<String>,
}

/// Query parameters registered on the completion callback URL.
#[derive(Debug, Default, Deserialize)]
pub struct LegEndedQuery {
    pub session: Option<String>,
    pub tech: Option<String>,
}

/// Form fields of the provider's status callback.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusCallbackForm {
    pub call_sid: Option<String>,
    pub call_status: Option<String>,
}

/// Wire the orchestrator to its collaborators from configuration.
pub fn build_orchestrator(config: &WarmTransferConfig) -> Result<TransferOrchestrator> {
    let provider: Arc<dyn CallProvider> = Arc::new(
        TwilioClient::new(
            config.provider.api_base_url.clone(),
            config.provider.requests_per_second,
            config.provider.burst,
        )
        .context("failed to build calling provider client")?,
    );

    let branch_id = config
        .tenancy
        .branch
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty());

    let branch = match branch_id {
        Some(branch_id) => BranchContext::branch(branch_id, config.public_url.clone()),
        None => BranchContext::single_tenant(config.public_url.clone()),
    };

    let resolver: Arc<dyn BranchConfigResolver> = match branch_id {
        Some(_) => Arc::new(
            AdminBranchConfig::new(
                config.tenancy.admin_url.clone(),
                Duration::from_millis(config.tenancy.fetch_timeout_ms),
                Duration::from_secs(config.tenancy.cache_ttl_seconds),
            )
            .context("failed to build admin settings client")?,
        ),
        None => Arc::new(StaticBranchConfig::from_config(config)),
    };

    let settings = WorkflowSettings {
        mode: config.mode,
        placement_timeout: Duration::from_millis(config.provider.placement_timeout_ms),
        session_ttl: Duration::from_secs(config.workflow.session_ttl_seconds),
        hold_music_url: config.workflow.hold_music_url.clone(),
    };

    Ok(TransferOrchestrator::new(branch, settings, provider, resolver))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(trigger))
        .route("/incoming_call", post(incoming_call))
        .route(LEG_ENDED_PATH, post(tech_leg_ended))
        .route("/events/tech_done", post(tech_leg_ended))
        .with_state(state)
}

/// Serve until SIGINT/SIGTERM, then report abandoned workflow state.
#[instrument(skip(state))]
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let shutdown = ShutdownCoordinator::new(state.orchestrator.clone());
    let app = router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Webhook server listening on {}", addr);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { signal.wait_for_signal().await })
        .await?;

    shutdown.shutdown().await;
    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "mode": state.orchestrator.mode().as_str(),
        "branch": state.orchestrator.branch().branch_id,
    }))
}

async fn trigger(State(state): State<AppState>, body: Option<Json<TriggerEvent>>) -> Response {
    let event = body.map(|Json(event)| event).unwrap_or_default();

    match state.orchestrator.on_trigger(event).await {
        Ok(TriggerOutcome::Placed { session_id, call_sid }) => (
            StatusCode::OK,
            Json(json!({
                "status": "Technician notified",
                "call_sid": call_sid,
                "session_id": session_id,
            })),
        )
            .into_response(),
        Ok(TriggerOutcome::TestMode) => (
            StatusCode::OK,
            Json(json!({"status": "TEST_MODE", "message": "Trigger logged."})),
        )
            .into_response(),
        Err(err) => {
            let status = match &err {
                OrchestratorError::State(StateError::SessionActive { .. }) => StatusCode::CONFLICT,
                OrchestratorError::Provider(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(json!({"error": err.to_string()}))).into_response()
        }
    }
}

async fn incoming_call(
    State(state): State<AppState>,
    form: Option<Form<InboundCallForm>>,
) -> Response {
    let form = form.map(|Form(form)| form).unwrap_or_default();
    let call = InboundCall {
        caller: form.from,
        call_sid: form.call_sid,
    };

    match state.orchestrator.on_inbound_call(call).await {
        Ok(response) => ([(header::CONTENT_TYPE, "text/xml")], response.markup).into_response(),
        Err(err) => {
            error!(error = %err, "Failed to render inbound call response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn tech_leg_ended(
    State(state): State<AppState>,
    query: Option<Query<LegEndedQuery>>,
    form: Option<Form<StatusCallbackForm>>,
) -> StatusCode {
    let query = query.map(|Query(query)| query).unwrap_or_default();
    let form = form.map(|Form(form)| form).unwrap_or_default();

    let outcome = state
        .orchestrator
        .on_tech_leg_ended(LegEnded {
            leg_id: form.call_sid,
            session_id: query.session,
            technician_address: query.tech,
        })
        .await;
    info!(outcome = ?outcome, call_status = ?form.call_status, "Leg-ended callback handled");

    StatusCode::OK
}
