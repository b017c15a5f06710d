use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use uuid::Uuid;

use super::branch::BranchContext;
use super::errors::OrchestratorError;

/// Whether triggers actually ring anyone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperatingMode {
    #[default]
    #[serde(alias = "normal", alias = "Normal")]
    Normal,
    #[serde(alias = "testing", alias = "Testing")]
    Testing,
}

impl OperatingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::Normal => "NORMAL",
            OperatingMode::Testing => "TESTING",
        }
    }

    pub fn is_testing(&self) -> bool {
        matches!(self, OperatingMode::Testing)
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NORMAL" => Ok(OperatingMode::Normal),
            "TESTING" => Ok(OperatingMode::Testing),
            other => Err(format!(
                "unknown operating mode '{other}' (expected NORMAL or TESTING)"
            )),
        }
    }
}

/// Emergency report that starts a workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    #[serde(default, rename = "technician_phone", alias = "chosen_phone")]
    pub technician_address: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "incident_address")]
    pub address: Option<String>,
}

/// A customer dialing in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundCall {
    pub caller: Option<String>,
    pub call_sid: Option<String>,
}

/// Completion callback for a technician notification leg.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegEnded {
    pub leg_id: Option<String>,
    pub session_id: Option<String>,
    /// Technician address echoed back through the callback URL.
    pub technician_address: Option<String>,
}

/// The single stateful record of an in-flight emergency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: String,
    pub technician_address: String,
    pub queue_key: String,
    pub customer_waiting: bool,
    pub notification_leg: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn open(branch: &BranchContext, technician_address: String) -> Self {
        let id = format!("emergency-{}", Uuid::new_v4());
        let queue_key = branch.queue_key(&id);
        Self {
            id,
            technician_address,
            queue_key,
            customer_waiting: false,
            notification_leg: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Notifying,
    Bridging,
}

/// Consistent view of the orchestrator state taken under its lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub session: Option<Session>,
    pub completed_workflows: u64,
}

impl SessionSnapshot {
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn customer_waiting(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| s.customer_waiting)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Placed { session_id: String, call_sid: String },
    TestMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundRoute {
    Hold { queue_key: String },
    NoActiveEmergency,
    TestMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundResponse {
    pub route: InboundRoute,
    pub markup: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegEndedOutcome {
    Bridged { session_id: String, call_sid: String },
    BridgeFailed { session_id: String, reason: String },
    WorkflowEnded { session_id: String },
    Ignored,
    TestMode,
}

static PHONE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\-().]").expect("valid separator pattern"));
static PHONE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("valid phone pattern"));

/// Strip separators and check the result looks like a dialable number.
pub fn normalize_phone(raw: &str) -> Result<String, OrchestratorError> {
    let compact = PHONE_SEPARATORS.replace_all(raw.trim(), "").into_owned();
    if PHONE_NUMBER.is_match(&compact) {
        Ok(compact)
    } else {
        Err(OrchestratorError::Configuration(format!(
            "'{raw}' is not a valid technician phone number"
        )))
    }
}
