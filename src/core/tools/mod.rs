//! Tool-call dispatcher.
//!
//! Interprets structured tool-call requests from the agent against the
//! persona state machine and the lead sink, and produces exactly one
//! acknowledgement per request, tagged with the originating call id. An
//! unrecognized name gets an error acknowledgement; it never terminates the
//! session.

pub mod sink;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::core::agent::ToolDeclaration;
use crate::core::persona::PersonaState;

pub use sink::{LeadSink, NullSink, SinkError, WebhookSink};

/// Tool name for flagging an emergency.
pub const TOOL_SET_EMERGENCY_STATUS: &str = "set_emergency_status";

/// Tool name for capturing a lead.
pub const TOOL_SUBMIT_LEAD: &str = "submit_lead";

/// Urgency tag that marks a lead as a hot install.
pub const HOT_INSTALL_TAG: &str = "HOT INSTALL";

/// A captured lead, mirrored into UI state and forwarded to the sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadRecord {
    /// Caller name.
    pub name: String,
    /// Callback phone number.
    pub phone: String,
    /// Age of the heating unit, as stated.
    pub unit_age: Option<String>,
    /// Issue summary.
    pub summary: Option<String>,
    /// Whether the lead was tagged as a hot install.
    pub is_hot_install: bool,
    /// Agent label the lead was captured under.
    pub agent: Option<String>,
}

/// Arguments of a `submit_lead` call.
#[derive(Debug, Deserialize)]
struct SubmitLeadArgs {
    name: String,
    phone: String,
    #[serde(default)]
    age: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    temp: Option<String>,
    #[serde(default)]
    agent: Option<String>,
}

/// Arguments of a `set_emergency_status` call.
#[derive(Debug, Deserialize)]
struct SetEmergencyArgs {
    active: bool,
}

/// One acknowledgement, success or error, for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolAck {
    /// Id of the originating call.
    pub call_id: String,
    /// Tool name, echoed back.
    pub name: String,
    /// Structured result.
    pub result: Value,
}

/// What a dispatch produced beyond the acknowledgement.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// The acknowledgement to send back, always present.
    pub ack: ToolAck,
    /// A captured lead to mirror into UI state.
    pub lead: Option<LeadRecord>,
    /// An actual emergency-flag transition (absent on idempotent repeats).
    pub emergency_change: Option<bool>,
}

/// Dispatcher over the persona machine and the lead sink.
pub struct ToolDispatcher {
    sink: Arc<dyn LeadSink>,
}

impl ToolDispatcher {
    /// Create a dispatcher delivering leads to `sink`.
    pub fn new(sink: Arc<dyn LeadSink>) -> Self {
        Self { sink }
    }

    /// Handle one tool-call request.
    ///
    /// Always returns an acknowledgement; only recognized, well-formed calls
    /// mutate state. Sink delivery is fire-and-forget: failures are logged
    /// and never reach the acknowledgement.
    pub fn dispatch(
        &self,
        call_id: &str,
        name: &str,
        arguments: Value,
        persona: &mut PersonaState,
    ) -> DispatchOutcome {
        match name {
            TOOL_SET_EMERGENCY_STATUS => self.set_emergency(call_id, arguments, persona),
            TOOL_SUBMIT_LEAD => self.submit_lead(call_id, arguments, persona),
            _ => {
                warn!(call_id, name, "unknown tool requested");
                DispatchOutcome {
                    ack: error_ack(call_id, name, format!("unknown tool: {name}")),
                    lead: None,
                    emergency_change: None,
                }
            }
        }
    }

    fn set_emergency(
        &self,
        call_id: &str,
        arguments: Value,
        persona: &mut PersonaState,
    ) -> DispatchOutcome {
        let args: SetEmergencyArgs = match serde_json::from_value(arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!(call_id, "malformed set_emergency_status args: {}", e);
                return DispatchOutcome {
                    ack: error_ack(call_id, TOOL_SET_EMERGENCY_STATUS, e.to_string()),
                    lead: None,
                    emergency_change: None,
                };
            }
        };

        let changed = persona.set_emergency(args.active);
        let label = persona.active_profile().label.clone();
        if changed {
            info!(active = args.active, agent = %label, "emergency status changed");
        }

        DispatchOutcome {
            ack: ToolAck {
                call_id: call_id.to_string(),
                name: TOOL_SET_EMERGENCY_STATUS.to_string(),
                result: json!({"status": "ok", "active_agent": label}),
            },
            lead: None,
            emergency_change: changed.then_some(args.active),
        }
    }

    fn submit_lead(
        &self,
        call_id: &str,
        arguments: Value,
        persona: &mut PersonaState,
    ) -> DispatchOutcome {
        let args: SubmitLeadArgs = match serde_json::from_value(arguments.clone()) {
            Ok(args) => args,
            Err(e) => {
                warn!(call_id, "malformed submit_lead args: {}", e);
                return DispatchOutcome {
                    ack: error_ack(call_id, TOOL_SUBMIT_LEAD, e.to_string()),
                    lead: None,
                    emergency_change: None,
                };
            }
        };

        let lead = LeadRecord {
            name: args.name,
            phone: args.phone,
            unit_age: args.age,
            summary: args.summary,
            is_hot_install: args.temp.as_deref() == Some(HOT_INSTALL_TAG),
            agent: args
                .agent
                .or_else(|| Some(persona.active_profile().label.clone())),
        };
        info!(name = %lead.name, hot_install = lead.is_hot_install, "lead captured");

        // Fire-and-forget: the event loop never waits on the sink, and a
        // sink failure never fails the acknowledgement.
        let sink = self.sink.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.deliver(&arguments).await {
                warn!("lead sink delivery failed: {}", e);
            }
        });

        DispatchOutcome {
            ack: ToolAck {
                call_id: call_id.to_string(),
                name: TOOL_SUBMIT_LEAD.to_string(),
                result: json!({"status": "success"}),
            },
            lead: Some(lead),
            emergency_change: None,
        }
    }
}

fn error_ack(call_id: &str, name: &str, message: String) -> ToolAck {
    ToolAck {
        call_id: call_id.to_string(),
        name: name.to_string(),
        result: json!({"status": "error", "message": message}),
    }
}

/// Tool schemas declared to the agent at session setup.
pub fn tool_declarations() -> Vec<ToolDeclaration> {
    vec![
        ToolDeclaration {
            name: TOOL_SUBMIT_LEAD.to_string(),
            description: "Capture intake lead data.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "phone": {"type": "string"},
                    "age": {"type": "string"},
                    "summary": {"type": "string"},
                    "temp": {"type": "string", "enum": [HOT_INSTALL_TAG, "REPAIR"]},
                    "agent": {"type": "string"}
                },
                "required": ["name", "phone"]
            }),
        },
        ToolDeclaration {
            name: TOOL_SET_EMERGENCY_STATUS.to_string(),
            description: "Flag or clear an emergency.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "active": {"type": "boolean"}
                },
                "required": ["active"]
            }),
        },
    ]
}
