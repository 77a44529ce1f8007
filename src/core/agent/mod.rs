//! Streaming agent transport.
//!
//! `base` defines the consumed capability interface (session, connector,
//! inbound events); `live` is the WebSocket implementation against the live
//! agent service.

mod base;
pub mod live;

pub use base::{
    AgentConnector, AgentError, AgentEvent, AgentResult, AgentSession, SessionSetup,
    ToolDeclaration,
};
pub use live::{LiveAgentConfig, LiveAgentConnector};
