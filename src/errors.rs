//! Common error taxonomy and the result envelope returned by every action.
//!
//! Errors here are values, never panics: a failing action produces a tagged
//! envelope and the tick carries on. The envelope shape is part of the admin
//! wire contract, so field names are stable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse error category carried by every failed envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// World-state mismatch (entity absent, position blocked)
    Map,
    /// Agent-level problems (not found, not a character)
    Agent,
    /// Host API unavailable or returned an error
    Engine,
    /// Schema/domain errors (missing param, wrong type, unknown recipe)
    Validation,
    /// Rule violation (concurrent craft, overwrite disallowed)
    Logical,
    /// Missing ingredients/items, insufficient inventory space
    Resource,
    /// Queue/inventory/bar limits exceeded
    Capacity,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Map => "MAP",
            ErrorCategory::Agent => "AGENT",
            ErrorCategory::Engine => "ENGINE",
            ErrorCategory::Validation => "VALIDATION",
            ErrorCategory::Logical => "LOGICAL",
            ErrorCategory::Resource => "RESOURCE",
            ErrorCategory::Capacity => "CAPACITY",
        };
        write!(f, "{}", s)
    }
}

/// Error value produced anywhere inside the action pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionError {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.category, self.code, self.message)
    }
}

impl std::error::Error for ActionError {}

impl ActionError {
    pub fn new<C: Into<String>, M: Into<String>>(
        category: ErrorCategory,
        code: C,
        message: M,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn map<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Self::new(ErrorCategory::Map, code, message)
    }

    pub fn agent<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Self::new(ErrorCategory::Agent, code, message)
    }

    pub fn engine<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Self::new(ErrorCategory::Engine, code, message)
    }

    pub fn validation<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Self::new(ErrorCategory::Validation, code, message)
    }

    pub fn logical<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Self::new(ErrorCategory::Logical, code, message)
    }

    pub fn resource<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Self::new(ErrorCategory::Resource, code, message)
    }

    pub fn capacity<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Self::new(ErrorCategory::Capacity, code, message)
    }
}

/// Convenient Result alias used throughout the action pipeline.
pub type ActionResult<T> = std::result::Result<T, ActionError>;

/// The canonical result envelope returned by every action.
///
/// Async actions return an initial envelope with `queued: true` and an
/// `action_id`; their terminal outcome travels through the completion
/// transport instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub ok: bool,
    pub code: Option<String>,
    pub category: Option<ErrorCategory>,
    pub message: String,
    pub data: serde_json::Value,
    pub tick: u64,
    pub agent_id: Option<u32>,
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rcon_tick: Option<u64>,
}

impl Envelope {
    pub fn success(tick: u64, data: serde_json::Value) -> Self {
        Self {
            ok: true,
            code: None,
            category: None,
            message: String::new(),
            data,
            tick,
            agent_id: None,
            trace_id: None,
            queued: None,
            action_id: None,
            rcon_tick: None,
        }
    }

    pub fn failure(tick: u64, error: ActionError) -> Self {
        Self {
            ok: false,
            code: Some(error.code),
            category: Some(error.category),
            message: error.message,
            data: serde_json::Value::Null,
            tick,
            agent_id: None,
            trace_id: None,
            queued: None,
            action_id: None,
            rcon_tick: None,
        }
    }

    /// Initial acknowledgement for an async action. The terminal outcome
    /// reuses `action_id` on the completion transport.
    pub fn queued(tick: u64, action_id: String, data: serde_json::Value) -> Self {
        Self {
            ok: true,
            code: None,
            category: None,
            message: String::new(),
            data,
            tick,
            agent_id: None,
            trace_id: None,
            queued: Some(true),
            action_id: Some(action_id),
            rcon_tick: Some(tick),
        }
    }

    pub fn with_agent(mut self, agent_id: u32) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    pub fn with_trace(mut self, trace_id: Option<String>) -> Self {
        self.trace_id = trace_id;
        self
    }
}

/// Stable correlation id for async actions: `"<kind>_<tick>_<agent_id>"`.
pub fn action_id(kind: &str, tick: u64, agent_id: u32) -> String {
    format!("{}_{}_{}", kind, tick, agent_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serializes_screaming_case() {
        let json = serde_json::to_string(&ErrorCategory::Validation).unwrap();
        assert_eq!(json, "\"VALIDATION\"");
        let back: ErrorCategory = serde_json::from_str("\"CAPACITY\"").unwrap();
        assert_eq!(back, ErrorCategory::Capacity);
    }

    #[test]
    fn test_failure_envelope_carries_taxonomy() {
        let env = Envelope::failure(42, ActionError::validation("MISSING_PARAM", "agent_id"));
        assert!(!env.ok);
        assert_eq!(env.code.as_deref(), Some("MISSING_PARAM"));
        assert_eq!(env.category, Some(ErrorCategory::Validation));
        assert_eq!(env.tick, 42);
    }

    #[test]
    fn test_queued_envelope_shape() {
        let env = Envelope::queued(100, action_id("walk", 100, 7), serde_json::json!({}));
        assert!(env.ok);
        assert_eq!(env.queued, Some(true));
        assert_eq!(env.action_id.as_deref(), Some("walk_100_7"));
        assert_eq!(env.rcon_tick, Some(100));
    }

    #[test]
    fn test_sync_envelope_omits_queue_fields() {
        let env = Envelope::success(5, serde_json::json!({"x": 1}));
        let json = serde_json::to_string(&env).unwrap();
        assert!(!json.contains("queued"));
        assert!(!json.contains("action_id"));
    }
}
