//! Inter-agent communication events as pushed by the kernel.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ProtocolError;

/// The kind of inter-agent communication event.
///
/// Kinds this client does not know keep their wire name in `Unknown` so
/// they can still be listed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CommsEventKind {
    /// Agent-to-agent message.
    AgentMessage,
    /// A new agent was spawned.
    AgentSpawned,
    /// An agent was terminated.
    AgentTerminated,
    /// A task was posted to the queue.
    TaskPosted,
    /// A task was claimed by an agent.
    TaskClaimed,
    /// A task was completed.
    TaskCompleted,
    Unknown(String),
}

impl CommsEventKind {
    pub fn as_str(&self) -> &str {
        match self {
            CommsEventKind::AgentMessage => "agent_message",
            CommsEventKind::AgentSpawned => "agent_spawned",
            CommsEventKind::AgentTerminated => "agent_terminated",
            CommsEventKind::TaskPosted => "task_posted",
            CommsEventKind::TaskClaimed => "task_claimed",
            CommsEventKind::TaskCompleted => "task_completed",
            CommsEventKind::Unknown(name) => name.as_str(),
        }
    }

    /// Spawns and terminations change the agent graph, so the cached
    /// topology is stale once one is observed.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            CommsEventKind::AgentSpawned | CommsEventKind::AgentTerminated
        )
    }
}

impl From<String> for CommsEventKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "agent_message" => CommsEventKind::AgentMessage,
            "agent_spawned" => CommsEventKind::AgentSpawned,
            "agent_terminated" => CommsEventKind::AgentTerminated,
            "task_posted" => CommsEventKind::TaskPosted,
            "task_claimed" => CommsEventKind::TaskClaimed,
            "task_completed" => CommsEventKind::TaskCompleted,
            _ => CommsEventKind::Unknown(s),
        }
    }
}

impl From<CommsEventKind> for String {
    fn from(kind: CommsEventKind) -> Self {
        match kind {
            CommsEventKind::Unknown(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for CommsEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A communication event between agents.
///
/// Accepts both the `from_agent_id`/`to_agent_id` and the
/// `source_id`/`target_id` spellings. Fields not modelled here are kept in
/// `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommsEvent {
    /// Unique event ID, when the kernel assigns one.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub kind: CommsEventKind,
    /// ISO-8601 timestamp as sent by the kernel.
    pub timestamp: String,
    #[serde(
        default,
        alias = "source_id",
        deserialize_with = "non_empty",
        skip_serializing_if = "Option::is_none"
    )]
    pub from_agent_id: Option<String>,
    #[serde(
        default,
        alias = "target_id",
        deserialize_with = "non_empty",
        skip_serializing_if = "Option::is_none"
    )]
    pub to_agent_id: Option<String>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    /// Human-readable detail text.
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Kind-specific fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CommsEvent {
    pub fn new(kind: CommsEventKind, timestamp: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            kind,
            timestamp: timestamp.into(),
            from_agent_id: None,
            to_agent_id: None,
            source_name: None,
            target_name: None,
            detail: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Parse a single JSON-encoded event.
    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(|e| ProtocolError::MalformedEvent(e.to_string()))
    }

    pub fn is_structural(&self) -> bool {
        self.kind.is_structural()
    }

    /// Display label for the sending side.
    pub fn source_label(&self) -> &str {
        self.source_name
            .as_deref()
            .or(self.from_agent_id.as_deref())
            .unwrap_or("")
    }

    /// Display label for the receiving side, if the event has one.
    pub fn target_label(&self) -> Option<&str> {
        self.target_name
            .as_deref()
            .or(self.to_agent_id.as_deref())
    }

    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Treat `""` and `null` the same as an absent field.
fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comms_event_kind_roundtrip() {
        let json = serde_json::to_string(&CommsEventKind::AgentMessage).unwrap();
        assert_eq!(json, "\"agent_message\"");
        let parsed: CommsEventKind = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, CommsEventKind::AgentMessage);
    }

    #[test]
    fn unknown_kind_keeps_its_name() {
        let parsed: CommsEventKind = serde_json::from_str("\"agent_migrated\"").unwrap();
        assert_eq!(parsed, CommsEventKind::Unknown("agent_migrated".to_string()));
        assert_eq!(parsed.as_str(), "agent_migrated");
        assert!(!parsed.is_structural());
    }

    #[test]
    fn structural_kinds() {
        assert!(CommsEventKind::AgentSpawned.is_structural());
        assert!(CommsEventKind::AgentTerminated.is_structural());
        for kind in [
            CommsEventKind::AgentMessage,
            CommsEventKind::TaskPosted,
            CommsEventKind::TaskClaimed,
            CommsEventKind::TaskCompleted,
        ] {
            assert!(!kind.is_structural(), "{kind} must not be structural");
        }
    }

    #[test]
    fn kernel_spelling_is_accepted() {
        let raw = r#"{
            "id": "ev-1",
            "timestamp": "2025-03-01T12:34:56Z",
            "kind": "agent_message",
            "source_id": "a1",
            "source_name": "planner",
            "target_id": "",
            "target_name": "",
            "detail": "hello"
        }"#;
        let ev = CommsEvent::from_json(raw).unwrap();
        assert_eq!(ev.from_agent_id.as_deref(), Some("a1"));
        assert_eq!(ev.to_agent_id, None);
        assert_eq!(ev.target_label(), None);
        assert_eq!(ev.source_label(), "planner");
        assert!(ev.extra.is_empty());
        assert!(ev.timestamp_utc().is_some());
    }

    #[test]
    fn kind_specific_fields_are_kept() {
        let raw = r#"{"kind":"task_posted","timestamp":"t","task_id":"t-9","title":"index docs"}"#;
        let ev = CommsEvent::from_json(raw).unwrap();
        assert_eq!(ev.kind, CommsEventKind::TaskPosted);
        assert_eq!(ev.extra["task_id"], "t-9");
        assert_eq!(ev.extra["title"], "index docs");
    }

    #[test]
    fn missing_kind_or_timestamp_is_malformed() {
        assert!(CommsEvent::from_json(r#"{"timestamp":"t"}"#).is_err());
        assert!(CommsEvent::from_json(r#"{"kind":"agent_message"}"#).is_err());
        assert!(CommsEvent::from_json("{not json").is_err());
    }
}
