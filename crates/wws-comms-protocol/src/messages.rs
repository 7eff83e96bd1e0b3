use serde::{Deserialize, Serialize};

/// Request body for `POST /api/comms/send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommsSendRequest {
    pub from_agent_id: String,
    pub to_agent_id: String,
    pub message: String,
}

/// Request body for `POST /api/comms/task`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommsTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
}
