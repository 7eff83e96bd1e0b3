/// Snapshot of the agent graph.
pub const TOPOLOGY_PATH: &str = "/api/comms/topology";

/// Most-recent-first page of comms events.
pub const EVENTS_PATH: &str = "/api/comms/events";

/// Server-Sent Events stream of comms events.
pub const EVENT_STREAM_PATH: &str = "/api/comms/events/stream";

/// Agent-to-agent message injection.
pub const SEND_PATH: &str = "/api/comms/send";

/// Task queue submission.
pub const TASK_PATH: &str = "/api/comms/task";

/// Query parameter carrying the access token on the stream URL.
pub const STREAM_TOKEN_PARAM: &str = "token";

/// Payload sent on the stream purely to keep the connection open.
pub const KEEPALIVE_TOKEN: &str = "ping";

/// Maximum number of events retained by the live feed.
pub const EVENT_BUFFER_CAPACITY: usize = 200;
