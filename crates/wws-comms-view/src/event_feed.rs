//! Live event feed: owns the stream connection and the event buffer.
//!
//! Lifecycle is `Idle -> Connecting -> Streaming -> Closed`. `stop` moves
//! any state to `Closed`; starting again first closes whatever is open, so
//! there is never more than one connection.

use futures_util::StreamExt;
use tokio::task::JoinHandle;

use wws_comms_protocol::{CommsEvent, KEEPALIVE_TOKEN};

use crate::backend::{CommsBackend, MessageStream};
use crate::event_buffer::EventBuffer;
use crate::update::{UpdateSender, ViewUpdate};
use crate::ViewError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    Connecting,
    Streaming,
    Closed,
}

impl FeedState {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedState::Idle => "idle",
            FeedState::Connecting => "connecting",
            FeedState::Streaming => "live",
            FeedState::Closed => "offline",
        }
    }
}

/// Outcome of handling one inbound stream payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// Keep-alive token; nothing changed.
    KeepAlive,
    /// Payload did not parse as an event and was dropped.
    Malformed,
    /// Payload came from a connection that is no longer current.
    Stale,
    /// Event inserted at the front of the buffer. `refresh` is set for
    /// structural events that invalidate the topology.
    Stored { refresh: bool },
}

struct StreamConnection {
    id: u64,
    pump: JoinHandle<()>,
}

impl StreamConnection {
    fn close(self) {
        self.pump.abort();
    }
}

pub struct EventFeed {
    buffer: EventBuffer,
    state: FeedState,
    connection: Option<StreamConnection>,
    last_connection_id: u64,
}

impl EventFeed {
    pub fn new() -> Self {
        Self::with_buffer(EventBuffer::new())
    }

    pub fn with_buffer(buffer: EventBuffer) -> Self {
        Self {
            buffer,
            state: FeedState::Idle,
            connection: None,
            last_connection_id: 0,
        }
    }

    pub fn state(&self) -> FeedState {
        self.state
    }

    pub fn events(&self) -> &EventBuffer {
        &self.buffer
    }

    /// ID of the open connection, if any.
    pub fn connection_id(&self) -> Option<u64> {
        self.connection.as_ref().map(|c| c.id)
    }

    pub fn is_streaming(&self) -> bool {
        self.state == FeedState::Streaming
    }

    /// Seed the buffer with a newest-first page and open the stream.
    pub async fn start(
        &mut self,
        initial: Vec<CommsEvent>,
        backend: &dyn CommsBackend,
        updates: &UpdateSender,
    ) -> Result<(), ViewError> {
        self.stop();
        let opened = self.connect(backend).await;
        self.buffer.seed(initial);
        self.install(opened, updates)
    }

    /// Reopen the stream, keeping the events already buffered.
    pub async fn reconnect(
        &mut self,
        backend: &dyn CommsBackend,
        updates: &UpdateSender,
    ) -> Result<(), ViewError> {
        self.stop();
        let opened = self.connect(backend).await;
        self.install(opened, updates)
    }

    /// Close the connection if open. Idempotent.
    pub fn stop(&mut self) {
        if let Some(conn) = self.connection.take() {
            tracing::debug!(connection = conn.id, "Closing event stream");
            conn.close();
        }
        self.state = FeedState::Closed;
    }

    /// Drop every buffered event.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Open a stream. The feed is `Connecting` only while this future is
    /// alive; if it is dropped before the open settles the feed is `Closed`.
    async fn connect(&mut self, backend: &dyn CommsBackend) -> Result<MessageStream, ViewError> {
        let _connecting = Connecting::enter(&mut self.state);
        backend.open_stream().await
    }

    fn install(
        &mut self,
        opened: Result<MessageStream, ViewError>,
        updates: &UpdateSender,
    ) -> Result<(), ViewError> {
        match opened {
            Ok(stream) => {
                self.last_connection_id += 1;
                let id = self.last_connection_id;
                let pump = tokio::spawn(pump_stream(id, stream, updates.clone()));
                self.connection = Some(StreamConnection { id, pump });
                self.state = FeedState::Streaming;
                tracing::info!(connection = id, "Event stream opened");
                Ok(())
            }
            Err(e) => {
                self.state = FeedState::Closed;
                tracing::warn!(error = %e, "Failed to open event stream");
                Err(e)
            }
        }
    }

    /// Handle a payload delivered by connection `connection`. Payloads from
    /// anything but the open connection are ignored.
    pub fn handle_message(&mut self, connection: u64, raw: &str) -> Ingest {
        if self.connection_id() != Some(connection) {
            return Ingest::Stale;
        }
        self.ingest(raw)
    }

    /// Keep-alives are dropped, malformed payloads discarded, and anything
    /// else goes to the front of the buffer.
    pub fn ingest(&mut self, raw: &str) -> Ingest {
        let payload = raw.trim();
        if payload == KEEPALIVE_TOKEN {
            return Ingest::KeepAlive;
        }
        match CommsEvent::from_json(payload) {
            Ok(event) => {
                let refresh = event.is_structural();
                tracing::trace!(kind = %event.kind, "Comms event received");
                self.buffer.push_front(event);
                Ingest::Stored { refresh }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Discarding malformed stream message");
                Ingest::Malformed
            }
        }
    }

    /// The pump for `connection` ended. Returns true if it was the open
    /// connection, which leaves the feed `Closed`.
    pub fn handle_closed(&mut self, connection: u64, reason: Option<&str>) -> bool {
        if self.connection_id() != Some(connection) {
            return false;
        }
        self.connection = None;
        self.state = FeedState::Closed;
        match reason {
            Some(reason) => tracing::warn!(connection, reason, "Event stream failed"),
            None => tracing::info!(connection, "Event stream ended by server"),
        }
        true
    }
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventFeed {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
        }
    }
}

/// Holds the feed in `Connecting` for the duration of an open attempt.
struct Connecting<'a>(&'a mut FeedState);

impl<'a> Connecting<'a> {
    fn enter(state: &'a mut FeedState) -> Self {
        *state = FeedState::Connecting;
        Self(state)
    }
}

impl Drop for Connecting<'_> {
    fn drop(&mut self) {
        if *self.0 == FeedState::Connecting {
            *self.0 = FeedState::Closed;
        }
    }
}

/// Forward every payload of `stream` to the view, then report the close.
async fn pump_stream(connection: u64, mut stream: MessageStream, updates: UpdateSender) {
    let reason = loop {
        match stream.next().await {
            Some(Ok(raw)) => {
                if updates
                    .send(ViewUpdate::StreamMessage { connection, raw })
                    .is_err()
                {
                    return;
                }
            }
            Some(Err(e)) => break Some(e.to_string()),
            None => break None,
        }
    };
    let _ = updates.send(ViewUpdate::StreamClosed { connection, reason });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use wws_comms_protocol::{CommsEventKind, CommsSendRequest, CommsTaskRequest, Topology};

    /// Backend whose stream never finishes opening.
    struct StalledStream;

    #[async_trait]
    impl CommsBackend for StalledStream {
        async fn fetch_topology(&self) -> Result<Topology, ViewError> {
            Ok(Topology::default())
        }

        async fn fetch_events(&self, _limit: usize) -> Result<Vec<CommsEvent>, ViewError> {
            Ok(Vec::new())
        }

        async fn open_stream(&self) -> Result<MessageStream, ViewError> {
            std::future::pending().await
        }

        async fn send_message(&self, _request: CommsSendRequest) -> Result<(), ViewError> {
            Ok(())
        }

        async fn post_task(&self, _request: CommsTaskRequest) -> Result<(), ViewError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn abandoned_open_leaves_feed_closed() {
        let (tx, _rx) = crate::update::channel();
        let mut feed = EventFeed::new();
        let page = vec![CommsEvent::new(CommsEventKind::AgentMessage, "t")];

        let started = tokio::time::timeout(
            Duration::from_millis(20),
            feed.start(page, &StalledStream, &tx),
        )
        .await;
        assert!(started.is_err());
        assert_eq!(feed.state(), FeedState::Closed);
        assert_eq!(feed.connection_id(), None);
        assert!(feed.events().is_empty());

        let reconnected =
            tokio::time::timeout(Duration::from_millis(20), feed.reconnect(&StalledStream, &tx))
                .await;
        assert!(reconnected.is_err());
        assert_eq!(feed.state(), FeedState::Closed);
    }

    fn ingest_all(feed: &mut EventFeed, raws: &[&str]) -> Vec<Ingest> {
        raws.iter().map(|r| feed.ingest(r)).collect()
    }

    #[test]
    fn keepalive_is_not_an_event() {
        let mut feed = EventFeed::new();
        assert_eq!(feed.ingest("ping"), Ingest::KeepAlive);
        assert_eq!(feed.ingest(" ping\n"), Ingest::KeepAlive);
        assert!(feed.events().is_empty());
    }

    #[test]
    fn malformed_payload_leaves_buffer_untouched() {
        let mut feed = EventFeed::new();
        feed.ingest(r#"{"kind":"agent_message","timestamp":"t1"}"#);
        let out = ingest_all(&mut feed, &["{oops", "42", r#"{"kind":"task_posted"}"#, ""]);
        assert!(out.iter().all(|o| *o == Ingest::Malformed));
        assert_eq!(feed.events().len(), 1);
    }

    #[test]
    fn structural_kinds_request_refresh() {
        let mut feed = EventFeed::new();
        let out = ingest_all(
            &mut feed,
            &[
                r#"{"kind":"agent_spawned","timestamp":"t"}"#,
                r#"{"kind":"agent_terminated","timestamp":"t"}"#,
                r#"{"kind":"agent_message","timestamp":"t"}"#,
                r#"{"kind":"task_posted","timestamp":"t"}"#,
                r#"{"kind":"task_claimed","timestamp":"t"}"#,
                r#"{"kind":"task_completed","timestamp":"t"}"#,
                r#"{"kind":"something_new","timestamp":"t"}"#,
            ],
        );
        let refreshes = out
            .iter()
            .filter(|o| matches!(o, Ingest::Stored { refresh: true }))
            .count();
        assert_eq!(refreshes, 2);
        assert_eq!(feed.events().len(), 7);
    }

    #[test]
    fn messages_without_open_connection_are_stale() {
        let mut feed = EventFeed::new();
        assert_eq!(
            feed.handle_message(1, r#"{"kind":"agent_message","timestamp":"t"}"#),
            Ingest::Stale
        );
        assert!(feed.events().is_empty());
        assert!(!feed.handle_closed(1, None));
    }

    #[test]
    fn stop_is_idempotent() {
        let mut feed = EventFeed::new();
        assert_eq!(feed.state(), FeedState::Idle);
        feed.stop();
        feed.stop();
        assert_eq!(feed.state(), FeedState::Closed);
        assert_eq!(feed.connection_id(), None);
    }
}
