//! The single owned view model combining topology and live feed.
//!
//! All view state is mutated through `&mut self` by one owner. Background
//! tasks report through the update channel; every update is tagged with the
//! session it was issued in so results that land after a teardown or a
//! reload are ignored.

use std::sync::Arc;

use wws_comms_protocol::{CommsSendRequest, CommsTaskRequest, Topology, EVENT_BUFFER_CAPACITY};

use crate::backend::CommsBackend;
use crate::event_buffer::EventBuffer;
use crate::event_feed::{EventFeed, FeedState, Ingest};
use crate::topology_store::TopologyStore;
use crate::update::{self, ActionKind, UpdateReceiver, UpdateSender, ViewUpdate};
use crate::ViewError;

/// What applying an update changed, for the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewChange {
    Nothing,
    FeedUpdated,
    TopologyUpdated,
    StreamEnded,
    /// `id` is the one returned when the action was issued.
    ActionSucceeded {
        id: u64,
        action: ActionKind,
        message: String,
    },
    ActionFailed {
        id: u64,
        action: ActionKind,
        message: String,
    },
}

pub struct ViewModel {
    backend: Arc<dyn CommsBackend>,
    topology: TopologyStore,
    feed: EventFeed,
    updates_tx: UpdateSender,
    updates_rx: UpdateReceiver,
    session: u64,
    active: bool,
    event_limit: usize,
    load_error: Option<String>,
    stream_error: Option<String>,
    last_action_id: u64,
}

impl ViewModel {
    pub fn new(backend: Arc<dyn CommsBackend>) -> Self {
        let (updates_tx, updates_rx) = update::channel();
        Self {
            backend,
            topology: TopologyStore::new(),
            feed: EventFeed::new(),
            updates_tx,
            updates_rx,
            session: 0,
            active: false,
            event_limit: EVENT_BUFFER_CAPACITY,
            load_error: None,
            stream_error: None,
            last_action_id: 0,
        }
    }

    /// Size of the initial event page, capped at the buffer capacity.
    pub fn with_event_limit(mut self, limit: usize) -> Self {
        self.event_limit = limit.clamp(1, EVENT_BUFFER_CAPACITY);
        self
    }

    /// Load the initial snapshot and event page concurrently, then open the
    /// stream.
    ///
    /// If either fetch fails nothing is applied: the view is left empty, no
    /// connection is opened and the error is kept for display. A stream that
    /// fails to open does not fail activation; the feed is left `Closed` and
    /// the failure is kept in [`ViewModel::stream_error`].
    ///
    /// Nothing is committed until the stream open has settled, so dropping
    /// this future part way applies nothing.
    pub async fn activate(&mut self) -> Result<(), ViewError> {
        self.deactivate();
        self.session += 1;
        tracing::info!(session = self.session, "Activating comms view");

        let backend = Arc::clone(&self.backend);
        let fetched = tokio::try_join!(
            backend.fetch_topology(),
            backend.fetch_events(self.event_limit)
        );
        let (topology, events) = match fetched {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "Initial comms load failed");
                self.topology.clear();
                self.feed.clear();
                self.stream_error = None;
                self.load_error = Some(format!("Failed to load comms view: {e}"));
                return Err(e);
            }
        };

        let opened = self
            .feed
            .start(events, backend.as_ref(), &self.updates_tx)
            .await;
        self.topology.replace(topology);
        self.load_error = None;
        self.stream_error = opened.err().map(|e| e.to_string());
        self.active = true;
        Ok(())
    }

    /// Close the stream and invalidate all in-flight background work.
    pub fn deactivate(&mut self) {
        self.feed.stop();
        if self.active {
            tracing::info!(session = self.session, "Deactivating comms view");
        }
        self.active = false;
        self.session += 1;
    }

    /// Reopen the stream without reloading.
    pub async fn reconnect(&mut self) -> Result<(), ViewError> {
        if !self.active {
            return Err(ViewError::StreamClosed("view is not active".into()));
        }
        let backend = Arc::clone(&self.backend);
        let result = self.feed.reconnect(backend.as_ref(), &self.updates_tx).await;
        self.stream_error = result.as_ref().err().map(ToString::to_string);
        result
    }

    /// Reload only the topology, surfacing failure to the caller.
    pub async fn reload_topology(&mut self) -> Result<Arc<Topology>, ViewError> {
        let backend = Arc::clone(&self.backend);
        self.topology.load(backend.as_ref()).await
    }

    /// Wait for the next background update.
    pub async fn next_update(&mut self) -> Option<ViewUpdate> {
        self.updates_rx.recv().await
    }

    /// Take an already queued update without waiting.
    pub fn try_next_update(&mut self) -> Option<ViewUpdate> {
        self.updates_rx.try_recv().ok()
    }

    /// Apply one update. Updates from a stale session or connection are
    /// no-ops.
    pub fn apply(&mut self, update: ViewUpdate) -> ViewChange {
        match update {
            ViewUpdate::StreamMessage { connection, raw } => {
                match self.feed.handle_message(connection, &raw) {
                    Ingest::Stored { refresh } => {
                        if refresh {
                            self.refresh_topology();
                        }
                        ViewChange::FeedUpdated
                    }
                    Ingest::KeepAlive | Ingest::Malformed | Ingest::Stale => ViewChange::Nothing,
                }
            }
            ViewUpdate::StreamClosed { connection, reason } => {
                if self.feed.handle_closed(connection, reason.as_deref()) {
                    ViewChange::StreamEnded
                } else {
                    ViewChange::Nothing
                }
            }
            ViewUpdate::TopologyFetched {
                session,
                seq,
                result,
            } => {
                if session != self.session {
                    tracing::debug!(session, current = self.session, "Dropping stale topology refresh");
                    return ViewChange::Nothing;
                }
                if self.topology.apply_refresh(seq, result) {
                    ViewChange::TopologyUpdated
                } else {
                    ViewChange::Nothing
                }
            }
            ViewUpdate::ActionFinished {
                session,
                id,
                action,
                result,
            } => {
                if session != self.session {
                    return ViewChange::Nothing;
                }
                match result {
                    Ok(()) => ViewChange::ActionSucceeded {
                        id,
                        action,
                        message: action.success_message().to_string(),
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, ?action, "Comms action failed");
                        ViewChange::ActionFailed {
                            id,
                            action,
                            message: format!("{}: {}", action.failure_prefix(), describe(&e)),
                        }
                    }
                }
            }
        }
    }

    /// Apply everything already queued. Returns the changes in order.
    pub fn drain_updates(&mut self) -> Vec<ViewChange> {
        let mut changes = Vec::new();
        while let Some(update) = self.try_next_update() {
            let change = self.apply(update);
            if change != ViewChange::Nothing {
                changes.push(change);
            }
        }
        changes
    }

    /// Fire-and-forget topology refresh.
    pub fn refresh_topology(&mut self) {
        self.topology.refresh(
            Arc::clone(&self.backend),
            self.session,
            self.updates_tx.clone(),
        );
    }

    /// Send a message in the background. Returns the id its result will
    /// carry.
    pub fn send_message(&mut self, request: CommsSendRequest) -> u64 {
        let backend = Arc::clone(&self.backend);
        self.spawn_action(ActionKind::SendMessage, async move {
            backend.send_message(request).await
        })
    }

    /// Post a task in the background. Returns the id its result will carry.
    pub fn post_task(&mut self, request: CommsTaskRequest) -> u64 {
        let backend = Arc::clone(&self.backend);
        self.spawn_action(ActionKind::PostTask, async move {
            backend.post_task(request).await
        })
    }

    fn spawn_action<F>(&mut self, action: ActionKind, fut: F) -> u64
    where
        F: std::future::Future<Output = Result<(), ViewError>> + Send + 'static,
    {
        self.last_action_id += 1;
        let id = self.last_action_id;
        let session = self.session;
        let updates = self.updates_tx.clone();
        tokio::spawn(async move {
            let result = fut.await;
            let _ = updates.send(ViewUpdate::ActionFinished {
                session,
                id,
                action,
                result,
            });
        });
        id
    }

    pub fn topology(&self) -> &TopologyStore {
        &self.topology
    }

    pub fn events(&self) -> &EventBuffer {
        self.feed.events()
    }

    pub fn feed_state(&self) -> FeedState {
        self.feed.state()
    }

    pub fn connection_id(&self) -> Option<u64> {
        self.feed.connection_id()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Why the last attempt to open the event stream failed, if it did.
    pub fn stream_error(&self) -> Option<&str> {
        self.stream_error.as_deref()
    }
}

/// Server-provided messages read better without the status prefix.
fn describe(e: &ViewError) -> String {
    match e {
        ViewError::Status { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
