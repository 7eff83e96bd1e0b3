//! Scripted in-memory backend shared by the view tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;

use wws_comms_protocol::{
    CommsEvent, CommsEventKind, CommsSendRequest, CommsTaskRequest, Edge, Node, NodeState,
    Topology,
};
use wws_comms_view::{CommsBackend, MessageStream, ViewChange, ViewError, ViewModel};

type StreamTx = mpsc::UnboundedSender<Result<String, ViewError>>;

pub struct FakeBackend {
    topology: Mutex<Result<Topology, ViewError>>,
    events: Mutex<Result<Vec<CommsEvent>, ViewError>>,
    stream_error: Mutex<Option<ViewError>>,
    stall_stream: AtomicBool,
    action_result: Mutex<Result<(), ViewError>>,
    topology_fetches: AtomicUsize,
    event_fetches: AtomicUsize,
    streams: Mutex<Vec<StreamTx>>,
    pub sent: Mutex<Vec<CommsSendRequest>>,
    pub tasks: Mutex<Vec<CommsTaskRequest>>,
}

impl FakeBackend {
    pub fn new(topology: Topology, events: Vec<CommsEvent>) -> Self {
        Self {
            topology: Mutex::new(Ok(topology)),
            events: Mutex::new(Ok(events)),
            stream_error: Mutex::new(None),
            stall_stream: AtomicBool::new(false),
            action_result: Mutex::new(Ok(())),
            topology_fetches: AtomicUsize::new(0),
            event_fetches: AtomicUsize::new(0),
            streams: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn set_topology(&self, result: Result<Topology, ViewError>) {
        *self.topology.lock().unwrap() = result;
    }

    pub fn set_events(&self, result: Result<Vec<CommsEvent>, ViewError>) {
        *self.events.lock().unwrap() = result;
    }

    pub fn fail_stream(&self, error: Option<ViewError>) {
        *self.stream_error.lock().unwrap() = error;
    }

    /// Make every later stream open hang forever.
    pub fn stall_stream(&self, stall: bool) {
        self.stall_stream.store(stall, Ordering::SeqCst);
    }

    pub fn set_action_result(&self, result: Result<(), ViewError>) {
        *self.action_result.lock().unwrap() = result;
    }

    pub fn topology_fetches(&self) -> usize {
        self.topology_fetches.load(Ordering::SeqCst)
    }

    pub fn event_fetches(&self) -> usize {
        self.event_fetches.load(Ordering::SeqCst)
    }

    /// Number of stream connections opened so far.
    pub fn streams_opened(&self) -> usize {
        self.streams.lock().unwrap().len()
    }

    /// Deliver `raw` on stream `index`. Returns false once the receiving side
    /// is gone.
    pub fn push(&self, index: usize, raw: &str) -> bool {
        self.streams.lock().unwrap()[index]
            .send(Ok(raw.to_string()))
            .is_ok()
    }

    pub fn push_error(&self, index: usize, error: ViewError) {
        let _ = self.streams.lock().unwrap()[index].send(Err(error));
    }

    /// End stream `index` from the server side.
    pub fn end_stream(&self, index: usize) {
        let (tx, _) = mpsc::unbounded_channel();
        let _ = std::mem::replace(&mut self.streams.lock().unwrap()[index], tx);
    }

    pub fn stream_closed(&self, index: usize) -> bool {
        self.streams.lock().unwrap()[index].is_closed()
    }

    /// Wait until the client side of stream `index` has been dropped.
    pub async fn wait_stream_closed(&self, index: usize) {
        for _ in 0..200 {
            if self.stream_closed(index) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("stream {index} was never closed");
    }
}

#[async_trait]
impl CommsBackend for FakeBackend {
    async fn fetch_topology(&self) -> Result<Topology, ViewError> {
        self.topology_fetches.fetch_add(1, Ordering::SeqCst);
        self.topology.lock().unwrap().clone()
    }

    async fn fetch_events(&self, limit: usize) -> Result<Vec<CommsEvent>, ViewError> {
        self.event_fetches.fetch_add(1, Ordering::SeqCst);
        self.events
            .lock()
            .unwrap()
            .clone()
            .map(|events| events.into_iter().take(limit).collect())
    }

    async fn open_stream(&self) -> Result<MessageStream, ViewError> {
        if self.stall_stream.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if let Some(e) = self.stream_error.lock().unwrap().clone() {
            return Err(e);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().push(tx);
        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(stream.boxed())
    }

    async fn send_message(&self, request: CommsSendRequest) -> Result<(), ViewError> {
        self.sent.lock().unwrap().push(request);
        self.action_result.lock().unwrap().clone()
    }

    async fn post_task(&self, request: CommsTaskRequest) -> Result<(), ViewError> {
        self.tasks.lock().unwrap().push(request);
        self.action_result.lock().unwrap().clone()
    }
}

/// planner -> {worker-1, worker-2}, planner <-> auditor.
pub fn sample_topology() -> Topology {
    Topology::new(
        vec![
            Node::new("p", "planner", NodeState::Running),
            Node::new("w1", "worker-1", NodeState::Running),
            Node::new("w2", "worker-2", NodeState::Suspended),
            Node::new("x", "auditor", NodeState::Running),
        ],
        vec![
            Edge::parent_child("p", "w1"),
            Edge::parent_child("p", "w2"),
            Edge::peer("p", "x"),
        ],
    )
}

pub fn event(id: &str, kind: CommsEventKind) -> CommsEvent {
    let mut ev = CommsEvent::new(kind, "2025-03-01T12:00:00Z");
    ev.id = id.to_string();
    ev.from_agent_id = Some("p".into());
    ev.source_name = Some("planner".into());
    ev
}

pub fn event_json(id: &str, kind: &str) -> String {
    format!(
        r#"{{"id":"{id}","kind":"{kind}","timestamp":"2025-03-01T12:00:01Z","source_id":"p","source_name":"planner","target_id":"w1","target_name":"worker-1","detail":"hello"}}"#
    )
}

/// Wait for the next background update and apply it.
pub async fn next_change(view: &mut ViewModel) -> ViewChange {
    let update = tokio::time::timeout(Duration::from_secs(2), view.next_update())
        .await
        .expect("timed out waiting for a view update")
        .expect("update channel closed");
    view.apply(update)
}

/// Give spawned tasks a chance to run, then apply whatever they posted.
pub async fn settle(view: &mut ViewModel) -> Vec<ViewChange> {
    tokio::time::sleep(Duration::from_millis(50)).await;
    view.drain_updates()
}
