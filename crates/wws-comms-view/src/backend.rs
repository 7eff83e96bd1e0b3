//! The seam between the view and the kernel's comms API.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use wws_comms_protocol::{CommsEvent, CommsSendRequest, CommsTaskRequest, Topology};

use crate::ViewError;

/// Raw text payloads delivered by a live stream connection, in arrival
/// order. The stream ends when the remote side closes the connection.
pub type MessageStream = BoxStream<'static, Result<String, ViewError>>;

#[async_trait]
pub trait CommsBackend: Send + Sync {
    /// Full topology snapshot.
    async fn fetch_topology(&self) -> Result<Topology, ViewError>;

    /// Up to `limit` most recent events, newest first.
    async fn fetch_events(&self, limit: usize) -> Result<Vec<CommsEvent>, ViewError>;

    /// Open the push-only event stream.
    async fn open_stream(&self) -> Result<MessageStream, ViewError>;

    async fn send_message(&self, request: CommsSendRequest) -> Result<(), ViewError>;

    async fn post_task(&self, request: CommsTaskRequest) -> Result<(), ViewError>;
}
