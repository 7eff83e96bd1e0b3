//! Messages posted by background tasks to the view model.
//!
//! Background work never touches view state; it reports through this
//! channel and the owner applies updates one at a time.

use tokio::sync::mpsc;

use wws_comms_protocol::Topology;

use crate::ViewError;

pub type UpdateSender = mpsc::UnboundedSender<ViewUpdate>;
pub type UpdateReceiver = mpsc::UnboundedReceiver<ViewUpdate>;

/// A user-initiated write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    SendMessage,
    PostTask,
}

impl ActionKind {
    pub fn success_message(self) -> &'static str {
        match self {
            ActionKind::SendMessage => "Message sent",
            ActionKind::PostTask => "Task posted",
        }
    }

    pub fn failure_prefix(self) -> &'static str {
        match self {
            ActionKind::SendMessage => "Send failed",
            ActionKind::PostTask => "Post failed",
        }
    }
}

#[derive(Debug)]
pub enum ViewUpdate {
    /// Raw payload received on stream connection `connection`.
    StreamMessage { connection: u64, raw: String },
    /// Stream connection `connection` ended, with the transport error if any.
    StreamClosed {
        connection: u64,
        reason: Option<String>,
    },
    /// Background topology fetch number `seq`, issued during `session`,
    /// finished.
    TopologyFetched {
        session: u64,
        seq: u64,
        result: Result<Topology, ViewError>,
    },
    /// User action `id`, issued during `session`, finished.
    ActionFinished {
        session: u64,
        id: u64,
        action: ActionKind,
        result: Result<(), ViewError>,
    },
}

pub fn channel() -> (UpdateSender, UpdateReceiver) {
    mpsc::unbounded_channel()
}
