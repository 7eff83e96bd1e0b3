//! WWS Comms View - live agent topology and event feed
//!
//! Builds a consistent live view from two sources: a one-time snapshot of
//! the agent graph plus a recent event page, and a continuous
//! Server-Sent Events stream that drives every later update.

pub mod backend;
pub mod client;
pub mod config;
pub mod console;
pub mod error;
pub mod event_buffer;
pub mod event_feed;
pub mod present;
pub mod sse;
pub mod topology_store;
pub mod update;
pub mod view_model;

pub use backend::{CommsBackend, MessageStream};
pub use client::HttpBackend;
pub use config::ViewConfig;
pub use error::ViewError;
pub use event_buffer::EventBuffer;
pub use event_feed::{EventFeed, FeedState, Ingest};
pub use topology_store::TopologyStore;
pub use update::{ActionKind, ViewUpdate};
pub use view_model::{ViewChange, ViewModel};
