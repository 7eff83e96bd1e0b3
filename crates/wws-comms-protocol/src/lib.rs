//! WWS Comms Protocol - wire types for the agent communication view
//!
//! Defines the topology graph (agents and their relations), the
//! inter-agent event records pushed by the kernel, and the request
//! bodies used to send messages and post tasks.

pub mod constants;
pub mod error;
pub mod events;
pub mod messages;
pub mod topology;
pub mod types;

pub use constants::*;
pub use error::*;
pub use events::*;
pub use messages::*;
pub use types::*;
