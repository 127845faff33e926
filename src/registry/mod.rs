//! Per-session connection multiplexing and event broadcast.
//!
//! The module is organised around the [`SessionRegistry`], the envelope
//! shape written to every client ([`Envelope`]), and the transport seam
//! connections implement ([`ClientConnection`]).
//!
//! The registry is an explicitly constructed instance: the process's
//! composition root creates one, hands out `Arc`s, and owns its lifetime.
//! There is deliberately no global accessor.

pub mod connection;
pub mod envelope;
pub mod sessions;

pub use connection::{ChannelConnection, ClientConnection, ConnectionId};
pub use envelope::{Envelope, PipelineStatus};
pub use sessions::SessionRegistry;
