//! # Docloom: live document ingestion with citation-grained context
//!
//! Docloom is the real-time ingestion subsystem of a chat application: it
//! takes a URL or an uploaded file, extracts its text, splits it into
//! overlapping citable chunks, persists it, and streams per-stage progress
//! to every client watching the owning conversation session. Alongside it
//! lives a pipeline-configuration registry kept consistent across server
//! processes through a pub/sub invalidation channel.
//!
//! ## Core Concepts
//!
//! - **Session**: broadcast partition key grouping a conversation, its
//!   documents, and its live connections
//! - **Document**: one ingested artifact with immutable content
//! - **Chunk**: transient word-range slice used for citation-grained
//!   context assembly
//! - **Envelope**: the JSON event shape fanned out to connected clients
//!
//! ## Control Flow
//!
//! ```text
//! inbound text ──► urls::extract ──► per valid URL:
//!                                      broadcast url_detected
//!                                      spawn supervised ingestion ──┐
//!                                                                   │
//! ingest::DocumentProcessor ── fetch ► extract ► store ─────────────┤
//!          │                                                        │
//!          └── stage events ──► registry::SessionRegistry ──► every
//!                                connection registered for the session
//!
//! pipelines::PipelineCache ◄── invalidation channel ◄── any process
//!                               that mutated a pipeline config
//! ```
//!
//! ## Module Guide
//!
//! - [`urls`] - URL detection, validation, and safety filtering
//! - [`chunker`] - deterministic overlapping word-window splitting
//! - [`context`] - context assembly and citation mapping
//! - [`registry`] - per-session connection multiplexing and broadcast
//! - [`ingest`] - the staged document ingestion pipeline
//! - [`pipelines`] - pipeline config registry with pub/sub invalidation
//! - [`store`] - document and pipeline persistence over SQLite
//! - [`config`] - environment-driven runtime configuration

pub mod chunker;
pub mod config;
pub mod context;
pub mod ingest;
pub mod pipelines;
pub mod registry;
pub mod store;
pub mod urls;
