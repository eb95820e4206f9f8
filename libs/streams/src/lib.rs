//! # l4gate-streams
//!
//! Stream configuration for the l4gate layer-4 proxy.
//!
//! A stream binds a TCP, UDP or Unix-socket listener and forwards its
//! traffic to a default backend, or routes it by TLS SNI to per-domain
//! backend groups.
//!
//! ## Layers
//!
//! - [`model`]: plain value types (`Stream`, `Address`, `Backend`, ...)
//! - [`validation`]: pure consistency checks reporting every violation
//! - [`repository`]: the async storage contract
//! - [`commands`]: validate-then-persist orchestration over a repository
//! - [`memory`] and [`db`]: in-memory and Postgres storage adapters
//!
//! ## ID Format
//!
//! Streams are identified by `strm_{ulid}`, e.g.
//! `strm_01HV4Z2WQXKJNM8GPQY6VBKC3D`.

pub mod commands;
pub mod db;
pub mod dns;
pub mod id;
pub mod memory;
pub mod model;
pub mod repository;
pub mod validation;

pub use commands::{CommandError, CommandResult, StreamCommands, StreamService};
pub use id::{IdError, StreamId};
pub use memory::InMemoryStreamRepository;
pub use model::{Address, Backend, CircuitBreaker, FeatureSet, Protocol, Route, Stream, StreamType};
pub use repository::{Page, StorageError, StorageResult, StreamRepository};
pub use validation::{validate, validate_stream, Message, ValidationError, Violation};
