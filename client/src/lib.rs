//! # Realm Client Library
//!
//! A headless game client that joins a server either by `host:port` or by a
//! realm invite code, keeps the session alive, and rewrites a handful of
//! messages on the way through.
//!
//! ## Run sequence
//!
//! 1. [`auth`] loads the cached account token or runs the device-code flow.
//! 2. [`realms`] turns an invite code into a server address, accepting the
//!    invite on the way.
//! 3. [`discovery`] sends an unconnected ping; the status string in the pong
//!    is decoded into a [`shared::StatusRecord`].
//! 4. [`session`] dials the server with the advertised protocol, logs in and
//!    installs the [`pipeline`] on every message in both directions.
//! 5. [`orchestrator`] drains the session until an interrupt arrives or the
//!    server hangs up, then closes it.
//!
//! ## Packet pipeline
//!
//! High-volume world updates are dropped outright, resource pack
//! advertisements are replaced with an empty one so the client never
//! downloads packs, and with `--debug` every remaining packet is traced to the
//! `packets` log target.

pub mod auth;
pub mod config;
pub mod discovery;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod realms;
pub mod session;

pub use config::ClientConfig;
pub use error::ClientError;
pub use orchestrator::{Orchestrator, SessionState, Target};
