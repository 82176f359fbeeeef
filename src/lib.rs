//! A progressive, HTTP-accessible object cache for live-streaming media.
//!
//! Producers `POST`/`PUT` a named object's body using chunked transfer;
//! consumers may `GET` the same name before the upload finishes and tail
//! the bytes as they arrive. Objects persist to disk and are evicted on a
//! `Cache-Control: max-age` policy. Logical `EDGE`/`OLD_S=N` URL suffixes
//! resolve to a concrete sequence id for live-streaming consumers, and a
//! `GET` for a name that does not exist yet can park briefly for a matching
//! `POST`.
//!
//! # Module map
//! - [object] is the append-only buffer a single producer writes and many
//!   consumers tail.
//! - [registry] maps names to objects under one RW lock.
//! - [waiters] parks GETs for absent names and wakes them.
//! - [translator] resolves `EDGE`/`OLD_S=N` to concrete sequence ids.
//! - [eviction] sweeps expired objects off the registry and disk.
//! - [dispatch] is the HTTP method boundary tying the above together.
//! - [app] is the owned composition root ([app::Server]) built once at
//!   startup and shared across connections.

/// The server composition root.
pub mod app;

/// Response body wrapper.
pub mod body;

/// CLI argument parsing.
pub mod config;

/// CORS policy loading and header assembly.
pub mod cors;

/// HTTP method dispatcher.
pub mod dispatch;

/// Crate-local error types.
pub mod error;

/// TTL eviction sweep.
pub mod eviction;

/// Structured logging setup.
pub mod logging;

/// The progressive object buffer.
pub mod object;

/// The name -> object mapping.
pub mod registry;

/// Response conversion trait.
pub mod responder;

/// Connection accept loop.
mod server;

/// TLS-terminating connection accept loop.
#[cfg(feature = "tls")]
pub mod server_tls;

/// In-process signal arbiter for lifecycle/cache events.
pub mod signals;

/// EDGE/OLD_S=N URL translation.
pub mod translator;

/// Core HTTP type aliases.
pub mod types;

/// Waiting-GET rendezvous registry.
pub mod waiters;

pub use app::Server;
pub use server::serve;

#[cfg(feature = "tls")]
pub use server_tls::serve_tls;
