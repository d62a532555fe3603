//! # Observability & Tracing
//!
//! [`setup_tracing`] installs structured logging for the engine and the store actor.
//!
//! Levels follow one convention throughout the crate:
//!
//! - `debug!` records full payloads (request bodies, filters, find options) once, at entry.
//! - `info!` records completed mutations and dispatch decisions.
//! - `warn!` records failures and degraded results (e.g. a population that fell back to
//!   unpopulated rows).
//!
//! Dispatch entry points and CRUD operations are `#[tracing::instrument]`ed, so every log line
//! inside a request carries its resource, verb and path.
//!
//! ```bash
//! # Mutations and dispatch decisions
//! RUST_LOG=info cargo run
//!
//! # Full payloads
//! RUST_LOG=debug cargo run
//!
//! # Only the store actor
//! RUST_LOG=resource_framework::store=debug cargo run
//! ```
//!
//! With `RUST_LOG=info` a nested create reads:
//!
//! ```text
//! INFO handle:dispatch{resource="user" verb=post path="addresses"}:create{resource="address"}: Created collection="addresses" id="9f0c..."
//! INFO handle:dispatch{resource="user" verb=post path="addresses"}:create{resource="address"}: Primary reconciled parent="b41e..." primary=Some("9f0c...")
//! ```

/// Initializes the global subscriber. Call once, at process start.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
