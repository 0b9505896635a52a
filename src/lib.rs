//! dupmon: a status monitor for Duplicati backup servers.
//!
//! The crate is split into the REST client for the server API ([`api`]),
//! the reconciliation core that mirrors selected backups and derives
//! events from observed state transitions ([`core`]), and the daemon glue
//! (config, context, logging) used by the binary.

pub mod api;
pub mod config;
pub mod context;
pub mod core;
pub mod logging;
