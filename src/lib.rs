//! aeroctl - admin client for the AeroDB control plane
//!
//! Command modules plug into one shared parser; every invocation resolves
//! its configuration, authenticates with the host identity and runs the
//! selected command against a single connection.

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod identity;
pub mod observability;
