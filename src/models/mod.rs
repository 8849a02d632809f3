//! Data models for the pool registry.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;

// Re-export commonly used types
pub use connection::{ConnectRequest, ConnectionConfig, Engine, Role};
