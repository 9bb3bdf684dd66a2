//! High-level server API
//!
//! Provides a simplified server building interface for common use cases.

mod builder;

pub use builder::{BoundServer, Server, ServerBuilder};
