//! Common types module for the egg price tracker.
//!
//! This module defines the records, API payloads and configuration helpers
//! shared by the storage backends, the query service and the HTTP server.

/// API types for HTTP endpoints and error responses.
pub mod api;
/// Price observations, locations and comparison records.
pub mod prices;
/// Registry trait for named backend implementations.
pub mod registry;
/// Configuration validation types for backend-specific TOML tables.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use prices::*;
pub use registry::*;
pub use validation::*;
