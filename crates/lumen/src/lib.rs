//! Lumen HTTP service.
//!
//! The binary wires [`lumen_core::LabelService`] to an axum router; the
//! router lives here so integration tests can drive it directly.

pub mod http;
