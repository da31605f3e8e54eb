//! Image intake stages.
//!
//! - **decode**: sniff the container format and decode client bytes
//!
//! Base64 handling lives in [`crate::payload`]; everything after the image
//! is decoded belongs to the engine.

pub mod decode;

// Re-exports for convenient access
pub use decode::{DecodedImage, ImageLoader};
