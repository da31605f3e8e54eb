//! Command handlers for the `lumen` binary.

pub mod config;
pub mod models;
pub mod serve;
