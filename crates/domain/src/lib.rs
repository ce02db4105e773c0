//! `mh-domain`: shared types for mcphub.
//!
//! Holds the provider-agnostic conversation model, the shared error type,
//! and the TOML configuration model. Nothing in here performs I/O.

pub mod config;
pub mod error;
pub mod tool;
