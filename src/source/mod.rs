//! Image source resolution.
//!
//! This module provides:
//! - path and URL helpers (`paths`)
//! - JSON index and HTML listing parsers (`listing`)
//! - `SourceResolver` - picks the source and produces a `ResolutionResult`

pub mod error;
pub mod listing;
pub mod paths;
pub mod resolver;

pub use error::ResolveError;
pub use resolver::{apply_whitelist, SourceResolver};
