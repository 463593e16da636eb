//! Core types for the site cache.
//!
//! This crate provides:
//! - The per-site response cache with snapshot persistence
//! - The [`Upstream`] seam the cache fetches through
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod upstream;

pub use cache::{CachePolicy, Entry, FetchOutcome, PaginationShape, PurgeReport, SiteCache};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use upstream::Upstream;
