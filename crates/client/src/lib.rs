//! Client code for the site cache.
//!
//! This crate provides the HTTP client for the upstream REST API and the
//! resolution of inbound requests into site slugs and cache identifiers.

pub mod api;
pub mod identifier;

pub use api::{ApiClient, ApiConfig, ApiError};
pub use identifier::{
    IdentifierError, REFRESH_PARAM, SITE_PARAM, control_param, control_value, force_refresh_requested, normalize_identifier,
    site_requested, site_slug,
};
