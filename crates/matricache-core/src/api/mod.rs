//! REST API client module for the records backend.
//!
//! This module provides the `ApiClient` used to build fetchers for data
//! binders and to issue the write requests that precede optimistic updates.
//!
//! Requests carry an optional bearer token.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
