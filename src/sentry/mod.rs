//! Sentry API interaction module
//!
//! This module provides the HTTP plumbing the provider uses to talk to the
//! Sentry REST API.
//!
//! # Module Structure
//!
//! - [`api`] - The [`SentryApi`] trait the provider is written against
//! - [`client`] - Main Sentry client (token, base URL, URL builders)
//! - [`http`] - HTTP utilities and API error classification
//! - [`projects`] - Project create/read/update/delete
//! - [`keys`] - Client key (DSN) management
//!
//! # Example
//!
//! ```no_run
//! use sentry_iac::config::ProviderConfig;
//! use sentry_iac::sentry::{projects, SentryClient};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = SentryClient::new(&ProviderConfig::new("token", "https://sentry.io/api/0/"))?;
//!     let project = projects::get_project(&client, "acme", "backend").await?;
//!     println!("{}", project.name);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod http;
pub mod keys;
pub mod projects;

pub use api::SentryApi;
pub use client::SentryClient;
pub use http::{format_api_error, is_not_found, SentryApiError};
