//! Typed infrastructure-as-code bindings for Sentry.
//!
//! Declare a [`Project`] (or attach to an existing one with [`Project::get`]);
//! the handle checks its arguments, submits a registration through a
//! [`Context`] to an [`engine::Engine`], and exposes every property as a
//! [`Deferred`] value that settles once the engine has answered.
//!
//! ```
//! use std::sync::Arc;
//! use sentry_iac::engine::MockEngine;
//! use sentry_iac::{Context, ContextConfig, Project, ProjectArgs, ResourceOptions};
//!
//! # tokio_test::block_on(async {
//! let engine = Arc::new(MockEngine::new());
//! let ctx = Context::new(engine, ContextConfig::new("dev", "infra")).unwrap();
//! let project = Project::new(
//!     &ctx,
//!     "backend",
//!     ProjectArgs::new()
//!         .name("Backend")
//!         .organization_slug("acme")
//!         .slug("backend")
//!         .team_slug("core"),
//!     ResourceOptions::new(),
//! )
//! .unwrap();
//!
//! ctx.drain().await;
//! assert_eq!(project.name().value().await.unwrap(), "Backend");
//! # });
//! ```
//!
//! [`engine::LocalEngine`] together with [`provider::SentryProvider`] performs
//! the declarations against the Sentry API.

pub mod config;
pub mod context;
pub mod deferred;
pub mod engine;
pub mod error;
pub mod property;
pub mod provider;
pub mod resource;
pub mod sdk;
pub mod sentry;

/// Version injected at compile time via SENTRY_IAC_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("SENTRY_IAC_VERSION") {
    Some(v) => v,
    None => "dev",
};

pub use context::{Context, ContextConfig};
pub use deferred::{Deferred, DeferredState, Input, Resolver};
pub use error::{CheckFailure, EngineError, EngineResult, ResourceError, ResourceResult};
pub use resource::{
    CustomResource, Dependency, RegisteredResource, ResourceOptions, ResourceRegistration,
    TypeToken, Urn,
};
pub use sdk::{ClientKey, ClientKeyArgs, Project, ProjectArgs};
