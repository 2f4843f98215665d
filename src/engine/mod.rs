//! Orchestration engine
//!
//! The [`Engine`] trait is the seam between resource handles and whatever
//! reconciles desired state against the real world.
//!
//! # Module Structure
//!
//! - [`local`] - In-process engine driving a
//!   [`ResourceProvider`](crate::provider::ResourceProvider)
//! - [`mock`] - Recording engine for tests
//! - [`operations`] - History of the operations an engine performed

pub mod local;
pub mod mock;
pub mod operations;

use crate::error::EngineResult;
use crate::property::PropertyMap;
use crate::resource::Urn;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use local::{LocalEngine, ResourceState, StateSnapshot};
pub use mock::MockEngine;
pub use operations::{Operation, OperationKind, OperationLog, OperationStatus};

/// Options as the engine sees them: every deferred piece already settled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub protect: bool,
    #[serde(default)]
    pub delete_before_replace: bool,
    #[serde(default)]
    pub retain_on_delete: bool,
    #[serde(default)]
    pub ignore_changes: Vec<String>,
    #[serde(default)]
    pub replace_on_changes: Vec<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

/// Declare desired state.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterRequest {
    pub urn: Urn,
    pub type_token: String,
    pub name: String,
    pub inputs: PropertyMap,
    pub options: RequestOptions,
}

/// Attach to an existing object and read its state.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub urn: Urn,
    pub type_token: String,
    pub name: String,
    pub id: String,
    pub options: RequestOptions,
}

/// Settled state of a resource after registration or read.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterResponse {
    pub urn: Urn,
    pub id: String,
    pub outputs: PropertyMap,
}

/// Reconciles declared resources.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn register_resource(&self, request: RegisterRequest) -> EngineResult<RegisterResponse>;

    async fn read_resource(&self, request: ReadRequest) -> EngineResult<RegisterResponse>;
}
