//! Resource providers
//!
//! A provider knows how to check, diff, create, read and delete the resource
//! kinds of one package. [`SentryProvider`] dispatches on the type token to the
//! per-kind implementations in [`projects`] and [`keys`].

pub mod keys;
pub mod projects;

use crate::config::ProviderConfig;
use crate::error::{CheckFailure, EngineError, EngineResult};
use crate::property::PropertyMap;
use crate::resource::{TypeToken, Urn};
use crate::sentry::{SentryApi, SentryClient};
use async_trait::async_trait;
use std::sync::Arc;

/// Reason given for every missing or mistyped required input
pub const NON_EMPTY_STRING_REASON: &str = "this input must be a non-empty string";

/// Reason given for a mistyped optional input
pub const STRING_REASON: &str = "this input must be a string";

/// Validated inputs plus whatever the provider rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckResult {
    pub inputs: PropertyMap,
    pub failures: Vec<CheckFailure>,
}

/// Outcome of comparing prior inputs with new ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// Properties whose values changed
    pub diffs: Vec<String>,
    /// Changed properties that force a replacement
    pub replaces: Vec<String>,
    /// The replacement would collide with the old object, so it must go first
    pub delete_before_replace: bool,
}

impl DiffResult {
    pub fn has_changes(&self) -> bool {
        !self.diffs.is_empty()
    }

    pub fn requires_replace(&self) -> bool {
        !self.replaces.is_empty()
    }
}

/// A resource as the provider reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResource {
    pub id: String,
    pub outputs: PropertyMap,
}

/// Create/read/delete for the resource kinds of one package.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Package prefix of the type tokens this provider serves
    fn package(&self) -> &str;

    async fn check(
        &self,
        urn: &Urn,
        token: &TypeToken,
        news: &PropertyMap,
    ) -> EngineResult<CheckResult>;

    async fn diff(
        &self,
        urn: &Urn,
        token: &TypeToken,
        id: &str,
        olds: &PropertyMap,
        news: &PropertyMap,
    ) -> EngineResult<DiffResult>;

    async fn create(
        &self,
        urn: &Urn,
        token: &TypeToken,
        inputs: &PropertyMap,
    ) -> EngineResult<ProviderResource>;

    /// `Ok(None)` when the object no longer exists.
    async fn read(
        &self,
        urn: &Urn,
        token: &TypeToken,
        id: &str,
    ) -> EngineResult<Option<ProviderResource>>;

    async fn update(
        &self,
        _urn: &Urn,
        token: &TypeToken,
        _id: &str,
        _olds: &PropertyMap,
        _news: &PropertyMap,
    ) -> EngineResult<PropertyMap> {
        Err(EngineError::UnsupportedUpdate(token.to_string()))
    }

    async fn delete(&self, urn: &Urn, token: &TypeToken, id: &str) -> EngineResult<()>;
}

/// Resource kinds served by [`SentryProvider`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SentryKind {
    Project,
    ClientKey,
}

impl SentryKind {
    fn from_token(token: &TypeToken) -> EngineResult<Self> {
        match (token.package(), token.module(), token.name()) {
            (PACKAGE, "index", "Project") => Ok(Self::Project),
            (PACKAGE, "index", "ClientKey") => Ok(Self::ClientKey),
            _ => Err(EngineError::UnknownType(token.to_string())),
        }
    }
}

/// Package name of the Sentry provider
pub const PACKAGE: &str = "sentry";

/// Provider for `sentry:index:*` resources.
#[derive(Clone)]
pub struct SentryProvider {
    api: Arc<dyn SentryApi>,
}

impl SentryProvider {
    pub fn new(api: Arc<dyn SentryApi>) -> Self {
        Self { api }
    }

    /// Configure a provider talking to the real API
    pub fn from_config(config: &ProviderConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = SentryClient::new(config).context("could not initialize a Sentry API client")?;
        Ok(Self::new(Arc::new(client)))
    }

    fn label(&self) -> &'static str {
        "Provider[sentry]"
    }
}

#[async_trait]
impl ResourceProvider for SentryProvider {
    fn package(&self) -> &str {
        PACKAGE
    }

    async fn check(
        &self,
        urn: &Urn,
        token: &TypeToken,
        news: &PropertyMap,
    ) -> EngineResult<CheckResult> {
        tracing::debug!("{}.Check({}) executing", self.label(), urn);
        match SentryKind::from_token(token)? {
            SentryKind::Project => Ok(projects::check(news)),
            SentryKind::ClientKey => Ok(keys::check(news)),
        }
    }

    async fn diff(
        &self,
        urn: &Urn,
        token: &TypeToken,
        _id: &str,
        olds: &PropertyMap,
        news: &PropertyMap,
    ) -> EngineResult<DiffResult> {
        tracing::debug!("{}.Diff({}) executing", self.label(), urn);
        match SentryKind::from_token(token)? {
            SentryKind::Project => Ok(projects::diff(olds, news)),
            SentryKind::ClientKey => Ok(keys::diff(olds, news)),
        }
    }

    async fn create(
        &self,
        urn: &Urn,
        token: &TypeToken,
        inputs: &PropertyMap,
    ) -> EngineResult<ProviderResource> {
        tracing::debug!("{}.Create({}) executing", self.label(), urn);
        match SentryKind::from_token(token)? {
            SentryKind::Project => projects::create(self.api.as_ref(), urn, inputs).await,
            SentryKind::ClientKey => keys::create(self.api.as_ref(), urn, inputs).await,
        }
    }

    async fn read(
        &self,
        urn: &Urn,
        token: &TypeToken,
        id: &str,
    ) -> EngineResult<Option<ProviderResource>> {
        tracing::debug!("{}.Read({}) executing", self.label(), urn);
        match SentryKind::from_token(token)? {
            SentryKind::Project => projects::read(self.api.as_ref(), urn, id).await,
            SentryKind::ClientKey => keys::read(self.api.as_ref(), urn, id).await,
        }
    }

    async fn delete(&self, urn: &Urn, token: &TypeToken, id: &str) -> EngineResult<()> {
        tracing::debug!("{}.Delete({}) executing", self.label(), urn);
        match SentryKind::from_token(token)? {
            SentryKind::Project => projects::delete(self.api.as_ref(), urn, id).await,
            SentryKind::ClientKey => keys::delete(self.api.as_ref(), urn, id).await,
        }
    }
}

/// Check that every `required` key is a non-empty string and every
/// `optional` key, when present, is a string.
fn check_inputs(news: &PropertyMap, required: &[&str], optional: &[&str]) -> CheckResult {
    use crate::property::{is_non_empty_string, without_nulls};

    let mut failures = Vec::new();
    for key in required {
        if !is_non_empty_string(news.get(*key)) {
            failures.push(CheckFailure::new(*key, NON_EMPTY_STRING_REASON));
        }
    }
    for key in optional {
        match news.get(*key) {
            None | Some(serde_json::Value::Null) | Some(serde_json::Value::String(_)) => {}
            Some(_) => failures.push(CheckFailure::new(*key, STRING_REASON)),
        }
    }
    failures.sort();

    CheckResult {
        inputs: without_nulls(news.clone()),
        failures,
    }
}

/// Diff where every changed input forces a replacement.
fn replace_on_any_change(olds: &PropertyMap, news: &PropertyMap, inputs: &[&str]) -> DiffResult {
    let diffs: Vec<String> = crate::property::changed_keys(olds, news)
        .into_iter()
        .filter(|key| inputs.contains(&key.as_str()))
        .collect();
    DiffResult {
        replaces: diffs.clone(),
        diffs,
        delete_before_replace: false,
    }
}

/// Map an anyhow failure to a provider error for `urn`.
fn provider_error(urn: &Urn) -> impl FnOnce(anyhow::Error) -> EngineError + '_ {
    move |err| EngineError::provider(urn.as_str(), &err)
}
