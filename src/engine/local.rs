//! In-process engine
//!
//! Keeps the last known state of every resource and reconciles each new
//! declaration against it through the provider that owns the type token:
//! check, then diff, then create, replace, update or nothing.
//!
//! Resources attached with a read are marked external and are never deleted
//! remotely; destroying or replacing them only forgets the record.

use super::operations::{OperationKind, OperationLog};
use super::{Engine, ReadRequest, RegisterRequest, RegisterResponse, RequestOptions};
use crate::error::{EngineError, EngineResult};
use crate::property::PropertyMap;
use crate::provider::{DiffResult, ProviderResource, ResourceProvider};
use crate::resource::{TypeToken, Urn};
use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Format version written into every snapshot
pub const SNAPSHOT_VERSION: u32 = 1;

/// Last known state of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceState {
    pub urn: String,
    #[serde(rename = "type")]
    pub type_token: String,
    pub id: String,
    #[serde(default)]
    pub inputs: PropertyMap,
    #[serde(default)]
    pub outputs: PropertyMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub protect: bool,
    #[serde(default)]
    pub delete_before_replace: bool,
    #[serde(default)]
    pub retain_on_delete: bool,
    /// Attached by a read rather than created by this engine
    #[serde(default)]
    pub external: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ResourceState {
    fn new(
        urn: &Urn,
        type_token: &str,
        resource: ProviderResource,
        inputs: PropertyMap,
        options: &RequestOptions,
        external: bool,
    ) -> Self {
        Self {
            urn: urn.to_string(),
            type_token: type_token.to_string(),
            id: resource.id,
            inputs,
            outputs: resource.outputs,
            parent: options.parent.clone(),
            dependencies: options.dependencies.clone(),
            protect: options.protect,
            delete_before_replace: options.delete_before_replace,
            retain_on_delete: options.retain_on_delete,
            external,
            provider: options.provider.clone(),
            version: options.version.clone(),
        }
    }

    /// Logical name, the last segment of the URN
    pub fn name(&self) -> &str {
        self.urn.splitn(4, "::").nth(3).unwrap_or(&self.urn)
    }

    fn response(&self, urn: Urn) -> RegisterResponse {
        RegisterResponse {
            urn,
            id: self.id.clone(),
            outputs: self.outputs.clone(),
        }
    }

    fn references(&self, urn: &str) -> bool {
        self.parent.as_deref() == Some(urn) || self.dependencies.iter().any(|d| d == urn)
    }
}

/// Serializable copy of an engine's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub version: u32,
    #[serde(default)]
    pub resources: Vec<ResourceState>,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            resources: Vec::new(),
        }
    }
}

impl StateSnapshot {
    /// Load a snapshot; a missing file is an empty state
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not read state file {}", path.display()))?;
        let snapshot: Self = serde_json::from_str(&content)
            .with_context(|| format!("malformed state file {}", path.display()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            anyhow::bail!(
                "state file {} has version {}, expected {}",
                path.display(),
                snapshot.version,
                SNAPSHOT_VERSION
            );
        }
        Ok(snapshot)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("could not write state file {}", path.display()))?;
        Ok(())
    }

    /// Resources whose logical name is `name`
    pub fn find_by_name(&self, name: &str) -> Vec<&ResourceState> {
        self.resources.iter().filter(|r| r.name() == name).collect()
    }
}

/// Engine that reconciles declarations in-process against registered providers.
pub struct LocalEngine {
    providers: HashMap<String, Arc<dyn ResourceProvider>>,
    state: RwLock<BTreeMap<String, ResourceState>>,
    operations: Mutex<OperationLog>,
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalEngine {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            state: RwLock::new(BTreeMap::new()),
            operations: Mutex::new(OperationLog::new()),
        }
    }

    /// Serve the provider's package with it
    pub fn with_provider(mut self, provider: Arc<dyn ResourceProvider>) -> Self {
        self.providers.insert(provider.package().to_string(), provider);
        self
    }

    /// Start from previously saved state
    pub fn with_snapshot(mut self, snapshot: StateSnapshot) -> Self {
        let resources = snapshot
            .resources
            .into_iter()
            .map(|r| (r.urn.clone(), r))
            .collect();
        self.state = RwLock::new(resources);
        self
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            version: SNAPSHOT_VERSION,
            resources: self.state.read().await.values().cloned().collect(),
        }
    }

    pub async fn resource(&self, urn: &str) -> Option<ResourceState> {
        self.state.read().await.get(urn).cloned()
    }

    pub async fn resources(&self) -> Vec<ResourceState> {
        self.state.read().await.values().cloned().collect()
    }

    /// Kinds of the operations performed for a resource, oldest first
    pub async fn operation_kinds(&self, urn: &Urn) -> Vec<OperationKind> {
        self.operations.lock().await.kinds_for(urn.as_str())
    }

    /// One line per recorded operation, most recent first
    pub async fn operation_summaries(&self) -> Vec<String> {
        self.operations
            .lock()
            .await
            .operations
            .iter()
            .map(|o| o.summary())
            .collect()
    }

    /// Delete a resource and forget it.
    ///
    /// Protected resources and resources still referenced as a parent or
    /// dependency are refused. Retained and external resources are only
    /// dropped from state.
    pub async fn destroy(&self, urn: &str) -> EngineResult<()> {
        let state = self
            .resource(urn)
            .await
            .ok_or_else(|| EngineError::UnknownUrn(urn.to_string()))?;
        if state.protect {
            return Err(EngineError::Protected(urn.to_string()));
        }
        let dependents: Vec<String> = self
            .state
            .read()
            .await
            .values()
            .filter(|r| r.references(urn))
            .map(|r| r.urn.clone())
            .collect();
        if !dependents.is_empty() {
            return Err(EngineError::HasDependents {
                urn: urn.to_string(),
                dependents,
            });
        }

        let token = parse_token(&state.type_token)?;
        let provider = self.provider_for(&token, state.provider.as_deref())?;
        let urn_ref = Urn::parse(urn).ok_or_else(|| EngineError::UnknownUrn(urn.to_string()))?;
        self.track(
            OperationKind::Delete,
            &state.type_token,
            &urn_ref,
            delete_remote(provider.as_ref(), &urn_ref, &token, &state),
        )
        .await?;

        self.state.write().await.remove(urn);
        Ok(())
    }

    fn provider_for(
        &self,
        token: &TypeToken,
        package: Option<&str>,
    ) -> EngineResult<Arc<dyn ResourceProvider>> {
        let package = package.unwrap_or_else(|| token.package());
        self.providers
            .get(package)
            .cloned()
            .ok_or_else(|| EngineError::NoProvider(package.to_string()))
    }

    /// Prior state under the URN itself or, failing that, one of its aliases
    async fn prior_state(&self, request: &RegisterRequest) -> Option<ResourceState> {
        let state = self.state.read().await;
        std::iter::once(request.urn.as_str())
            .chain(request.options.aliases.iter().map(String::as_str))
            .find_map(|urn| state.get(urn).cloned())
    }

    async fn store(&self, state: ResourceState, aliases: &[String]) {
        let mut resources = self.state.write().await;
        for alias in aliases {
            resources.remove(alias);
        }
        resources.insert(state.urn.clone(), state);
    }

    async fn track<T, F>(
        &self,
        kind: OperationKind,
        type_token: &str,
        urn: &Urn,
        operation: F,
    ) -> EngineResult<T>
    where
        F: Future<Output = EngineResult<T>>,
    {
        let id = self.operations.lock().await.start(kind, type_token, urn.as_str());
        let result = operation.await;
        let mut log = self.operations.lock().await;
        match &result {
            Ok(_) => log.mark_success(id),
            Err(e) => log.mark_error(id, e.to_string()),
        }
        result
    }

    async fn replace(
        &self,
        provider: &dyn ResourceProvider,
        request: &RegisterRequest,
        token: &TypeToken,
        prior: &ResourceState,
        inputs: &PropertyMap,
        diff: &DiffResult,
    ) -> EngineResult<ProviderResource> {
        let urn = &request.urn;
        if prior.protect {
            return Err(EngineError::Protected(urn.to_string()));
        }

        if diff.delete_before_replace
            || request.options.delete_before_replace
            || prior.delete_before_replace
        {
            self.track(OperationKind::Replace, &request.type_token, urn, async {
                delete_remote(provider, urn, token, prior).await?;
                provider.create(urn, token, inputs).await
            })
            .await
        } else {
            let created = self
                .track(
                    OperationKind::Replace,
                    &request.type_token,
                    urn,
                    provider.create(urn, token, inputs),
                )
                .await?;
            if created.id == prior.id {
                tracing::warn!("{} was replaced in place as {}", urn, created.id);
                return Ok(created);
            }
            // The replacement is live; a failed cleanup is logged, not fatal.
            let _ = self
                .track(
                    OperationKind::Delete,
                    &request.type_token,
                    urn,
                    delete_remote(provider, urn, token, prior),
                )
                .await;
            Ok(created)
        }
    }
}

fn parse_token(type_token: &str) -> EngineResult<TypeToken> {
    TypeToken::parse(type_token).map_err(|_| EngineError::UnknownType(type_token.to_string()))
}

async fn delete_remote(
    provider: &dyn ResourceProvider,
    urn: &Urn,
    token: &TypeToken,
    state: &ResourceState,
) -> EngineResult<()> {
    if state.external || state.retain_on_delete {
        tracing::info!("Leaving {} ({}) in place", urn, state.id);
        return Ok(());
    }
    provider.delete(urn, token, &state.id).await
}

/// Inputs listed in `ignore_changes` keep their prior value.
fn apply_ignore_changes(news: &mut PropertyMap, olds: &PropertyMap, ignore_changes: &[String]) {
    for key in ignore_changes {
        match olds.get(key) {
            Some(old) => {
                news.insert(key.clone(), old.clone());
            }
            None => {
                news.remove(key);
            }
        }
    }
}

/// Changed inputs listed in `replace_on_changes` (or `*`) force a replacement.
fn force_replacements(diff: &mut DiffResult, replace_on_changes: &[String]) {
    let all = replace_on_changes.iter().any(|k| k == "*");
    for key in &diff.diffs {
        if (all || replace_on_changes.contains(key)) && !diff.replaces.contains(key) {
            diff.replaces.push(key.clone());
        }
    }
}

#[async_trait]
impl Engine for LocalEngine {
    async fn register_resource(&self, request: RegisterRequest) -> EngineResult<RegisterResponse> {
        let token = parse_token(&request.type_token)?;
        let provider = self.provider_for(&token, request.options.provider.as_deref())?;
        let urn = &request.urn;

        // External records are never diffed against a declaration.
        let prior = self.prior_state(&request).await.filter(|p| !p.external);

        let mut news = request.inputs.clone();
        if let Some(prior) = &prior {
            apply_ignore_changes(&mut news, &prior.inputs, &request.options.ignore_changes);
        }
        let checked = provider.check(urn, &token, &news).await?;
        if !checked.failures.is_empty() {
            return Err(EngineError::CheckFailed {
                urn: urn.to_string(),
                failures: checked.failures,
            });
        }
        let inputs = checked.inputs;

        let resource = match &prior {
            None => {
                self.track(
                    OperationKind::Create,
                    &request.type_token,
                    urn,
                    provider.create(urn, &token, &inputs),
                )
                .await?
            }
            Some(prior) => {
                let mut diff = provider
                    .diff(urn, &token, &prior.id, &prior.inputs, &inputs)
                    .await?;
                force_replacements(&mut diff, &request.options.replace_on_changes);

                if !diff.has_changes() {
                    self.operations
                        .lock()
                        .await
                        .record(OperationKind::Same, &request.type_token, urn.as_str());
                    ProviderResource {
                        id: prior.id.clone(),
                        outputs: prior.outputs.clone(),
                    }
                } else if diff.requires_replace() {
                    tracing::info!("{} requires replacement: {}", urn, diff.replaces.join(", "));
                    self.replace(provider.as_ref(), &request, &token, prior, &inputs, &diff)
                        .await?
                } else {
                    let outputs = self
                        .track(
                            OperationKind::Update,
                            &request.type_token,
                            urn,
                            provider.update(urn, &token, &prior.id, &prior.inputs, &inputs),
                        )
                        .await?;
                    ProviderResource {
                        id: prior.id.clone(),
                        outputs,
                    }
                }
            }
        };

        let state = ResourceState::new(
            urn,
            &request.type_token,
            resource,
            inputs,
            &request.options,
            false,
        );
        let response = state.response(urn.clone());
        self.store(state, &request.options.aliases).await;
        Ok(response)
    }

    async fn read_resource(&self, request: ReadRequest) -> EngineResult<RegisterResponse> {
        let token = parse_token(&request.type_token)?;
        let provider = self.provider_for(&token, request.options.provider.as_deref())?;
        let urn = &request.urn;

        let resource = self
            .track(OperationKind::Read, &request.type_token, urn, async {
                provider
                    .read(urn, &token, &request.id)
                    .await?
                    .ok_or_else(|| EngineError::NotFound {
                        type_token: request.type_token.clone(),
                        id: request.id.clone(),
                    })
            })
            .await?;

        let state = ResourceState::new(
            urn,
            &request.type_token,
            resource,
            PropertyMap::new(),
            &request.options,
            true,
        );
        let response = state.response(urn.clone());
        self.store(state, &request.options.aliases).await;
        Ok(response)
    }
}
