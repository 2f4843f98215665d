//! Registration context
//!
//! A [`Context`] submits [`ResourceRegistration`]s to an [`Engine`]. Each
//! submission returns a [`RegisteredResource`] immediately and runs on its
//! own task: the task waits for deferred inputs and dependencies, calls the
//! engine, then settles the resource's id and outputs. Any failure along the
//! way fails both with the same error.

use crate::deferred::{Deferred, Input, Resolver};
use crate::engine::{Engine, ReadRequest, RegisterRequest, RegisterResponse, RequestOptions};
use crate::error::{EngineResult, ResourceError, ResourceResult};
use crate::property::PropertyMap;
use crate::resource::{RegisteredResource, ResourceOptions, ResourceRegistration, TypeToken, Urn};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Explicit settings for a registration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Stack name used in URNs
    pub stack: String,
    /// Project name used in URNs
    pub project: String,
    /// Version stamped on registrations whose options leave it unset
    pub sdk_version: String,
}

impl ContextConfig {
    pub fn new(stack: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            project: project.into(),
            sdk_version: crate::VERSION.to_string(),
        }
    }

    pub fn with_sdk_version(mut self, version: impl Into<String>) -> Self {
        self.sdk_version = version.into();
        self
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self::new("dev", "sentry-iac")
    }
}

/// Submits registrations to an engine.
#[derive(Clone)]
pub struct Context {
    engine: Arc<dyn Engine>,
    config: Arc<ContextConfig>,
    runtime: Handle,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What a spawned registration will send once its inputs settle
enum Submission {
    Register {
        inputs: std::collections::BTreeMap<String, Input<serde_json::Value>>,
    },
    Read {
        id: Input<String>,
    },
}

impl Context {
    /// Must be called from within a tokio runtime.
    pub fn new(engine: Arc<dyn Engine>, config: ContextConfig) -> ResourceResult<Self> {
        let runtime = Handle::try_current().map_err(|_| ResourceError::NoRuntime)?;
        Ok(Self {
            engine,
            config: Arc::new(config),
            runtime,
            tasks: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Address a resource of this context's stack and project.
    pub fn urn(&self, type_token: &TypeToken, name: &str, parent: Option<&Urn>) -> Urn {
        Urn::new(&self.config.stack, &self.config.project, parent, type_token, name)
    }

    /// Declare desired state. With `options.id` set, attaches to the
    /// existing object instead and sends no inputs.
    pub fn register(&self, registration: ResourceRegistration) -> RegisteredResource {
        let ResourceRegistration {
            type_token,
            name,
            inputs,
            mut options,
        } = registration;
        let submission = match options.id.take() {
            Some(id) => Submission::Read { id },
            None => Submission::Register { inputs },
        };
        self.submit(type_token, name, submission, options)
    }

    /// Attach to an existing object by id and read its state.
    pub fn read(
        &self,
        type_token: TypeToken,
        name: impl Into<String>,
        id: impl Into<Input<String>>,
        options: ResourceOptions,
    ) -> RegisteredResource {
        self.submit(type_token, name.into(), Submission::Read { id: id.into() }, options)
    }

    /// Wait for every registration submitted so far, including ones
    /// submitted while waiting.
    pub async fn drain(&self) {
        loop {
            let pending = std::mem::take(&mut *lock(&self.tasks));
            if pending.is_empty() {
                break;
            }
            for task in pending {
                if let Err(e) = task.await {
                    tracing::error!("Registration task failed: {}", e);
                }
            }
        }
    }

    /// Registrations still running.
    pub fn outstanding(&self) -> usize {
        lock(&self.tasks).iter().filter(|t| !t.is_finished()).count()
    }

    fn submit(
        &self,
        type_token: TypeToken,
        name: String,
        submission: Submission,
        options: ResourceOptions,
    ) -> RegisteredResource {
        let urn = self.urn(&type_token, &name, options.parent.as_ref());
        let (id, id_resolver) = Deferred::channel();
        let (outputs, outputs_resolver) = Deferred::channel();

        let engine = Arc::clone(&self.engine);
        let sdk_version = self.config.sdk_version.clone();
        let task_urn = urn.clone();
        let token = type_token.to_string();
        let task = async move {
            let result = run(
                engine,
                task_urn.clone(),
                token,
                name,
                submission,
                options,
                sdk_version,
            )
            .await;
            settle(&task_urn, result, id_resolver, outputs_resolver);
        };

        let mut tasks = lock(&self.tasks);
        tasks.retain(|t| !t.is_finished());
        tasks.push(self.runtime.spawn(task));

        RegisteredResource {
            type_token,
            urn,
            id,
            outputs,
        }
    }
}

async fn run(
    engine: Arc<dyn Engine>,
    urn: Urn,
    type_token: String,
    name: String,
    submission: Submission,
    options: ResourceOptions,
    sdk_version: String,
) -> EngineResult<RegisterResponse> {
    let options = request_options(options, sdk_version).await?;
    match submission {
        Submission::Register { inputs } => {
            let inputs = resolve_inputs(inputs).await?;
            tracing::debug!("Registering {}", urn);
            engine
                .register_resource(RegisterRequest {
                    urn,
                    type_token,
                    name,
                    inputs,
                    options,
                })
                .await
        }
        Submission::Read { id } => {
            let id = id.value().await?;
            tracing::debug!("Reading {} as {}", id, urn);
            engine
                .read_resource(ReadRequest {
                    urn,
                    type_token,
                    name,
                    id,
                    options,
                })
                .await
        }
    }
}

fn settle(
    urn: &Urn,
    result: EngineResult<RegisterResponse>,
    id: Resolver<String>,
    outputs: Resolver<PropertyMap>,
) {
    match result {
        Ok(response) => {
            id.resolve(response.id);
            outputs.resolve(response.outputs);
        }
        Err(err) => {
            tracing::warn!("Registration of {} failed: {}", urn, err);
            id.fail(err.clone());
            outputs.fail(err);
        }
    }
}

async fn resolve_inputs(
    inputs: std::collections::BTreeMap<String, Input<serde_json::Value>>,
) -> EngineResult<PropertyMap> {
    let mut resolved = PropertyMap::new();
    for (key, input) in inputs {
        resolved.insert(key, input.value().await?);
    }
    Ok(resolved)
}

/// Settle every dependency and fill the version from the context.
async fn request_options(
    options: ResourceOptions,
    sdk_version: String,
) -> EngineResult<RequestOptions> {
    let mut dependencies = Vec::with_capacity(options.depends_on.len());
    for dependency in &options.depends_on {
        dependency.ready.value().await?;
        dependencies.push(dependency.urn.to_string());
    }

    Ok(RequestOptions {
        version: Some(options.version.unwrap_or(sdk_version)),
        parent: options.parent.map(|p| p.to_string()),
        dependencies,
        aliases: options.aliases,
        protect: options.protect,
        delete_before_replace: options.delete_before_replace,
        retain_on_delete: options.retain_on_delete,
        ignore_changes: options.ignore_changes,
        replace_on_changes: options.replace_on_changes,
        provider: options.provider,
    })
}
