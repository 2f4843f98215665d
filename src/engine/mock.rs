//! Mock engine for testing.
//!
//! Captures every request and answers with canned responses, optionally
//! holding each answer until the test releases it so pending states can be
//! observed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::{Engine, ReadRequest, RegisterRequest, RegisterResponse};
use crate::error::{EngineError, EngineResult};
use crate::property::PropertyMap;

/// Captured call information for verification.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedRequest {
    Register(RegisterRequest),
    Read(ReadRequest),
}

impl CapturedRequest {
    pub fn type_token(&self) -> &str {
        match self {
            Self::Register(r) => &r.type_token,
            Self::Read(r) => &r.type_token,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Register(r) => &r.name,
            Self::Read(r) => &r.name,
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, Self::Read(_))
    }
}

/// Mock engine for testing.
///
/// Registrations echo their inputs as outputs with the id `<name>-id`.
/// Reads answer from the objects added with [`MockEngine::with_existing`].
#[derive(Clone, Default)]
pub struct MockEngine {
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
    existing: Arc<Mutex<HashMap<String, PropertyMap>>>,
    failures: Arc<Mutex<HashMap<String, EngineError>>>,
    gate: Option<Arc<Semaphore>>,
    answered: Arc<AtomicUsize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine that answers nothing until [`release`](Self::release) is called.
    pub fn held() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    /// Let `count` held requests through.
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    /// Stop holding requests.
    pub fn release_all(&self) {
        if let Some(gate) = &self.gate {
            gate.close();
        }
    }

    /// An object reads can find under `id`.
    pub fn with_existing(self, id: impl Into<String>, outputs: PropertyMap) -> Self {
        lock(&self.existing).insert(id.into(), outputs);
        self
    }

    /// Fail every request for the logical name `name`.
    pub fn fail(self, name: impl Into<String>, error: EngineError) -> Self {
        lock(&self.failures).insert(name.into(), error);
        self
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        lock(&self.captured).clone()
    }

    pub fn registrations(&self) -> Vec<RegisterRequest> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                CapturedRequest::Register(r) => Some(r),
                CapturedRequest::Read(_) => None,
            })
            .collect()
    }

    pub fn reads(&self) -> Vec<ReadRequest> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                CapturedRequest::Read(r) => Some(r),
                CapturedRequest::Register(_) => None,
            })
            .collect()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.captured).len()
    }

    /// Number of requests that have been answered.
    pub fn answered(&self) -> usize {
        self.answered.load(Ordering::SeqCst)
    }

    async fn pass_gate(&self) {
        if let Some(gate) = &self.gate {
            // A closed gate lets everything through.
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }

    fn canned_failure(&self, name: &str) -> Option<EngineError> {
        lock(&self.failures).get(name).cloned()
    }
}

#[async_trait]
impl Engine for MockEngine {
    async fn register_resource(&self, request: RegisterRequest) -> EngineResult<RegisterResponse> {
        lock(&self.captured).push(CapturedRequest::Register(request.clone()));
        self.pass_gate().await;
        self.answered.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.canned_failure(&request.name) {
            return Err(err);
        }
        Ok(RegisterResponse {
            id: format!("{}-id", request.name),
            urn: request.urn,
            outputs: request.inputs,
        })
    }

    async fn read_resource(&self, request: ReadRequest) -> EngineResult<RegisterResponse> {
        lock(&self.captured).push(CapturedRequest::Read(request.clone()));
        self.pass_gate().await;
        self.answered.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.canned_failure(&request.name) {
            return Err(err);
        }
        let outputs = lock(&self.existing).get(&request.id).cloned();
        match outputs {
            Some(outputs) => Ok(RegisterResponse {
                urn: request.urn,
                id: request.id,
                outputs,
            }),
            None => Err(EngineError::NotFound {
                type_token: request.type_token,
                id: request.id,
            }),
        }
    }
}
