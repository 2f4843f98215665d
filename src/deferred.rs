//! Deferred values
//!
//! A [`Deferred`] is a property whose value is only known once the engine has
//! finished talking to the provider. It is either pending, resolved, or
//! failed; derived values built with [`Deferred::map`], [`Deferred::and_then`]
//! or [`Deferred::zip`] inherit the failure of any parent.
//!
//! # Example
//!
//! ```
//! use sentry_iac::Deferred;
//!
//! # tokio_test::block_on(async {
//! let (slug, resolver) = Deferred::<String>::channel();
//! let upper = slug.map(|s| s.to_uppercase());
//! assert!(upper.is_pending());
//!
//! resolver.resolve("backend".to_string());
//! assert_eq!(upper.value().await.unwrap(), "BACKEND");
//! # });
//! ```

use crate::error::EngineError;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;

/// Snapshot of a deferred value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredState<T> {
    Pending,
    Resolved(T),
    Failed(EngineError),
}

impl<T> DeferredState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    fn into_result(self) -> Option<Result<T, EngineError>> {
        match self {
            Self::Pending => None,
            Self::Resolved(value) => Some(Ok(value)),
            Self::Failed(err) => Some(Err(err)),
        }
    }
}

impl<T> From<Result<T, EngineError>> for DeferredState<T> {
    fn from(result: Result<T, EngineError>) -> Self {
        match result {
            Ok(value) => Self::Resolved(value),
            Err(err) => Self::Failed(err),
        }
    }
}

/// Where a deferred value gets its state from.
trait Source<T>: Send + Sync {
    fn state(&self) -> DeferredState<T>;
    fn settled(self: Arc<Self>) -> BoxFuture<'static, Result<T, EngineError>>;
}

/// An eventually-known value.
pub struct Deferred<T> {
    source: Arc<dyn Source<T>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<T> fmt::Debug for Deferred<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Deferred").field(&self.state()).finish()
    }
}

impl<T> Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a pending value and the handle that settles it.
    pub fn channel() -> (Self, Resolver<T>) {
        let (tx, rx) = watch::channel(DeferredState::Pending);
        (
            Self {
                source: Arc::new(Cell { rx }),
            },
            Resolver { tx },
        )
    }

    /// A value that is already known.
    pub fn resolved(value: T) -> Self {
        let (deferred, resolver) = Self::channel();
        resolver.resolve(value);
        deferred
    }

    /// A value that will never be known.
    pub fn failed(err: EngineError) -> Self {
        let (deferred, resolver) = Self::channel();
        resolver.fail(err);
        deferred
    }

    pub fn state(&self) -> DeferredState<T> {
        self.source.state()
    }

    pub fn is_pending(&self) -> bool {
        self.state().is_pending()
    }

    /// The settled value, without waiting.
    pub fn try_get(&self) -> Option<Result<T, EngineError>> {
        self.state().into_result()
    }

    /// Wait until the value settles.
    ///
    /// Returns [`EngineError::Abandoned`] if whoever held the resolver went
    /// away without settling it; [`Deferred::state`] keeps reporting
    /// `Pending` in that case.
    pub async fn value(&self) -> Result<T, EngineError> {
        Arc::clone(&self.source).settled().await
    }

    /// Derive a value. `f` runs at most once, after the parent resolves.
    pub fn map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.try_map(move |value| Ok(f(value)))
    }

    /// Derive a value with a step that may itself fail.
    pub fn try_map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> Result<U, EngineError> + Send + Sync + 'static,
    {
        Deferred {
            source: Arc::new(Mapped {
                parent: self.clone(),
                f: Box::new(f),
                memo: OnceLock::new(),
            }),
        }
    }

    /// Chain into another deferred value built from this one.
    pub fn and_then<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> Deferred<U> + Send + Sync + 'static,
    {
        Deferred {
            source: Arc::new(Chained {
                parent: self.clone(),
                f: Box::new(f),
                child: OnceLock::new(),
            }),
        }
    }

    /// Combine two values; fails as soon as either side fails.
    pub fn zip<U>(&self, other: &Deferred<U>) -> Deferred<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        Deferred {
            source: Arc::new(Zipped {
                left: self.clone(),
                right: other.clone(),
            }),
        }
    }
}

/// Settles one [`Deferred`]. Consumed on use, so a value settles once.
pub struct Resolver<T> {
    tx: watch::Sender<DeferredState<T>>,
}

impl<T> Resolver<T> {
    pub fn resolve(self, value: T) {
        self.tx.send_replace(DeferredState::Resolved(value));
    }

    pub fn fail(self, err: EngineError) {
        self.tx.send_replace(DeferredState::Failed(err));
    }

    pub fn settle(self, result: Result<T, EngineError>) {
        self.tx.send_replace(result.into());
    }
}

struct Cell<T> {
    rx: watch::Receiver<DeferredState<T>>,
}

impl<T> Source<T> for Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn state(&self) -> DeferredState<T> {
        self.rx.borrow().clone()
    }

    fn settled(self: Arc<Self>) -> BoxFuture<'static, Result<T, EngineError>> {
        let mut rx = self.rx.clone();
        async move {
            loop {
                let current = rx.borrow_and_update().clone();
                if let Some(result) = current.into_result() {
                    return result;
                }
                if rx.changed().await.is_err() {
                    let last = rx.borrow().clone();
                    return last.into_result().unwrap_or(Err(EngineError::Abandoned));
                }
            }
        }
        .boxed()
    }
}

type MapFn<S, T> = Box<dyn Fn(S) -> Result<T, EngineError> + Send + Sync>;

struct Mapped<S, T> {
    parent: Deferred<S>,
    f: MapFn<S, T>,
    memo: OnceLock<Result<T, EngineError>>,
}

impl<S, T> Mapped<S, T> {
    fn settle(&self, parent: Result<S, EngineError>) -> Result<T, EngineError>
    where
        T: Clone,
    {
        self.memo
            .get_or_init(|| parent.and_then(|value| (self.f)(value)))
            .clone()
    }
}

impl<S, T> Source<T> for Mapped<S, T>
where
    S: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn state(&self) -> DeferredState<T> {
        if let Some(result) = self.memo.get() {
            return result.clone().into();
        }
        match self.parent.try_get() {
            None => DeferredState::Pending,
            Some(parent) => self.settle(parent).into(),
        }
    }

    fn settled(self: Arc<Self>) -> BoxFuture<'static, Result<T, EngineError>> {
        async move {
            if let Some(result) = self.memo.get() {
                return result.clone();
            }
            let parent = self.parent.value().await;
            self.settle(parent)
        }
        .boxed()
    }
}

type ChainFn<S, T> = Box<dyn Fn(S) -> Deferred<T> + Send + Sync>;

struct Chained<S, T> {
    parent: Deferred<S>,
    f: ChainFn<S, T>,
    child: OnceLock<Result<Deferred<T>, EngineError>>,
}

impl<S, T> Chained<S, T>
where
    T: Clone + Send + Sync + 'static,
{
    fn child(&self, parent: Result<S, EngineError>) -> Result<Deferred<T>, EngineError> {
        self.child
            .get_or_init(|| parent.map(|value| (self.f)(value)))
            .clone()
    }
}

impl<S, T> Source<T> for Chained<S, T>
where
    S: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn state(&self) -> DeferredState<T> {
        let child = match self.child.get() {
            Some(child) => child.clone(),
            None => match self.parent.try_get() {
                None => return DeferredState::Pending,
                Some(parent) => self.child(parent),
            },
        };
        match child {
            Ok(child) => child.state(),
            Err(err) => DeferredState::Failed(err),
        }
    }

    fn settled(self: Arc<Self>) -> BoxFuture<'static, Result<T, EngineError>> {
        async move {
            let child = match self.child.get() {
                Some(child) => child.clone(),
                None => {
                    let parent = self.parent.value().await;
                    self.child(parent)
                }
            };
            let child = child?;
            child.value().await
        }
        .boxed()
    }
}

struct Zipped<A, B> {
    left: Deferred<A>,
    right: Deferred<B>,
}

impl<A, B> Source<(A, B)> for Zipped<A, B>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn state(&self) -> DeferredState<(A, B)> {
        match (self.left.state(), self.right.state()) {
            (DeferredState::Failed(err), _) | (_, DeferredState::Failed(err)) => {
                DeferredState::Failed(err)
            }
            (DeferredState::Resolved(a), DeferredState::Resolved(b)) => {
                DeferredState::Resolved((a, b))
            }
            _ => DeferredState::Pending,
        }
    }

    fn settled(self: Arc<Self>) -> BoxFuture<'static, Result<(A, B), EngineError>> {
        async move { futures::future::try_join(self.left.value(), self.right.value()).await }
            .boxed()
    }
}

/// A property input: either known now or produced by another resource.
#[derive(Clone)]
pub enum Input<T> {
    Value(T),
    Deferred(Deferred<T>),
}

impl<T> Input<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn into_deferred(self) -> Deferred<T> {
        match self {
            Input::Value(value) => Deferred::resolved(value),
            Input::Deferred(deferred) => deferred,
        }
    }

    pub fn map<U, F>(self, f: F) -> Input<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        match self {
            Input::Value(value) => Input::Value(f(value)),
            Input::Deferred(deferred) => Input::Deferred(deferred.map(f)),
        }
    }

    pub async fn value(self) -> Result<T, EngineError> {
        match self {
            Input::Value(value) => Ok(value),
            Input::Deferred(deferred) => deferred.value().await,
        }
    }
}

impl<T> fmt::Debug for Input<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Input::Deferred(deferred) => fmt::Debug::fmt(deferred, f),
        }
    }
}

impl<T> From<Deferred<T>> for Input<T> {
    fn from(deferred: Deferred<T>) -> Self {
        Input::Deferred(deferred)
    }
}

impl From<&str> for Input<String> {
    fn from(value: &str) -> Self {
        Input::Value(value.to_string())
    }
}

impl From<String> for Input<String> {
    fn from(value: String) -> Self {
        Input::Value(value)
    }
}

impl From<&String> for Input<String> {
    fn from(value: &String) -> Self {
        Input::Value(value.clone())
    }
}
