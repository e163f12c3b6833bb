//! Safety invariants.
//!
//! An invariant is a named predicate over the running system. Hosts plug
//! their own in by implementing [`SafetyInvariant`], or by wrapping a closure
//! in [`FnInvariant`] / [`AsyncFnInvariant`].

use std::future::Future;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

/// A pluggable safety predicate.
///
/// `check` returns `Ok(true)` when the invariant holds. `Ok(false)`, an
/// error, or a panic all count as a violation.
#[async_trait]
pub trait SafetyInvariant: Send + Sync {
    /// Unique identifier.
    fn id(&self) -> &str;

    /// Free-form grouping used in reports (e.g. "capacity").
    fn category(&self) -> &str;

    /// A failing critical invariant makes the whole check CRITICAL.
    fn is_critical(&self) -> bool;

    /// Evaluate the invariant.
    async fn check(&self) -> anyhow::Result<bool>;
}

type SyncCheck = dyn Fn() -> anyhow::Result<bool> + Send + Sync;
type AsyncCheck = dyn Fn() -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync;

/// Invariant backed by a synchronous closure.
pub struct FnInvariant {
    id: String,
    category: String,
    critical: bool,
    check: Box<SyncCheck>,
}

impl FnInvariant {
    /// A non-critical invariant.
    pub fn new<F>(id: impl Into<String>, category: impl Into<String>, check: F) -> Self
    where
        F: Fn() -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            category: category.into(),
            critical: false,
            check: Box::new(check),
        }
    }

    /// Mark the invariant critical.
    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }
}

#[async_trait]
impl SafetyInvariant for FnInvariant {
    fn id(&self) -> &str {
        &self.id
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    async fn check(&self) -> anyhow::Result<bool> {
        (self.check)()
    }
}

/// Invariant backed by an async closure.
pub struct AsyncFnInvariant {
    id: String,
    category: String,
    critical: bool,
    check: Box<AsyncCheck>,
}

impl AsyncFnInvariant {
    pub fn new<F, Fut>(id: impl Into<String>, category: impl Into<String>, check: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        Self {
            id: id.into(),
            category: category.into(),
            critical: false,
            check: Box::new(move || check().boxed()),
        }
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }
}

#[async_trait]
impl SafetyInvariant for AsyncFnInvariant {
    fn id(&self) -> &str {
        &self.id
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    async fn check(&self) -> anyhow::Result<bool> {
        (self.check)().await
    }
}
