//! Fixture composition: named, lazily-resolved, test-scoped values
//!
//! A [`FixtureRegistry`] is built once per run and never mutated afterwards.
//! Each test gets its own [`FixtureScope`] holding one memo slot per fixture,
//! so nothing resolved for one test is visible to another.
//!
//! ```text
//! unrequested ─► resolving ─► ready ─► tearing-down ─► disposed
//!                    │                                   ▲
//!                    └──────────── (setup failed) ───────┘
//! ```
//!
//! Providers may only depend on providers registered before them, which keeps
//! the graph acyclic by construction. A provider's setup receives a scope that
//! only resolves the dependencies it declared.

pub mod api;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{HarnessError, HarnessResult};

pub use api::{api_fixtures, keys};

type FixtureValue = Arc<dyn Any + Send + Sync>;
type SetupFn = Arc<dyn Fn(FixtureScope) -> BoxFuture<'static, HarnessResult<FixtureValue>> + Send + Sync>;
type TeardownFn = Arc<dyn Fn(FixtureValue) -> BoxFuture<'static, HarnessResult<()>> + Send + Sync>;

/// Typed handle naming one fixture
pub struct FixtureKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> FixtureKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for FixtureKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FixtureKey<T> {}

impl<T> std::fmt::Debug for FixtureKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FixtureKey({})", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    Unrequested,
    Resolving,
    Ready,
    TearingDown,
    Disposed,
}

struct Provider {
    deps: Arc<[&'static str]>,
    setup: SetupFn,
    teardown: Option<TeardownFn>,
}

/// Upper bound on a single fixture's teardown
pub const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// The fixture graph: one provider per name
pub struct FixtureRegistry {
    providers: HashMap<&'static str, Provider>,
    order: Vec<&'static str>,
    teardown_timeout: Duration,
}

impl Default for FixtureRegistry {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            order: Vec::new(),
            teardown_timeout: TEARDOWN_TIMEOUT,
        }
    }
}

impl FixtureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout = timeout;
        self
    }

    /// Register a fixture with no teardown
    pub fn provide<T, F, Fut>(
        &mut self,
        key: FixtureKey<T>,
        deps: &[&'static str],
        setup: F,
    ) -> HarnessResult<&mut Self>
    where
        T: Send + Sync + 'static,
        F: Fn(FixtureScope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HarnessResult<T>> + Send + 'static,
    {
        self.insert(key, deps, setup, None)
    }

    /// Register a fixture whose value is released by `teardown` after the test
    pub fn provide_with_teardown<T, F, Fut, D, DFut>(
        &mut self,
        key: FixtureKey<T>,
        deps: &[&'static str],
        setup: F,
        teardown: D,
    ) -> HarnessResult<&mut Self>
    where
        T: Send + Sync + 'static,
        F: Fn(FixtureScope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HarnessResult<T>> + Send + 'static,
        D: Fn(Arc<T>) -> DFut + Send + Sync + 'static,
        DFut: Future<Output = HarnessResult<()>> + Send + 'static,
    {
        let name = key.name;
        let teardown: TeardownFn = Arc::new(move |value: FixtureValue| match value.downcast::<T>() {
            Ok(typed) => teardown(typed).boxed(),
            Err(_) => futures::future::ready(Err(type_mismatch(name))).boxed(),
        });
        self.insert(key, deps, setup, Some(teardown))
    }

    fn insert<T, F, Fut>(
        &mut self,
        key: FixtureKey<T>,
        deps: &[&'static str],
        setup: F,
        teardown: Option<TeardownFn>,
    ) -> HarnessResult<&mut Self>
    where
        T: Send + Sync + 'static,
        F: Fn(FixtureScope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HarnessResult<T>> + Send + 'static,
    {
        let name = key.name;
        if self.providers.contains_key(name) {
            return Err(fixture_error(name, "already registered"));
        }
        if let Some(missing) = deps.iter().find(|d| !self.providers.contains_key(*d)) {
            return Err(fixture_error(
                name,
                format!("depends on '{}' which is not registered before it", missing),
            ));
        }

        let setup: SetupFn = Arc::new(move |scope| {
            setup(scope)
                .map(|result| result.map(|value| Arc::new(value) as FixtureValue))
                .boxed()
        });
        self.providers.insert(
            name,
            Provider {
                deps: deps.to_vec().into(),
                setup,
                teardown,
            },
        );
        self.order.push(name);
        Ok(self)
    }

    /// Fixture names in registration order
    pub fn names(&self) -> &[&'static str] {
        &self.order
    }

    pub fn dependencies(&self, name: &str) -> Option<&[&'static str]> {
        self.providers.get(name).map(|p| &p.deps[..])
    }

    /// Open a fresh scope for one test execution
    pub fn scope(self: &Arc<Self>, test_name: impl Into<String>) -> FixtureScope {
        FixtureScope::new(self.clone(), test_name.into())
    }

    /// Run `body` inside a fresh scope and tear the scope down on every exit
    /// path: success, error, panic, timeout and cancellation.
    pub async fn run_scoped<F, Fut, R>(
        self: &Arc<Self>,
        test_name: &str,
        limits: ScopeLimits,
        body: F,
    ) -> ScopedOutcome<R>
    where
        F: FnOnce(FixtureScope) -> Fut,
        Fut: Future<Output = HarnessResult<R>>,
    {
        let scope = self.scope(test_name);
        let guarded = AssertUnwindSafe(body(scope.clone()))
            .catch_unwind()
            .map(|outcome| outcome.unwrap_or_else(|panic| Err(HarnessError::Assertion(panic_message(panic)))));
        let cancel = limits.cancel.unwrap_or_else(CancellationToken::new);
        let deadline = async {
            match limits.timeout {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending::<()>().await,
            }
        };

        let result = tokio::select! {
            result = guarded => result,
            _ = deadline => Err(HarnessError::Timeout {
                operation: format!("test '{}'", test_name),
                after: limits.timeout.unwrap_or_default(),
            }),
            _ = cancel.cancelled() => Err(HarnessError::Cancelled(format!(
                "test '{}' cancelled before completion",
                test_name
            ))),
        };

        let resolved = scope.resolved();
        let teardown_errors = scope.teardown().await;
        ScopedOutcome {
            result,
            teardown_errors,
            resolved,
        }
    }
}

/// Limits applied to a scoped test body
#[derive(Debug, Clone, Default)]
pub struct ScopeLimits {
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

/// What happened inside [`FixtureRegistry::run_scoped`]
#[derive(Debug)]
pub struct ScopedOutcome<R> {
    pub result: HarnessResult<R>,
    /// Teardown failures; logged, never folded into `result`
    pub teardown_errors: Vec<HarnessError>,
    /// Fixtures resolved during the test, in construction order
    pub resolved: Vec<&'static str>,
}

struct ScopeInner {
    test_name: String,
    registry: Arc<FixtureRegistry>,
    cells: HashMap<&'static str, OnceCell<FixtureValue>>,
    states: Mutex<HashMap<&'static str, FixtureState>>,
    constructed: Mutex<Vec<(&'static str, FixtureValue)>>,
    closed: AtomicBool,
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        let pending = self.constructed.get_mut().len();
        if !*self.closed.get_mut() && pending > 0 {
            warn!(test = %self.test_name, pending, "fixture scope dropped without teardown");
        }
    }
}

/// One test's view of the fixture graph
#[derive(Clone)]
pub struct FixtureScope {
    inner: Arc<ScopeInner>,
    /// Set for the scope handed to a provider: its name and declared deps
    requester: Option<(&'static str, Arc<[&'static str]>)>,
}

impl FixtureScope {
    fn new(registry: Arc<FixtureRegistry>, test_name: String) -> Self {
        let cells = registry
            .order
            .iter()
            .map(|name| (*name, OnceCell::new()))
            .collect();
        Self {
            inner: Arc::new(ScopeInner {
                test_name,
                registry,
                cells,
                states: Mutex::new(HashMap::new()),
                constructed: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
            requester: None,
        }
    }

    pub fn test_name(&self) -> &str {
        &self.inner.test_name
    }

    /// Resolve `key`, running its provider at most once for this scope
    pub async fn get<T: Send + Sync + 'static>(&self, key: &FixtureKey<T>) -> HarnessResult<Arc<T>> {
        let value = self.resolve(key.name).await?;
        value.downcast::<T>().map_err(|_| type_mismatch(key.name))
    }

    pub fn state(&self, name: &str) -> FixtureState {
        self.inner
            .states
            .lock()
            .get(name)
            .copied()
            .unwrap_or(FixtureState::Unrequested)
    }

    /// Fixtures that reached `ready`, in construction order
    pub fn resolved(&self) -> Vec<&'static str> {
        self.inner.constructed.lock().iter().map(|(name, _)| *name).collect()
    }

    fn set_state(&self, name: &'static str, state: FixtureState) {
        self.inner.states.lock().insert(name, state);
    }

    async fn resolve(&self, name: &'static str) -> HarnessResult<FixtureValue> {
        if let Some((requester, deps)) = &self.requester {
            if !deps.contains(&name) {
                return Err(fixture_error(
                    name,
                    format!("not declared as a dependency of '{}'", requester),
                ));
            }
        }
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(fixture_error(name, "scope already torn down"));
        }

        let registry = self.inner.registry.clone();
        let provider = registry
            .providers
            .get(name)
            .ok_or_else(|| fixture_error(name, "no such fixture"))?;
        let cell = self
            .inner
            .cells
            .get(name)
            .ok_or_else(|| fixture_error(name, "no such fixture"))?;

        let value = cell
            .get_or_try_init(|| async {
                if self.state(name) == FixtureState::Disposed {
                    return Err(fixture_error(name, "setup already failed in this test"));
                }
                self.set_state(name, FixtureState::Resolving);
                debug!(test = %self.inner.test_name, fixture = name, "resolving fixture");

                let restricted = FixtureScope {
                    inner: self.inner.clone(),
                    requester: Some((name, provider.deps.clone())),
                };
                match (provider.setup)(restricted).await {
                    Ok(value) => {
                        self.inner.constructed.lock().push((name, value.clone()));
                        self.set_state(name, FixtureState::Ready);
                        Ok(value)
                    }
                    Err(e) => {
                        self.set_state(name, FixtureState::Disposed);
                        warn!(test = %self.inner.test_name, fixture = name, error = %e, "fixture setup failed");
                        Err(e)
                    }
                }
            })
            .await?;

        Ok(value.clone())
    }

    /// Tear down every resolved fixture in reverse construction order.
    ///
    /// All teardowns run even when earlier ones fail. Calling this twice is a no-op.
    pub async fn teardown(&self) -> Vec<HarnessError> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Vec::new();
        }

        let constructed = std::mem::take(&mut *self.inner.constructed.lock());
        let mut errors = Vec::new();

        for (name, value) in constructed.into_iter().rev() {
            self.set_state(name, FixtureState::TearingDown);
            let teardown = self
                .inner
                .registry
                .providers
                .get(name)
                .and_then(|p| p.teardown.clone());
            if let Some(teardown) = teardown {
                if let Err(e) = self.release(name, teardown, value).await {
                    warn!(test = %self.inner.test_name, fixture = name, error = %e, "fixture teardown failed");
                    errors.push(e);
                }
            }
            self.set_state(name, FixtureState::Disposed);
            debug!(test = %self.inner.test_name, fixture = name, "fixture disposed");
        }

        errors
    }

    /// One teardown, with panics and overruns reported as disposal errors
    async fn release(&self, name: &'static str, teardown: TeardownFn, value: FixtureValue) -> HarnessResult<()> {
        let limit = self.inner.registry.teardown_timeout;
        let guarded = AssertUnwindSafe(async move { teardown(value).await }).catch_unwind();
        match tokio::time::timeout(limit, guarded).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(HarnessError::Disposal(format!(
                "teardown of '{}' {}",
                name,
                panic_message(panic)
            ))),
            Err(_) => Err(HarnessError::Disposal(format!(
                "teardown of '{}' did not finish within {:?}",
                name, limit
            ))),
        }
    }
}

fn fixture_error(name: &str, reason: impl Into<String>) -> HarnessError {
    HarnessError::Fixture {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn type_mismatch(name: &str) -> HarnessError {
    fixture_error(name, "requested with a different value type than it provides")
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
