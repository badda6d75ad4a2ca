//! The runner capability and its generic combinators.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::context::RunnerContext;
use crate::error::{Result, RunnerError};

/// A unit of work.
///
/// Anything that can be run against a [`RunnerContext`] qualifies. Runners
/// carry no shared base state; composition happens by wrapping.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, ctx: &RunnerContext) -> Result<()>;
}

/// A type-erased runner.
pub type BoxedRunner = Box<dyn Runner>;

#[async_trait]
impl<R: Runner + ?Sized> Runner for Box<R> {
    async fn run(&self, ctx: &RunnerContext) -> Result<()> {
        (**self).run(ctx).await
    }
}

#[async_trait]
impl<R: Runner + ?Sized> Runner for Arc<R> {
    async fn run(&self, ctx: &RunnerContext) -> Result<()> {
        (**self).run(ctx).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Closure runners
// ─────────────────────────────────────────────────────────────────────────────

/// A runner backed by a closure. See [`runner_fn`].
pub struct FnRunner<F> {
    f: F,
}

/// Wrap a closure as a [`Runner`].
///
/// The closure captures whatever per-call configuration it needs at
/// construction time and is invoked once per `run`.
///
/// ```
/// use sortie_runner::{runner_fn, Runner};
///
/// let greeting = "hello".to_string();
/// let runner = runner_fn(move |_ctx| {
///     let greeting = greeting.clone();
///     Box::pin(async move {
///         tracing::info!(%greeting, "running");
///         Ok(())
///     })
/// });
/// # let _ = runner;
/// ```
pub fn runner_fn<F>(f: F) -> FnRunner<F>
where
    F: for<'a> Fn(&'a RunnerContext) -> BoxFuture<'a, Result<()>> + Send + Sync,
{
    FnRunner { f }
}

#[async_trait]
impl<F> Runner for FnRunner<F>
where
    F: for<'a> Fn(&'a RunnerContext) -> BoxFuture<'a, Result<()>> + Send + Sync,
{
    async fn run(&self, ctx: &RunnerContext) -> Result<()> {
        (self.f)(ctx).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sequence
// ─────────────────────────────────────────────────────────────────────────────

/// Runs child runners one after another, stopping at the first failure.
///
/// Cancellation is checked before each child starts.
pub struct Sequence {
    name: String,
    runners: Vec<BoxedRunner>,
}

impl Sequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            runners: Vec::new(),
        }
    }

    /// Append a runner.
    pub fn then(mut self, runner: impl Runner + 'static) -> Self {
        self.runners.push(Box::new(runner));
        self
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }
}

#[async_trait]
impl Runner for Sequence {
    async fn run(&self, ctx: &RunnerContext) -> Result<()> {
        for (index, runner) in self.runners.iter().enumerate() {
            if ctx.is_cancelled() {
                tracing::info!(sequence = %self.name, index, "Sequence cancelled");
                return Err(RunnerError::Cancelled {
                    step: self.name.clone(),
                });
            }
            tracing::debug!(sequence = %self.name, index, "Running sequence member");
            runner.run(ctx).await?;
        }
        Ok(())
    }
}
