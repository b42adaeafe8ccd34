//! Action bodies and the values passed in and out of them.

use std::{any::Any, future::Future, thread};

use actionflow_types::{ParamValue, Update};
use anyhow::{anyhow, bail};
use futures_util::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use tokio::{
    runtime::{Builder, Handle, RuntimeFlavor},
    task,
};

use crate::error::{EngineError, Result};

type BlockingFn = dyn Fn(&Inputs) -> anyhow::Result<Outputs> + Send + Sync;
type SuspendableFn = dyn Fn(Inputs) -> BoxFuture<'static, anyhow::Result<Outputs>> + Send + Sync;

/// The unit of domain logic wrapped by an action.
pub(crate) enum ActionBody {
    Blocking(Box<BlockingFn>),
    Suspendable(Box<SuspendableFn>),
}

impl ActionBody {
    pub(crate) fn blocking<F>(body: F) -> Self
    where
        F: Fn(&Inputs) -> anyhow::Result<Outputs> + Send + Sync + 'static,
    {
        Self::Blocking(Box::new(body))
    }

    pub(crate) fn suspendable<F, Fut>(body: F) -> Self
    where
        F: Fn(Inputs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Outputs>> + Send + 'static,
    {
        Self::Suspendable(Box::new(move |inputs| body(inputs).boxed()))
    }

    /// Run the body to completion. The outer result reports runtime faults,
    /// the inner one the body's own outcome.
    pub(crate) fn call(&self, inputs: Inputs) -> Result<anyhow::Result<Outputs>> {
        match self {
            Self::Blocking(body) => Ok(body(&inputs)),
            Self::Suspendable(body) => block_on_body(body(inputs)),
        }
    }
}

/// Drive a suspendable body from the synchronous run loop.
///
/// Reuses a multi-threaded runtime when called from one. Inside a
/// current-thread runtime the future runs on a helper thread with its own
/// runtime, since that runtime cannot be blocked on re-entrantly.
fn block_on_body(future: BoxFuture<'static, anyhow::Result<Outputs>>) -> Result<anyhow::Result<Outputs>> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => Ok(task::block_in_place(|| handle.block_on(future))),
        Ok(_) => thread::scope(|scope| {
            scope
                .spawn(|| block_on_fresh_runtime(future))
                .join()
                .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
        }),
        Err(_) => block_on_fresh_runtime(future),
    }
}

fn block_on_fresh_runtime(future: BoxFuture<'static, anyhow::Result<Outputs>>) -> Result<anyhow::Result<Outputs>> {
    let runtime = Builder::new_current_thread().enable_all().build().map_err(EngineError::Runtime)?;
    Ok(runtime.block_on(future))
}

/// Snapshot of the values an action declared as inputs.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    values: IndexMap<String, ParamValue>,
}

impl Inputs {
    pub(crate) fn new(values: IndexMap<String, ParamValue>) -> Self {
        Self { values }
    }

    /// Borrow input `name` as a `T`.
    ///
    /// # Errors
    ///
    /// Fails when the input was not declared or holds another type.
    pub fn get<T: Any>(&self, name: &str) -> anyhow::Result<&T> {
        let Some(value) = self.values.get(name) else {
            bail!("input '{name}' is not available");
        };
        value
            .downcast_ref::<T>()
            .ok_or_else(|| anyhow!("input '{name}' holds a {}, not the requested type", value.type_tag()))
    }

    pub fn value(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What a body produced, one entry per declared output, in declaration order.
///
/// Entries added with a name are checked against the declaration at the same
/// position; entries added without one are matched purely by position. An
/// empty `Outputs` leaves every declared slot unchanged.
#[derive(Debug, Clone, Default)]
pub struct Outputs {
    entries: Vec<(Option<String>, Update)>,
}

impl Outputs {
    /// Nothing produced.
    pub fn none() -> Self {
        Self::default()
    }

    /// A single positional value, for actions with one output.
    pub fn one<T: Any + Send + Sync>(value: T) -> Self {
        Self::none().push(Update::set(value))
    }

    /// Append a positional update.
    pub fn push(mut self, update: impl Into<Update>) -> Self {
        self.entries.push((None, update.into()));
        self
    }

    /// Append a named value.
    pub fn set<T: Any + Send + Sync>(self, name: impl Into<String>, value: T) -> Self {
        self.update(name, Update::set(value))
    }

    /// Append a named removal.
    pub fn remove(self, name: impl Into<String>) -> Self {
        self.update(name, Update::Removed)
    }

    /// Append a named slot left as it is.
    pub fn unchanged(self, name: impl Into<String>) -> Self {
        self.update(name, Update::Unchanged)
    }

    pub fn update(mut self, name: impl Into<String>, update: Update) -> Self {
        self.entries.push((Some(name.into()), update));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(Option<String>, Update)> {
        self.entries
    }
}
