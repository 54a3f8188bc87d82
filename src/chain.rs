//! Sequential, short-circuiting step chains.
//!
//! A [`Chain`] owns an ordered list of steps executed left to right over a
//! single data value. Each step returns the next data value or the failure
//! that stops the run; no later step executes after the first failure. A
//! panic inside a step is caught and reported as that step's failure.
//!
//! Steps are appended with [`Chain::use_step`], or resolved by name through a
//! [`StepRegistry`] with [`Chain::use_group`]. Group resolution happens when
//! `use_group` is called, not when the chain executes: a misspelled step name
//! fails wiring at startup instead of the first request.
//!
//! A chain is reusable; `exec` leaves no residual state behind.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::DispatchError;

/// One step of a chain.
pub trait ChainStep: Send + Sync {
    fn run(&self, data: Value) -> Result<Value, DispatchError>;
}

impl<F> ChainStep for F
where
    F: Fn(Value) -> Result<Value, DispatchError> + Send + Sync,
{
    fn run(&self, data: Value) -> Result<Value, DispatchError> {
        self(data)
    }
}

/// Explicit name-to-step registry, populated once at startup and consulted
/// when chains are wired.
#[derive(Default)]
pub struct StepRegistry {
    steps: HashMap<String, Arc<dyn ChainStep>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, step: Arc<dyn ChainStep>) {
        self.steps.insert(name.into(), step);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ChainStep>> {
        self.steps.get(name).map(Arc::clone)
    }
}

/// Ordered list of steps with first-failure short-circuit.
#[derive(Clone, Default)]
pub struct Chain {
    steps: Vec<Arc<dyn ChainStep>>,
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("steps", &self.steps.len())
            .finish()
    }
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one step.
    pub fn use_step(&mut self, step: Arc<dyn ChainStep>) -> &mut Self {
        self.steps.push(step);
        self
    }

    /// Append every named step of a group, resolved through `registry` now.
    /// An unknown name fails here, before any `exec`.
    pub fn use_group<I, S>(
        &mut self,
        registry: &StepRegistry,
        names: I,
    ) -> Result<&mut Self, DispatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref();
            let step = registry.get(name).ok_or_else(|| {
                DispatchError::handler(
                    "unknown_chain_step",
                    Some(Value::String(name.to_string())),
                )
            })?;
            self.steps.push(step);
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run the chain over `data`. Resolves with the data produced by the
    /// last step, or with the first step failure; later steps never run
    /// after a failure.
    pub fn exec(&self, data: Value) -> Result<Value, DispatchError> {
        let mut data = data;
        for (index, step) in self.steps.iter().enumerate() {
            let current = data;
            match catch_unwind(AssertUnwindSafe(|| step.run(current))) {
                Ok(Ok(next)) => data = next,
                Ok(Err(err)) => {
                    debug!(step = index, error = %err, "chain step failed");
                    return Err(err);
                }
                Err(panic) => {
                    let message = format!("{panic:?}");
                    debug!(step = index, panic = %message, "chain step panicked");
                    return Err(DispatchError::handler(
                        "chain_step_panicked",
                        Some(Value::String(message)),
                    ));
                }
            }
        }
        Ok(data)
    }
}
