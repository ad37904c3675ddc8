//! Async code executor
//!
//! Drives one compiled unit against a borrowed Scope. Each call to
//! [`AsyncCodeExecutor::advance`] runs the VM to its next produced value,
//! resolving any awaitables in between, and reports how the run stands.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::awaitable::{AwaitResolver, DefaultResolver};
use super::{ExecError, ProducedResult, RuntimeError};
use crate::compiler::CompiledUnit;
use crate::executor::{step, Control, Step, Val, VM};
use crate::scope::{Bindings, Scope, ScopeGuard};

/// VM steps between two courtesy yields to the tokio scheduler
pub const DEFAULT_YIELD_INTERVAL: u64 = 1024;

/// Reserved name bound to the latest result
pub const LAST_RESULT_NAME: &str = "_";

/// Outcome of one `advance`
#[derive(Debug, Clone)]
pub enum Advance {
    /// The program produced a value and waits for the next `advance`
    Yielded(ProducedResult),
    /// The program is done; carries the final result the first time
    Completed(Option<Val>),
    /// The cancellation token fired
    Cancelled,
    /// The program threw and nothing caught it
    Failed(ExecError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing has run yet
    Ready,
    /// Stopped at a produced value
    Paused,
    /// Finished, failed or cancelled; every further advance completes empty
    Exhausted,
}

/// Runs a compiled unit step by step on tokio
pub struct AsyncCodeExecutor<'s> {
    vm: VM,
    scope: ScopeGuard<'s>,
    token: CancellationToken,
    resolver: Arc<dyn AwaitResolver>,
    yield_interval: u64,
    steps_since_yield: u64,
    state: State,
    final_value: Option<Val>,
}

impl<'s> AsyncCodeExecutor<'s> {
    /// Inject `bindings` into `scope` and prepare the unit for execution
    ///
    /// The bindings, and the reserved `_`, are removed from the Scope again
    /// when the executor is dropped.
    pub fn new(
        unit: &CompiledUnit,
        scope: &'s mut Scope,
        bindings: Bindings,
        token: CancellationToken,
    ) -> Self {
        let mut scope = ScopeGuard::new(scope, bindings);
        scope.track(LAST_RESULT_NAME);

        Self {
            vm: VM::new(unit.to_program()),
            scope,
            token,
            resolver: Arc::new(DefaultResolver),
            yield_interval: DEFAULT_YIELD_INTERVAL,
            steps_since_yield: 0,
            state: State::Ready,
            final_value: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn AwaitResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// A zero interval is treated as 1
    pub fn with_yield_interval(mut self, interval: u64) -> Self {
        self.yield_interval = interval.max(1);
        self
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Write a binding into the Scope the program runs against
    pub fn bind(&mut self, name: impl Into<String>, value: Val) {
        self.scope.set(name, value);
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == State::Exhausted
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Run to the next produced value
    ///
    /// `send` answers the previously produced value; it is ignored on the
    /// first call and after a final result.
    pub async fn advance(&mut self, send: Option<Val>) -> Advance {
        match self.state {
            State::Exhausted => return Advance::Completed(self.final_value.take()),
            State::Paused => {
                self.vm.resume(send);
            }
            State::Ready => {}
        }

        loop {
            if self.token.is_cancelled() {
                return self.cancel();
            }
            if !self.run_until_paused().await {
                return self.cancel();
            }

            match &self.vm.control {
                Control::Suspend(awaitable) => {
                    let awaitable = awaitable.clone();
                    let resolved = tokio::select! {
                        biased;
                        _ = self.token.cancelled() => None,
                        resolved = self.resolver.resolve(&awaitable) => Some(resolved),
                    };
                    match resolved {
                        None => return self.cancel(),
                        Some(Ok(value)) => {
                            self.vm.resume(Some(value));
                        }
                        Some(Err(error)) => {
                            self.vm.throw_into(error);
                        }
                    }
                }

                Control::Yield { value, last } => {
                    let result = if *last {
                        self.final_value = Some(value.clone());
                        ProducedResult::final_value(value.clone())
                    } else {
                        ProducedResult::intermediate(value.clone())
                    };
                    self.state = State::Paused;
                    return Advance::Yielded(result);
                }

                Control::Return(value) => {
                    let value = value.clone();
                    self.final_value = Some(value.clone());
                    self.state = State::Exhausted;
                    return Advance::Yielded(ProducedResult::final_value(value));
                }

                Control::Throw(value) => {
                    let error = RuntimeError {
                        value: value.clone(),
                        span: self.vm.throw_span,
                    };
                    debug!(error = %error, "program threw");
                    self.state = State::Exhausted;
                    self.final_value = None;
                    return Advance::Failed(ExecError::Runtime(error));
                }

                Control::None | Control::Break | Control::Continue => {
                    self.state = State::Exhausted;
                    return Advance::Completed(self.final_value.take());
                }
            }
        }
    }

    /// Step the VM until it pauses or finishes
    ///
    /// Returns false if cancellation was noticed at a courtesy yield.
    async fn run_until_paused(&mut self) -> bool {
        loop {
            match step(&mut self.vm, &mut self.scope) {
                Step::Done => return true,
                Step::Continue => {
                    self.steps_since_yield += 1;
                    if self.steps_since_yield >= self.yield_interval {
                        self.steps_since_yield = 0;
                        tokio::task::yield_now().await;
                        if self.token.is_cancelled() {
                            return false;
                        }
                    }
                }
            }
        }
    }

    fn cancel(&mut self) -> Advance {
        debug!(steps = self.vm.steps, "execution cancelled");
        self.state = State::Exhausted;
        self.final_value = None;
        Advance::Cancelled
    }
}
