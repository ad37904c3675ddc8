//! Awaitable resolution
//!
//! Flow code suspends on `await sleep(..)` or `await host(..)`; the executor
//! hands the awaitable to an [`AwaitResolver`] and resumes the program with
//! what it returns.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::executor::errors::{self, error_val};
use crate::executor::{Awaitable, Val};

/// Resolves the awaitables a program suspends on
///
/// `Ok` resumes the program with the value; `Err` throws the value from the
/// paused `await`, where a `try` can catch it.
#[async_trait]
pub trait AwaitResolver: Send + Sync {
    async fn resolve(&self, awaitable: &Awaitable) -> Result<Val, Val>;
}

/// Handles `sleep` and rejects every host call
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResolver;

#[async_trait]
impl AwaitResolver for DefaultResolver {
    async fn resolve(&self, awaitable: &Awaitable) -> Result<Val, Val> {
        match awaitable {
            Awaitable::Sleep { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(Val::Null)
            }
            Awaitable::Host { name, .. } => {
                debug!(host = %name, "no resolver for host call");
                Err(error_val(
                    errors::HOST_ERROR,
                    format!("No host function named '{}'", name),
                ))
            }
        }
    }
}
