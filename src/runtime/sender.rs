//! Result sender
//!
//! Iterates an [`AsyncCodeExecutor`] and pairs every produced value with a
//! [`Continuation`] the consumer may use to answer it:
//!
//! ```ignore
//! let mut sender = AsyncSender::new(executor);
//! while let Some(item) = sender.next().await {
//!     let (reply, result) = item?;
//!     reply.send(render(&result.value));
//! }
//! ```
//!
//! The continuation borrows the sender, so it cannot outlive the result it
//! belongs to and cannot be used twice.

use super::executor::{Advance, AsyncCodeExecutor, LAST_RESULT_NAME};
use super::{ExecError, ProducedResult};
use crate::executor::Val;
use crate::scope::Scope;

/// One-shot answer to a produced value
#[must_use = "dropping a continuation resumes the program with no value"]
pub struct Continuation<'a> {
    slot: &'a mut Option<Val>,
}

impl Continuation<'_> {
    /// Resume the program with `value`
    pub fn send(self, value: Val) {
        *self.slot = Some(value);
    }
}

/// Consumer-side driver of an executor
pub struct AsyncSender<'s> {
    executor: AsyncCodeExecutor<'s>,
    reply: Option<Val>,
    produced: Option<Val>,
    finished: bool,
    cancelled: bool,
}

impl<'s> AsyncSender<'s> {
    pub fn new(executor: AsyncCodeExecutor<'s>) -> Self {
        Self {
            executor,
            reply: None,
            produced: None,
            finished: false,
            cancelled: false,
        }
    }

    /// Next produced value, `None` once the run is over
    ///
    /// Before advancing, `_` is bound to the reply for the previous value,
    /// or to the previous value itself when nothing was sent. A null value
    /// with no reply leaves `_` as it was.
    pub async fn next(&mut self) -> Option<Result<(Continuation<'_>, ProducedResult), ExecError>> {
        let reply = self.reply.take();
        if let Some(produced) = self.produced.take() {
            match &reply {
                Some(sent) => self.executor.bind(LAST_RESULT_NAME, sent.clone()),
                None if !produced.is_null() => self.executor.bind(LAST_RESULT_NAME, produced),
                None => {}
            }
        }

        if self.finished {
            return None;
        }

        match self.executor.advance(reply).await {
            Advance::Yielded(result) => {
                self.produced = Some(result.value.clone());
                let continuation = Continuation {
                    slot: &mut self.reply,
                };
                Some(Ok((continuation, result)))
            }
            Advance::Completed(_) => {
                self.finished = true;
                None
            }
            Advance::Cancelled => {
                self.finished = true;
                self.cancelled = true;
                None
            }
            Advance::Failed(error) => {
                self.finished = true;
                Some(Err(error))
            }
        }
    }

    /// True if the run ended because its token fired
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn scope(&self) -> &Scope {
        self.executor.scope()
    }
}
