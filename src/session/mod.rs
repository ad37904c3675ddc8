//! # Session - command-level glue
//!
//! A [`Session`] holds what outlives a single invocation: the retention
//! state, the task registry, the last produced result and the channels
//! with an open REPL. Its methods are the commands a presentation layer
//! exposes:
//!
//! - [`Session::python`]: run code and render each produced value
//! - [`Session::python_inspect`]: run code and render inspection reports
//! - [`Session::ast`]: show the compiled form of code
//! - [`Session::retain`]: query or toggle scope retention
//! - [`Session::repl`]: an interactive session fed by a [`MessageSource`]

pub mod codeblock;
pub mod context;
pub mod inspect;
pub mod render;

#[cfg(test)]
mod tests;

pub use codeblock::strip_code_fence;
pub use context::{InvocationContext, Mention, MentionKind};
pub use render::{IncomingMessage, MessageSource, Renderer};

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::compiler::{compile, CompileError, Substitutions};
use crate::config::{Config, ReplConfig};
use crate::executor::Val;
use crate::runtime::{AsyncCodeExecutor, AsyncSender, AwaitResolver, DefaultResolver, ExecError};
use crate::scope::{Bindings, Retention, Scope};
use crate::tasks::TaskRegistry;

/* ===================== Outcomes ===================== */

/// How a run that did not fail ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

/// Answer of [`Session::retain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetainStatus {
    On,
    Off,
    AlreadyOn,
    AlreadyOff,
    TurnedOn,
    TurnedOff,
}

impl fmt::Display for RetainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RetainStatus::On => "Variable retention is set to ON.",
            RetainStatus::Off => "Variable retention is set to OFF.",
            RetainStatus::AlreadyOn => "Variable retention is already set to ON.",
            RetainStatus::AlreadyOff => "Variable retention is already set to OFF.",
            RetainStatus::TurnedOn => {
                "Variable retention is ON. Future REPL sessions will retain their scope."
            }
            RetainStatus::TurnedOff => {
                "Variable retention is OFF. Future REPL sessions will dispose their scope when done."
            }
        };
        f.write_str(text)
    }
}

/// Why a REPL session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplExit {
    /// Another session already runs in the channel
    AlreadyRunning,
    /// The user typed `exit()` or `quit()`
    Exited,
    /// No input within the idle timeout
    TimedOut,
    /// The message source closed
    SourceClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenderMode {
    /// Skip null, render the value
    Value,
    /// Render an inspection report for every value
    Inspect,
}

/* ===================== Session ===================== */

/// Long-lived state behind the code execution commands
pub struct Session {
    config: ReplConfig,
    retention: Retention,
    registry: TaskRegistry,
    resolver: Arc<dyn AwaitResolver>,
    last_result: Option<Val>,
    repl_channels: Arc<Mutex<HashSet<u64>>>,
}

impl Session {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.repl.clone(),
            retention: Retention::new(config.repl.retain),
            registry: TaskRegistry::new(),
            resolver: Arc::new(DefaultResolver),
            last_result: None,
            repl_channels: Arc::default(),
        }
    }

    /// Share a registry with e.g. a Ctrl-C handler or a task list command
    pub fn with_registry(mut self, registry: TaskRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn AwaitResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// The most recent non-null result, bound to `_` in the next run
    pub fn last_result(&self) -> Option<&Val> {
        self.last_result.as_ref()
    }

    /// The retained Scope, if retention is on
    pub fn scope(&self) -> Option<&Scope> {
        self.retention.retained()
    }

    pub fn is_retaining(&self) -> bool {
        self.retention.is_enabled()
    }

    /// Run code, rendering every non-null produced value
    ///
    /// The renderer's answer to a value is sent back into the program.
    pub async fn python(
        &mut self,
        ctx: &InvocationContext,
        source: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<RunOutcome, ExecError> {
        self.run(ctx, source, Bindings::new(), renderer, RenderMode::Value)
            .await
    }

    /// Run code, rendering an inspection report for every produced value
    pub async fn python_inspect(
        &mut self,
        ctx: &InvocationContext,
        source: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<RunOutcome, ExecError> {
        self.run(ctx, source, Bindings::new(), renderer, RenderMode::Inspect)
            .await
    }

    /// Pretty JSON of the compiled form of `source`
    ///
    /// The VM runs the AST directly, so this is also the closest thing to a
    /// disassembly; there is no separate bytecode listing.
    pub fn ast(&self, source: &str) -> Result<String, CompileError> {
        let unit = compile(source, &Substitutions::new())?;
        Ok(serde_json::to_string_pretty(&unit.body)
            .unwrap_or_else(|e| format!("<unprintable: {}>", e)))
    }

    /// Report retention (`None`) or switch it on or off
    ///
    /// Switching on always starts from an empty Scope.
    pub fn retain(&mut self, toggle: Option<bool>) -> RetainStatus {
        let enabled = self.retention.is_enabled();
        match (toggle, enabled) {
            (None, true) => RetainStatus::On,
            (None, false) => RetainStatus::Off,
            (Some(true), true) => RetainStatus::AlreadyOn,
            (Some(false), false) => RetainStatus::AlreadyOff,
            (Some(true), false) => {
                self.retention.enable();
                RetainStatus::TurnedOn
            }
            (Some(false), true) => {
                self.retention.disable();
                RetainStatus::TurnedOff
            }
        }
    }

    /// Interactive session in the invocation's channel
    ///
    /// Reads messages from the invoking author until `exit()`/`quit()`,
    /// the idle timeout, or the end of `messages`. Each accepted message
    /// runs like [`Session::python`] with `message`/`msg` bound to it;
    /// failures are reported and the session goes on.
    pub async fn repl(
        &mut self,
        ctx: &InvocationContext,
        messages: &mut dyn MessageSource,
        renderer: &mut dyn Renderer,
    ) -> ReplExit {
        let Some(_claim) = ChannelClaim::acquire(&self.repl_channels, ctx.channel_id) else {
            renderer
                .render_text(
                    "Already running an interactive shell in this channel. Use `exit()` or `quit()` to exit.",
                )
                .await;
            return ReplExit::AlreadyRunning;
        };

        info!(channel = ctx.channel_id, author = %ctx.author, "repl session started");
        renderer.render_text(&banner()).await;

        let exit = self.repl_loop(ctx, messages, renderer).await;
        info!(channel = ctx.channel_id, ?exit, "repl session ended");
        exit
    }

    async fn repl_loop(
        &mut self,
        ctx: &InvocationContext,
        messages: &mut dyn MessageSource,
        renderer: &mut dyn Renderer,
    ) -> ReplExit {
        let idle = Duration::from_secs(self.config.idle_timeout_secs);

        loop {
            let next = tokio::time::timeout(idle, self.next_line(ctx, messages)).await;
            let (message, code) = match next {
                Err(_) => {
                    renderer.render_text("Exiting...").await;
                    return ReplExit::TimedOut;
                }
                Ok(None) => return ReplExit::SourceClosed,
                Ok(Some(line)) => line,
            };

            match code.as_str() {
                "exit()" | "quit()" => {
                    renderer.render_text("Exiting...").await;
                    return ReplExit::Exited;
                }
                "exit" | "quit" => {
                    renderer
                        .render_text(&format!("Use `{}()` to exit.", code))
                        .await;
                    continue;
                }
                _ => {}
            }

            let message_val = message.to_val();
            let mut extra = Bindings::new();
            extra.insert("message".to_string(), message_val.clone());
            extra.insert("msg".to_string(), message_val);

            match self
                .run(ctx, &code, extra, renderer, RenderMode::Value)
                .await
            {
                Ok(RunOutcome::Completed) => {}
                Ok(RunOutcome::Cancelled) => renderer.render_text("Cancelled.").await,
                Err(error) => renderer.render_text(&describe_error(&error)).await,
            }
        }
    }

    /// Next message from the session's author in its channel, as code
    async fn next_line(
        &self,
        ctx: &InvocationContext,
        messages: &mut dyn MessageSource,
    ) -> Option<(IncomingMessage, String)> {
        loop {
            let message = messages.next_message().await?;
            if message.author != ctx.author || message.channel_id != ctx.channel_id {
                continue;
            }

            let content = message.content.trim();
            let content = if self.config.require_prefix {
                match content.strip_prefix(self.config.line_prefix.as_str()) {
                    Some(rest) => rest,
                    None => continue,
                }
            } else {
                content
                    .strip_prefix(self.config.line_prefix.as_str())
                    .unwrap_or(content)
            };

            let code = strip_code_fence(content).to_string();
            return Some((message, code));
        }
    }

    /// One invocation: register, compile, execute, render
    async fn run(
        &mut self,
        ctx: &InvocationContext,
        source: &str,
        extra: Bindings,
        renderer: &mut dyn Renderer,
        mode: RenderMode,
    ) -> Result<RunOutcome, ExecError> {
        let Session {
            config,
            retention,
            registry,
            resolver,
            last_result,
            ..
        } = self;

        let task = registry.submit(ctx.describe());

        let (mention_bindings, substitutions) = ctx.mention_bindings();
        let mut bindings = ctx.bindings(&config.scope_prefix);
        bindings.extend(mention_bindings);
        bindings.insert(
            "_".to_string(),
            last_result.clone().unwrap_or(Val::Null),
        );
        bindings.extend(extra);

        let unit = compile(source, &substitutions)?;
        for warning in &unit.warnings {
            debug!(task = task.index(), %warning, "compiled with warning");
        }

        let mut lease = retention.lease();
        let executor = AsyncCodeExecutor::new(&unit, &mut lease, bindings, task.token())
            .with_resolver(Arc::clone(resolver))
            .with_yield_interval(config.yield_interval);
        let mut sender = AsyncSender::new(executor);

        while let Some(item) = sender.next().await {
            let (reply, result) = item?;

            match mode {
                RenderMode::Value => {
                    if result.value.is_null() {
                        continue;
                    }
                    *last_result = Some(result.value.clone());
                    if let Some(answer) = renderer.render(&result.value).await {
                        reply.send(answer);
                    }
                }
                RenderMode::Inspect => {
                    *last_result = Some(result.value.clone());
                    renderer.render_text(&inspect::report(&result.value)).await;
                }
            }
        }

        if sender.cancelled() {
            warn!(task = task.index(), "execution cancelled");
            Ok(RunOutcome::Cancelled)
        } else {
            Ok(RunOutcome::Completed)
        }
    }
}

/* ===================== Helpers ===================== */

/// Marks a channel as having an open REPL until dropped
struct ChannelClaim {
    channels: Arc<Mutex<HashSet<u64>>>,
    channel_id: u64,
}

impl ChannelClaim {
    fn acquire(channels: &Arc<Mutex<HashSet<u64>>>, channel_id: u64) -> Option<Self> {
        let inserted = channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel_id);
        inserted.then(|| Self {
            channels: Arc::clone(channels),
            channel_id,
        })
    }
}

impl Drop for ChannelClaim {
    fn drop(&mut self) {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.channel_id);
    }
}

fn banner() -> String {
    format!(
        "Flow {} on {}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

/// One-line description of a failed run for the user
pub fn describe_error(error: &ExecError) -> String {
    match error {
        ExecError::Compile(CompileError::Syntax { original, .. }) => match original.span() {
            Some(span) => format!("Syntax error at {}: {}", span, original.message()),
            None => format!("Syntax error: {}", original.message()),
        },
        ExecError::Compile(e @ CompileError::Invalid(_)) => {
            let text = e.to_string();
            let detail = text.strip_prefix("syntax error: ").unwrap_or(&text);
            format!("Syntax error: {}", detail)
        }
        ExecError::Runtime(e) => e.to_string(),
    }
}
