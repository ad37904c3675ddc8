//! Session tests with in-memory renderer and message source

use super::*;
use crate::config::Config;
use crate::executor::errors;
use async_trait::async_trait;
use std::collections::VecDeque;

/// Records everything shown; answers values from a script
#[derive(Default)]
struct RecordingRenderer {
    values: Vec<Val>,
    texts: Vec<String>,
    replies: VecDeque<Option<Val>>,
}

impl RecordingRenderer {
    fn replying(replies: Vec<Option<Val>>) -> Self {
        Self {
            replies: replies.into(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Renderer for RecordingRenderer {
    async fn render(&mut self, value: &Val) -> Option<Val> {
        self.values.push(value.clone());
        self.replies.pop_front().flatten()
    }

    async fn render_text(&mut self, text: &str) {
        self.texts.push(text.to_string());
    }
}

/// Hands out queued messages, then either closes or hangs
struct ScriptedSource {
    messages: VecDeque<IncomingMessage>,
    hang_when_empty: bool,
}

impl ScriptedSource {
    fn new(messages: Vec<IncomingMessage>) -> Self {
        Self {
            messages: messages.into(),
            hang_when_empty: false,
        }
    }

    fn lines(lines: &[&str]) -> Self {
        Self::new(lines.iter().map(|l| IncomingMessage::new("ana", 42, *l)).collect())
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn next_message(&mut self) -> Option<IncomingMessage> {
        match self.messages.pop_front() {
            Some(message) => Some(message),
            None if self.hang_when_empty => std::future::pending().await,
            None => None,
        }
    }
}

fn context() -> InvocationContext {
    InvocationContext::new("ana", "general", 42).with_message("jsk py")
}

fn session() -> Session {
    Session::new(&Config::default())
}

/* ===================== python ===================== */

#[tokio::test]
async fn test_python_renders_non_null_values() {
    let mut session = session();
    let mut renderer = RecordingRenderer::default();

    let outcome = session
        .python(&context(), "1\nnull\n'two'", &mut renderer)
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(renderer.values, vec![Val::Num(1.0), Val::from("two")]);
    assert_eq!(session.last_result(), Some(&Val::from("two")));
    assert!(session.registry().is_empty());
}

#[tokio::test]
async fn test_context_bindings_visible() {
    let mut session = session();
    let mut renderer = RecordingRenderer::default();

    session
        .python(&context(), "_author + ' in ' + _channel", &mut renderer)
        .await
        .unwrap();

    assert_eq!(renderer.values, vec![Val::from("ana in general")]);
    // Injected names do not leak into the retained scope
    assert!(!session.scope().unwrap().contains("_author"));
}

#[tokio::test]
async fn test_retained_scope_and_last_result() {
    let mut session = session();
    let mut renderer = RecordingRenderer::default();

    session.python(&context(), "x = 20\n21", &mut renderer).await.unwrap();
    session.python(&context(), "_ * 2", &mut renderer).await.unwrap();
    session.python(&context(), "x + 1", &mut renderer).await.unwrap();

    assert_eq!(
        renderer.values,
        vec![Val::Num(21.0), Val::Num(42.0), Val::Num(21.0)]
    );
}

#[tokio::test]
async fn test_without_retention_scope_is_discarded() {
    let mut config = Config::default();
    config.repl.retain = false;
    let mut session = Session::new(&config);
    let mut renderer = RecordingRenderer::default();

    session.python(&context(), "x = 1", &mut renderer).await.unwrap();
    let error = session
        .python(&context(), "x", &mut renderer)
        .await
        .expect_err("x should be gone");

    assert!(matches!(error.thrown(), Some(Val::Error(info)) if info.code == errors::REFERENCE_ERROR));
    assert!(session.scope().is_none());
}

#[tokio::test]
async fn test_renderer_reply_resumes_program() {
    let mut session = session();
    let mut renderer = RecordingRenderer::replying(vec![Some(Val::Num(10.0))]);

    session
        .python(&context(), "let a = yield 'question'\na + 1", &mut renderer)
        .await
        .unwrap();

    assert_eq!(renderer.values, vec![Val::from("question"), Val::Num(11.0)]);
}

#[tokio::test]
async fn test_mentions_are_substituted() {
    let mut session = session();
    let mut renderer = RecordingRenderer::default();
    let ctx = context().with_mention(Mention::new(MentionKind::User, "<@1>", Val::from("bob")));

    session.python(&ctx, "<@1> + '!'", &mut renderer).await.unwrap();
    assert_eq!(renderer.values, vec![Val::from("bob!")]);
}

#[tokio::test]
async fn test_syntax_error_is_reported() {
    let mut session = session();
    let mut renderer = RecordingRenderer::default();

    let error = session
        .python(&context(), "1 +", &mut renderer)
        .await
        .expect_err("should not compile");

    assert!(matches!(error, ExecError::Compile(CompileError::Syntax { .. })));
    assert!(describe_error(&error).starts_with("Syntax error"));
    assert!(renderer.values.is_empty());
}

#[tokio::test]
async fn test_cancel_through_registry() {
    let registry = TaskRegistry::new();
    let mut session = session().with_registry(registry.clone());
    let mut renderer = RecordingRenderer::default();

    let canceller = tokio::spawn(async move {
        while registry.cancel_all() == 0 {
            tokio::task::yield_now().await;
        }
    });

    let outcome = session
        .python(&context(), "1\nawait sleep(60000)\n2", &mut renderer)
        .await
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(renderer.values, vec![Val::Num(1.0)]);
    assert!(session.registry().is_empty());
}

#[tokio::test]
async fn test_null_results_keep_underscore() {
    let mut session = session();
    let mut renderer = RecordingRenderer::default();

    session
        .python(&context(), "5\nawait sleep(1)\n_", &mut renderer)
        .await
        .unwrap();

    assert_eq!(renderer.values, vec![Val::Num(5.0), Val::Num(5.0)]);
}

#[tokio::test]
async fn test_injected_names_removed_on_failure_and_cancel() {
    let registry = TaskRegistry::new();
    let mut session = session().with_registry(registry.clone());
    let mut renderer = RecordingRenderer::default();
    let ctx = context().with_mention(Mention::new(MentionKind::User, "<@1>", Val::from("bob")));

    session
        .python(&ctx, "y = <@1>\nmissing", &mut renderer)
        .await
        .expect_err("missing is not defined");
    assert_eq!(session.scope().unwrap().names(), vec!["y".to_string()]);

    let canceller = tokio::spawn(async move {
        while registry.cancel_all() == 0 {
            tokio::task::yield_now().await;
        }
    });
    let outcome = session
        .python(&ctx, "z = <@1> + _author\nawait sleep(60000)", &mut renderer)
        .await
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(outcome, RunOutcome::Cancelled);
    let scope = session.scope().unwrap();
    assert_eq!(scope.names(), vec!["y".to_string(), "z".to_string()]);
    assert_eq!(scope.get("z"), Some(&Val::from("bobana")));
    assert!(!scope.contains("_author"));
    assert!(!scope.contains("_"));
    assert!(!scope.contains("__user_mention_0"));
}

/* ===================== python_inspect / ast ===================== */

#[tokio::test]
async fn test_inspect_reports_every_value() {
    let mut session = session();
    let mut renderer = RecordingRenderer::default();

    session
        .python_inspect(&context(), "null\n[1, 2]", &mut renderer)
        .await
        .unwrap();

    assert!(renderer.values.is_empty());
    assert_eq!(renderer.texts.len(), 2);
    assert!(renderer.texts[0].starts_with("=== null ==="));
    assert!(renderer.texts[1].contains(":: list"));
    assert_eq!(
        session.last_result(),
        Some(&Val::List(vec![Val::Num(1.0), Val::Num(2.0)]))
    );
}

#[test]
fn test_ast_shows_wrapped_statements() {
    let session = session();
    let json = session.ast("x = 1\nx").unwrap();

    assert!(json.contains("\"t\": \"Emit\""));
    assert!(json.contains("\"last\": true"));
    assert!(session.ast("let").is_err());
}

/* ===================== retain ===================== */

#[tokio::test]
async fn test_retain_transitions() {
    let mut session = session();
    let mut renderer = RecordingRenderer::default();
    session.python(&context(), "x = 1", &mut renderer).await.unwrap();

    assert_eq!(session.retain(None), RetainStatus::On);
    assert_eq!(session.retain(Some(true)), RetainStatus::AlreadyOn);
    assert_eq!(session.retain(Some(false)), RetainStatus::TurnedOff);
    assert_eq!(session.retain(None), RetainStatus::Off);
    assert_eq!(session.retain(Some(false)), RetainStatus::AlreadyOff);
    assert_eq!(session.retain(Some(true)), RetainStatus::TurnedOn);

    // Re-enabling starts empty
    assert!(session.scope().unwrap().is_empty());
}

#[test]
fn test_retain_messages() {
    assert_eq!(RetainStatus::On.to_string(), "Variable retention is set to ON.");
    assert_eq!(
        RetainStatus::AlreadyOff.to_string(),
        "Variable retention is already set to OFF."
    );
    assert!(RetainStatus::TurnedOff
        .to_string()
        .ends_with("dispose their scope when done."));
}

/* ===================== repl ===================== */

#[tokio::test]
async fn test_repl_runs_prefixed_lines_until_exit() {
    let mut session = session();
    let mut renderer = RecordingRenderer::default();
    let mut source = ScriptedSource::new(vec![
        IncomingMessage::new("ana", 42, "$1 + 1"),
        IncomingMessage::new("ana", 42, "not code"),
        IncomingMessage::new("bob", 42, "$100"),
        IncomingMessage::new("ana", 7, "$200"),
        IncomingMessage::new("ana", 42, "$```\n_ + 1\n```"),
        IncomingMessage::new("ana", 42, "$exit()"),
        IncomingMessage::new("ana", 42, "$999"),
    ]);

    let exit = session.repl(&context(), &mut source, &mut renderer).await;

    assert_eq!(exit, ReplExit::Exited);
    assert_eq!(renderer.values, vec![Val::Num(2.0), Val::Num(3.0)]);
    assert!(renderer.texts[0].starts_with("Flow "));
    assert_eq!(renderer.texts.last().map(String::as_str), Some("Exiting..."));
    assert_eq!(source.messages.len(), 1);
}

#[tokio::test]
async fn test_repl_keeps_going_after_errors() {
    let mut session = session();
    let mut renderer = RecordingRenderer::default();
    let mut source = ScriptedSource::lines(&["$missing", "$exit", "$3", "$quit()"]);

    let exit = session.repl(&context(), &mut source, &mut renderer).await;

    assert_eq!(exit, ReplExit::Exited);
    assert_eq!(renderer.values, vec![Val::Num(3.0)]);
    assert!(renderer.texts.iter().any(|t| t.contains("missing is not defined")));
    assert!(renderer.texts.iter().any(|t| t == "Use `exit()` to exit."));
}

#[tokio::test]
async fn test_repl_binds_message() {
    let mut session = session();
    let mut renderer = RecordingRenderer::default();
    let mut source = ScriptedSource::lines(&["$msg.author + ':' + message.content"]);

    let exit = session.repl(&context(), &mut source, &mut renderer).await;

    assert_eq!(exit, ReplExit::SourceClosed);
    assert_eq!(
        renderer.values,
        vec![Val::from("ana:$msg.author + ':' + message.content")]
    );
    assert!(!session.scope().unwrap().contains("message"));
}

#[tokio::test]
async fn test_repl_without_required_prefix() {
    let mut config = Config::default();
    config.repl.require_prefix = false;
    let mut session = Session::new(&config);
    let mut renderer = RecordingRenderer::default();
    let mut source = ScriptedSource::lines(&["4", "$5"]);

    session.repl(&context(), &mut source, &mut renderer).await;
    assert_eq!(renderer.values, vec![Val::Num(4.0), Val::Num(5.0)]);
}

#[tokio::test]
async fn test_one_repl_per_channel() {
    let mut session = session();
    let mut renderer = RecordingRenderer::default();

    let claim = ChannelClaim::acquire(&session.repl_channels, 42).unwrap();
    let mut source = ScriptedSource::lines(&["$1"]);
    let exit = session.repl(&context(), &mut source, &mut renderer).await;

    assert_eq!(exit, ReplExit::AlreadyRunning);
    assert!(renderer.values.is_empty());
    assert_eq!(source.messages.len(), 1);

    // Released claims make the channel available again
    drop(claim);
    let exit = session.repl(&context(), &mut source, &mut renderer).await;
    assert_eq!(exit, ReplExit::SourceClosed);
    assert!(session.repl_channels.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_repl_idle_timeout() {
    let mut config = Config::default();
    config.repl.idle_timeout_secs = 1;
    let mut session = Session::new(&config);
    let mut renderer = RecordingRenderer::default();
    let mut source = ScriptedSource {
        messages: VecDeque::new(),
        hang_when_empty: true,
    };

    let exit = session.repl(&context(), &mut source, &mut renderer).await;

    assert_eq!(exit, ReplExit::TimedOut);
    assert_eq!(renderer.texts.last().map(String::as_str), Some("Exiting..."));
    assert!(session.repl_channels.lock().unwrap().is_empty());
}
