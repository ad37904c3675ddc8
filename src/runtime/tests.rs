//! Runtime tests - executor and sender against real compiled units

use super::*;
use crate::compiler::{compile, Substitutions};
use crate::executor::{errors, Awaitable};
use crate::scope::{Bindings, Scope};
use async_trait::async_trait;
use maplit::hashmap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn executor<'s>(source: &str, scope: &'s mut Scope, bindings: Bindings) -> AsyncCodeExecutor<'s> {
    let unit = compile(source, &Substitutions::new()).expect("Should compile");
    AsyncCodeExecutor::new(&unit, scope, bindings, CancellationToken::new())
}

/// Run to the end without replying, collecting every produced value
async fn collect(source: &str, scope: &mut Scope) -> Result<Vec<ProducedResult>, ExecError> {
    let mut sender = AsyncSender::new(executor(source, scope, Bindings::new()));
    let mut out = Vec::new();
    while let Some(item) = sender.next().await {
        let (_reply, result) = item?;
        out.push(result);
    }
    Ok(out)
}

fn values(results: &[ProducedResult]) -> Vec<Val> {
    results.iter().map(|r| r.value.clone()).collect()
}

/// Counts suspensions and answers host calls named "double"
#[derive(Default)]
struct CountingResolver {
    calls: AtomicUsize,
}

#[async_trait]
impl AwaitResolver for CountingResolver {
    async fn resolve(&self, awaitable: &Awaitable) -> Result<Val, Val> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match awaitable {
            Awaitable::Sleep { .. } => Ok(Val::Null),
            Awaitable::Host { name, args } if name == "double" => match args.first() {
                Some(Val::Num(n)) => Ok(Val::Num(n * 2.0)),
                _ => Err(Val::from("double needs a number")),
            },
            Awaitable::Host { .. } => Err(Val::from("unknown host call")),
        }
    }
}

/// Never resolves; only cancellation gets a program past it
struct PendingResolver;

#[async_trait]
impl AwaitResolver for PendingResolver {
    async fn resolve(&self, _awaitable: &Awaitable) -> Result<Val, Val> {
        std::future::pending().await
    }
}

/* ===================== Produced Values ===================== */

#[tokio::test]
async fn test_each_expression_is_produced_in_order() {
    let mut scope = Scope::new();
    let results = collect("1; 'two'; [3]", &mut scope).await.unwrap();

    assert_eq!(
        values(&results),
        vec![Val::Num(1.0), Val::from("two"), Val::List(vec![Val::Num(3.0)])]
    );
    assert!(!results[0].is_final());
    assert!(!results[1].is_final());
    assert!(results[2].is_final());
}

#[tokio::test]
async fn test_single_expression() {
    let mut scope = Scope::new();
    let results = collect("1+1", &mut scope).await.unwrap();
    assert_eq!(results, vec![ProducedResult::final_value(Val::Num(2.0))]);
}

#[tokio::test]
async fn test_assignment_only_produces_nothing() {
    let mut scope = Scope::new();
    let results = collect("x = 5", &mut scope).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(scope.get("x"), Some(&Val::Num(5.0)));
}

#[tokio::test]
async fn test_empty_source_produces_nothing() {
    let mut scope = Scope::new();
    assert!(collect("   ", &mut scope).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_return_value_is_final() {
    let mut scope = Scope::new();
    let results = collect("1\nreturn 7\n8", &mut scope).await.unwrap();
    assert_eq!(
        results,
        vec![
            ProducedResult::intermediate(Val::Num(1.0)),
            ProducedResult::final_value(Val::Num(7.0)),
        ]
    );
}

#[tokio::test]
async fn test_await_and_yield_in_loop() {
    let mut scope = Scope::new();
    let resolver = Arc::new(CountingResolver::default());
    let exec = executor(
        "for (let i of range(3)) { await sleep(1); yield i }",
        &mut scope,
        Bindings::new(),
    )
    .with_resolver(resolver.clone());

    let mut sender = AsyncSender::new(exec);
    let mut produced = Vec::new();
    while let Some(item) = sender.next().await {
        let (_reply, result) = item.unwrap();
        produced.push(result.value);
    }

    assert_eq!(produced, vec![Val::Num(0.0), Val::Num(1.0), Val::Num(2.0)]);
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_host_call_through_resolver() {
    let mut scope = Scope::new();
    let exec = executor("let d = await host('double', 21)\nd", &mut scope, Bindings::new())
        .with_resolver(Arc::new(CountingResolver::default()));

    let mut sender = AsyncSender::new(exec);
    let (_reply, result) = sender.next().await.unwrap().unwrap();
    assert_eq!(result, ProducedResult::final_value(Val::Num(42.0)));
}

#[tokio::test]
async fn test_failed_awaitable_is_catchable() {
    let mut scope = Scope::new();
    let source = r#"
let code = null
try { await host("nope") } catch (e) { code = e.code }
code
"#;
    let results = collect(source, &mut scope).await.unwrap();
    assert_eq!(values(&results), vec![Val::from(errors::HOST_ERROR)]);
}

/* ===================== Continuations ===================== */

#[tokio::test]
async fn test_sent_value_becomes_yield_result() {
    let mut scope = Scope::new();
    let mut sender = AsyncSender::new(executor(
        "let answer = yield 'question'\nanswer * 10",
        &mut scope,
        Bindings::new(),
    ));

    let (reply, first) = sender.next().await.unwrap().unwrap();
    assert_eq!(first, ProducedResult::intermediate(Val::from("question")));
    reply.send(Val::Num(4.0));

    let (_reply, second) = sender.next().await.unwrap().unwrap();
    assert_eq!(second, ProducedResult::final_value(Val::Num(40.0)));
    assert!(sender.next().await.is_none());
}

#[tokio::test]
async fn test_underscore_tracks_results() {
    let mut scope = Scope::new();
    let mut sender = AsyncSender::new(executor("5\n_ + 1\n_ + 1", &mut scope, Bindings::new()));

    // No reply: `_` is the produced value
    let (_reply, first) = sender.next().await.unwrap().unwrap();
    assert_eq!(first.value, Val::Num(5.0));

    // Reply: `_` is what was sent
    let (reply, second) = sender.next().await.unwrap().unwrap();
    assert_eq!(second.value, Val::Num(6.0));
    reply.send(Val::Num(100.0));

    let (_reply, third) = sender.next().await.unwrap().unwrap();
    assert_eq!(third.value, Val::Num(101.0));
}

#[tokio::test]
async fn test_null_result_keeps_underscore() {
    let mut scope = Scope::new();
    let results = collect("5\nawait sleep(1)\nnull\n_", &mut scope).await.unwrap();
    assert_eq!(
        values(&results),
        vec![Val::Num(5.0), Val::Null, Val::Null, Val::Num(5.0)]
    );

    // An explicit null reply still counts
    let mut sender = AsyncSender::new(executor("5\n_", &mut scope, Bindings::new()));
    let (reply, _) = sender.next().await.unwrap().unwrap();
    reply.send(Val::Null);
    let (_reply, second) = sender.next().await.unwrap().unwrap();
    assert_eq!(second.value, Val::Null);
}

#[tokio::test]
async fn test_reply_to_final_result_is_ignored() {
    let mut scope = Scope::new();
    let mut sender = AsyncSender::new(executor("1", &mut scope, Bindings::new()));

    let (reply, result) = sender.next().await.unwrap().unwrap();
    assert!(result.is_final());
    reply.send(Val::from("ignored"));
    assert!(sender.next().await.is_none());
    assert!(!sender.cancelled());
}

#[tokio::test]
async fn test_bindings_removed_after_run() {
    let mut scope = Scope::new();
    scope.set("kept", Val::Num(1.0));

    {
        let bindings = hashmap! {
            "_author".to_string() => Val::from("ana"),
            "kept".to_string() => Val::Num(2.0),
        };
        let mut sender = AsyncSender::new(executor(
            "created = _author + '!'\n_author",
            &mut scope,
            bindings,
        ));
        let (_reply, result) = sender.next().await.unwrap().unwrap();
        assert_eq!(result.value, Val::from("ana"));
        assert_eq!(sender.scope().get("_"), None);
        assert!(sender.next().await.is_none());
        assert_eq!(sender.scope().get("_"), Some(&Val::from("ana")));
    }

    assert!(!scope.contains("_author"));
    assert!(!scope.contains("_"));
    // An injected name is removed even if it shadowed an existing one
    assert!(!scope.contains("kept"));
    assert_eq!(scope.get("created"), Some(&Val::from("ana!")));
}

/* ===================== Errors ===================== */

#[tokio::test]
async fn test_bindings_removed_after_failure() {
    let mut scope = Scope::new();
    {
        let bindings = hashmap! { "_author".to_string() => Val::from("ana") };
        let mut sender = AsyncSender::new(executor("y = 1\n_author\nmissing", &mut scope, bindings));
        while let Some(Ok(_)) = sender.next().await {}
        assert_eq!(sender.scope().get("_"), Some(&Val::from("ana")));
    }

    assert_eq!(scope.names(), vec!["y".to_string()]);
}

#[tokio::test]
async fn test_uncaught_throw_ends_the_sequence() {
    let mut scope = Scope::new();
    let mut sender = AsyncSender::new(executor("1\nmissing\n3", &mut scope, Bindings::new()));

    let (_reply, first) = sender.next().await.unwrap().unwrap();
    assert_eq!(first.value, Val::Num(1.0));

    let error = match sender.next().await {
        Some(Err(ExecError::Runtime(e))) => e,
        _ => panic!("Expected a runtime error"),
    };
    assert!(matches!(&error.value, Val::Error(info) if info.code == errors::REFERENCE_ERROR));
    assert_eq!(error.span.map(|s| s.start_line), Some(1));
    assert!(error.to_string().contains("missing is not defined"));

    assert!(sender.next().await.is_none());
}

#[tokio::test]
async fn test_thrown_value_is_unchanged() {
    let mut scope = Scope::new();
    match collect("throw { reason: 'custom' }", &mut scope).await {
        Err(error) => {
            let thrown = error.thrown().expect("runtime error");
            assert_eq!(thrown.repr(), "{ reason: \"custom\" }");
            assert!(error.to_string().starts_with("Uncaught"));
        }
        Ok(results) => panic!("Expected failure, got {:?}", results),
    }
}

/* ===================== Executor State ===================== */

#[tokio::test]
async fn test_advance_after_exhaustion() {
    let mut scope = Scope::new();
    let mut exec = executor("2 * 3", &mut scope, Bindings::new());

    assert!(matches!(exec.advance(None).await, Advance::Yielded(r) if r.is_final()));
    assert!(matches!(
        exec.advance(None).await,
        Advance::Completed(Some(Val::Num(n))) if n == 6.0
    ));
    assert!(exec.is_exhausted());
    assert!(matches!(exec.advance(None).await, Advance::Completed(None)));
    assert!(matches!(exec.advance(Some(Val::Null)).await, Advance::Completed(None)));
}

/* ===================== Cancellation ===================== */

#[tokio::test]
async fn test_cancel_while_awaiting() {
    let mut scope = Scope::new();
    let token = CancellationToken::new();
    let unit = compile("1\nawait sleep(60000)\n2", &Substitutions::new()).unwrap();
    let exec = AsyncCodeExecutor::new(&unit, &mut scope, Bindings::new(), token.clone())
        .with_resolver(Arc::new(PendingResolver));
    let mut sender = AsyncSender::new(exec);

    let (_reply, first) = sender.next().await.unwrap().unwrap();
    assert_eq!(first.value, Val::Num(1.0));

    let canceller = token.clone();
    tokio::spawn(async move { canceller.cancel() });

    assert!(sender.next().await.is_none());
    assert!(sender.cancelled());
    assert!(sender.next().await.is_none());
}

#[tokio::test]
async fn test_cancel_before_start() {
    let mut scope = Scope::new();
    let token = CancellationToken::new();
    token.cancel();

    let unit = compile("x = 1", &Substitutions::new()).unwrap();
    let mut exec = AsyncCodeExecutor::new(&unit, &mut scope, Bindings::new(), token);
    assert!(matches!(exec.advance(None).await, Advance::Cancelled));
    assert!(!exec.scope().contains("x"));
}

#[tokio::test]
async fn test_infinite_loop_is_cancellable() {
    let mut scope = Scope::new();
    let token = CancellationToken::new();
    let unit = compile("let n = 0\nwhile (true) { n += 1 }", &Substitutions::new()).unwrap();
    let mut exec = AsyncCodeExecutor::new(&unit, &mut scope, Bindings::new(), token.clone())
        .with_yield_interval(16);

    let canceller = token.clone();
    tokio::spawn(async move { canceller.cancel() });

    assert!(matches!(exec.advance(None).await, Advance::Cancelled));
    assert!(matches!(exec.scope().get("n"), Some(Val::Num(n)) if *n > 0.0));
}
