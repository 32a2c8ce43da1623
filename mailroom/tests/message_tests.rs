/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::time::{Duration, Instant};

use mailroom::prelude::*;
use mailroom_test::prelude::*;

use crate::setup::actors::{staller, ticker, Echo};
use crate::setup::{initialize_tracing, runtime};

mod setup;

/// Tests a server-streaming call end to end.
///
/// **Scenario:**
/// 1. Build a ticker service.
/// 2. Stream `count(4)` and `count(-1)` into channel-backed result streams.
///
/// **Verification:**
/// - The first stream yields 0 through 3 and completes.
/// - The second fails with `InvalidArguments` and yields no values.
#[mailroom_test]
async fn test_stream_values_then_completion() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = runtime();
    let ticks = runtime.new_service(ticker()).build()?;

    let mut outbox = runtime.outbox();
    let (counting, values) = ResultStream::channel();
    let (failing, failure) = ResultStream::channel();
    ticks.method("count").stream(&mut outbox, Headers::new(), counting, None, vec![json!(4)]);
    ticks.method("count").stream(&mut outbox, Headers::new(), failing, None, vec![json!(-1)]);
    outbox.flush().await;

    assert_eq!(values.collect().await?, vec![json!(0), json!(1), json!(2), json!(3)]);
    assert!(matches!(
        failure.collect().await,
        Err(ServiceError::InvalidArguments { .. })
    ));
    Ok(())
}

/// Tests streaming against handles that cannot serve the call.
///
/// **Scenario:**
/// 1. Stream from an unbound address.
/// 2. Stream with the wrong number of arguments.
///
/// **Verification:**
/// - Both streams fail without yielding values.
#[mailroom_test]
async fn test_stream_failures_before_enqueue() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = runtime();
    let ticks = runtime.new_service(ticker()).build()?;
    let mut outbox = runtime.outbox();

    let (absent, absent_values) = ResultStream::channel();
    runtime
        .service("/nowhere")
        .method("count")
        .stream(&mut outbox, Headers::new(), absent, None, vec![json!(1)]);
    let (wrong, wrong_values) = ResultStream::channel();
    ticks.method("count").stream(&mut outbox, Headers::new(), wrong, None, vec![]);
    outbox.flush().await;

    assert!(absent_values.collect().await.unwrap_err().is_not_found());
    assert!(matches!(
        wrong_values.collect().await,
        Err(ServiceError::InvalidArguments { .. })
    ));
    Ok(())
}

/// Tests that an unanswered query times out and that a dropped reply is reported.
///
/// **Scenario:**
/// 1. Build a service that holds or drops its deferred replies.
/// 2. Query `hold` with a 50 ms timeout.
/// 3. Query `drop`.
///
/// **Verification:**
/// - The held query fails with `Timeout` well before the default query timeout.
/// - The dropped query fails with `Abandoned`.
#[mailroom_test]
async fn test_query_timeout_and_abandoned_reply() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = runtime();
    let stalls = runtime.new_service(staller()).build()?;

    let mut outbox = runtime.outbox();
    let (held, held_reply) = Continuation::channel();
    let started = Instant::now();
    stalls.method("hold").query(
        &mut outbox,
        Headers::new(),
        held,
        Some(Duration::from_millis(50)),
        vec![],
    );
    outbox.flush().await;

    let error = held_reply.wait().await.unwrap_err();
    assert!(matches!(error, ServiceError::Timeout { .. }), "{error}");
    assert!(started.elapsed() < Duration::from_secs(5));

    let error = stalls.method("drop").call(vec![]).await.unwrap_err();
    assert_eq!(error, ServiceError::Abandoned);

    // the held continuation completes late on shutdown and must not disturb anything
    stalls.shutdown(ShutdownMode::Graceful).await;
    Ok(())
}

/// Tests that a stream left open by its producer times out.
///
/// **Scenario:**
/// 1. Build a staller with a 100 ms query timeout.
/// 2. Stream `tail`, which emits one value and never finishes, without a timeout.
/// 3. Stream `tail` again with an explicit 30 ms timeout.
///
/// **Verification:**
/// - Both streams yield their value, then fail with `Timeout` carrying the applied timeout.
/// - Both fail long before the outer one-second guard.
#[mailroom_test]
async fn test_open_stream_times_out() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = runtime();
    let stalls = runtime
        .new_service(staller())
        .with_query_timeout(Duration::from_millis(100))
        .build()?;

    let mut outbox = runtime.outbox();
    let (defaulted, mut defaulted_values) = ResultStream::channel();
    let (explicit, mut explicit_values) = ResultStream::channel();
    let tail = stalls.method("tail");
    tail.stream(&mut outbox, Headers::new(), defaulted, None, vec![]);
    tail.stream(
        &mut outbox,
        Headers::new(),
        explicit,
        Some(Duration::from_millis(30)),
        vec![],
    );
    outbox.flush().await;

    for (values, expected) in [
        (&mut defaulted_values, Duration::from_millis(100)),
        (&mut explicit_values, Duration::from_millis(30)),
    ] {
        assert_eq!(values.next().await, Some(Ok(json!("first"))));
        let ended = tokio::time::timeout(Duration::from_secs(1), values.next()).await?;
        match ended {
            Some(Err(ServiceError::Timeout { timeout, .. })) => assert_eq!(timeout, expected),
            other => panic!("expected a stream timeout, got {other:?}"),
        }
    }

    stalls.shutdown(ShutdownMode::Graceful).await;
    Ok(())
}

/// Tests chaining a second query off the first one's result.
///
/// **Scenario:**
/// 1. Query `echo("hi")` with a continuation derived by `then_with`.
/// 2. In the derived handler, query `echo` again with the first answer.
///
/// **Verification:**
/// - The final result is the second answer.
/// - A failing first query skips the handler and fails the final result.
#[mailroom_test]
async fn test_then_with_chains_queries() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = runtime();
    let echo = runtime.new_service(Echo).build()?;
    let mut outbox = runtime.outbox();

    let (result, final_reply) = Continuation::<Value>::channel();
    let again = echo.method("echo");
    let chained = result.then_with(move |first: Value, result, outbox| {
        let text = format!("{} again", first.as_str().unwrap_or_default());
        again.query(outbox, Headers::new(), result, None, vec![json!(text)]);
    });
    echo.method("echo").query(&mut outbox, Headers::new(), chained, None, vec![json!("hi")]);
    outbox.flush().await;
    assert_eq!(final_reply.wait().await?, json!("hi again"));

    let (result, final_reply) = Continuation::<Value>::channel();
    let chained = result.then_with(|_: Value, result, _| result.ok(json!("unreachable")));
    echo.method("missing").query(&mut outbox, Headers::new(), chained, None, vec![]);
    outbox.flush().await;
    assert!(final_reply.wait().await.unwrap_err().is_not_found());
    Ok(())
}

/// Tests joining several queries with a forked continuation.
///
/// **Scenario:**
/// 1. Fork a continuation into three branches.
/// 2. Query `echo` once per branch.
///
/// **Verification:**
/// - The joined result lists the answers in branch order.
#[mailroom_test]
async fn test_fork_joins_queries() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = runtime();
    let echo = runtime.new_service(Echo).build()?;
    let mut outbox = runtime.outbox();

    let (all, joined) = Continuation::<Vec<Value>>::channel();
    for (i, branch) in all.fork(3).into_iter().enumerate() {
        echo.method("echo")
            .query(&mut outbox, Headers::new(), branch, None, vec![json!(format!("b{i}"))]);
    }
    outbox.flush().await;
    assert_eq!(joined.wait().await?, vec![json!("b0"), json!("b1"), json!("b2")]);
    Ok(())
}

/// Tests headers and variadic parameters.
///
/// **Scenario:**
/// 1. Build a service with a method reading a header and a variadic `sum`.
/// 2. Query with a `user` header, then call `sum` with loose and pre-folded arguments.
///
/// **Verification:**
/// - The header value reaches the handler.
/// - Loose arguments are folded into the variadic parameter; a single array is kept.
#[mailroom_test]
async fn test_headers_and_varargs() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = runtime();
    let service = runtime
        .new_service(
            ServiceDef::new("math", ())
                .act_on(MethodInfo::new("user").returns("Value"), |_, call| {
                    Ok(Reply::Value(call.headers().get("user").cloned().unwrap_or(Value::Null)))
                })
                .act_on(
                    MethodInfo::new("sum").param("values", "Vec<i64>").varargs().returns("i64"),
                    |_, call| Reply::json(call.arg::<Vec<i64>>(0)?.iter().sum::<i64>()),
                ),
        )
        .build()?;

    let mut outbox = runtime.outbox();
    let (result, user) = Continuation::channel();
    let headers = Headers::new().add("user", "ada");
    service.method("user").query(&mut outbox, headers, result, None, vec![]);
    outbox.flush().await;
    assert_eq!(user.wait().await?, json!("ada"));

    let sum = service.method("sum");
    assert_eq!(sum.call(vec![json!(1), json!(2), json!(3)]).await?, json!(6));
    assert_eq!(sum.call(vec![json!([4, 5])]).await?, json!(9));
    assert_eq!(sum.call(vec![]).await?, json!(0));
    Ok(())
}
