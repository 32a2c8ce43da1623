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

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::common::{Address, Headers, ServiceError};
use crate::inbox::Inbox;
use crate::message::{Continuation, StreamSink};
use crate::outbox::Outbox;

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Work posted to an inbox's reply lane and executed by its worker.
pub(crate) type ReplyTask = Box<dyn FnOnce(&mut Outbox) + Send + 'static>;

/// Runs `task` on `home`'s worker, or inline when there is no open home inbox.
pub(crate) fn route(home: Option<&Inbox>, task: ReplyTask, outbox: Option<&mut Outbox>) {
    let task = match home {
        Some(inbox) => match inbox.post_reply(task) {
            Ok(()) => return,
            Err(task) => task,
        },
        None => task,
    };
    match outbox {
        Some(outbox) => task(outbox),
        None => task(&mut Outbox::new()),
    }
}

/// The delivery shape of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Fire-and-forget.
    OneWay,
    /// Correlated request/response.
    Query,
    /// Server-streaming call.
    Stream,
}

/// One unit of work addressed to an inbox.
///
/// A message is delivered at most once. If it cannot be enqueued, or is discarded after
/// being enqueued, its own continuation receives the failure.
pub struct Message {
    id: u64,
    kind: MessageKind,
    target: Address,
    method: String,
    headers: Headers,
    args: Vec<Value>,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    reply: ReplyTo,
}

pub(crate) enum ReplyTo {
    None,
    Query(QueryReply),
    Stream(StreamSink),
}

impl Message {
    /// Builds a one-way message.
    pub fn one_way(
        target: Address,
        method: impl Into<String>,
        headers: Headers,
        args: Vec<Value>,
    ) -> Self {
        Self {
            id: NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed),
            kind: MessageKind::OneWay,
            target,
            method: method.into(),
            headers,
            args,
            timeout: None,
            deadline: None,
            reply: ReplyTo::None,
        }
    }

    pub(crate) fn query(
        target: Address,
        method: impl Into<String>,
        headers: Headers,
        args: Vec<Value>,
        timeout: Duration,
        reply: QueryReply,
    ) -> Self {
        Self {
            kind: MessageKind::Query,
            timeout: Some(timeout),
            deadline: Instant::now().checked_add(timeout),
            reply: ReplyTo::Query(reply),
            ..Self::one_way(target, method, headers, args)
        }
    }

    pub(crate) fn stream(
        target: Address,
        method: impl Into<String>,
        headers: Headers,
        args: Vec<Value>,
        timeout: Duration,
        sink: StreamSink,
    ) -> Self {
        Self {
            kind: MessageKind::Stream,
            timeout: Some(timeout),
            deadline: Instant::now().checked_add(timeout),
            reply: ReplyTo::Stream(sink),
            ..Self::one_way(target, method, headers, args)
        }
    }

    /// Correlation id, unique within the process.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn target(&self) -> &Address {
        &self.target
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// The caller's timeout, for queries and streams.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The instant after which the message is no longer worth executing.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` once the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Fails the message's continuation or stream. One-way messages are logged and dropped.
    pub fn fail(self, error: ServiceError) {
        self.fail_in(error, None);
    }

    pub(crate) fn fail_in(self, error: ServiceError, outbox: Option<&mut Outbox>) {
        match self.reply {
            ReplyTo::None => debug!(
                address = %self.target,
                method = %self.method,
                "one-way message dropped: {}", error
            ),
            ReplyTo::Query(reply) => reply.complete(Err(error), outbox),
            ReplyTo::Stream(sink) => sink.fail(error),
        }
    }

    pub(crate) fn into_parts(self) -> MessageParts {
        MessageParts {
            kind: self.kind,
            method: self.method,
            headers: self.headers,
            args: self.args,
            reply: self.reply,
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("target", &self.target)
            .field("method", &self.method)
            .field("args", &self.args.len())
            .finish()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} #{} {}::{}", self.kind, self.id, self.target, self.method)
    }
}

pub(crate) struct MessageParts {
    pub(crate) kind: MessageKind,
    pub(crate) method: String,
    pub(crate) headers: Headers,
    pub(crate) args: Vec<Value>,
    pub(crate) reply: ReplyTo,
}

/// The reply half of a query, shared between the worker and the timeout timer.
pub(crate) struct QueryReply {
    slot: Arc<QuerySlot>,
    home: Option<Inbox>,
}

struct QuerySlot {
    result: Mutex<Option<Continuation<Value>>>,
    timer: Mutex<Option<AbortHandle>>,
}

impl QueryReply {
    pub(crate) fn new(result: Continuation<Value>, home: Option<Inbox>) -> Self {
        Self {
            slot: Arc::new(QuerySlot {
                result: Mutex::new(Some(result)),
                timer: Mutex::new(None),
            }),
            home,
        }
    }

    /// Fails the query with [`ServiceError::Timeout`] if no reply arrives within `timeout`.
    ///
    /// Needs a Tokio runtime; outside one the query simply has no timer.
    pub(crate) fn arm_timer(&self, timeout: Duration, address: &Address, method: &str) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            trace!("no runtime available; query timer not armed");
            return;
        };
        let slot = Arc::clone(&self.slot);
        let home = self.home.clone();
        let error = ServiceError::Timeout {
            address: address.to_string(),
            method: method.to_string(),
            timeout,
        };
        let timer = handle.spawn(async move {
            tokio::time::sleep(timeout).await;
            let expired = slot.result.lock().take();
            if let Some(result) = expired {
                debug!("{}", error);
                route(
                    home.as_ref(),
                    Box::new(move |outbox| result.complete_in(Err(error), outbox)),
                    None,
                );
            }
        });
        *self.slot.timer.lock() = Some(timer.abort_handle());
    }

    /// Delivers the result, unless the timer already failed the query.
    pub(crate) fn complete(self, result: Result<Value, ServiceError>, outbox: Option<&mut Outbox>) {
        let continuation = self.slot.result.lock().take();
        let Some(continuation) = continuation else {
            debug!("late reply dropped after timeout");
            return;
        };
        if let Some(timer) = self.slot.timer.lock().take() {
            timer.abort();
        }
        route(
            self.home.as_ref(),
            Box::new(move |outbox| continuation.complete_in(result, outbox)),
            outbox,
        );
    }

    /// Converts the reply into a continuation handed to the actor.
    pub(crate) fn into_continuation(self) -> Continuation<Value> {
        Continuation::with_outbox(move |result, outbox| self.complete(result, Some(outbox)))
    }
}

/// Items travelling through an inbox queue.
pub(crate) enum Envelope {
    Deliver(Message),
    Save(Continuation<()>),
    Stop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timer_fails_unanswered_query() {
        let (result, pending) = Continuation::<Value>::channel();
        let reply = QueryReply::new(result, None);
        let address = Address::parse("/slow").unwrap();
        reply.arm_timer(Duration::from_millis(20), &address, "work");
        let outcome = pending.wait().await;
        assert!(matches!(outcome, Err(ServiceError::Timeout { .. })));
        reply.complete(Ok(Value::from(1)), None);
    }

    #[tokio::test]
    async fn reply_before_deadline_wins() {
        let (result, pending) = Continuation::<Value>::channel();
        let reply = QueryReply::new(result, None);
        let address = Address::parse("/fast").unwrap();
        reply.arm_timer(Duration::from_secs(5), &address, "work");
        reply.complete(Ok(Value::from("done")), None);
        assert_eq!(pending.wait().await, Ok(Value::from("done")));
    }

    #[tokio::test]
    async fn expired_messages_are_detected() {
        let (result, _pending) = Continuation::<Value>::channel();
        let message = Message::query(
            Address::parse("/x").unwrap(),
            "m",
            Headers::new(),
            vec![],
            Duration::ZERO,
            QueryReply::new(result, None),
        );
        assert!(message.is_expired());
        assert!(!Message::one_way(Address::parse("/x").unwrap(), "m", Headers::new(), vec![])
            .is_expired());
    }
}
