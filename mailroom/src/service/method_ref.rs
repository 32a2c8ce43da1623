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
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, trace, warn};

use super::ServiceRef;
use crate::actor::MethodInfo;
use crate::common::{Headers, ServiceError};
use crate::inbox::{Inbox, OfferTimeout};
use crate::message::{Continuation, Message, QueryReply, ResultStream, StreamSink};
use crate::outbox::{Delivery, Outbox};
use crate::traits::ExecutionContext;

enum MethodKind {
    Direct {
        service: ServiceRef,
        inbox: Inbox,
        info: MethodInfo,
        pinned: bool,
    },
    Lazy {
        service: ServiceRef,
        name: String,
        slot: RwLock<Option<MethodRef>>,
    },
    Failed {
        name: String,
        error: ServiceError,
    },
    NotFound {
        name: String,
        error: ServiceError,
    },
    Context {
        context: Arc<dyn ExecutionContext>,
        target: MethodRef,
    },
}

/// A callable handle to one method of one service.
///
/// Always callable: a handle that cannot work fails each call with its captured cause, so a
/// caller cannot tell "never going to work" from "not yet available" except by the error.
///
/// Calls are buffered in the given [`Outbox`] and enqueued when it is flushed.
#[derive(Clone)]
pub struct MethodRef(Arc<MethodKind>);

impl MethodRef {
    pub(crate) fn direct(service: ServiceRef, inbox: Inbox, info: MethodInfo, pinned: bool) -> Self {
        Self(Arc::new(MethodKind::Direct {
            service,
            inbox,
            info,
            pinned,
        }))
    }

    pub(crate) fn lazy(service: ServiceRef, name: &str) -> Self {
        Self(Arc::new(MethodKind::Lazy {
            service,
            name: name.to_string(),
            slot: RwLock::new(None),
        }))
    }

    pub(crate) fn failed(name: &str, error: ServiceError) -> Self {
        Self(Arc::new(MethodKind::Failed {
            name: name.to_string(),
            error,
        }))
    }

    pub(crate) fn not_found(name: &str, error: ServiceError) -> Self {
        Self(Arc::new(MethodKind::NotFound {
            name: name.to_string(),
            error,
        }))
    }

    /// Wraps the handle so every call swaps `context` in around the delegate call.
    #[must_use]
    pub fn with_context(self, context: Arc<dyn ExecutionContext>) -> Self {
        Self(Arc::new(MethodKind::Context {
            context,
            target: self,
        }))
    }

    pub fn name(&self) -> &str {
        match &*self.0 {
            MethodKind::Direct { info, .. } => info.name(),
            MethodKind::Lazy { name, .. }
            | MethodKind::Failed { name, .. }
            | MethodKind::NotFound { name, .. } => name,
            MethodKind::Context { target, .. } => target.name(),
        }
    }

    /// Method metadata, once the handle is bound.
    pub fn info(&self) -> Option<MethodInfo> {
        match &*self.0 {
            MethodKind::Direct { info, .. } => Some(info.clone()),
            MethodKind::Lazy { slot, .. } => slot.read().as_ref().and_then(MethodRef::info),
            MethodKind::Context { target, .. } => target.info(),
            MethodKind::Failed { .. } | MethodKind::NotFound { .. } => None,
        }
    }

    /// `true` when calls can no longer succeed through this handle.
    pub fn is_closed(&self) -> bool {
        match &*self.0 {
            MethodKind::Direct { inbox, .. } => inbox.is_closed(),
            MethodKind::Lazy { service, .. } => service.is_closed(),
            MethodKind::Failed { .. } => true,
            MethodKind::NotFound { .. } => false,
            MethodKind::Context { target, .. } => target.is_closed(),
        }
    }

    fn is_bound(&self) -> bool {
        match &*self.0 {
            MethodKind::Direct { inbox, .. } => !inbox.is_closed(),
            MethodKind::Context { target, .. } => target.is_bound(),
            _ => false,
        }
    }

    /// The current delegate of a lazy handle.
    ///
    /// Re-resolves against the service whenever the cached delegate is missing or closed,
    /// and caches only open, bound delegates.
    fn resolve(service: &ServiceRef, name: &str, slot: &RwLock<Option<MethodRef>>) -> MethodRef {
        if let Some(cached) = slot.read().as_ref().filter(|method| !method.is_closed()) {
            return cached.clone();
        }
        let mut cached = slot.write();
        if let Some(current) = cached.as_ref().filter(|method| !method.is_closed()) {
            return current.clone();
        }
        let resolved = match service.delegate() {
            Some(delegate) => delegate.method(name),
            None => MethodRef::not_found(
                name,
                ServiceError::NotFound {
                    address: service.address().to_string(),
                    method: name.to_string(),
                },
            ),
        };
        if resolved.is_bound() {
            trace!(address = %service.address(), method = name, "lazy method bound");
            *cached = Some(resolved.clone());
        }
        resolved
    }

    fn offer_timeout(pinned: bool) -> OfferTimeout {
        if pinned {
            OfferTimeout::Unbounded
        } else {
            OfferTimeout::Default
        }
    }

    /// Fire-and-forget call.
    ///
    /// Nothing about delivery or execution is reported back; failures are only logged.
    pub fn send(&self, outbox: &mut Outbox, headers: Headers, args: Vec<Value>) {
        match &*self.0 {
            MethodKind::Direct {
                service,
                inbox,
                info,
                pinned,
            } => {
                let mut args = args;
                if let Err(error) = info.check_args(&mut args) {
                    warn!(address = %service.address(), "send dropped: {}", error);
                    return;
                }
                let message = Message::one_way(service.address().clone(), info.name(), headers, args);
                outbox.push(Delivery::new(
                    inbox.clone(),
                    message,
                    Self::offer_timeout(*pinned),
                    None,
                ));
            }
            MethodKind::Lazy { service, name, slot } => {
                Self::resolve(service, name, slot).send(outbox, headers, args);
            }
            MethodKind::Failed { error, .. } => warn!("send dropped: {}", error),
            MethodKind::NotFound { error, .. } => debug!("send dropped: {}", error),
            MethodKind::Context { context, target } => {
                let _guard = context.enter();
                target.send(outbox, headers, args);
            }
        }
    }

    /// A one-way call whose `confirm` continuation learns whether the message was
    /// enqueued. The method's own result is still not reported.
    pub fn send_confirmed(
        &self,
        outbox: &mut Outbox,
        headers: Headers,
        confirm: Continuation<()>,
        args: Vec<Value>,
    ) {
        match &*self.0 {
            MethodKind::Direct {
                service,
                inbox,
                info,
                pinned,
            } => {
                let mut args = args;
                if let Err(error) = info.check_args(&mut args) {
                    confirm.complete_in(Err(error), outbox);
                    return;
                }
                let message = Message::one_way(service.address().clone(), info.name(), headers, args);
                outbox.push(Delivery::new(
                    inbox.clone(),
                    message,
                    Self::offer_timeout(*pinned),
                    Some(confirm),
                ));
            }
            MethodKind::Lazy { service, name, slot } => {
                Self::resolve(service, name, slot).send_confirmed(outbox, headers, confirm, args);
            }
            MethodKind::Failed { error, .. } | MethodKind::NotFound { error, .. } => {
                confirm.complete_in(Err(error.clone()), outbox);
            }
            MethodKind::Context { context, target } => {
                let _guard = context.enter();
                target.send_confirmed(outbox, headers, confirm, args);
            }
        }
    }

    /// Request/response call.
    ///
    /// `result` is completed exactly once: with the method's value, its error, a
    /// [`ServiceError::Timeout`] after `timeout` (the service's query timeout when
    /// `None`), or the enqueue failure. Problems detected before enqueueing fail `result`
    /// right away instead of being returned. The reply runs on the worker of the outbox's
    /// inbox when there is one.
    pub fn query(
        &self,
        outbox: &mut Outbox,
        headers: Headers,
        result: Continuation<Value>,
        timeout: Option<Duration>,
        args: Vec<Value>,
    ) {
        match &*self.0 {
            MethodKind::Direct {
                service,
                inbox,
                info,
                pinned,
            } => {
                let mut args = args;
                if let Err(error) = info.check_args(&mut args) {
                    result.complete_in(Err(error), outbox);
                    return;
                }
                let timeout = timeout.unwrap_or_else(|| inbox.query_timeout());
                let reply = QueryReply::new(result, outbox.inbox().cloned());
                reply.arm_timer(timeout, service.address(), info.name());
                let message = Message::query(
                    service.address().clone(),
                    info.name(),
                    headers,
                    args,
                    timeout,
                    reply,
                );
                outbox.push(Delivery::new(
                    inbox.clone(),
                    message,
                    Self::offer_timeout(*pinned),
                    None,
                ));
            }
            MethodKind::Lazy { service, name, slot } => {
                Self::resolve(service, name, slot).query(outbox, headers, result, timeout, args);
            }
            MethodKind::Failed { error, .. } | MethodKind::NotFound { error, .. } => {
                result.complete_in(Err(error.clone()), outbox);
            }
            MethodKind::Context { context, target } => {
                let _guard = context.enter();
                target.query(outbox, headers, result, timeout, args);
            }
        }
    }

    /// Server-streaming call.
    ///
    /// `stream` receives zero or more values and then exactly one completion or failure.
    /// A stream still open after `timeout` (the service's query timeout when `None`) fails
    /// with [`ServiceError::Timeout`]. Its callbacks run on the stream's own home inbox if
    /// it has one, otherwise on the outbox's inbox.
    pub fn stream(
        &self,
        outbox: &mut Outbox,
        headers: Headers,
        stream: ResultStream,
        timeout: Option<Duration>,
        args: Vec<Value>,
    ) {
        match &*self.0 {
            MethodKind::Direct {
                service,
                inbox,
                info,
                pinned,
            } => {
                let mut args = args;
                if let Err(error) = info.check_args(&mut args) {
                    stream.fail(error);
                    return;
                }
                let timeout = timeout.unwrap_or_else(|| inbox.query_timeout());
                let sink = StreamSink::new(stream, outbox.inbox().cloned());
                sink.arm_timer(timeout, service.address(), info.name());
                let message = Message::stream(
                    service.address().clone(),
                    info.name(),
                    headers,
                    args,
                    timeout,
                    sink,
                );
                outbox.push(Delivery::new(
                    inbox.clone(),
                    message,
                    Self::offer_timeout(*pinned),
                    None,
                ));
            }
            MethodKind::Lazy { service, name, slot } => {
                Self::resolve(service, name, slot).stream(outbox, headers, stream, timeout, args);
            }
            MethodKind::Failed { error, .. } | MethodKind::NotFound { error, .. } => {
                stream.fail(error.clone());
            }
            MethodKind::Context { context, target } => {
                let _guard = context.enter();
                target.stream(outbox, headers, stream, timeout, args);
            }
        }
    }

    /// Queries with the default timeout from a fresh outbox and waits for the reply.
    ///
    /// # Errors
    ///
    /// Whatever the query's continuation was failed with.
    #[instrument(skip(self, args), fields(method = self.name()))]
    pub async fn call(&self, args: Vec<Value>) -> Result<Value, ServiceError> {
        let (result, pending) = Continuation::channel();
        let mut outbox = Outbox::new();
        self.query(&mut outbox, Headers::new(), result, None, args);
        outbox.flush().await;
        pending.wait().await
    }

    /// [`MethodRef::call`] with the reply decoded into `T`.
    ///
    /// # Errors
    ///
    /// The call's error, or [`ServiceError::Execution`] if the reply does not decode.
    pub async fn call_as<T: DeserializeOwned>(&self, args: Vec<Value>) -> Result<T, ServiceError> {
        let value = self.call(args).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Sends from a fresh outbox and flushes it immediately.
    pub async fn send_now(&self, args: Vec<Value>) {
        let mut outbox = Outbox::new();
        self.send(&mut outbox, Headers::new(), args);
        outbox.flush().await;
    }
}

impl fmt::Debug for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variant = match &*self.0 {
            MethodKind::Direct { .. } => "Direct",
            MethodKind::Lazy { .. } => "Lazy",
            MethodKind::Failed { .. } => "Failed",
            MethodKind::NotFound { .. } => "NotFound",
            MethodKind::Context { .. } => "Context",
        };
        f.debug_struct("MethodRef")
            .field("variant", &variant)
            .field("name", &self.name())
            .finish()
    }
}
