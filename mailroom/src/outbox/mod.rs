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

//! The batching context for outgoing calls.
//!
//! Every `send`, `query` and `stream` is buffered in an [`Outbox`] and only handed to the
//! target inbox at a flush point. Inbox workers flush after each message they process, so
//! calls issued while handling a message become visible to their targets after the handler
//! returns, in the order they were issued.
//!
//! The outbox is passed explicitly. Code that may or may not already be running inside a
//! batching context uses [`OutboxScope::current_or_create`] to reuse the ambient outbox or
//! open its own.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};

use derive_new::new;
use tracing::{trace, warn};

use crate::common::ServiceError;
use crate::inbox::{Inbox, OfferTimeout};
use crate::message::{Continuation, Message};

/// One buffered call waiting for a flush.
#[derive(new)]
pub(crate) struct Delivery {
    target: Inbox,
    message: Message,
    timeout: OfferTimeout,
    confirm: Option<Continuation<()>>,
}

impl Delivery {
    async fn deliver(self) -> Option<(Continuation<()>, Result<(), ServiceError>)> {
        let result = self.target.offer(self.message, self.timeout).await;
        self.confirm.map(|confirm| (confirm, result))
    }
}

/// A batch of outgoing calls released together at a flush point.
///
/// Dropping an outbox with pending calls flushes them on a background task of the current
/// Tokio runtime; outside a runtime the calls are discarded and their continuations fail.
#[derive(Default)]
pub struct Outbox {
    inbox: Option<Inbox>,
    pending: VecDeque<Delivery>,
}

impl Outbox {
    /// An outbox with no owning inbox, for callers outside any service.
    pub fn new() -> Self {
        Self::default()
    }

    /// An outbox owned by `inbox`'s worker. Replies to queries issued through it run on
    /// that worker.
    pub(crate) fn for_inbox(inbox: Inbox) -> Self {
        Self {
            inbox: Some(inbox),
            pending: VecDeque::new(),
        }
    }

    /// The inbox this outbox belongs to, if any.
    pub fn inbox(&self) -> Option<&Inbox> {
        self.inbox.as_ref()
    }

    /// Number of calls waiting for a flush.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn push(&mut self, delivery: Delivery) {
        self.pending.push_back(delivery);
    }

    /// Hands every pending call to its target inbox, in issue order.
    ///
    /// Calls added while flushing, e.g. by a confirmation callback, are flushed too.
    pub async fn flush(&mut self) {
        while let Some(delivery) = self.pending.pop_front() {
            if let Some((confirm, result)) = delivery.deliver().await {
                confirm.complete_in(result, self);
            }
        }
    }

    /// Drops every pending call without delivering it.
    pub fn discard(&mut self) {
        if !self.pending.is_empty() {
            trace!("discarding {} pending deliveries", self.pending.len());
        }
        self.pending.clear();
    }
}

impl Drop for Outbox {
    fn drop(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let mut outbox = Outbox {
                        inbox: None,
                        pending,
                    };
                    outbox.flush().await;
                });
            }
            Err(_) => warn!(
                "outbox dropped outside a runtime with {} undelivered calls",
                pending.len()
            ),
        }
    }
}

impl fmt::Debug for Outbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outbox")
            .field("inbox", &self.inbox.as_ref().map(Inbox::address))
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// A reentrant acquisition of "the current outbox".
///
/// Nested code asks for the current outbox and gets the ambient one if there is one, or a
/// fresh owned one otherwise. Only the owner flushes on [`OutboxScope::release`].
pub enum OutboxScope<'a> {
    /// Reusing an outbox owned further up the stack.
    Borrowed(&'a mut Outbox),
    /// Owning a fresh outbox.
    Owned(Outbox),
}

impl<'a> OutboxScope<'a> {
    /// Reuses `current` or opens a new outbox.
    pub fn current_or_create(current: Option<&'a mut Outbox>) -> Self {
        match current {
            Some(outbox) => Self::Borrowed(outbox),
            None => Self::Owned(Outbox::new()),
        }
    }

    /// Returns `true` if this scope opened the outbox.
    pub fn is_owner(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    /// Ends the scope. The owner flushes; a borrowed scope leaves flushing to its owner.
    pub async fn release(self) {
        if let Self::Owned(mut outbox) = self {
            outbox.flush().await;
        }
    }
}

impl Deref for OutboxScope<'_> {
    type Target = Outbox;

    fn deref(&self) -> &Outbox {
        match self {
            Self::Borrowed(outbox) => outbox,
            Self::Owned(outbox) => outbox,
        }
    }
}

impl DerefMut for OutboxScope<'_> {
    fn deref_mut(&mut self) -> &mut Outbox {
        match self {
            Self::Borrowed(outbox) => outbox,
            Self::Owned(outbox) => outbox,
        }
    }
}
