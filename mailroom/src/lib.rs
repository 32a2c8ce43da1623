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

#![forbid(unsafe_code)]
//! Mailroom
//!
//! The dispatch core of an actor runtime: addressable services, the mailboxes that
//! serialize calls into them, and the handles and envelopes callers use to reach them.
//!
//! A service is an [`Actor`](prelude::Actor) bound into an inbox at an address. Callers
//! resolve a [`ServiceRef`](prelude::ServiceRef), pick a [`MethodRef`](prelude::MethodRef)
//! by name and issue one of three call shapes through an [`Outbox`](prelude::Outbox):
//! `send` (fire-and-forget), `query` (one reply through a
//! [`Continuation`](prelude::Continuation)) or `stream` (many values, then completion).

use static_assertions::assert_impl_all;

/// Common utilities: addresses, errors, configuration and the runtime registry.
pub(crate) mod common;

/// Actor helpers: method metadata and closure-built services.
pub(crate) mod actor;
/// Mailboxes, their workers and delivery pipelines.
pub(crate) mod inbox;
/// Durable call journals.
pub(crate) mod journal;
pub(crate) mod message;
/// Batches of outgoing calls.
pub(crate) mod outbox;
/// Service and method handles.
pub(crate) mod service;
/// Trait definitions at the extension points of the dispatch core.
pub(crate) mod traits;

/// Prelude module for convenient imports.
///
/// Re-exports the public types of every module, the `#[mailroom_service]` attribute, the
/// `async_trait` attribute used to implement [`Actor`](prelude::Actor) by hand, and
/// `serde_json`'s `json!` and `Value`.
pub mod prelude {
    pub use async_trait::async_trait;
    pub use mailroom_macro::mailroom_service;
    pub use serde_json::{json, Value};

    pub use crate::actor::{MethodInfo, ParamInfo, ServiceDef};
    pub use crate::common::{
        Address, BehaviorSection, Headers, InboxSection, InboxState, JournalSection,
        MailroomApp, MailroomConfig, QuerySection, Runtime, ServiceError, ShutdownSection,
        CONFIG,
    };
    pub use crate::inbox::{
        Inbox, InboxBuilder, JournalStage, LogQueueFull, OfferTimeout, ShutdownMode, TraceStage,
    };
    pub use crate::journal::{FileJournal, JournalEntry, MemoryJournal};
    pub use crate::message::{
        Call, Continuation, Message, MessageKind, Pending, Reply, ResultStream, StreamReceiver,
        StreamSink,
    };
    pub use crate::outbox::{Outbox, OutboxScope};
    pub use crate::service::{MethodRef, ServiceRef, SpanContext};
    pub use crate::traits::{
        Actor, ContextGuard, DeliveryStage, ExecutionContext, Journal, QueueFullHandler,
    };
}

assert_impl_all!(service::ServiceRef: Send, Sync, Clone);
assert_impl_all!(service::MethodRef: Send, Sync, Clone);
assert_impl_all!(inbox::Inbox: Send, Sync, Clone);
assert_impl_all!(outbox::Outbox: Send);
assert_impl_all!(message::Continuation<serde_json::Value>: Send);
assert_impl_all!(common::Runtime: Send, Sync, Clone);
