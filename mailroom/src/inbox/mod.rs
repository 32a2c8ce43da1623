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

//! The mailbox: a bounded queue plus the worker(s) that drain it.
//!
//! An [`Inbox`] turns concurrent calls into a serialized execution stream for one actor.
//! With a single worker the queue is the only serialization mechanism: exactly one task
//! dequeues and invokes the actor, so no two invocations ever overlap. With more workers
//! each worker owns its own actor instance and they share the queue.
//!
//! Besides the bounded queue every inbox has an unbounded reply lane. Query replies and
//! stream events addressed to an inbox are posted there and run on its worker between
//! messages, so they serialize with the inbox's other work and can never be rejected for
//! capacity.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, instrument, trace, warn};

use crate::actor::MethodInfo;
use crate::common::{Address, InboxState, Lifecycle, Runtime, RuntimeInner, ServiceError};
use crate::message::{Continuation, Envelope, Message, ReplyTask};
use crate::outbox::Outbox;
use crate::traits::{Actor, DeliveryStage, Journal, QueueFullHandler};

pub use builder::InboxBuilder;
pub use full_handler::LogQueueFull;
pub use pipeline::{JournalStage, TraceStage};

/// Defines the builder that assembles and binds inboxes.
mod builder;
/// Defines the default queue-full observer.
mod full_handler;
/// Defines the per-message delivery pipeline.
mod pipeline;
/// Defines the worker loop.
mod worker;

static NEXT_INBOX_ID: AtomicU64 = AtomicU64::new(1);

/// How long an offer may wait for queue space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OfferTimeout {
    /// The inbox's configured offer timeout.
    #[default]
    Default,
    /// At most this long, and never longer than the configured timeout.
    After(Duration),
    /// Wait for space without bound. Used for pinned services, where rejecting a call
    /// from the owning context would deadlock it.
    Unbounded,
}

/// How an inbox shuts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownMode {
    /// Drain queued work, deliver a save request, then stop.
    Graceful,
    /// Stop after the in-flight message; queued work fails with `Closed`.
    Immediate,
}

pub(crate) type ActorFactory = Box<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

/// Where worker actor instances come from.
pub(crate) struct ActorSource {
    first: Mutex<Option<Box<dyn Actor>>>,
    factory: Option<ActorFactory>,
}

impl ActorSource {
    pub(crate) fn single(actor: Box<dyn Actor>) -> Self {
        Self {
            first: Mutex::new(Some(actor)),
            factory: None,
        }
    }

    pub(crate) fn pooled(factory: ActorFactory) -> Self {
        let first = factory();
        Self {
            first: Mutex::new(Some(first)),
            factory: Some(factory),
        }
    }

    fn instance(&self) -> Option<Box<dyn Actor>> {
        let first = self.first.lock().take();
        first.or_else(|| self.factory.as_ref().map(|factory| factory()))
    }

    pub(crate) fn has_factory(&self) -> bool {
        self.factory.is_some()
    }

    /// Name and method table of the actor, read before any worker takes it.
    pub(crate) fn describe(&self) -> (String, Vec<MethodInfo>) {
        match self.first.lock().as_ref() {
            Some(actor) => (actor.name().to_string(), actor.methods()),
            None => (String::new(), Vec::new()),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct InboxConfig {
    pub(crate) capacity: usize,
    pub(crate) initial_size: usize,
    pub(crate) offer_timeout: Duration,
    pub(crate) workers: usize,
    pub(crate) query_timeout: Duration,
    pub(crate) shutdown_timeout: Duration,
    pub(crate) save_timeout: Duration,
    pub(crate) pinned: bool,
}

pub(crate) struct Receivers {
    queue: mpsc::Receiver<Envelope>,
    replies: mpsc::UnboundedReceiver<ReplyTask>,
}

pub(crate) enum Event {
    Envelope(Envelope),
    Reply(ReplyTask),
    Cancelled,
    Closed,
}

struct InboxInner {
    id: u64,
    name: String,
    address: Address,
    bindings: Mutex<Vec<Address>>,
    config: InboxConfig,
    methods: Vec<MethodInfo>,
    sender: mpsc::Sender<Envelope>,
    replies: mpsc::UnboundedSender<ReplyTask>,
    receivers: tokio::sync::Mutex<Receivers>,
    state: Lifecycle,
    source: ActorSource,
    stages: Vec<Arc<dyn DeliveryStage>>,
    journal: Option<Arc<dyn Journal>>,
    full_handler: Arc<dyn QueueFullHandler>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    spawned: AtomicUsize,
    runtime: Weak<RuntimeInner>,
}

pub(crate) struct InboxParts {
    pub(crate) address: Address,
    pub(crate) config: InboxConfig,
    pub(crate) source: ActorSource,
    pub(crate) stages: Vec<Arc<dyn DeliveryStage>>,
    pub(crate) journal: Option<Arc<dyn Journal>>,
    pub(crate) full_handler: Arc<dyn QueueFullHandler>,
    pub(crate) runtime: Weak<RuntimeInner>,
}

/// Handle to one mailbox. Clones share the same queue and workers.
#[derive(Clone)]
pub struct Inbox {
    inner: Arc<InboxInner>,
}

impl Inbox {
    pub(crate) fn new(parts: InboxParts) -> Self {
        let (sender, queue) = mpsc::channel(parts.config.capacity);
        let (replies, reply_queue) = mpsc::unbounded_channel();
        let (name, methods) = parts.source.describe();
        Self {
            inner: Arc::new(InboxInner {
                id: NEXT_INBOX_ID.fetch_add(1, Ordering::Relaxed),
                name,
                address: parts.address,
                bindings: Mutex::new(Vec::new()),
                config: parts.config,
                methods,
                sender,
                replies,
                receivers: tokio::sync::Mutex::new(Receivers {
                    queue,
                    replies: reply_queue,
                }),
                state: Lifecycle::new(),
                source: parts.source,
                stages: parts.stages,
                journal: parts.journal,
                full_handler: parts.full_handler,
                tracker: TaskTracker::new(),
                cancel: CancellationToken::new(),
                spawned: AtomicUsize::new(0),
                runtime: parts.runtime,
            }),
        }
    }

    /// Process-unique identity of the inbox.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The address the inbox was built with.
    pub fn address(&self) -> Address {
        self.inner.address.clone()
    }

    /// The actor's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> InboxState {
        self.inner.state.get()
    }

    /// `true` once shutdown has begun; no offer succeeds after that.
    pub fn is_closed(&self) -> bool {
        !self.state().accepts_messages()
    }

    /// Bounded queue capacity.
    pub fn capacity(&self) -> usize {
        self.inner.config.capacity
    }

    /// The initial allocation hint the inbox was configured with.
    pub fn initial_size(&self) -> usize {
        self.inner.config.initial_size
    }

    /// Messages currently queued, including reserved slots.
    pub fn depth(&self) -> usize {
        self.inner.sender.max_capacity() - self.inner.sender.capacity()
    }

    pub fn workers(&self) -> usize {
        self.inner.config.workers
    }

    /// The configured offer timeout.
    pub fn offer_timeout(&self) -> Duration {
        self.inner.config.offer_timeout
    }

    /// Whether calls wait for queue space without a bound.
    pub fn is_pinned(&self) -> bool {
        self.inner.config.pinned
    }

    /// The durability journal, if the inbox has one.
    pub fn journal(&self) -> Option<&Arc<dyn Journal>> {
        self.inner.journal.as_ref()
    }

    /// Method metadata exposed by the actor.
    pub fn methods(&self) -> &[MethodInfo] {
        &self.inner.methods
    }

    /// Every address this inbox is currently registered under.
    pub fn bindings(&self) -> Vec<Address> {
        self.inner.bindings.lock().clone()
    }

    pub(crate) fn method_info(&self, name: &str) -> Option<MethodInfo> {
        if self.inner.methods.is_empty() {
            return Some(MethodInfo::dynamic(name));
        }
        self.inner
            .methods
            .iter()
            .find(|info| info.name() == name)
            .cloned()
    }

    pub(crate) fn runtime(&self) -> Option<Runtime> {
        self.inner.runtime.upgrade().map(Runtime::from_inner)
    }

    pub(crate) fn query_timeout(&self) -> Duration {
        self.inner.config.query_timeout
    }

    pub(crate) fn record_binding(&self, address: &Address) {
        let mut bindings = self.inner.bindings.lock();
        if !bindings.contains(address) {
            bindings.push(address.clone());
        }
    }

    /// Moves `Configured → Ready`. Returns `false` if the inbox was already initialised.
    pub fn init(&self) -> bool {
        self.inner
            .state
            .transition(InboxState::Configured, InboxState::Ready)
    }

    /// Starts the workers. Idempotent while the inbox is accepting.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Closed`] after shutdown began; [`ServiceError::InvalidConfig`] when
    /// called outside a Tokio runtime.
    #[instrument(skip(self), fields(address = %self.inner.address))]
    pub fn start(&self) -> Result<(), ServiceError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            ServiceError::InvalidConfig("starting an inbox requires a Tokio runtime".to_string())
        })?;
        self.init();
        if !self
            .inner
            .state
            .transition(InboxState::Ready, InboxState::Accepting)
        {
            return match self.state() {
                InboxState::Accepting => Ok(()),
                _ => Err(ServiceError::closed(&self.inner.address)),
            };
        }
        self.spawn_workers(&handle);
        Ok(())
    }

    fn spawn_workers(&self, handle: &tokio::runtime::Handle) {
        for index in 0..self.inner.config.workers {
            let Some(actor) = self.inner.source.instance() else {
                warn!(index, "no actor instance available for worker");
                break;
            };
            self.inner.spawned.fetch_add(1, Ordering::AcqRel);
            self.inner
                .tracker
                .spawn_on(worker::run(self.clone(), index, actor), handle);
        }
        trace!(
            workers = self.inner.spawned.load(Ordering::Acquire),
            "inbox workers started"
        );
    }

    /// Enqueues a message, waiting up to the resolved timeout for space.
    ///
    /// On failure the message's own continuation (or stream) receives the error, and the
    /// same error is returned for the caller's information.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Closed`] if the inbox is shutting down, [`ServiceError::QueueFull`] if
    /// no space opened up in time.
    pub async fn offer(&self, message: Message, timeout: OfferTimeout) -> Result<(), ServiceError> {
        if self.is_closed() {
            return Err(self.reject_closed(message));
        }

        let configured = self.inner.config.offer_timeout;
        let wait = match timeout {
            OfferTimeout::Default => Some(configured),
            OfferTimeout::After(limit) => Some(limit.min(configured)),
            OfferTimeout::Unbounded => None,
        };

        let sender = &self.inner.sender;
        let permit = match wait {
            Some(wait) if wait.is_zero() => match sender.try_reserve() {
                Ok(permit) => permit,
                Err(TrySendError::Full(())) => return Err(self.reject_full(message, wait)),
                Err(TrySendError::Closed(())) => return Err(self.reject_closed(message)),
            },
            Some(wait) => match tokio::time::timeout(wait, sender.reserve()).await {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(self.reject_closed(message)),
                Err(_) => return Err(self.reject_full(message, wait)),
            },
            None => match sender.reserve().await {
                Ok(permit) => permit,
                Err(_) => return Err(self.reject_closed(message)),
            },
        };

        trace!(address = %self.inner.address, message = %message, "enqueued");
        permit.send(Envelope::Deliver(message));
        Ok(())
    }

    fn reject_closed(&self, message: Message) -> ServiceError {
        let error = ServiceError::closed(&self.inner.address);
        message.fail(error.clone());
        error
    }

    fn reject_full(&self, message: Message, waited: Duration) -> ServiceError {
        let depth = self.depth();
        self.inner
            .full_handler
            .on_queue_full(&self.inner.address, depth, waited, &message);
        let error = ServiceError::QueueFull {
            address: self.inner.address.to_string(),
            depth,
            timeout: waited,
        };
        message.fail(error.clone());
        error
    }

    /// Asks the actor to save its state and, for journalled inboxes, checkpoints the journal.
    ///
    /// # Errors
    ///
    /// The actor's save error, [`ServiceError::Closed`] after shutdown began, or
    /// [`ServiceError::QueueFull`] if the request could not be queued in time.
    pub async fn save(&self) -> Result<(), ServiceError> {
        if self.is_closed() {
            return Err(ServiceError::closed(&self.inner.address));
        }
        let (result, pending) = Continuation::channel();
        let send = self.inner.sender.send(Envelope::Save(result));
        match tokio::time::timeout(self.inner.config.save_timeout, send).await {
            Ok(Ok(())) => pending.wait().await,
            Ok(Err(_)) => Err(ServiceError::closed(&self.inner.address)),
            Err(_) => Err(ServiceError::QueueFull {
                address: self.inner.address.to_string(),
                depth: self.depth(),
                timeout: self.inner.config.save_timeout,
            }),
        }
    }

    /// Shuts the inbox down. Terminal and idempotent.
    ///
    /// Graceful shutdown lets the workers drain everything queued before it, delivers a
    /// save request (its failure is only logged) and waits up to the configured shutdown
    /// timeout before falling back to cancellation. Immediate shutdown cancels the workers
    /// after their in-flight message. Either way, whatever is still queued afterwards fails
    /// with [`ServiceError::Closed`] and the inbox is removed from the runtime registry.
    #[instrument(skip(self), fields(address = %self.inner.address))]
    pub async fn shutdown(&self, mode: ShutdownMode) {
        let previous = self.inner.state.begin_stopping();
        if previous >= InboxState::Stopping {
            trace!("shutdown already in progress");
            self.inner.tracker.wait().await;
            return;
        }

        if previous < InboxState::Accepting && mode == ShutdownMode::Graceful {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                self.spawn_workers(&handle);
            }
        }

        match mode {
            ShutdownMode::Graceful => self.stop_gracefully().await,
            ShutdownMode::Immediate => {
                self.inner.cancel.cancel();
                self.inner.tracker.close();
                self.inner.tracker.wait().await;
            }
        }

        self.inner.state.close();
        self.drain().await;
        if let Some(runtime) = self.runtime() {
            runtime.unregister(self);
        }
        debug!("inbox closed");
    }

    async fn stop_gracefully(&self) {
        let address = self.address();
        let save = Continuation::new(move |result: Result<(), ServiceError>| {
            if let Err(error) = result {
                warn!(%address, "save before shutdown failed: {}", error);
            }
        });
        let workers = self.inner.spawned.load(Ordering::Acquire);
        let sender = &self.inner.sender;
        let tracker = &self.inner.tracker;
        let stop = async move {
            if sender.send(Envelope::Save(save)).await.is_ok() {
                for _ in 0..workers {
                    if sender.send(Envelope::Stop).await.is_err() {
                        break;
                    }
                }
            }
            tracker.close();
            tracker.wait().await;
        };
        if tokio::time::timeout(self.inner.config.shutdown_timeout, stop)
            .await
            .is_err()
        {
            warn!("graceful shutdown timed out; cancelling workers");
            self.inner.cancel.cancel();
            self.inner.tracker.close();
            self.inner.tracker.wait().await;
        }
    }

    /// Fails everything left in the queue and runs leftover reply tasks inline.
    async fn drain(&self) {
        let mut outbox = Outbox::new();
        let mut dropped = 0usize;
        {
            let mut receivers = self.inner.receivers.lock().await;
            receivers.queue.close();
            while let Ok(envelope) = receivers.queue.try_recv() {
                match envelope {
                    Envelope::Deliver(message) => {
                        dropped += 1;
                        message.fail_in(ServiceError::closed(&self.inner.address), Some(&mut outbox));
                    }
                    Envelope::Save(result) => {
                        result.complete_in(Err(ServiceError::closed(&self.inner.address)), &mut outbox);
                    }
                    Envelope::Stop => {}
                }
            }
            while let Ok(task) = receivers.replies.try_recv() {
                task(&mut outbox);
            }
        }
        if dropped > 0 {
            debug!(dropped, "queued messages failed on shutdown");
        }
        outbox.flush().await;
    }

    /// Posts a task to the reply lane. Hands the task back if the inbox is closed.
    pub(crate) fn post_reply(&self, task: ReplyTask) -> Result<(), ReplyTask> {
        if self.state() == InboxState::Closed {
            return Err(task);
        }
        self.inner.replies.send(task).map_err(|error| error.0)
    }

    /// Waits for the next reply task or queued envelope. Reply tasks go first.
    pub(crate) async fn next_event(&self) -> Event {
        let mut guard = self.inner.receivers.lock().await;
        let receivers = &mut *guard;
        tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => Event::Cancelled,
            Some(task) = receivers.replies.recv() => Event::Reply(task),
            envelope = receivers.queue.recv() => match envelope {
                Some(envelope) => Event::Envelope(envelope),
                None => Event::Closed,
            },
        }
    }
}

impl PartialEq for Inbox {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Inbox {}

impl fmt::Debug for Inbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbox")
            .field("id", &self.inner.id)
            .field("address", &self.inner.address)
            .field("state", &self.state())
            .field("depth", &self.depth())
            .field("workers", &self.inner.config.workers)
            .finish()
    }
}
