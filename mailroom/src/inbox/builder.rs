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

use tracing::{debug, instrument};

use super::{ActorFactory, ActorSource, Inbox, InboxConfig, InboxParts, LogQueueFull};
use crate::common::{Address, Runtime, ServiceError};
use crate::inbox::{JournalStage, TraceStage};
use crate::journal::FileJournal;
use crate::service::ServiceRef;
use crate::traits::{Actor, DeliveryStage, ExecutionContext, Journal, QueueFullHandler};

enum JournalChoice {
    Named { name: String, flush_delay: Duration },
    Custom(Arc<dyn Journal>),
}

/// Assembles an actor and its delivery policy into a bound inbox.
///
/// Obtained from [`Runtime::new_service`], [`Runtime::new_pool`] or [`Runtime::pin`].
/// Defaults come from the runtime's configuration; every `with_*` call overrides one of them.
///
/// # Example
///
/// ```rust,ignore
/// let echo = runtime
///     .new_service(Echo::default())
///     .with_address("/echo")
///     .with_capacity(64)
///     .build()?;
/// ```
pub struct InboxBuilder {
    runtime: Runtime,
    source: ActorSource,
    address: Option<String>,
    anonymous: bool,
    pinned: bool,
    capacity: usize,
    initial_size: usize,
    offer_timeout: Duration,
    workers: usize,
    query_timeout: Duration,
    journal: Option<JournalChoice>,
    auto_start: bool,
    trace: bool,
    full_handler: Arc<dyn QueueFullHandler>,
    stages: Vec<Arc<dyn DeliveryStage>>,
    context: Option<Arc<dyn ExecutionContext>>,
}

impl InboxBuilder {
    pub(crate) fn new(runtime: Runtime, actor: Box<dyn Actor>) -> Self {
        Self::from_source(runtime, ActorSource::single(actor))
    }

    pub(crate) fn pooled(runtime: Runtime, factory: ActorFactory) -> Self {
        Self::from_source(runtime, ActorSource::pooled(factory))
    }

    fn from_source(runtime: Runtime, source: ActorSource) -> Self {
        let config = runtime.config();
        let (capacity, initial_size, offer_timeout, workers, query_timeout, auto_start, trace) = (
            config.inbox.capacity,
            config.inbox.initial_size,
            config.offer_timeout(),
            config.inbox.workers,
            config.query_timeout(),
            config.behavior.auto_start,
            config.behavior.trace_deliveries,
        );
        let workers = if source.has_factory() { workers } else { 1 };
        Self {
            runtime,
            source,
            address: None,
            anonymous: false,
            pinned: false,
            capacity,
            initial_size,
            offer_timeout,
            workers,
            query_timeout,
            journal: None,
            auto_start,
            trace,
            full_handler: Arc::new(LogQueueFull),
            stages: Vec::new(),
            context: None,
        }
    }

    /// Binds at this address instead of the conventional `local:///<name>`.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Skips registration; the service is reachable only through the returned handle.
    #[must_use]
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    /// Marks the service as pinned: calls made through its handle wait for queue space
    /// without a bound.
    #[must_use]
    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_initial_size(mut self, initial_size: usize) -> Self {
        self.initial_size = initial_size;
        self
    }

    /// How long offers wait for space. Zero makes a full queue reject immediately.
    #[must_use]
    pub fn with_offer_timeout(mut self, timeout: Duration) -> Self {
        self.offer_timeout = timeout;
        self
    }

    /// Number of workers. Values above one need a pool built with [`Runtime::new_pool`].
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Default timeout for queries issued against this service without an explicit one.
    #[must_use]
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Journals every call to a file named after `name` in the configured journal
    /// directory.
    #[must_use]
    pub fn with_journal(mut self, name: impl Into<String>, flush_delay: Duration) -> Self {
        self.journal = Some(JournalChoice::Named {
            name: name.into(),
            flush_delay,
        });
        self
    }

    /// Journals every call to a caller-supplied journal.
    #[must_use]
    pub fn with_journal_store(mut self, journal: Arc<dyn Journal>) -> Self {
        self.journal = Some(JournalChoice::Custom(journal));
        self
    }

    #[must_use]
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Adds the [`TraceStage`] to the pipeline.
    #[must_use]
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    #[must_use]
    pub fn with_queue_full_handler(mut self, handler: Arc<dyn QueueFullHandler>) -> Self {
        self.full_handler = handler;
        self
    }

    /// Appends a custom stage after the built-in ones.
    #[must_use]
    pub fn with_stage(mut self, stage: Arc<dyn DeliveryStage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Wraps the returned handle so every call runs inside `context`.
    #[must_use]
    pub fn with_context(mut self, context: Arc<dyn ExecutionContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Builds the inbox, registers it and, with auto-start, starts its workers.
    ///
    /// A registration conflict is not an error here: the returned handle is permanently
    /// failed and reports the conflict on every call.
    ///
    /// # Errors
    ///
    /// Contract violations only: zero capacity or workers, a multi-worker inbox without a
    /// factory, a journal on a multi-worker inbox, an invalid address, an unopenable
    /// journal, or auto-start outside a Tokio runtime.
    #[instrument(skip(self))]
    pub fn build(self) -> Result<ServiceRef, ServiceError> {
        if self.capacity == 0 {
            return Err(ServiceError::InvalidConfig(
                "inbox capacity must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(ServiceError::InvalidConfig(
                "an inbox needs at least one worker".to_string(),
            ));
        }
        if self.workers > 1 && !self.source.has_factory() {
            return Err(ServiceError::InvalidConfig(format!(
                "{} workers need an actor factory",
                self.workers
            )));
        }
        if self.workers > 1 && self.journal.is_some() {
            return Err(ServiceError::InvalidConfig(
                "a journalled inbox must have exactly one worker".to_string(),
            ));
        }

        let (name, _) = self.source.describe();
        let address = match (&self.address, self.anonymous || self.pinned) {
            (Some(raw), _) => Address::parse(raw)?,
            (None, true) => Address::anonymous(&name),
            (None, false) => Address::local(&name),
        };

        let journal: Option<Arc<dyn Journal>> = match self.journal {
            Some(JournalChoice::Named { name, flush_delay }) => {
                let directory = self.runtime.config().journal_directory();
                let journal = FileJournal::open(&directory, &name, flush_delay)
                    .map_err(|e| ServiceError::InvalidConfig(format!("{e:#}")))?;
                Some(Arc::new(journal))
            }
            Some(JournalChoice::Custom(journal)) => Some(journal),
            None => None,
        };

        let mut stages: Vec<Arc<dyn DeliveryStage>> = Vec::new();
        if let Some(journal) = &journal {
            stages.push(Arc::new(JournalStage::new(Arc::clone(journal), address.clone())));
        }
        if self.trace {
            stages.push(Arc::new(TraceStage));
        }
        stages.extend(self.stages);

        let config = self.runtime.config();
        let inbox = Inbox::new(InboxParts {
            address: address.clone(),
            config: InboxConfig {
                capacity: self.capacity,
                initial_size: self.initial_size.min(self.capacity),
                offer_timeout: self.offer_timeout,
                workers: self.workers,
                query_timeout: self.query_timeout,
                shutdown_timeout: config.shutdown_timeout(),
                save_timeout: config.save_timeout(),
                pinned: self.pinned,
            },
            source: self.source,
            stages,
            journal,
            full_handler: self.full_handler,
            runtime: self.runtime.downgrade(),
        });

        if self.anonymous || self.pinned {
            self.runtime.track(&inbox);
        } else if let Err(conflict) = self.runtime.register(&inbox, &address) {
            debug!(%address, "registration conflict");
            return Ok(ServiceRef::failed(address, conflict));
        }

        if self.auto_start {
            if let Err(error) = inbox.start() {
                self.runtime.unregister(&inbox);
                return Err(error);
            }
        }

        let service = ServiceRef::local(inbox, address, self.pinned);
        Ok(match self.context {
            Some(context) => service.with_context(context),
            None => service,
        })
    }
}

impl fmt::Debug for InboxBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboxBuilder")
            .field("address", &self.address)
            .field("capacity", &self.capacity)
            .field("workers", &self.workers)
            .field("offer_timeout", &self.offer_timeout)
            .field("journal", &self.journal.is_some())
            .field("auto_start", &self.auto_start)
            .finish()
    }
}
