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
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use tracing::{debug, instrument, trace};

use crate::common::{Address, MailroomConfig, ServiceError};
use crate::inbox::{Inbox, InboxBuilder, ShutdownMode};
use crate::outbox::Outbox;
use crate::service::ServiceRef;
use crate::traits::Actor;

pub(crate) struct RuntimeInner {
    registry: DashMap<Address, Inbox>,
    inboxes: DashMap<u64, Inbox>,
    config: MailroomConfig,
}

/// The registry and factory for services.
///
/// Maps each address to at most one bound inbox, creates [`InboxBuilder`]s and resolves
/// addresses into [`ServiceRef`]s. Clones share the same registry.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    pub(crate) fn new(config: MailroomConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                registry: DashMap::new(),
                inboxes: DashMap::new(),
                config,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<RuntimeInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<RuntimeInner> {
        Arc::downgrade(&self.inner)
    }

    /// The configuration this runtime was launched with.
    pub fn config(&self) -> &MailroomConfig {
        &self.inner.config
    }

    /// Starts building a service around a single actor instance.
    pub fn new_service<A: Actor>(&self, actor: A) -> InboxBuilder {
        InboxBuilder::new(self.clone(), Box::new(actor))
    }

    /// Starts building a pooled service; every worker gets its own instance from `factory`.
    pub fn new_pool<A, F>(&self, factory: F) -> InboxBuilder
    where
        A: Actor,
        F: Fn() -> A + Send + Sync + 'static,
    {
        InboxBuilder::pooled(self.clone(), Box::new(move || Box::new(factory()) as Box<dyn Actor>))
    }

    /// Binds `actor` as an anonymous, pinned service.
    ///
    /// Calls through the returned handle wait for queue space without a bound, so a context
    /// that owns the service can never be rejected by its own backpressure.
    ///
    /// # Errors
    ///
    /// Returns the builder's error when the inbox cannot be started.
    pub fn pin<A: Actor>(&self, actor: A) -> Result<ServiceRef, ServiceError> {
        self.new_service(actor).pinned().build()
    }

    /// The service bound at `address`, or a not-found placeholder.
    ///
    /// Never fails: an unbound address yields a handle whose calls fail with
    /// [`ServiceError::NotFound`], and an unparseable one a handle failing with
    /// [`ServiceError::InvalidAddress`].
    pub fn service(&self, address: &str) -> ServiceRef {
        match Address::parse(address) {
            Ok(address) => self
                .resolve(&address)
                .unwrap_or_else(|| ServiceRef::not_found(address)),
            Err(error) => ServiceRef::failed(Address::verbatim(address), error),
        }
    }

    /// The service bound at `address`, if any.
    pub fn lookup(&self, address: &str) -> Option<ServiceRef> {
        Address::parse(address)
            .ok()
            .and_then(|address| self.resolve(&address))
    }

    /// A forward reference to `address`, resolved against the registry on first use and
    /// re-resolved for as long as nothing open is bound there.
    pub fn lazy(&self, address: &str) -> ServiceRef {
        let address = match Address::parse(address) {
            Ok(address) => address,
            Err(error) => return ServiceRef::failed(Address::verbatim(address), error),
        };
        let registry = self.downgrade();
        let target = address.clone();
        ServiceRef::lazy(address, move || {
            let runtime = Runtime::from_inner(registry.upgrade()?);
            runtime.resolve(&target)
        })
    }

    /// Registers `service` under an additional address. See [`ServiceRef::bind`].
    pub fn bind(&self, service: &ServiceRef, address: &str) -> ServiceRef {
        service.bind(address)
    }

    /// A fresh outbox for issuing calls from outside any worker.
    pub fn outbox(&self) -> Outbox {
        Outbox::new()
    }

    /// Number of open inboxes created through this runtime, registered or anonymous.
    pub fn service_count(&self) -> usize {
        self.inner.inboxes.len()
    }

    /// Shuts every inbox down concurrently.
    #[instrument(skip(self))]
    pub async fn shutdown_all(&self, mode: ShutdownMode) {
        let inboxes: Vec<Inbox> = self
            .inner
            .inboxes
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        debug!(count = inboxes.len(), "shutting down all services");
        join_all(inboxes.iter().map(|inbox| inbox.shutdown(mode))).await;
    }

    fn resolve(&self, address: &Address) -> Option<ServiceRef> {
        let inbox = self.inner.registry.get(address)?.value().clone();
        let pinned = inbox.is_pinned();
        (!inbox.is_closed()).then(|| ServiceRef::local(inbox, address.clone(), pinned))
    }

    /// Binds `inbox` at `address`.
    ///
    /// Re-binding the same inbox is a no-op and a closed occupant is replaced; any other
    /// occupant is a [`ServiceError::Conflict`]. A closed inbox cannot be registered.
    pub(crate) fn register(&self, inbox: &Inbox, address: &Address) -> Result<(), ServiceError> {
        if inbox.is_closed() {
            return Err(ServiceError::closed(inbox.address()));
        }
        match self.inner.registry.entry(address.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get() != inbox {
                    if !entry.get().is_closed() {
                        return Err(ServiceError::Conflict {
                            address: address.to_string(),
                        });
                    }
                    entry.insert(inbox.clone());
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(inbox.clone());
            }
        }
        inbox.record_binding(address);
        self.track(inbox);
        trace!(%address, inbox = inbox.id(), "registered");
        Ok(())
    }

    pub(crate) fn track(&self, inbox: &Inbox) {
        self.inner.inboxes.insert(inbox.id(), inbox.clone());
    }

    /// Removes every registration of `inbox`.
    pub(crate) fn unregister(&self, inbox: &Inbox) {
        for address in inbox.bindings() {
            self.inner
                .registry
                .remove_if(&address, |_, bound| bound == inbox);
        }
        self.inner.inboxes.remove(&inbox.id());
        trace!(inbox = inbox.id(), "unregistered");
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("bound", &self.inner.registry.len())
            .field("inboxes", &self.inner.inboxes.len())
            .finish()
    }
}
