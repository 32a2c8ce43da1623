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

use tracing::{debug, instrument, trace};

use super::lazy_slot::LazySlot;
use super::MethodRef;
use crate::actor::MethodInfo;
use crate::common::{Address, ServiceError};
use crate::inbox::{Inbox, ShutdownMode};
use crate::traits::ExecutionContext;

type ServiceFactory = Arc<dyn Fn() -> Option<ServiceRef> + Send + Sync>;

enum ServiceKind {
    Local {
        inbox: Inbox,
        address: Address,
        pinned: bool,
    },
    Alias {
        address: Address,
        target: ServiceRef,
    },
    Lazy {
        address: Address,
        factory: ServiceFactory,
        slot: LazySlot<ServiceRef>,
    },
    Failed {
        address: Address,
        error: ServiceError,
    },
    NotFound {
        address: Address,
    },
    Context {
        context: Arc<dyn ExecutionContext>,
        target: ServiceRef,
    },
}

/// A handle to a named, possibly not yet resolved, service.
///
/// Cheap to clone. Every variant answers every operation: a handle that can never work
/// (not found, registration conflict) fails each call with its cause instead of failing at
/// lookup time.
#[derive(Clone)]
pub struct ServiceRef(Arc<ServiceKind>);

impl ServiceRef {
    pub(crate) fn local(inbox: Inbox, address: Address, pinned: bool) -> Self {
        Self(Arc::new(ServiceKind::Local {
            inbox,
            address,
            pinned,
        }))
    }

    pub(crate) fn failed(address: Address, error: ServiceError) -> Self {
        Self(Arc::new(ServiceKind::Failed { address, error }))
    }

    pub(crate) fn not_found(address: Address) -> Self {
        Self(Arc::new(ServiceKind::NotFound { address }))
    }

    /// A forward reference: `factory` is consulted on each use until it yields an open
    /// service, which is then cached for good.
    pub fn lazy(
        address: Address,
        factory: impl Fn() -> Option<ServiceRef> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(ServiceKind::Lazy {
            address,
            factory: Arc::new(factory),
            slot: LazySlot::new(),
        }))
    }

    /// Exposes `target` under `address`. Nested lookups are rewritten to stay under the
    /// alias.
    pub fn alias(address: Address, target: ServiceRef) -> Self {
        Self(Arc::new(ServiceKind::Alias { address, target }))
    }

    /// Wraps the handle so every call made through it runs inside `context`.
    #[must_use]
    pub fn with_context(self, context: Arc<dyn ExecutionContext>) -> Self {
        Self(Arc::new(ServiceKind::Context {
            context,
            target: self,
        }))
    }

    /// The address this handle was resolved or created under.
    pub fn address(&self) -> &Address {
        match &*self.0 {
            ServiceKind::Local { address, .. }
            | ServiceKind::Alias { address, .. }
            | ServiceKind::Lazy { address, .. }
            | ServiceKind::Failed { address, .. }
            | ServiceKind::NotFound { address } => address,
            ServiceKind::Context { target, .. } => target.address(),
        }
    }

    /// The resolved delegate of a lazy handle, resolving it now if possible.
    ///
    /// Other variants return themselves, or the handle they wrap.
    pub(crate) fn delegate(&self) -> Option<ServiceRef> {
        match &*self.0 {
            ServiceKind::Lazy { factory, slot, .. } => slot
                .get_or_try_init(|| {
                    let resolved = factory()?;
                    if resolved.is_closed() {
                        trace!(address = %resolved.address(), "lazy delegate closed; retrying later");
                        return None;
                    }
                    debug!(address = %resolved.address(), "lazy service resolved");
                    Some(resolved)
                })
                .cloned(),
            ServiceKind::Alias { target, .. } | ServiceKind::Context { target, .. } => {
                Some(target.clone())
            }
            _ => Some(self.clone()),
        }
    }

    /// The bound inbox, resolving lazy handles on the way.
    pub fn inbox(&self) -> Option<Inbox> {
        match &*self.0 {
            ServiceKind::Local { inbox, .. } => Some(inbox.clone()),
            ServiceKind::Alias { target, .. } | ServiceKind::Context { target, .. } => {
                target.inbox()
            }
            ServiceKind::Lazy { .. } => self.delegate()?.inbox(),
            ServiceKind::Failed { .. } | ServiceKind::NotFound { .. } => None,
        }
    }

    /// `true` once the handle can never be used again: its inbox shut down, or it carries
    /// a permanent failure. Unresolved handles are not closed.
    pub fn is_closed(&self) -> bool {
        match &*self.0 {
            ServiceKind::Local { inbox, .. } => inbox.is_closed(),
            ServiceKind::Alias { target, .. } | ServiceKind::Context { target, .. } => {
                target.is_closed()
            }
            ServiceKind::Lazy { slot, .. } => slot.get().is_some_and(ServiceRef::is_closed),
            ServiceKind::Failed { .. } => true,
            ServiceKind::NotFound { .. } => false,
        }
    }

    /// `true` when the handle resolves to an open inbox.
    pub fn is_up(&self) -> bool {
        self.inbox().is_some_and(|inbox| !inbox.is_closed())
    }

    /// Method metadata of the resolved service.
    pub fn methods(&self) -> Vec<MethodInfo> {
        self.inbox()
            .map(|inbox| inbox.methods().to_vec())
            .unwrap_or_default()
    }

    /// The error every call through this handle would fail with right now, if any.
    pub(crate) fn failure(&self, operation: &str) -> Option<ServiceError> {
        match &*self.0 {
            ServiceKind::Failed { error, .. } => Some(error.clone()),
            ServiceKind::NotFound { address } => Some(ServiceError::NotFound {
                address: address.to_string(),
                method: operation.to_string(),
            }),
            _ => None,
        }
    }

    /// Resolves a method by name. Never fails here: problems surface on first use of the
    /// returned handle.
    pub fn method(&self, name: &str) -> MethodRef {
        match &*self.0 {
            ServiceKind::Local { inbox, pinned, .. } => match inbox.method_info(name) {
                Some(info) => MethodRef::direct(self.clone(), inbox.clone(), info, *pinned),
                None => MethodRef::not_found(
                    name,
                    ServiceError::method_not_found(self.address(), name),
                ),
            },
            ServiceKind::Alias { target, .. } => target.method(name),
            ServiceKind::Lazy { .. } => MethodRef::lazy(self.clone(), name),
            ServiceKind::Failed { error, .. } => MethodRef::failed(name, error.clone()),
            ServiceKind::NotFound { address } => MethodRef::not_found(
                name,
                ServiceError::NotFound {
                    address: address.to_string(),
                    method: name.to_string(),
                },
            ),
            ServiceKind::Context { context, target } => {
                let _guard = context.enter();
                target.method(name).with_context(Arc::clone(context))
            }
        }
    }

    /// The sub-resource at `sub_path` below this service.
    pub fn service(&self, sub_path: &str) -> ServiceRef {
        if let ServiceKind::Lazy { address, .. } = &*self.0 {
            let parent = self.clone();
            let path = sub_path.to_string();
            return ServiceRef::lazy(address.join(sub_path), move || parent.on_lookup(&path));
        }
        if let Some(found) = self.on_lookup(sub_path) {
            return found;
        }
        let address = self.address().join(sub_path);
        match &*self.0 {
            ServiceKind::Failed { error, .. } => ServiceRef::failed(address, error.clone()),
            _ => ServiceRef::not_found(address),
        }
    }

    /// Looks up `path` below this service, or `None` if nothing open is bound there.
    pub fn on_lookup(&self, path: &str) -> Option<ServiceRef> {
        match &*self.0 {
            ServiceKind::Local { inbox, address, .. } => {
                let runtime = inbox.runtime()?;
                runtime.lookup(address.join(path).as_str())
            }
            ServiceKind::Alias { address, target } => {
                let found = target.on_lookup(path)?;
                Some(ServiceRef::alias(address.join(path), found))
            }
            ServiceKind::Lazy { .. } => self.delegate()?.on_lookup(path),
            ServiceKind::Context { context, target } => {
                let found = {
                    let _guard = context.enter();
                    target.on_lookup(path)?
                };
                Some(found.with_context(Arc::clone(context)))
            }
            ServiceKind::Failed { .. } | ServiceKind::NotFound { .. } => None,
        }
    }

    /// Registers this handle's inbox under another address.
    ///
    /// Never fails here. If the address is owned by a different open inbox the returned
    /// handle is permanently closed and every call through it fails with the
    /// [`ServiceError::Conflict`]. Binding a shut-down service yields a handle failing with
    /// [`ServiceError::Closed`].
    #[instrument(skip(self), fields(service = %self.address()))]
    pub fn bind(&self, address: &str) -> ServiceRef {
        let address = match Address::parse(address) {
            Ok(address) => address,
            Err(error) => return ServiceRef::failed(Address::verbatim(address), error),
        };
        let Some(inbox) = self.inbox() else {
            let error = self
                .failure("bind")
                .unwrap_or_else(|| ServiceError::closed(self.address()));
            return ServiceRef::failed(address, error);
        };
        let Some(runtime) = inbox.runtime() else {
            return ServiceRef::failed(address, ServiceError::closed(self.address()));
        };
        match runtime.register(&inbox, &address) {
            Ok(()) => {
                let bound = ServiceRef::local(inbox, address, self.is_pinned());
                match &*self.0 {
                    ServiceKind::Context { context, .. } => bound.with_context(Arc::clone(context)),
                    _ => bound,
                }
            }
            Err(conflict) => {
                debug!(%address, "bind failed: {}", conflict);
                ServiceRef::failed(address, conflict)
            }
        }
    }

    fn is_pinned(&self) -> bool {
        match &*self.0 {
            ServiceKind::Local { pinned, .. } => *pinned,
            ServiceKind::Alias { target, .. } | ServiceKind::Context { target, .. } => {
                target.is_pinned()
            }
            _ => false,
        }
    }

    /// Starts the inbox's workers.
    ///
    /// # Errors
    ///
    /// The handle's permanent failure, [`ServiceError::NotFound`] for an unresolved handle,
    /// or the inbox's start error.
    pub fn start(&self) -> Result<(), ServiceError> {
        match self.inbox() {
            Some(inbox) => inbox.start(),
            None => Err(self.unresolved("start")),
        }
    }

    /// Asks the service to save its state; see [`Inbox::save`].
    ///
    /// # Errors
    ///
    /// As for [`ServiceRef::start`], plus the actor's save error.
    pub async fn save(&self) -> Result<(), ServiceError> {
        match self.inbox() {
            Some(inbox) => inbox.save().await,
            None => Err(self.unresolved("save")),
        }
    }

    /// Shuts the bound inbox down. A no-op for handles without one.
    pub async fn shutdown(&self, mode: ShutdownMode) {
        if let Some(inbox) = self.inbox() {
            inbox.shutdown(mode).await;
        }
    }

    fn unresolved(&self, operation: &str) -> ServiceError {
        self.failure(operation).unwrap_or_else(|| ServiceError::NotFound {
            address: self.address().to_string(),
            method: operation.to_string(),
        })
    }
}

impl PartialEq for ServiceRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.address(), f)
    }
}

impl fmt::Debug for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variant = match &*self.0 {
            ServiceKind::Local { .. } => "Local",
            ServiceKind::Alias { .. } => "Alias",
            ServiceKind::Lazy { .. } => "Lazy",
            ServiceKind::Failed { .. } => "Failed",
            ServiceKind::NotFound { .. } => "NotFound",
            ServiceKind::Context { .. } => "Context",
        };
        f.debug_struct("ServiceRef")
            .field("variant", &variant)
            .field("address", self.address())
            .field("closed", &self.is_closed())
            .finish()
    }
}
