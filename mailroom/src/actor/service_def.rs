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

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::actor::MethodInfo;
use crate::common::ServiceError;
use crate::inbox::ShutdownMode;
use crate::message::{Call, Reply, StreamSink};
use crate::outbox::Outbox;
use crate::traits::Actor;

type MethodHandler<S> =
    Arc<dyn Fn(&mut S, &mut Call<'_>) -> Result<Reply, ServiceError> + Send + Sync>;
type StreamHandler<S> =
    Arc<dyn Fn(&mut S, &mut Call<'_>, StreamSink) -> Result<(), ServiceError> + Send + Sync>;
type StartHook<S> = Arc<dyn Fn(&mut S, &mut Outbox) -> Result<(), ServiceError> + Send + Sync>;
type SaveHook<S> = Arc<dyn Fn(&mut S) -> Result<(), ServiceError> + Send + Sync>;
type StopHook<S> = Arc<dyn Fn(&mut S, ShutdownMode) + Send + Sync>;

/// An [`Actor`] assembled from closures over a state value.
///
/// Each handler is registered together with its [`MethodInfo`]. Handlers run on the inbox
/// worker with exclusive access to the state.
///
/// # Example
///
/// ```rust,ignore
/// let counter = ServiceDef::new("counter", 0i64)
///     .act_on(MethodInfo::new("add").param("n", "i64"), |total, call| {
///         *total += call.arg::<i64>(0)?;
///         Ok(Reply::null())
///     })
///     .act_on(MethodInfo::new("get").returns("i64"), |total, _| Reply::json(*total));
/// ```
pub struct ServiceDef<S> {
    name: String,
    state: S,
    methods: Vec<MethodInfo>,
    handlers: HashMap<String, MethodHandler<S>>,
    streams: HashMap<String, StreamHandler<S>>,
    after_start: Option<StartHook<S>>,
    on_save: Option<SaveHook<S>>,
    before_stop: Option<StopHook<S>>,
}

impl<S: Send + 'static> ServiceDef<S> {
    pub fn new(name: impl Into<String>, state: S) -> Self {
        Self {
            name: name.into(),
            state,
            methods: Vec::new(),
            handlers: HashMap::new(),
            streams: HashMap::new(),
            after_start: None,
            on_save: None,
            before_stop: None,
        }
    }

    /// Registers the handler for a `send` or `query` method.
    #[must_use]
    pub fn act_on(
        mut self,
        info: MethodInfo,
        handler: impl Fn(&mut S, &mut Call<'_>) -> Result<Reply, ServiceError> + Send + Sync + 'static,
    ) -> Self {
        trace!(method = info.name(), "registering handler");
        self.handlers.insert(info.name().to_string(), Arc::new(handler));
        self.methods.push(info);
        self
    }

    /// Registers the handler for a streaming method. The handler may finish the sink itself
    /// or keep a clone and finish it later; if it returns an error the stream fails.
    #[must_use]
    pub fn act_on_stream(
        mut self,
        info: MethodInfo,
        handler: impl Fn(&mut S, &mut Call<'_>, StreamSink) -> Result<(), ServiceError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.streams.insert(info.name().to_string(), Arc::new(handler));
        self.methods.push(info);
        self
    }

    /// Runs on the worker before the first message.
    #[must_use]
    pub fn after_start(
        mut self,
        hook: impl Fn(&mut S, &mut Outbox) -> Result<(), ServiceError> + Send + Sync + 'static,
    ) -> Self {
        self.after_start = Some(Arc::new(hook));
        self
    }

    /// Runs for every save request, including the one a graceful shutdown sends.
    #[must_use]
    pub fn on_save(
        mut self,
        hook: impl Fn(&mut S) -> Result<(), ServiceError> + Send + Sync + 'static,
    ) -> Self {
        self.on_save = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn before_stop(mut self, hook: impl Fn(&mut S, ShutdownMode) + Send + Sync + 'static) -> Self {
        self.before_stop = Some(Arc::new(hook));
        self
    }

    pub fn state(&self) -> &S {
        &self.state
    }
}

impl<S: Clone> Clone for ServiceDef<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            state: self.state.clone(),
            methods: self.methods.clone(),
            handlers: self.handlers.clone(),
            streams: self.streams.clone(),
            after_start: self.after_start.clone(),
            on_save: self.on_save.clone(),
            before_stop: self.before_stop.clone(),
        }
    }
}

impl<S: Debug> Debug for ServiceDef<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDef")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("methods", &self.methods.len())
            .finish()
    }
}

#[async_trait]
impl<S: Send + 'static> Actor for ServiceDef<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn methods(&self) -> Vec<MethodInfo> {
        self.methods.clone()
    }

    async fn invoke(&mut self, call: &mut Call<'_>) -> Result<Reply, ServiceError> {
        let handler = self
            .handlers
            .get(call.method())
            .cloned()
            .ok_or_else(|| ServiceError::method_not_found(call.address(), call.method()))?;
        handler(&mut self.state, call)
    }

    async fn invoke_stream(
        &mut self,
        call: &mut Call<'_>,
        sink: StreamSink,
    ) -> Result<(), ServiceError> {
        let handler = self
            .streams
            .get(call.method())
            .cloned()
            .ok_or_else(|| ServiceError::method_not_found(call.address(), call.method()))?;
        handler(&mut self.state, call, sink)
    }

    async fn on_init(&mut self, outbox: &mut Outbox) -> Result<(), ServiceError> {
        match self.after_start.clone() {
            Some(hook) => hook(&mut self.state, outbox),
            None => Ok(()),
        }
    }

    async fn on_save(&mut self) -> Result<(), ServiceError> {
        match self.on_save.clone() {
            Some(hook) => hook(&mut self.state),
            None => Ok(()),
        }
    }

    async fn on_shutdown(&mut self, mode: ShutdownMode) {
        if let Some(hook) = self.before_stop.clone() {
            hook(&mut self.state, mode);
        }
    }
}
