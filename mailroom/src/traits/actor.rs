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

use async_trait::async_trait;

use crate::actor::MethodInfo;
use crate::common::ServiceError;
use crate::inbox::ShutdownMode;
use crate::message::{Call, Reply, StreamSink};
use crate::outbox::Outbox;

/// The invocable stub of a service, bound into an inbox.
///
/// An inbox worker owns its actor exclusively and calls it for one message at a time, so
/// implementations need no internal locking. With more than one worker each worker owns a
/// separate instance produced by the builder's factory.
///
/// Only [`Actor::name`], [`Actor::methods`] and [`Actor::invoke`] are required; every
/// lifecycle hook defaults to doing nothing.
#[async_trait]
pub trait Actor: Send + 'static {
    /// The service name, used to derive the default address `local:///<name>`.
    fn name(&self) -> &str;

    /// Metadata for every callable method.
    ///
    /// An empty list makes the service dynamic: any method name resolves and arity is not
    /// checked.
    fn methods(&self) -> Vec<MethodInfo>;

    /// Runs one `send` or `query`.
    ///
    /// # Errors
    ///
    /// Any error is delivered to the caller's continuation unchanged. For one-way calls it is
    /// logged.
    async fn invoke(&mut self, call: &mut Call<'_>) -> Result<Reply, ServiceError>;

    /// Runs one streaming call. The default rejects streaming.
    ///
    /// # Errors
    ///
    /// An error fails the stream unless the method already finished it.
    async fn invoke_stream(
        &mut self,
        call: &mut Call<'_>,
        sink: StreamSink,
    ) -> Result<(), ServiceError> {
        let _ = sink;
        Err(ServiceError::Unsupported {
            address: call.address().to_string(),
            operation: format!("stream {}", call.method()),
        })
    }

    /// Called on the worker before the first message, after any journal replay.
    async fn on_init(&mut self, _outbox: &mut Outbox) -> Result<(), ServiceError> {
        Ok(())
    }

    /// The save/checkpoint delivery of a graceful shutdown.
    async fn on_save(&mut self) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Called on the worker as its last action.
    async fn on_shutdown(&mut self, _mode: ShutdownMode) {}
}
