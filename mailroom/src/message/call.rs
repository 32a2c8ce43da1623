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

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::common::{Address, Headers, Runtime, ServiceError};
use crate::message::{Continuation, MessageKind};
use crate::outbox::Outbox;

/// What an actor method hands back to the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The method finished; the value completes the caller's query.
    Value(Value),
    /// The method took the continuation with [`Call::defer`] and will complete it later.
    Deferred,
}

impl Reply {
    /// A `null` reply, for methods without a meaningful result.
    pub fn null() -> Self {
        Self::Value(Value::Null)
    }

    /// Serializes `value` into a reply.
    ///
    /// # Errors
    ///
    /// Fails if `value` cannot be represented as JSON.
    pub fn json<T: Serialize>(value: T) -> Result<Self, ServiceError> {
        Ok(Self::Value(serde_json::to_value(value)?))
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// The invocation context handed to an actor for one message.
///
/// Gives access to the method name, arguments and headers, the worker's [`Outbox`] for
/// issuing further calls, and the reply continuation for deferred answers.
pub struct Call<'a> {
    address: Address,
    kind: MessageKind,
    method: String,
    headers: Headers,
    args: Vec<Value>,
    reply: Option<Continuation<Value>>,
    outbox: &'a mut Outbox,
    runtime: Option<Runtime>,
}

impl<'a> Call<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        address: Address,
        kind: MessageKind,
        method: String,
        headers: Headers,
        args: Vec<Value>,
        reply: Option<Continuation<Value>>,
        outbox: &'a mut Outbox,
        runtime: Option<Runtime>,
    ) -> Self {
        Self {
            address,
            kind,
            method,
            headers,
            args,
            reply,
            outbox,
            runtime,
        }
    }

    /// The address of the service being invoked.
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
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

    /// Decodes argument `index`.
    ///
    /// # Errors
    ///
    /// [`ServiceError::InvalidArguments`] if the argument is missing or has the wrong shape.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, ServiceError> {
        let value = self
            .args
            .get(index)
            .ok_or_else(|| ServiceError::InvalidArguments {
                method: self.method.clone(),
                reason: format!("missing argument {index}"),
            })?;
        serde_json::from_value(value.clone()).map_err(|e| ServiceError::InvalidArguments {
            method: self.method.clone(),
            reason: format!("argument {index}: {e}"),
        })
    }

    /// The outbox of the worker running this call. Calls issued through it are flushed
    /// after the method returns.
    pub fn outbox(&mut self) -> &mut Outbox {
        &mut *self.outbox
    }

    /// The runtime the service is registered with, if it is still alive.
    pub fn runtime(&self) -> Option<&Runtime> {
        self.runtime.as_ref()
    }

    /// Takes the reply continuation so the method can answer later.
    ///
    /// Return [`Reply::Deferred`] after calling this. One-way and streaming calls get a
    /// continuation that ignores its result.
    pub fn defer(&mut self) -> Continuation<Value> {
        self.reply.take().unwrap_or_else(Continuation::ignore)
    }

    pub(crate) fn take_reply(&mut self) -> Option<Continuation<Value>> {
        self.reply.take()
    }
}

impl std::fmt::Debug for Call<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("address", &self.address)
            .field("kind", &self.kind)
            .field("method", &self.method)
            .field("args", &self.args)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn arg_decodes_and_reports_shape_errors() {
        let mut outbox = Outbox::new();
        let call = Call::new(
            Address::parse("/calc").unwrap(),
            MessageKind::Query,
            "add".to_string(),
            Headers::new(),
            vec![json!(2), json!("three")],
            None,
            &mut outbox,
            None,
        );
        assert_eq!(call.arg::<i64>(0), Ok(2));
        assert!(matches!(
            call.arg::<i64>(1),
            Err(ServiceError::InvalidArguments { .. })
        ));
        assert!(matches!(
            call.arg::<i64>(2),
            Err(ServiceError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn defer_without_reply_is_ignored() {
        let mut outbox = Outbox::new();
        let mut call = Call::new(
            Address::parse("/calc").unwrap(),
            MessageKind::OneWay,
            "poke".to_string(),
            Headers::new(),
            vec![],
            None,
            &mut outbox,
            None,
        );
        assert!(call.defer().is_ignored());
    }
}
