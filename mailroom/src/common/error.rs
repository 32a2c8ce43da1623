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

use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

/// The single error type delivered to continuations, streams and builder callers.
///
/// Every failure a call can observe is expressed as one of these variants. Errors raised by
/// an actor travel to the caller's continuation unchanged, so callers can match on the
/// variant the service produced.
///
/// The variants fall into five groups:
///
/// *   **Resolution**: [`ServiceError::NotFound`], [`ServiceError::MethodNotFound`],
///     [`ServiceError::InvalidAddress`].
/// *   **Backpressure**: [`ServiceError::QueueFull`].
/// *   **Closed target**: [`ServiceError::Closed`], [`ServiceError::Abandoned`].
/// *   **Registration**: [`ServiceError::Conflict`].
/// *   **Execution**: [`ServiceError::Execution`], [`ServiceError::Timeout`],
///     [`ServiceError::InvalidArguments`], [`ServiceError::Unsupported`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// No service is bound at the address.
    #[error("no service bound at '{address}' (calling '{method}')")]
    NotFound {
        /// The address that failed to resolve.
        address: String,
        /// The method or operation that was attempted.
        method: String,
    },

    /// The service exists but does not expose the method.
    #[error("method '{method}' not found on service '{address}'")]
    MethodNotFound {
        /// The address of the service.
        address: String,
        /// The unknown method name.
        method: String,
    },

    /// The target inbox stayed full for the whole offer timeout.
    #[error("queue full for '{address}' (depth {depth}, waited {timeout:?})")]
    QueueFull {
        /// The address of the saturated inbox.
        address: String,
        /// The queue depth observed when the offer gave up.
        depth: usize,
        /// How long the offer waited.
        timeout: Duration,
    },

    /// The target inbox or service handle is shut down.
    #[error("service '{address}' is closed")]
    Closed {
        /// The address of the closed service.
        address: String,
    },

    /// A continuation or stream was dropped without ever being completed.
    #[error("result dropped before completion")]
    Abandoned,

    /// The address is already bound to a different inbox.
    #[error("address '{address}' is already bound to another service")]
    Conflict {
        /// The contested address.
        address: String,
    },

    /// A query or stream did not complete before its deadline.
    #[error("'{method}' on '{address}' timed out after {timeout:?}")]
    Timeout {
        /// The address of the target service.
        address: String,
        /// The method that timed out.
        method: String,
        /// The deadline that expired.
        timeout: Duration,
    },

    /// The actor method raised an error.
    #[error("{0}")]
    Execution(String),

    /// The arguments do not match the method's parameters.
    #[error("invalid arguments for '{method}': {reason}")]
    InvalidArguments {
        /// The method being called.
        method: String,
        /// What was wrong with the arguments.
        reason: String,
    },

    /// The string cannot be turned into a canonical address.
    #[error("'{address}' is an invalid address: {reason}")]
    InvalidAddress {
        /// The rejected address.
        address: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The target does not support the requested call shape.
    #[error("'{operation}' is not supported by '{address}'")]
    Unsupported {
        /// The address of the target service.
        address: String,
        /// The unsupported operation.
        operation: String,
    },

    /// A builder or configuration value violates its contract.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ServiceError {
    /// Wraps any displayable error as an [`ServiceError::Execution`] failure.
    pub fn execution(error: impl Display) -> Self {
        Self::Execution(error.to_string())
    }

    /// Creates a [`ServiceError::Closed`] for the given address.
    pub fn closed(address: impl Display) -> Self {
        Self::Closed {
            address: address.to_string(),
        }
    }

    /// Creates a [`ServiceError::MethodNotFound`] for the given service and method.
    pub fn method_not_found(address: impl Display, method: impl Display) -> Self {
        Self::MethodNotFound {
            address: address.to_string(),
            method: method.to_string(),
        }
    }

    /// Returns `true` for errors caused by a shut-down target.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }

    /// Returns `true` for resolution failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::MethodNotFound { .. })
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(error: serde_json::Error) -> Self {
        Self::Execution(format!("value conversion failed: {error}"))
    }
}
