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

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::common::ServiceError;
use crate::outbox::Outbox;

type Callback<T> = Box<dyn FnOnce(Result<T, ServiceError>, &mut Outbox) + Send + 'static>;

/// A single-shot result callback.
///
/// A `Continuation` is completed exactly once, with either a value or a [`ServiceError`].
/// Completion consumes it, so a second completion is impossible by construction. A
/// continuation that is dropped without being completed fails itself with
/// [`ServiceError::Abandoned`], which keeps the exactly-once guarantee even when a message
/// carrying it is discarded.
///
/// Callbacks receive the [`Outbox`] of the context completing them. Calls issued from a
/// callback are therefore batched with the work that produced the result and flushed after it.
///
/// # Example
///
/// ```rust,ignore
/// let (result, pending) = Continuation::<Value>::channel();
/// echo.method("echo").query(&mut outbox, Headers::new(), result, None, vec![json!("hi")]);
/// outbox.flush().await;
/// assert_eq!(pending.wait().await?, json!("hi"));
/// ```
pub struct Continuation<T: Send + 'static> {
    callback: Option<Callback<T>>,
}

impl<T: Send + 'static> Continuation<T> {
    /// Creates a continuation from a result callback.
    pub fn new(callback: impl FnOnce(Result<T, ServiceError>) + Send + 'static) -> Self {
        Self::with_outbox(move |result, _| callback(result))
    }

    /// Creates a continuation whose callback may issue further calls through the completing
    /// context's outbox.
    pub fn with_outbox(
        callback: impl FnOnce(Result<T, ServiceError>, &mut Outbox) + Send + 'static,
    ) -> Self {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    /// Creates a continuation from separate success and failure callbacks.
    pub fn of(
        ok: impl FnOnce(T) + Send + 'static,
        fail: impl FnOnce(ServiceError) + Send + 'static,
    ) -> Self {
        Self::new(move |result| match result {
            Ok(value) => ok(value),
            Err(error) => fail(error),
        })
    }

    /// A continuation that discards its result.
    pub fn ignore() -> Self {
        Self { callback: None }
    }

    /// Creates a continuation paired with a [`Pending`] that resolves to its result.
    pub fn channel() -> (Self, Pending<T>) {
        let (tx, rx) = oneshot::channel();
        let continuation = Self::new(move |result| {
            let _ = tx.send(result);
        });
        (continuation, Pending(rx))
    }

    /// Completes with a value.
    pub fn ok(self, value: T) {
        self.complete(Ok(value));
    }

    /// Completes with an error.
    pub fn fail(self, error: ServiceError) {
        self.complete(Err(error));
    }

    /// Completes outside of any worker context.
    ///
    /// Calls issued by the callback are flushed in the background when the temporary outbox
    /// is dropped.
    pub fn complete(self, result: Result<T, ServiceError>) {
        let mut outbox = Outbox::new();
        self.complete_in(result, &mut outbox);
    }

    /// Completes inside the caller's batching context.
    pub fn complete_in(mut self, result: Result<T, ServiceError>, outbox: &mut Outbox) {
        if let Some(callback) = self.callback.take() {
            callback(result, outbox);
        }
    }

    /// Returns `true` if completing this continuation has no effect.
    pub fn is_ignored(&self) -> bool {
        self.callback.is_none()
    }

    /// Derives a continuation for an upstream value of type `U`.
    ///
    /// Success values are mapped through `transform`; errors pass through unchanged.
    pub fn then<U: Send + 'static>(
        self,
        transform: impl FnOnce(U) -> Result<T, ServiceError> + Send + 'static,
    ) -> Continuation<U> {
        Continuation::with_outbox(move |result: Result<U, ServiceError>, outbox| {
            self.complete_in(result.and_then(transform), outbox);
        })
    }

    /// Derives a continuation whose success handler completes `self` itself, possibly later.
    ///
    /// The handler receives the upstream value, this continuation and the completing outbox;
    /// it is typically used to chain a second query off the result of a first. Errors pass
    /// straight through to `self`.
    pub fn then_with<U: Send + 'static>(
        self,
        next: impl FnOnce(U, Continuation<T>, &mut Outbox) + Send + 'static,
    ) -> Continuation<U> {
        Continuation::with_outbox(move |result: Result<U, ServiceError>, outbox| match result {
            Ok(value) => next(value, self, outbox),
            Err(error) => self.complete_in(Err(error), outbox),
        })
    }
}

impl<V: Send + 'static> Continuation<Vec<V>> {
    /// Splits into `branches` continuations joined back into this one.
    ///
    /// Once every branch has completed, this continuation receives the values in branch
    /// order, or the error of the lowest-numbered failed branch. With zero branches it
    /// completes immediately with an empty vector.
    pub fn fork(self, branches: usize) -> Vec<Continuation<V>> {
        if branches == 0 {
            self.ok(Vec::new());
            return Vec::new();
        }

        let join = Arc::new(Mutex::new(Join {
            results: (0..branches).map(|_| None).collect(),
            remaining: branches,
            target: Some(self),
        }));

        (0..branches)
            .map(|index| {
                let join = Arc::clone(&join);
                Continuation::with_outbox(move |result, outbox| {
                    let finished = {
                        let mut join = join.lock();
                        join.results[index] = Some(result);
                        join.remaining -= 1;
                        if join.remaining == 0 {
                            join.target
                                .take()
                                .map(|target| (target, std::mem::take(&mut join.results)))
                        } else {
                            None
                        }
                    };
                    if let Some((target, results)) = finished {
                        let joined = results
                            .into_iter()
                            .map(|slot| slot.unwrap_or(Err(ServiceError::Abandoned)))
                            .collect::<Result<Vec<V>, ServiceError>>();
                        target.complete_in(joined, outbox);
                    }
                })
            })
            .collect()
    }
}

struct Join<V: Send + 'static> {
    results: Vec<Option<Result<V, ServiceError>>>,
    remaining: usize,
    target: Option<Continuation<Vec<V>>>,
}

impl<T: Send + 'static> Drop for Continuation<T> {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            let mut outbox = Outbox::new();
            callback(Err(ServiceError::Abandoned), &mut outbox);
        }
    }
}

impl<T: Send + 'static> fmt::Debug for Continuation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("pending", &self.callback.is_some())
            .finish()
    }
}

/// The receiving half of [`Continuation::channel`].
#[derive(Debug)]
pub struct Pending<T>(oneshot::Receiver<Result<T, ServiceError>>);

impl<T> Pending<T> {
    /// Waits for the paired continuation to complete.
    pub async fn wait(self) -> Result<T, ServiceError> {
        self.0.await.unwrap_or(Err(ServiceError::Abandoned))
    }
}
