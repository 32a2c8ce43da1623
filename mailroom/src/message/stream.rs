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
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

use crate::common::{Address, ServiceError};
use crate::inbox::Inbox;
use crate::message::route;

type OnNext = Box<dyn FnMut(Value) + Send + 'static>;
type OnDone = Box<dyn FnOnce(Result<(), ServiceError>) + Send + 'static>;

/// The consumer side of a streaming call.
///
/// Receives zero or more values followed by exactly one completion or failure. A stream may
/// carry inbox affinity ([`ResultStream::with_home`]); when it does, every callback runs on
/// that inbox's worker, serialised with the inbox's other work.
pub struct ResultStream {
    on_next: OnNext,
    on_done: Option<OnDone>,
    home: Option<Inbox>,
}

impl ResultStream {
    /// Creates a stream from a value callback and a completion callback.
    pub fn new(
        on_next: impl FnMut(Value) + Send + 'static,
        on_done: impl FnOnce(Result<(), ServiceError>) + Send + 'static,
    ) -> Self {
        Self {
            on_next: Box::new(on_next),
            on_done: Some(Box::new(on_done)),
            home: None,
        }
    }

    /// Creates a stream that forwards every event to a [`StreamReceiver`].
    pub fn channel() -> (Self, StreamReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let done = tx.clone();
        let stream = Self::new(
            move |value| {
                let _ = tx.send(Ok(value));
            },
            move |result| {
                if let Err(error) = result {
                    let _ = done.send(Err(error));
                }
            },
        );
        (stream, StreamReceiver(rx))
    }

    /// Pins the stream's callbacks to `inbox`.
    #[must_use]
    pub fn with_home(mut self, inbox: Inbox) -> Self {
        self.home = Some(inbox);
        self
    }

    /// The inbox this stream is pinned to, if any.
    pub fn home(&self) -> Option<&Inbox> {
        self.home.as_ref()
    }

    /// Fails the stream immediately.
    pub fn fail(self, error: ServiceError) {
        self.finish(Err(error));
    }

    pub(crate) fn emit(&mut self, value: Value) {
        (self.on_next)(value);
    }

    pub(crate) fn finish(mut self, result: Result<(), ServiceError>) {
        if let Some(on_done) = self.on_done.take() {
            on_done(result);
        }
    }

    pub(crate) fn take_home(&mut self) -> Option<Inbox> {
        self.home.take()
    }
}

impl Drop for ResultStream {
    fn drop(&mut self) {
        if let Some(on_done) = self.on_done.take() {
            on_done(Err(ServiceError::Abandoned));
        }
    }
}

impl fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultStream")
            .field("open", &self.on_done.is_some())
            .field("home", &self.home.as_ref().map(Inbox::address))
            .finish()
    }
}

/// Receiving half of [`ResultStream::channel`].
#[derive(Debug)]
pub struct StreamReceiver(mpsc::UnboundedReceiver<Result<Value, ServiceError>>);

impl StreamReceiver {
    /// Next value; `None` once the stream completed successfully.
    pub async fn next(&mut self) -> Option<Result<Value, ServiceError>> {
        self.0.recv().await
    }

    /// Collects every value until completion.
    ///
    /// # Errors
    ///
    /// Returns the stream's failure, if it failed.
    pub async fn collect(mut self) -> Result<Vec<Value>, ServiceError> {
        let mut values = Vec::new();
        while let Some(item) = self.next().await {
            values.push(item?);
        }
        Ok(values)
    }
}

/// The producer side of a streaming call, handed to the actor.
///
/// Clones share one stream. `complete` and `fail` are idempotent: the first finish wins.
/// When the last clone is dropped without finishing, the consumer is failed with
/// [`ServiceError::Abandoned`].
#[derive(Clone)]
pub struct StreamSink {
    shared: Arc<SinkShared>,
}

struct SinkShared {
    stream: Mutex<Option<ResultStream>>,
    finished: AtomicBool,
    timer: Mutex<Option<AbortHandle>>,
    home: Option<Inbox>,
}

impl StreamSink {
    pub(crate) fn new(mut stream: ResultStream, home: Option<Inbox>) -> Self {
        let home = stream.take_home().or(home);
        Self {
            shared: Arc::new(SinkShared {
                stream: Mutex::new(Some(stream)),
                finished: AtomicBool::new(false),
                timer: Mutex::new(None),
                home,
            }),
        }
    }

    /// Sends one value to the consumer. Ignored once the stream is finished.
    pub fn next(&self, value: Value) {
        if self.is_finished() {
            trace!("value dropped on finished stream");
            return;
        }
        let shared = Arc::clone(&self.shared);
        route(
            self.shared.home.as_ref(),
            Box::new(move |_| {
                if let Some(stream) = shared.stream.lock().as_mut() {
                    stream.emit(value);
                }
            }),
            None,
        );
    }

    /// Completes the stream successfully.
    pub fn complete(&self) {
        self.finish(Ok(()));
    }

    /// Fails the stream.
    pub fn fail(&self, error: ServiceError) {
        self.finish(Err(error));
    }

    /// Whether `complete` or `fail` has been called.
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::Acquire)
    }

    /// Fails the stream with [`ServiceError::Timeout`] unless it finishes within `timeout`.
    ///
    /// The timer holds only a weak reference, so dropping every clone still abandons the
    /// stream. Outside a Tokio runtime no timer is armed.
    pub(crate) fn arm_timer(&self, timeout: Duration, address: &Address, method: &str) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            trace!("no runtime available; stream timer not armed");
            return;
        };
        let shared: Weak<SinkShared> = Arc::downgrade(&self.shared);
        let error = ServiceError::Timeout {
            address: address.to_string(),
            method: method.to_string(),
            timeout,
        };
        let timer = handle.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(shared) = shared.upgrade() {
                let sink = StreamSink { shared };
                if !sink.is_finished() {
                    debug!("{}", error);
                    sink.finish(Err(error));
                }
            }
        });
        *self.shared.timer.lock() = Some(timer.abort_handle());
    }

    fn finish(&self, result: Result<(), ServiceError>) {
        if self.shared.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(timer) = self.shared.timer.lock().take() {
            timer.abort();
        }
        let shared = Arc::clone(&self.shared);
        route(
            self.shared.home.as_ref(),
            Box::new(move |_| {
                let stream = shared.stream.lock().take();
                if let Some(stream) = stream {
                    stream.finish(result);
                }
            }),
            None,
        );
    }
}

impl Drop for SinkShared {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
        if self.finished.load(Ordering::Acquire) {
            return;
        }
        if let Some(stream) = self.stream.get_mut().take() {
            route(
                self.home.as_ref(),
                Box::new(move |_| stream.finish(Err(ServiceError::Abandoned))),
                None,
            );
        }
    }
}

impl fmt::Debug for StreamSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSink")
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sink_without_home_runs_inline() {
        let (stream, receiver) = ResultStream::channel();
        let sink = StreamSink::new(stream, None);
        sink.next(Value::from(1));
        sink.next(Value::from(2));
        sink.complete();
        sink.fail(ServiceError::execution("ignored"));
        drop(sink);
        assert_eq!(
            receiver.collect().await,
            Ok(vec![Value::from(1), Value::from(2)])
        );
    }

    #[tokio::test]
    async fn dropped_sink_abandons_stream() {
        let (stream, receiver) = ResultStream::channel();
        let sink = StreamSink::new(stream, None);
        sink.next(Value::from("a"));
        drop(sink);
        assert_eq!(receiver.collect().await, Err(ServiceError::Abandoned));
    }

    #[tokio::test]
    async fn unfinished_sink_times_out_once() {
        let (stream, mut receiver) = ResultStream::channel();
        let sink = StreamSink::new(stream, None);
        let address = Address::parse("/slow").unwrap();
        sink.arm_timer(Duration::from_millis(20), &address, "tail");
        sink.next(Value::from(1));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(sink.is_finished());
        sink.complete();
        drop(sink);

        assert_eq!(receiver.next().await, Some(Ok(Value::from(1))));
        assert!(matches!(
            receiver.next().await,
            Some(Err(ServiceError::Timeout { .. }))
        ));
    }
}
