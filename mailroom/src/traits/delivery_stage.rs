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

use std::fmt::Debug;
use std::time::Duration;

use crate::common::ServiceError;
use crate::message::Message;

/// A step every dequeued message passes through before it reaches the actor.
///
/// Stages run in the order they were added to the builder. A stage that returns an error
/// stops the message: later stages and the actor never see it and the caller's continuation
/// receives the error.
pub trait DeliveryStage: Send + Sync + Debug {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Processes one message.
    ///
    /// # Errors
    ///
    /// Returning an error rejects the message.
    fn deliver(&self, message: &Message) -> Result<(), ServiceError>;

    /// Called when the worker has drained the queue, and again once a deadline reported by
    /// [`DeliveryStage::flush_due`] passes while the worker is idle.
    fn after_batch(&self) {}

    /// How long the stage can hold buffered work before `after_batch` must run again.
    fn flush_due(&self) -> Option<Duration> {
        None
    }
}
