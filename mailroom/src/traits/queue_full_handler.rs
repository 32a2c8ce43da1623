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

use crate::common::Address;
use crate::message::Message;

/// Observer for offers that gave up because the inbox stayed full.
///
/// Called before the message's continuation is failed with
/// [`ServiceError::QueueFull`](crate::common::ServiceError::QueueFull).
pub trait QueueFullHandler: Send + Sync + Debug {
    fn on_queue_full(&self, address: &Address, depth: usize, timeout: Duration, message: &Message);
}
