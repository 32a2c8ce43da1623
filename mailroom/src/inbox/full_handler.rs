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

use std::time::Duration;

use tracing::warn;

use crate::common::Address;
use crate::message::Message;
use crate::traits::QueueFullHandler;

/// The default [`QueueFullHandler`]: logs a warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogQueueFull;

impl QueueFullHandler for LogQueueFull {
    fn on_queue_full(&self, address: &Address, depth: usize, timeout: Duration, message: &Message) {
        warn!(
            %address,
            depth,
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "queue full; rejecting {}",
            message
        );
    }
}
