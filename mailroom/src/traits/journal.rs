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

use crate::journal::JournalEntry;

/// Durable record of the calls delivered to a service.
///
/// A journalled inbox appends every message before the actor runs it, flushes after each
/// batch, replays all entries into a fresh actor on start and truncates at checkpoint.
pub trait Journal: Send + Sync + Debug {
    /// The journal name.
    fn name(&self) -> &str;

    /// How long buffered entries may wait before they are forced out.
    fn flush_delay(&self) -> Duration;

    /// Records one entry.
    ///
    /// # Errors
    ///
    /// Fails if the entry cannot be buffered or written.
    fn append(&self, entry: &JournalEntry) -> anyhow::Result<()>;

    /// Forces buffered entries to storage.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    fn flush(&self) -> anyhow::Result<()>;

    /// Time left until buffered entries are due for [`Journal::flush`], or `None` when
    /// nothing is buffered.
    fn flush_due(&self) -> Option<Duration> {
        None
    }

    /// Every entry recorded since the last checkpoint, oldest first.
    ///
    /// # Errors
    ///
    /// Fails on I/O or decoding errors.
    fn replay(&self) -> anyhow::Result<Vec<JournalEntry>>;

    /// Discards recorded entries once the actor has saved its state.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    fn checkpoint(&self) -> anyhow::Result<()>;
}
