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

use parking_lot::Mutex;

use super::JournalEntry;
use crate::traits::Journal;

/// A journal that keeps its entries in memory.
///
/// Sharing one instance between successive inboxes replays calls across restarts within
/// a process, which is what tests and ephemeral services need.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    name: String,
    entries: Mutex<Vec<JournalEntry>>,
}

impl MemoryJournal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// A snapshot of the entries recorded since the last checkpoint.
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().clone()
    }
}

impl Journal for MemoryJournal {
    fn name(&self) -> &str {
        &self.name
    }

    fn flush_delay(&self) -> Duration {
        Duration::ZERO
    }

    fn append(&self, entry: &JournalEntry) -> anyhow::Result<()> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }

    fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn replay(&self) -> anyhow::Result<Vec<JournalEntry>> {
        Ok(self.entries())
    }

    fn checkpoint(&self) -> anyhow::Result<()> {
        self.entries.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::message::MessageKind;

    #[test]
    fn checkpoint_discards_entries() -> anyhow::Result<()> {
        let journal = MemoryJournal::new("counter");
        journal.append(&JournalEntry::new(0, MessageKind::OneWay, "add".into(), vec![json!(1)], vec![]))?;
        journal.append(&JournalEntry::new(1, MessageKind::Query, "get".into(), vec![], vec![]))?;
        assert_eq!(journal.replay()?.len(), 2);
        assert_eq!(journal.replay()?[0].method, "add");

        journal.checkpoint()?;
        assert!(journal.replay()?.is_empty());
        Ok(())
    }
}
