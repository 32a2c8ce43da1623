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

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use parking_lot::Mutex;
use tracing::{trace, warn};

use super::JournalEntry;
use crate::traits::Journal;

struct Writer {
    out: BufWriter<File>,
    last_flush: Instant,
    dirty: bool,
}

/// A journal stored as JSON lines in `<directory>/<name>.journal`.
///
/// Appends are buffered. The buffer is written out by [`Journal::flush`] once
/// `flush_delay` has passed since the previous write, so a zero delay writes after every
/// batch. [`Journal::flush_due`] tells an idle worker when the next write is owed.
pub struct FileJournal {
    name: String,
    path: PathBuf,
    flush_delay: Duration,
    writer: Mutex<Writer>,
}

impl FileJournal {
    /// Opens (or creates) the journal file, creating `directory` if needed.
    ///
    /// # Errors
    ///
    /// Fails if the directory or file cannot be created.
    pub fn open(directory: &Path, name: &str, flush_delay: Duration) -> anyhow::Result<Self> {
        fs::create_dir_all(directory)
            .with_context(|| format!("creating journal directory {}", directory.display()))?;
        let path = directory.join(format!("{name}.journal"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening journal {}", path.display()))?;
        trace!(path = %path.display(), "journal opened");
        Ok(Self {
            name: name.to_string(),
            path,
            flush_delay,
            writer: Mutex::new(Writer {
                out: BufWriter::new(file),
                last_flush: Instant::now(),
                dirty: false,
            }),
        })
    }

    /// Location of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_out(writer: &mut Writer) -> anyhow::Result<()> {
        // a failed write is retried after another full delay
        writer.last_flush = Instant::now();
        writer.out.flush()?;
        writer.out.get_ref().sync_data()?;
        writer.dirty = false;
        Ok(())
    }
}

impl Journal for FileJournal {
    fn name(&self) -> &str {
        &self.name
    }

    fn flush_delay(&self) -> Duration {
        self.flush_delay
    }

    fn append(&self, entry: &JournalEntry) -> anyhow::Result<()> {
        let line = serde_json::to_string(entry)?;
        let mut writer = self.writer.lock();
        writer.out.write_all(line.as_bytes())?;
        writer.out.write_all(b"\n")?;
        writer.dirty = true;
        Ok(())
    }

    fn flush(&self) -> anyhow::Result<()> {
        let mut writer = self.writer.lock();
        if writer.dirty && writer.last_flush.elapsed() >= self.flush_delay {
            Self::write_out(&mut writer)
                .with_context(|| format!("flushing journal {}", self.path.display()))?;
        }
        Ok(())
    }

    fn flush_due(&self) -> Option<Duration> {
        let writer = self.writer.lock();
        writer
            .dirty
            .then(|| self.flush_delay.saturating_sub(writer.last_flush.elapsed()))
    }

    fn replay(&self) -> anyhow::Result<Vec<JournalEntry>> {
        {
            let mut writer = self.writer.lock();
            if writer.dirty {
                Self::write_out(&mut writer)?;
            }
        }
        let file = File::open(&self.path)
            .with_context(|| format!("reading journal {}", self.path.display()))?;
        let mut entries = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    // A torn final write is dropped; the calls before it still replay.
                    warn!(journal = %self.name, line = number + 1, "skipping unreadable entry: {}", e);
                }
            }
        }
        Ok(entries)
    }

    fn checkpoint(&self) -> anyhow::Result<()> {
        let mut writer = self.writer.lock();
        writer.out.flush()?;
        writer.out.get_ref().set_len(0)?;
        writer.last_flush = Instant::now();
        writer.dirty = false;
        trace!(journal = %self.name, "journal truncated");
        Ok(())
    }
}

impl std::fmt::Debug for FileJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileJournal")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("flush_delay", &self.flush_delay)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::message::MessageKind;

    #[test]
    fn entries_survive_reopen_until_checkpoint() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        {
            let journal = FileJournal::open(dir.path(), "ledger", Duration::ZERO)?;
            journal.append(&JournalEntry::new(0, MessageKind::OneWay, "deposit".into(), vec![json!(5)], vec![]))?;
            journal.append(&JournalEntry::new(
                1,
                MessageKind::OneWay,
                "deposit".into(),
                vec![json!(7)],
                vec![("user".to_string(), json!("ann"))],
            ))?;
            journal.flush()?;
        }

        let journal = FileJournal::open(dir.path(), "ledger", Duration::ZERO)?;
        let entries = journal.replay()?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].args, vec![json!(7)]);
        assert_eq!(entries[1].headers[0].0, "user");

        journal.checkpoint()?;
        assert!(journal.replay()?.is_empty());
        Ok(())
    }

    #[test]
    fn buffered_entries_report_when_they_are_due() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let journal = FileJournal::open(dir.path(), "slow", Duration::from_secs(60))?;
        assert_eq!(journal.flush_due(), None);

        journal.append(&JournalEntry::new(0, MessageKind::OneWay, "touch".into(), vec![], vec![]))?;
        journal.flush()?;
        let due = journal.flush_due().expect("entry is buffered");
        assert!(due > Duration::from_secs(50));
        assert_eq!(fs::metadata(journal.path())?.len(), 0);
        Ok(())
    }
}
