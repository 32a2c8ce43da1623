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

use std::sync::Arc;
use std::time::Duration;

use mailroom::prelude::*;
use mailroom_test::prelude::*;

use crate::setup::actors::counter;
use crate::setup::{initialize_tracing, runtime};

mod setup;

/// Tests that a journalled service rebuilds its state after an abrupt stop, and that a
/// save checkpoints the journal.
///
/// **Scenario:**
/// 1. Build a counter journalled to a shared in-memory journal and add 5 and 7.
/// 2. Stop it immediately and build a fresh counter on the same journal.
/// 3. Shut the second one down gracefully and build a third.
///
/// **Verification:**
/// - The second counter starts at 12, replayed from the journal.
/// - The graceful shutdown saved and checkpointed, so the journal is empty and the third
///   counter starts at 0.
#[mailroom_test]
async fn test_memory_journal_replays_until_checkpoint() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = runtime();
    let journal = Arc::new(MemoryJournal::new("counter"));

    let first = runtime
        .new_service(counter())
        .with_journal_store(journal.clone())
        .build()?;
    first.method("add").send_now(vec![json!(5)]).await;
    first.method("add").send_now(vec![json!(7)]).await;
    assert_eq!(first.method("get").call(vec![]).await?, json!(12));
    first.shutdown(ShutdownMode::Immediate).await;

    let recorded: Vec<String> = journal.entries().into_iter().map(|e| e.method).collect();
    assert_eq!(recorded, ["add", "add", "get"]);

    let second = runtime
        .new_service(counter())
        .with_journal_store(journal.clone())
        .build()?;
    assert_eq!(second.method("get").call(vec![]).await?, json!(12));
    second.shutdown(ShutdownMode::Graceful).await;
    assert!(journal.entries().is_empty());

    let third = runtime
        .new_service(counter())
        .with_journal_store(journal.clone())
        .build()?;
    assert_eq!(third.method("get").call(vec![]).await?, json!(0));
    Ok(())
}

/// Tests that an explicit save checkpoints the journal.
///
/// **Scenario:**
/// 1. Build a journalled counter and add 3.
/// 2. Save it.
///
/// **Verification:**
/// - The journal held the call before the save and is empty after it.
/// - The counter's state is unaffected by the checkpoint.
#[mailroom_test]
async fn test_save_checkpoints_journal() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = runtime();
    let journal = Arc::new(MemoryJournal::new("counter"));
    let service = runtime
        .new_service(counter())
        .with_journal_store(journal.clone())
        .build()?;

    service.method("add").send_now(vec![json!(3)]).await;
    assert_eq!(service.method("get").call(vec![]).await?, json!(3));
    assert_eq!(journal.entries().len(), 2);

    service.save().await?;
    assert!(journal.entries().is_empty());
    assert_eq!(service.method("get").call(vec![]).await?, json!(3));
    Ok(())
}

/// Tests the file journal configured through the runtime.
///
/// **Scenario:**
/// 1. Launch a runtime whose journal directory is a temporary directory.
/// 2. Build a counter with a named journal and add 3 and 4.
/// 3. Stop it immediately and build a new counter with the same journal name.
///
/// **Verification:**
/// - The journal file exists and holds one JSON line per call.
/// - The new counter replays to 7.
#[mailroom_test]
async fn test_file_journal_survives_restart() -> anyhow::Result<()> {
    initialize_tracing();
    let directory = tempfile::tempdir()?;
    let mut config = MailroomConfig::default();
    config.journal.directory = Some(directory.path().to_path_buf());
    let runtime = MailroomApp::launch_with_config(config);

    let first = runtime
        .new_service(counter())
        .with_journal("counter", Duration::ZERO)
        .build()?;
    first.method("add").send_now(vec![json!(3)]).await;
    first.method("add").send_now(vec![json!(4)]).await;
    assert_eq!(first.method("get").call(vec![]).await?, json!(7));
    first.shutdown(ShutdownMode::Immediate).await;

    let path = directory.path().join("counter.journal");
    let contents = std::fs::read_to_string(&path)?;
    let entries: Vec<JournalEntry> = contents
        .lines()
        .map(|line| serde_json::from_str(line))
        .collect::<Result<_, _>>()?;
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].args, vec![json!(3)]);
    assert_eq!(entries[2].kind, MessageKind::Query);

    let second = runtime
        .new_service(counter())
        .with_journal("counter", Duration::ZERO)
        .build()?;
    assert_eq!(second.method("get").call(vec![]).await?, json!(7));
    Ok(())
}

/// Tests that buffered journal entries reach the file once the flush delay passes, even
/// when no further calls arrive.
///
/// **Scenario:**
/// 1. Build a counter journalled to a file with a 500 ms flush delay.
/// 2. Add 2 and read the counter back, then leave the service idle.
/// 3. Wait past the delay without saving or stopping the service.
///
/// **Verification:**
/// - Right after the calls the entries are still buffered.
/// - After the delay the file holds both entries.
#[mailroom_test]
async fn test_idle_file_journal_flushes_after_delay() -> anyhow::Result<()> {
    initialize_tracing();
    let directory = tempfile::tempdir()?;
    let mut config = MailroomConfig::default();
    config.journal.directory = Some(directory.path().to_path_buf());
    let runtime = MailroomApp::launch_with_config(config);

    let counter = runtime
        .new_service(counter())
        .with_journal("idle", Duration::from_millis(500))
        .build()?;
    counter.method("add").send_now(vec![json!(2)]).await;
    assert_eq!(counter.method("get").call(vec![]).await?, json!(2));

    let path = directory.path().join("idle.journal");
    assert_eq!(std::fs::metadata(&path)?.len(), 0);

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    let contents = std::fs::read_to_string(&path)?;
    assert_eq!(contents.lines().count(), 2);
    assert!(!counter.is_closed());
    Ok(())
}
