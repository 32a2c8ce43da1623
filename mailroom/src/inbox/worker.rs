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

use tracing::{error, info, instrument, trace, warn};

use super::pipeline::Pipeline;
use super::{Event, Inbox, ShutdownMode};
use crate::common::{Headers, ServiceError};
use crate::message::{Call, Envelope, MessageKind};
use crate::outbox::Outbox;
use crate::traits::{Actor, Journal};

/// The loop of one inbox worker.
///
/// Replays the journal (first worker only), runs `on_init`, then processes reply tasks and
/// queued envelopes one at a time until it is stopped or cancelled. The worker's outbox is
/// flushed after every unit of work.
#[instrument(skip(inbox, actor), fields(address = %inbox.address()))]
pub(super) async fn run(inbox: Inbox, index: usize, mut actor: Box<dyn Actor>) {
    let pipeline = Pipeline::new(inbox.inner.stages.clone());
    let mut outbox = Outbox::for_inbox(inbox.clone());

    if index == 0 {
        if let Some(journal) = inbox.inner.journal.clone() {
            replay(&inbox, &journal, actor.as_mut()).await;
        }
    }

    if let Err(error) = actor.on_init(&mut outbox).await {
        error!("on_init failed: {}", error);
    }
    outbox.flush().await;

    loop {
        let event = match pipeline.flush_due() {
            Some(due) => tokio::select! {
                event = inbox.next_event() => event,
                () = tokio::time::sleep(due) => {
                    trace!("flushing idle pipeline");
                    pipeline.after_batch();
                    continue;
                }
            },
            None => inbox.next_event().await,
        };
        match event {
            Event::Reply(task) => {
                task(&mut outbox);
                outbox.flush().await;
            }
            Event::Envelope(Envelope::Deliver(message)) => {
                pipeline
                    .deliver(&inbox, &mut actor, message, &mut outbox)
                    .await;
                outbox.flush().await;
                if inbox.depth() == 0 {
                    pipeline.after_batch();
                }
            }
            Event::Envelope(Envelope::Save(result)) => {
                let saved = save(&inbox, actor.as_mut()).await;
                result.complete_in(saved, &mut outbox);
                outbox.flush().await;
            }
            Event::Envelope(Envelope::Stop) => {
                trace!("stop received");
                actor.on_shutdown(ShutdownMode::Graceful).await;
                break;
            }
            Event::Cancelled | Event::Closed => {
                trace!("worker cancelled");
                actor.on_shutdown(ShutdownMode::Immediate).await;
                break;
            }
        }
    }

    pipeline.after_batch();
    outbox.flush().await;
}

/// Feeds every journalled call back into a fresh actor.
///
/// Replayed calls bypass the pipeline so they are not journalled twice, and calls the actor
/// issues while replaying are discarded.
async fn replay(inbox: &Inbox, journal: &Arc<dyn Journal>, actor: &mut dyn Actor) {
    let entries = match journal.replay() {
        Ok(entries) => entries,
        Err(e) => {
            error!("journal '{}' replay failed: {:#}", journal.name(), e);
            return;
        }
    };
    if entries.is_empty() {
        return;
    }

    info!(count = entries.len(), journal = journal.name(), "replaying journal");
    let mut scratch = Outbox::new();
    for entry in entries {
        let mut call = Call::new(
            inbox.address(),
            MessageKind::OneWay,
            entry.method,
            Headers::from(entry.headers),
            entry.args,
            None,
            &mut scratch,
            inbox.runtime(),
        );
        if let Err(error) = actor.invoke(&mut call).await {
            warn!(sequence = entry.sequence, "replayed call failed: {}", error);
        }
    }
    scratch.discard();
}

/// Runs the actor's save hook and checkpoints the journal once it succeeds.
async fn save(inbox: &Inbox, actor: &mut dyn Actor) -> Result<(), ServiceError> {
    actor.on_save().await?;
    if let Some(journal) = inbox.journal() {
        journal
            .flush()
            .and_then(|()| journal.checkpoint())
            .map_err(|e| ServiceError::Execution(format!("journal '{}': {e:#}", journal.name())))?;
    }
    Ok(())
}
