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

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, trace, warn};

use crate::common::{Address, ServiceError};
use crate::inbox::Inbox;
use crate::journal::JournalEntry;
use crate::message::{Call, Message, MessageKind, MessageParts, Reply, ReplyTo};
use crate::outbox::Outbox;
use crate::traits::{Actor, DeliveryStage, Journal};

/// Records every message in the inbox's journal before the actor sees it.
#[derive(Debug)]
pub struct JournalStage {
    journal: Arc<dyn Journal>,
    address: Address,
    sequence: AtomicU64,
}

impl JournalStage {
    /// Creates a stage writing to `journal` on behalf of the service at `address`.
    pub fn new(journal: Arc<dyn Journal>, address: Address) -> Self {
        Self {
            journal,
            address,
            sequence: AtomicU64::new(0),
        }
    }

    fn journal_error(&self, error: &anyhow::Error) -> ServiceError {
        ServiceError::Execution(format!(
            "journal '{}' for {}: {error:#}",
            self.journal.name(),
            self.address
        ))
    }
}

impl DeliveryStage for JournalStage {
    fn name(&self) -> &str {
        "journal"
    }

    fn deliver(&self, message: &Message) -> Result<(), ServiceError> {
        let entry = JournalEntry::new(
            self.sequence.fetch_add(1, Ordering::Relaxed),
            message.kind(),
            message.method().to_string(),
            message.args().to_vec(),
            message.headers().to_vec(),
        );
        self.journal
            .append(&entry)
            .map_err(|error| self.journal_error(&error))
    }

    fn after_batch(&self) {
        if let Err(error) = self.journal.flush() {
            warn!("{}", self.journal_error(&error));
        }
    }

    fn flush_due(&self) -> Option<Duration> {
        self.journal.flush_due()
    }
}

/// Logs every delivery at `debug`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceStage;

impl DeliveryStage for TraceStage {
    fn name(&self) -> &str {
        "trace"
    }

    fn deliver(&self, message: &Message) -> Result<(), ServiceError> {
        debug!(
            id = message.id(),
            kind = ?message.kind(),
            address = %message.target(),
            method = message.method(),
            args = message.args().len(),
            "delivering"
        );
        Ok(())
    }
}

/// The ordered stages of one worker followed by the actor itself.
pub(super) struct Pipeline {
    stages: Vec<Arc<dyn DeliveryStage>>,
}

impl Pipeline {
    pub(super) fn new(stages: Vec<Arc<dyn DeliveryStage>>) -> Self {
        Self { stages }
    }

    /// Runs one message through every stage and then the actor.
    #[instrument(skip_all, fields(message = %message))]
    pub(super) async fn deliver(
        &self,
        inbox: &Inbox,
        actor: &mut Box<dyn Actor>,
        message: Message,
        outbox: &mut Outbox,
    ) {
        if message.is_expired() {
            let error = ServiceError::Timeout {
                address: message.target().to_string(),
                method: message.method().to_string(),
                timeout: message.timeout().unwrap_or_default(),
            };
            trace!("expired before dequeue");
            message.fail_in(error, Some(outbox));
            return;
        }

        for stage in &self.stages {
            if let Err(error) = stage.deliver(&message) {
                warn!(stage = stage.name(), "delivery rejected: {}", error);
                message.fail_in(error, Some(outbox));
                return;
            }
        }

        invoke(inbox, actor.as_mut(), message, outbox).await;
    }

    pub(super) fn after_batch(&self) {
        for stage in &self.stages {
            stage.after_batch();
        }
    }

    /// The earliest deadline any stage reported for its buffered work.
    pub(super) fn flush_due(&self) -> Option<Duration> {
        self.stages.iter().filter_map(|stage| stage.flush_due()).min()
    }
}

/// Hands one message to the actor and routes its outcome to the caller.
async fn invoke(inbox: &Inbox, actor: &mut dyn Actor, message: Message, outbox: &mut Outbox) {
    let MessageParts {
        kind,
        method,
        headers,
        args,
        reply,
    } = message.into_parts();

    if let ReplyTo::Stream(sink) = reply {
        let mut call = Call::new(
            inbox.address(),
            kind,
            method,
            headers,
            args,
            None,
            outbox,
            inbox.runtime(),
        );
        if let Err(error) = actor.invoke_stream(&mut call, sink.clone()).await {
            sink.fail(error);
        }
        return;
    }

    let reply = match reply {
        ReplyTo::Query(reply) => Some(reply.into_continuation()),
        _ => None,
    };
    let mut call = Call::new(
        inbox.address(),
        kind,
        method,
        headers,
        args,
        reply,
        outbox,
        inbox.runtime(),
    );
    let result = actor.invoke(&mut call).await;
    match (result, call.take_reply()) {
        (Ok(Reply::Value(value)), Some(reply)) => reply.complete_in(Ok(value), call.outbox()),
        (Ok(Reply::Deferred), Some(reply)) => {
            let error = ServiceError::Execution(format!(
                "'{}' returned Deferred without taking its continuation",
                call.method()
            ));
            reply.complete_in(Err(error), call.outbox());
        }
        (Err(error), Some(reply)) => reply.complete_in(Err(error), call.outbox()),
        (Err(error), None) if kind == MessageKind::OneWay => {
            warn!(method = call.method(), "one-way call failed: {}", error);
        }
        (Err(error), None) => {
            debug!(method = call.method(), "deferred call failed: {}", error);
        }
        (Ok(_), None) => {}
    }
}
