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

use std::sync::atomic::{AtomicU8, Ordering};

/// The lifecycle of an inbox.
///
/// `Configured → Ready → Accepting → Stopping → Closed`. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum InboxState {
    /// Built but not initialised. Messages may already be queued.
    Configured = 0,
    /// Initialised; workers not yet running.
    Ready = 1,
    /// Workers are draining the queue.
    Accepting = 2,
    /// Shutdown in progress; new offers are rejected.
    Stopping = 3,
    /// Shut down.
    Closed = 4,
}

impl InboxState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Configured,
            1 => Self::Ready,
            2 => Self::Accepting,
            3 => Self::Stopping,
            _ => Self::Closed,
        }
    }

    /// Whether offers are accepted in this state.
    pub const fn accepts_messages(self) -> bool {
        (self as u8) < (Self::Stopping as u8)
    }
}

/// Atomic holder for an [`InboxState`] with compare-and-swap transitions.
#[derive(Debug)]
pub(crate) struct Lifecycle(AtomicU8);

impl Lifecycle {
    pub(crate) const fn new() -> Self {
        Self(AtomicU8::new(InboxState::Configured as u8))
    }

    pub(crate) fn get(&self) -> InboxState {
        InboxState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves `from → to`; returns `false` if the current state was not `from`.
    pub(crate) fn transition(&self, from: InboxState, to: InboxState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Enters `Stopping` unless already stopping or closed; returns the prior state.
    pub(crate) fn begin_stopping(&self) -> InboxState {
        let previous = self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
            (state < InboxState::Stopping as u8).then_some(InboxState::Stopping as u8)
        });
        match previous {
            Ok(state) | Err(state) => InboxState::from_u8(state),
        }
    }

    pub(crate) fn close(&self) {
        self.0.store(InboxState::Closed as u8, Ordering::Release);
    }
}
