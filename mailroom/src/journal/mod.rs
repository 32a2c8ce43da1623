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

//! Durable call journals.
//!
//! A journalled inbox records every delivered call before the actor runs it. When the
//! inbox starts again the entries are replayed into the fresh actor, and a successful save
//! truncates them.

use derive_new::new;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::MessageKind;

pub use file::FileJournal;
pub use memory::MemoryJournal;

/// Defines the JSON-lines file journal.
mod file;
/// Defines the in-memory journal.
mod memory;

/// One recorded call.
#[derive(new, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position of the call within the journalling inbox, starting at zero.
    pub sequence: u64,
    pub kind: MessageKind,
    pub method: String,
    pub args: Vec<Value>,
    #[serde(default)]
    pub headers: Vec<(String, Value)>,
}
