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

pub use address::Address;
pub use app::MailroomApp;
pub use config::{
    BehaviorSection, InboxSection, JournalSection, MailroomConfig, QuerySection,
    ShutdownSection, CONFIG,
};
pub use error::ServiceError;
pub use headers::Headers;
pub(crate) use lifecycle::Lifecycle;
pub use lifecycle::InboxState;
pub(crate) use runtime::RuntimeInner;
pub use runtime::Runtime;

/// Defines canonical service addresses.
mod address;
/// Defines the runtime entry point.
mod app;
/// Defines configuration loading and defaults.
mod config;
/// Defines the error taxonomy.
mod error;
/// Defines immutable call headers.
mod headers;
/// Defines the inbox state machine.
mod lifecycle;
/// Defines the service registry.
mod runtime;
