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

pub use actor::Actor;
pub use delivery_stage::DeliveryStage;
pub use execution_context::{ContextGuard, ExecutionContext};
pub use journal::Journal;
pub use queue_full_handler::QueueFullHandler;

/// Defines the invocable stub bound into an inbox.
mod actor;
/// Defines the stages of the per-message delivery pipeline.
mod delivery_stage;
/// Defines execution contexts swapped in around delegated calls.
mod execution_context;
/// Defines durable call journals.
mod journal;
/// Defines observers for rejected offers.
mod queue_full_handler;
