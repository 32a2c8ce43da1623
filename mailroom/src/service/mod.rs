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

//! Handles to services and their methods.
//!
//! A [`ServiceRef`] names a service that may not be resolved yet; a [`MethodRef`] is one
//! callable method on it. Both are small closed sets of variants dispatched on their tag.

pub use context::SpanContext;
pub use method_ref::MethodRef;
pub use service_ref::ServiceRef;

/// Defines the tracing-span execution context.
mod context;
/// Defines the double-checked lazy slot.
mod lazy_slot;
/// Defines method handles.
mod method_ref;
/// Defines service handles.
mod service_ref;
