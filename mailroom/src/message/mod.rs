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

//! Message envelopes and the callbacks they carry.

pub use call::{Call, Reply};
pub use continuation::{Continuation, Pending};
pub use envelope::{Message, MessageKind};
pub use stream::{ResultStream, StreamReceiver, StreamSink};

pub(crate) use envelope::{route, Envelope, MessageParts, QueryReply, ReplyTask, ReplyTo};

/// Defines the per-invocation context handed to actors.
mod call;
/// Defines single-shot result callbacks.
mod continuation;
/// Defines messages and the reply plumbing of queries.
mod envelope;
/// Defines the consumer and producer halves of streaming calls.
mod stream;
