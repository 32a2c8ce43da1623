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

use mailroom::prelude::*;

/// Replies and streams the staller has taken and never finished.
#[derive(Default)]
pub struct Held {
    replies: Vec<Continuation<Value>>,
    streams: Vec<StreamSink>,
}

/// Defers every reply. `hold` keeps the continuation forever; `drop` lets it go unanswered.
/// `tail` emits one value and then keeps its stream open.
pub fn staller() -> ServiceDef<Held> {
    ServiceDef::new("staller", Held::default())
        .act_on(MethodInfo::new("hold"), |held, call| {
            held.replies.push(call.defer());
            Ok(Reply::Deferred)
        })
        .act_on(MethodInfo::new("drop"), |_, call| {
            drop(call.defer());
            Ok(Reply::Deferred)
        })
        .act_on_stream(MethodInfo::new("tail"), |held, _, sink| {
            sink.next(Value::from("first"));
            held.streams.push(sink);
            Ok(())
        })
}
