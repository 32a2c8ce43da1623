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
use parking_lot::Mutex;

/// Events from both ends of a hand-off, in the order they happened.
pub type Timeline = Arc<Mutex<Vec<String>>>;

/// Notes `saw <entry>` on the timeline for every `record(entry)`.
pub fn observer(timeline: Timeline) -> ServiceDef<Timeline> {
    ServiceDef::new("observer", timeline).act_on(
        MethodInfo::new("record").param("entry", "Value"),
        |timeline, call| {
            timeline.lock().push(format!("saw {}", call.args()[0]));
            Ok(Reply::null())
        },
    )
}

/// Sends every `forward(entry)` on to `target`, lingers briefly, and notes
/// `returned <entry>` on the timeline as the handler's last step.
pub fn forwarder(target: MethodRef, timeline: Timeline) -> ServiceDef<(MethodRef, Timeline)> {
    ServiceDef::new("forwarder", (target, timeline)).act_on(
        MethodInfo::new("forward").param("entry", "Value"),
        |state, call| {
            let (target, timeline) = state;
            let entry = call.args()[0].clone();
            let headers = call.headers().clone();
            target.send(call.outbox(), headers, vec![entry.clone()]);
            std::thread::sleep(Duration::from_millis(2));
            timeline.lock().push(format!("returned {entry}"));
            Ok(Reply::null())
        },
    )
}
