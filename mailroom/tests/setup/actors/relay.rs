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

/// Answers `relay(text)` by querying `target` and replying with its answer once it arrives.
pub fn relay(target: MethodRef) -> ServiceDef<MethodRef> {
    ServiceDef::new("relay", target)
        .act_on(
            MethodInfo::new("relay").param("text", "String").returns("String"),
            |target, call| {
                let text = call.args()[0].clone();
                let reply = call.defer().then(|answer: Value| {
                    let answer = answer.as_str().unwrap_or_default();
                    Ok(Value::from(format!("{answer} (relayed)")))
                });
                target.query(call.outbox(), Headers::new(), reply, None, vec![text]);
                Ok(Reply::Deferred)
            },
        )
}
