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

/// Records every `record(n)` in arrival order; `snapshot()` returns the list so far.
pub fn recorder(name: &str) -> ServiceDef<Vec<Value>> {
    ServiceDef::new(name, Vec::new())
        .act_on(MethodInfo::new("record").param("entry", "Value"), |log, call| {
            log.push(call.args()[0].clone());
            Ok(Reply::null())
        })
        .act_on(MethodInfo::new("snapshot").returns("Vec<Value>"), |log, _call| {
            Reply::json(log.clone())
        })
}
