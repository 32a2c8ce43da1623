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

/// A running total: `add(n)` and `get()`.
pub fn counter() -> ServiceDef<i64> {
    ServiceDef::new("counter", 0i64)
        .act_on(MethodInfo::new("add").param("n", "i64"), |total, call| {
            *total += call.arg::<i64>(0)?;
            Ok(Reply::null())
        })
        .act_on(MethodInfo::new("get").returns("i64"), |total, _call| {
            Reply::json(*total)
        })
}
