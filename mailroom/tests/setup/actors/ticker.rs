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

/// Streams `count(n)` as the values `0..n`; a negative count fails the stream.
pub fn ticker() -> ServiceDef<()> {
    ServiceDef::new("ticker", ()).act_on_stream(
        MethodInfo::new("count").param("n", "i64").returns("i64"),
        |_, call, sink| {
            let n: i64 = call.arg(0)?;
            if n < 0 {
                return Err(ServiceError::InvalidArguments {
                    method: call.method().to_string(),
                    reason: "count must not be negative".to_string(),
                });
            }
            for i in 0..n {
                sink.next(Value::from(i));
            }
            sink.complete();
            Ok(())
        },
    )
}
