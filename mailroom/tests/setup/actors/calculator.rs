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

/// Integer arithmetic, used to exercise generated stubs with several parameters and
/// fallible methods.
#[derive(Debug, Default)]
pub struct Calculator {
    pub memory: i64,
}

#[mailroom_service(name = "calc")]
impl Calculator {
    pub fn add(&self, a: i64, b: i64) -> i64 {
        a + b
    }

    pub fn divide(&self, a: i64, b: i64) -> Result<i64, ServiceError> {
        if b == 0 {
            return Err(ServiceError::execution("division by zero"));
        }
        Ok(a / b)
    }

    pub fn store(&mut self, value: i64) {
        self.reset();
        self.memory += value;
    }

    pub async fn recall(&self) -> i64 {
        self.memory
    }

    // private, so not part of the method table
    fn reset(&mut self) {
        self.memory = 0;
    }
}
