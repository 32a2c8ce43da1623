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

use std::time::Duration;

use mailroom::prelude::*;

/// One member of a worker pool; answers with the id its factory gave it.
#[derive(Debug)]
pub struct PoolWorker {
    id: usize,
}

impl PoolWorker {
    pub fn new(id: usize) -> Self {
        Self { id }
    }
}

#[mailroom_service(name = "pool")]
impl PoolWorker {
    pub async fn whoami(&self) -> usize {
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.id
    }
}
