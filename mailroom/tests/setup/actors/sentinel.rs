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

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mailroom::prelude::*;

/// Detects overlapping invocations.
///
/// Each `work` marks the actor busy, yields to the scheduler for a moment and marks it idle
/// again. Finding the flag already set means two invocations overlapped.
#[derive(Debug, Clone, Default)]
pub struct Sentinel {
    pub busy: Arc<AtomicBool>,
    pub overlaps: Arc<AtomicUsize>,
    pub calls: Arc<AtomicUsize>,
    pub pause: Duration,
}

impl Sentinel {
    pub fn with_pause(pause: Duration) -> Self {
        Self {
            pause,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Actor for Sentinel {
    fn name(&self) -> &str {
        "sentinel"
    }

    fn methods(&self) -> Vec<MethodInfo> {
        vec![MethodInfo::new("work").param("n", "u64").returns("u64")]
    }

    async fn invoke(&mut self, call: &mut Call<'_>) -> Result<Reply, ServiceError> {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        tokio::time::sleep(self.pause).await;
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.busy.store(false, Ordering::SeqCst);
        Ok(Reply::Value(call.args()[0].clone()))
    }
}
