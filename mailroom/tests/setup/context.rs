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

use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::sync::Arc;

use mailroom::prelude::*;

/// An execution context that counts how often it is entered and how many guards are
/// currently open.
#[derive(Debug, Default)]
pub struct CountingContext {
    pub entered: AtomicUsize,
    pub open: Arc<AtomicIsize>,
}

impl ExecutionContext for CountingContext {
    fn name(&self) -> &str {
        "counting"
    }

    fn enter(&self) -> ContextGuard {
        self.entered.fetch_add(1, Ordering::SeqCst);
        self.open.fetch_add(1, Ordering::SeqCst);
        let open = Arc::clone(&self.open);
        ContextGuard::new(move || {
            open.fetch_sub(1, Ordering::SeqCst);
        })
    }
}
