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

use std::sync::OnceLock;

use parking_lot::Mutex;

/// A value published at most once, built under a narrow lock.
///
/// Readers never lock once the value is published. A failed initialisation leaves the slot
/// empty so the next caller tries again.
#[derive(Debug, Default)]
pub(crate) struct LazySlot<T> {
    value: OnceLock<T>,
    lock: Mutex<()>,
}

impl<T> LazySlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            value: OnceLock::new(),
            lock: Mutex::new(()),
        }
    }

    pub(crate) fn get(&self) -> Option<&T> {
        self.value.get()
    }

    /// Returns the published value, running `init` if there is none yet.
    ///
    /// Concurrent first callers serialize on the lock and re-check after acquiring it, so
    /// `init` runs exactly once for a successful initialisation.
    pub(crate) fn get_or_try_init(&self, init: impl FnOnce() -> Option<T>) -> Option<&T> {
        if let Some(value) = self.value.get() {
            return Some(value);
        }
        let _guard = self.lock.lock();
        if let Some(value) = self.value.get() {
            return Some(value);
        }
        let value = init()?;
        let _ = self.value.set(value);
        self.value.get()
    }
}
