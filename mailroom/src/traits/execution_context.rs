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

use std::fmt::{self, Debug};

/// An execution context swapped in around every call made through a context-wrapped handle.
///
/// [`ExecutionContext::enter`] installs the context and returns a guard that restores the
/// previous one when dropped, on every exit path.
pub trait ExecutionContext: Send + Sync + Debug {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Installs the context until the returned guard is dropped.
    fn enter(&self) -> ContextGuard;
}

/// Restores the previous execution context when dropped.
#[must_use = "the context is left as soon as the guard is dropped"]
pub struct ContextGuard {
    on_exit: Option<Box<dyn FnOnce()>>,
}

impl ContextGuard {
    /// Runs `on_exit` when the guard is dropped.
    pub fn new(on_exit: impl FnOnce() + 'static) -> Self {
        Self {
            on_exit: Some(Box::new(on_exit)),
        }
    }

    /// A guard with nothing to restore.
    pub fn noop() -> Self {
        Self { on_exit: None }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(on_exit) = self.on_exit.take() {
            on_exit();
        }
    }
}

impl Debug for ContextGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextGuard")
            .field("armed", &self.on_exit.is_some())
            .finish()
    }
}
