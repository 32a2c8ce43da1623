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

use tracing::Span;

use crate::traits::{ContextGuard, ExecutionContext};

/// An [`ExecutionContext`] that runs delegated calls inside a tracing span.
#[derive(Debug, Clone)]
pub struct SpanContext {
    name: String,
    span: Span,
}

impl SpanContext {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

impl ExecutionContext for SpanContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn enter(&self) -> ContextGuard {
        let entered = self.span.clone().entered();
        ContextGuard::new(move || drop(entered))
    }
}
