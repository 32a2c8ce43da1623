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

use std::sync::Arc;

use serde_json::Value;

/// Immutable call headers carried by every message.
///
/// Adding a header returns a new `Headers`; the original is left untouched, so a header set can
/// be shared between many messages without copying.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Headers(Arc<Vec<(String, Value)>>);

impl Headers {
    /// An empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with `key` set to `value`, replacing any previous value for `key`.
    #[must_use]
    pub fn add(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let mut entries: Vec<(String, Value)> = self
            .0
            .iter()
            .filter(|(existing, _)| *existing != key)
            .cloned()
            .collect();
        entries.push((key, value.into()));
        Self(Arc::new(entries))
    }

    /// Looks up a header value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0
            .iter()
            .find_map(|(existing, value)| (existing == key).then_some(value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub(crate) fn to_vec(&self) -> Vec<(String, Value)> {
        self.0.as_ref().clone()
    }
}

impl From<Vec<(String, Value)>> for Headers {
    fn from(entries: Vec<(String, Value)>) -> Self {
        Self(Arc::new(entries))
    }
}
