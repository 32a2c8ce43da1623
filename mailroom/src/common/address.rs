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

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::common::ServiceError;

static NEXT_ANONYMOUS: AtomicU64 = AtomicU64::new(1);

/// A canonical service address such as `local:///echo` or `pod://cluster/users`.
///
/// Addresses are always stored in canonical form:
///
/// | Input            | Canonical            |
/// |------------------|----------------------|
/// | `/foo`           | `local:///foo`       |
/// | `scheme:/bar`    | `scheme:///bar`      |
/// | `scheme://x/y`   | unchanged            |
/// | `scheme:`        | unchanged            |
/// | `scheme:bar`     | rejected             |
///
/// The authority section between `://` and the next `/` is the pod qualifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parses and canonicalises an address.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidAddress`] for an empty string or a scheme followed by
    /// a relative tail (`scheme:bar`).
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ServiceError::InvalidAddress {
                address: raw.to_string(),
                reason: "address is empty".to_string(),
            });
        }

        if raw.starts_with('/') {
            return Ok(Self(format!("local://{raw}")));
        }

        if raw.contains("://") {
            return Ok(Self(raw.to_string()));
        }

        match raw.find(':') {
            Some(colon) if colon > 0 => {
                let (scheme, tail) = (&raw[..colon], &raw[colon + 1..]);
                if tail.starts_with('/') {
                    Ok(Self(format!("{scheme}://{tail}")))
                } else if tail.is_empty() {
                    Ok(Self(raw.to_string()))
                } else {
                    Err(ServiceError::InvalidAddress {
                        address: raw.to_string(),
                        reason: "a scheme must be followed by '/'".to_string(),
                    })
                }
            }
            _ => Ok(Self(raw.to_string())),
        }
    }

    /// The conventional local address for a service name: `local:///<name>`, with the first
    /// letter of the name lower-cased.
    pub fn local(name: &str) -> Self {
        let mut chars = name.trim_start_matches('/').chars();
        let path: String = match chars.next() {
            Some(first) => first.to_lowercase().chain(chars).collect(),
            None => String::new(),
        };
        Self(format!("local:///{path}"))
    }

    /// A fresh, unregistered address for an anonymous or pinned service.
    pub fn anonymous(name: &str) -> Self {
        let n = NEXT_ANONYMOUS.fetch_add(1, Ordering::Relaxed);
        Self(format!("anon:{name}#{n}"))
    }

    /// Keeps `raw` as given. Used to name placeholders for addresses that failed to parse.
    pub(crate) fn verbatim(raw: &str) -> Self {
        Self(raw.to_string())
    }

    /// The canonical string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The scheme, e.g. `local` or `pod`.
    pub fn scheme(&self) -> &str {
        self.0.split_once(':').map_or("", |(scheme, _)| scheme)
    }

    /// The pod qualifier (the authority between `://` and the following `/`), if any.
    pub fn pod(&self) -> Option<&str> {
        let (_, rest) = self.0.split_once("://")?;
        let authority = rest.split('/').next().unwrap_or_default();
        (!authority.is_empty()).then_some(authority)
    }

    /// The path component, starting with `/` for hierarchical addresses.
    pub fn path(&self) -> &str {
        match self.0.split_once("://") {
            Some((_, rest)) => rest.find('/').map_or("", |slash| &rest[slash..]),
            None => self.0.split_once(':').map_or(self.0.as_str(), |(_, tail)| tail),
        }
    }

    /// Appends a sub-path, keeping exactly one `/` at the seam.
    pub fn join(&self, sub_path: &str) -> Self {
        let sub_path = sub_path.trim_start_matches('/');
        if sub_path.is_empty() {
            return self.clone();
        }
        let base = self.0.trim_end_matches('/');
        if base.ends_with(':') || base.ends_with("://") {
            Self(format!("{}/{sub_path}", self.0))
        } else {
            Self(format!("{base}/{sub_path}"))
        }
    }

    /// Rewrites `self` from under `from` to under `to`.
    ///
    /// Returns `None` when `self` does not start with `from`.
    pub fn rebase(&self, from: &Address, to: &Address) -> Option<Self> {
        let tail = self.0.strip_prefix(from.as_str())?;
        Some(to.join(tail))
    }

    /// Returns `true` for addresses created by [`Address::anonymous`].
    pub fn is_anonymous(&self) -> bool {
        self.0.starts_with("anon:")
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = ServiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
