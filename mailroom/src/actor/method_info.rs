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

use derive_new::new;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::ServiceError;

/// One declared parameter.
#[derive(new, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamInfo {
    pub name: String,
    /// The declared type, as written in the source.
    pub ty: String,
}

/// Metadata for one callable method: name, parameters, return type and vararg flag.
///
/// # Example
///
/// ```rust,ignore
/// let info = MethodInfo::new("add")
///     .param("a", "i64")
///     .param("b", "i64")
///     .returns("i64");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    name: String,
    params: Vec<ParamInfo>,
    returns: String,
    varargs: bool,
    dynamic: bool,
}

impl MethodInfo {
    /// A method taking no parameters and returning `()`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: "()".to_string(),
            varargs: false,
            dynamic: false,
        }
    }

    /// Metadata for a method of a dynamic actor; arguments are passed through unchecked.
    pub fn dynamic(name: impl Into<String>) -> Self {
        Self {
            dynamic: true,
            ..Self::new(name)
        }
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.params.push(ParamInfo::new(name.into(), ty.into()));
        self
    }

    #[must_use]
    pub fn returns(mut self, ty: impl Into<String>) -> Self {
        self.returns = ty.into();
        self
    }

    /// Marks the last parameter as variadic: every trailing argument is collected into one
    /// array.
    #[must_use]
    pub fn varargs(mut self) -> Self {
        self.varargs = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ParamInfo] {
        &self.params
    }

    pub fn return_type(&self) -> &str {
        &self.returns
    }

    pub fn is_varargs(&self) -> bool {
        self.varargs
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Checks `args` against the declared parameters, folding variadic tails in place.
    ///
    /// # Errors
    ///
    /// [`ServiceError::InvalidArguments`] when the argument count does not fit.
    pub fn check_args(&self, args: &mut Vec<Value>) -> Result<(), ServiceError> {
        if self.dynamic {
            return Ok(());
        }
        let declared = self.params.len();
        if !self.varargs {
            if args.len() != declared {
                return Err(self.arity_error(args.len()));
            }
            return Ok(());
        }

        let fixed = declared.saturating_sub(1);
        if args.len() < fixed {
            return Err(self.arity_error(args.len()));
        }
        // A single array in the variadic position is already folded.
        if args.len() == declared && args.last().is_some_and(Value::is_array) {
            return Ok(());
        }
        let tail: Vec<Value> = args.drain(fixed..).collect();
        args.push(Value::Array(tail));
        Ok(())
    }

    fn arity_error(&self, got: usize) -> ServiceError {
        let expected = if self.varargs {
            format!("at least {}", self.params.len().saturating_sub(1))
        } else {
            self.params.len().to_string()
        };
        ServiceError::InvalidArguments {
            method: self.name.clone(),
            reason: format!("expected {expected} arguments, got {got}"),
        }
    }
}
