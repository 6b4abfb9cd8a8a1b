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

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// The name used to match messages against subscriptions and interceptors.
///
/// Local messages are named after their Rust type (see [`MessageTypeName::of`]); messages
/// that arrive from a transport carry whatever name the remote side stamped on them.
/// The empty name is the null sentinel: the bus refuses to subscribe or intercept it.
///
/// Cloning is cheap (the string is shared).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageTypeName(Arc<str>);

impl MessageTypeName {
    /// Creates a type name from any string.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Returns the name of the Rust type `M`.
    #[must_use]
    pub fn of<M: ?Sized>() -> Self {
        Self::new(std::any::type_name::<M>())
    }

    /// Returns the null type name.
    #[must_use]
    pub fn none() -> Self {
        Self(Arc::from(""))
    }

    /// Returns `true` for the null type name.
    #[inline]
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the name as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageTypeName {
    fn default() -> Self {
        Self::none()
    }
}

impl Borrow<str> for MessageTypeName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageTypeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for MessageTypeName {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&MessageTypeName> for MessageTypeName {
    fn from(name: &MessageTypeName) -> Self {
        name.clone()
    }
}

impl fmt::Display for MessageTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for MessageTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}
