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

use serde::{Deserialize, Serialize};

/// How far a published message may travel.
///
/// Scopes are ordered from narrowest to widest, so subscriptions can accept a
/// contiguous [`ScopeRange`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageScope {
    /// Recipients on the sending thread only.
    Thread,
    /// Recipients in the local process only.
    Process,
    /// Recipients in the local process and on connected transport nodes.
    #[default]
    Network,
    /// Every reachable recipient.
    All,
}

impl MessageScope {
    /// Returns `true` if messages of this scope must not leave the process.
    #[inline]
    #[must_use]
    pub const fn is_local(self) -> bool {
        matches!(self, Self::Thread | Self::Process)
    }
}

/// An inclusive range of [`MessageScope`]s accepted by a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeRange {
    min: MessageScope,
    max: MessageScope,
}

impl ScopeRange {
    /// Accepts every scope.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            min: MessageScope::Thread,
            max: MessageScope::All,
        }
    }

    /// Accepts `scope` and everything wider.
    #[must_use]
    pub const fn at_least(scope: MessageScope) -> Self {
        Self {
            min: scope,
            max: MessageScope::All,
        }
    }

    /// Accepts `scope` and everything narrower.
    #[must_use]
    pub const fn at_most(scope: MessageScope) -> Self {
        Self {
            min: MessageScope::Thread,
            max: scope,
        }
    }

    /// Accepts exactly one scope.
    #[must_use]
    pub const fn exactly(scope: MessageScope) -> Self {
        Self {
            min: scope,
            max: scope,
        }
    }

    /// Accepts every scope between `a` and `b`, in either order.
    #[must_use]
    pub fn between(a: MessageScope, b: MessageScope) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Returns `true` if `scope` lies inside the range.
    #[inline]
    #[must_use]
    pub fn contains(&self, scope: MessageScope) -> bool {
        self.min <= scope && scope <= self.max
    }

    /// Lower bound (inclusive).
    #[inline]
    #[must_use]
    pub const fn min(&self) -> MessageScope {
        self.min
    }

    /// Upper bound (inclusive).
    #[inline]
    #[must_use]
    pub const fn max(&self) -> MessageScope {
        self.max
    }
}

impl Default for ScopeRange {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_ordering() {
        assert!(MessageScope::Thread < MessageScope::Process);
        assert!(MessageScope::Process < MessageScope::Network);
        assert!(MessageScope::Network < MessageScope::All);
        assert!(MessageScope::Process.is_local());
        assert!(!MessageScope::Network.is_local());
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let range = ScopeRange::between(MessageScope::Network, MessageScope::Process);
        assert_eq!(range.min(), MessageScope::Process);
        assert_eq!(range.max(), MessageScope::Network);
        assert!(!range.contains(MessageScope::Thread));
        assert!(range.contains(MessageScope::Process));
        assert!(range.contains(MessageScope::Network));
        assert!(!range.contains(MessageScope::All));
    }

    #[test]
    fn test_range_constructors() {
        assert!(ScopeRange::all().contains(MessageScope::Thread));
        assert!(ScopeRange::all().contains(MessageScope::All));
        assert!(!ScopeRange::at_least(MessageScope::Network).contains(MessageScope::Process));
        assert!(!ScopeRange::at_most(MessageScope::Process).contains(MessageScope::Network));
        assert!(ScopeRange::exactly(MessageScope::Process).contains(MessageScope::Process));
        assert!(!ScopeRange::exactly(MessageScope::Process).contains(MessageScope::Thread));
    }
}
