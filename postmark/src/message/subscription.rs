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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::message::{MessageAddress, MessageScope, MessageTypeName, ScopeRange};

/// Shared handle to a [`Subscription`].
pub type SubscriptionRef = Arc<Subscription>;

/// A subscriber's interest in published messages of one type.
///
/// Returned by [`MessageBus::subscribe`](crate::prelude::MessageBus::subscribe). The handle
/// can be used to pause the subscription without removing it: a disabled subscription never
/// matches.
#[derive(Debug)]
pub struct Subscription {
    subscriber: MessageAddress,
    message_type: MessageTypeName,
    scope_range: ScopeRange,
    enabled: AtomicBool,
}

impl Subscription {
    /// Creates an enabled subscription.
    pub fn new(subscriber: MessageAddress, message_type: MessageTypeName, scope_range: ScopeRange) -> Self {
        Self {
            subscriber,
            message_type,
            scope_range,
            enabled: AtomicBool::new(true),
        }
    }

    /// The subscribing recipient.
    #[inline]
    #[must_use]
    pub fn subscriber(&self) -> MessageAddress {
        self.subscriber
    }

    /// The subscribed message type.
    #[inline]
    #[must_use]
    pub fn message_type(&self) -> &MessageTypeName {
        &self.message_type
    }

    /// The accepted scope range.
    #[inline]
    #[must_use]
    pub fn scope_range(&self) -> ScopeRange {
        self.scope_range
    }

    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    /// Returns `true` if this subscription accepts a publish of the given scope.
    #[must_use]
    pub fn matches(&self, scope: MessageScope) -> bool {
        self.is_enabled() && self.scope_range.contains(scope)
    }
}
