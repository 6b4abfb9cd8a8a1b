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

use crate::message::MessageContextRef;

/// Shared handle to a registered recipient.
pub type RecipientRef = Arc<dyn MessageRecipient>;

/// Receives messages delivered by the router.
///
/// `receive_message` runs on the router thread. Implementations should hand heavy work
/// off to their own executor; a recipient that blocks stalls every other delivery. A
/// panic is caught, logged and counted, and does not affect other recipients.
///
/// Recipients are held by the bus for as long as they are registered, so they must not
/// own the [`MessageBus`](crate::common::MessageBus) they are registered with.
pub trait MessageRecipient: Send + Sync {
    /// Handles one delivered message.
    fn receive_message(&self, context: &MessageContextRef);

    /// A human-readable name used in logs.
    fn debug_name(&self) -> &str {
        "recipient"
    }

    /// Returns `false` for recipients that stand in for remote addresses.
    ///
    /// Non-local recipients do not receive publishes scoped to [`Thread`] or [`Process`].
    ///
    /// [`Thread`]: crate::message::MessageScope::Thread
    /// [`Process`]: crate::message::MessageScope::Process
    fn is_local(&self) -> bool {
        true
    }
}

impl<F> MessageRecipient for F
where
    F: Fn(&MessageContextRef) + Send + Sync,
{
    fn receive_message(&self, context: &MessageContextRef) {
        self(context);
    }
}
