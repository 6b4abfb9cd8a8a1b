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

use std::collections::HashSet;
use std::sync::Arc;

use crate::message::{MessageContextRef, NodeId};

/// Shared handle to a transport.
pub type TransportRef = Arc<dyn MessageTransport>;

/// Moves messages between this process and remote transport nodes.
///
/// A transport is driven by a [`MessageBridge`](crate::common::MessageBridge): outbound
/// messages arrive through [`transport_message`](Self::transport_message) on the router
/// thread, and inbound messages are handed back through
/// [`MessageBridge::receive_transport_message`](crate::common::MessageBridge::receive_transport_message).
pub trait MessageTransport: Send + Sync {
    /// Queues `context` for delivery to `nodes`, which is never empty.
    ///
    /// Returns `false` if the message could not be queued.
    fn transport_message(&self, context: &MessageContextRef, nodes: &HashSet<NodeId>) -> bool;

    fn debug_name(&self) -> &str {
        "transport"
    }
}
