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
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::common::{MessageAddressBook, MessageBus};
use crate::message::{MessageAddress, MessageContextRef, MessageTypeName, NodeId, ScopeRange, SubscriptionRef};
use crate::traits::{MessageRecipient, MessageSender, TransportRef};

/// The non-local recipient that stands in for every remote address a bridge knows.
struct BridgeReceiver {
    address_book: Arc<MessageAddressBook>,
    transport: TransportRef,
}

impl MessageRecipient for BridgeReceiver {
    fn receive_message(&self, context: &MessageContextRef) {
        let mut nodes = if context.is_publish() {
            self.address_book.known_nodes()
        } else {
            self.address_book.nodes_for(context.recipients())
        };
        // Never echo a message back to the node it came from.
        if let Some(origin) = self.address_book.node_for(context.sender()) {
            nodes.remove(&origin);
        }
        if nodes.is_empty() {
            trace!(message_type = %context.message_type(), "No remote nodes for message");
            return;
        }
        if !self.transport.transport_message(context, &nodes) {
            warn!(
                transport = self.transport.debug_name(),
                message_type = %context.message_type(),
                nodes = nodes.len(),
                "Transport refused message"
            );
        }
    }

    fn debug_name(&self) -> &str {
        self.transport.debug_name()
    }

    fn is_local(&self) -> bool {
        false
    }
}

/// Connects a [`MessageBus`] to remote processes through a [`MessageTransport`].
///
/// The bridge registers itself under its own address (for subscriptions on behalf of
/// remote nodes) and under every remote sender address it learns, so local code can send
/// to remote recipients as if they were local. Remote addresses are resolved to nodes with
/// a [`MessageAddressBook`].
///
/// [`MessageTransport`]: crate::traits::MessageTransport
pub struct MessageBridge {
    address: MessageAddress,
    bus: MessageBus,
    address_book: Arc<MessageAddressBook>,
    receiver: Arc<BridgeReceiver>,
}

impl fmt::Debug for MessageBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBridge")
            .field("address", &self.address)
            .field("transport", &self.receiver.transport.debug_name())
            .field("remote_addresses", &self.address_book.len())
            .finish()
    }
}

impl MessageBridge {
    /// Registers a bridge for `transport` with `bus`.
    ///
    /// Returns `None` if the bus refuses the registration.
    pub fn new(bus: &MessageBus, transport: TransportRef) -> Option<Self> {
        let address = MessageAddress::new();
        let address_book = Arc::new(MessageAddressBook::new());
        let receiver = Arc::new(BridgeReceiver {
            address_book: Arc::clone(&address_book),
            transport,
        });
        if !bus.register(address, receiver.clone()) {
            return None;
        }
        debug!(%address, transport = receiver.transport.debug_name(), "Message bridge registered");
        Some(Self {
            address,
            bus: bus.clone(),
            address_book,
            receiver,
        })
    }

    #[inline]
    #[must_use]
    pub fn address(&self) -> MessageAddress {
        self.address
    }

    /// Remote addresses learned so far and the nodes they live on.
    #[must_use]
    pub fn address_book(&self) -> &MessageAddressBook {
        &self.address_book
    }

    /// Subscribes the bridge to `message_type` on behalf of remote nodes, so matching local
    /// publishes are handed to the transport.
    pub fn subscribe_remote(
        &self,
        message_type: impl Into<MessageTypeName>,
        scope_range: ScopeRange,
    ) -> Option<SubscriptionRef> {
        self.bus.subscribe(self.address, message_type, scope_range)
    }

    pub fn unsubscribe_remote(&self, message_type: impl Into<MessageTypeName>) -> bool {
        self.bus.unsubscribe(self.address, message_type)
    }

    /// Hands a message that arrived from `node` to the local bus.
    ///
    /// The first time a sender is seen it is registered to this bridge, so replies reach
    /// the transport, and recorded as living on `node`. A sender the bus refuses to
    /// register is not recorded. Expired messages are dropped.
    pub fn receive_transport_message(&self, context: MessageContextRef, node: NodeId) {
        if context.is_expired() {
            trace!(%node, message_type = %context.message_type(), "Dropping expired remote message");
            return;
        }
        let sender = context.sender();
        if sender.is_valid() {
            if self.address_book.contains(sender) {
                self.address_book.add(sender, node);
            } else if !self.bus.is_registered(sender) {
                // Addresses registered locally by someone else are never taken over.
                if self.bus.register(sender, self.receiver.clone()) {
                    self.address_book.add(sender, node);
                } else {
                    debug!(%sender, %node, "Remote sender registration refused");
                }
            }
        }
        self.bus.post_context(context);
    }

    /// Forgets every address on `node` and unregisters them from the bus.
    pub fn forget_transport_node(&self, node: NodeId) -> Vec<MessageAddress> {
        let lost = self.address_book.remove_node(node);
        self.unregister_all(&lost);
        debug!(%node, lost = lost.len(), "Transport node forgotten");
        lost
    }

    /// Forgets every known remote address.
    pub fn forget_all_nodes(&self) -> Vec<MessageAddress> {
        let lost = self.address_book.remove_all_nodes();
        self.unregister_all(&lost);
        lost
    }

    fn unregister_all(&self, addresses: &[MessageAddress]) {
        for address in addresses {
            self.bus.unregister(*address);
        }
    }
}

impl MessageSender for MessageBridge {
    fn sender_address(&self) -> MessageAddress {
        self.address
    }
}

impl Drop for MessageBridge {
    fn drop(&mut self) {
        if self.bus.is_shut_down() {
            return;
        }
        self.forget_all_nodes();
        self.bus.unregister(self.address);
    }
}
