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

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::common::MessageBus;
use crate::message::{MessageAddress, MessageContextRef, MessageScope, MessageTypeName, ScopeRange, SubscriptionRef};
use crate::traits::{BusMessage, MessageRecipient, MessageSender};

type Handler = Box<dyn Fn(&MessageContextRef) + Send + Sync>;

/// The recipient an endpoint registers with the bus.
struct EndpointReceiver {
    name: String,
    handlers: HashMap<TypeId, Handler>,
}

impl MessageRecipient for EndpointReceiver {
    fn receive_message(&self, context: &MessageContextRef) {
        let payload: &dyn Any = context.message().as_ref().as_any();
        match self.handlers.get(&Any::type_id(payload)) {
            Some(handler) => handler(context),
            None => trace!(
                endpoint = %self.name,
                message_type = %context.message_type(),
                "No handler for message"
            ),
        }
    }

    fn debug_name(&self) -> &str {
        &self.name
    }
}

/// Builds a [`MessageEndpoint`] with one handler per message type.
pub struct MessageEndpointBuilder {
    name: String,
    bus: MessageBus,
    handlers: HashMap<TypeId, Handler>,
}

impl MessageEndpointBuilder {
    /// Adds a handler for messages of type `M`, replacing any previous handler for `M`.
    ///
    /// Handlers run on the router thread.
    #[must_use]
    pub fn handling<M, F>(mut self, handler: F) -> Self
    where
        M: BusMessage,
        F: Fn(&MessageContextRef, &M) + Send + Sync + 'static,
    {
        self.handlers.insert(
            TypeId::of::<M>(),
            Box::new(move |context: &MessageContextRef| {
                if let Some(message) = context.message_as::<M>() {
                    handler(context, message);
                }
            }),
        );
        self
    }

    /// Registers the endpoint under a fresh address.
    ///
    /// Returns `None` if the bus refuses the registration.
    #[must_use]
    pub fn build(self) -> Option<MessageEndpoint> {
        let address = MessageAddress::new();
        let receiver = Arc::new(EndpointReceiver {
            name: self.name.clone(),
            handlers: self.handlers,
        });
        if !self.bus.register(address, receiver) {
            return None;
        }
        Some(MessageEndpoint {
            name: self.name,
            address,
            bus: self.bus,
        })
    }
}

/// A registered recipient that dispatches by message type and sends under its own address.
///
/// ```rust,ignore
/// let endpoint = MessageEndpoint::builder("thermostat", &bus)
///     .handling::<Temperature, _>(|_context, reading| println!("{reading:?}"))
///     .build()
///     .expect("bus accepted the endpoint");
/// endpoint.subscribe::<Temperature>(ScopeRange::all());
/// ```
///
/// Dropping the endpoint unregisters it. Handlers must not capture a clone of the endpoint
/// or its bus, or the endpoint can never be released.
pub struct MessageEndpoint {
    name: String,
    address: MessageAddress,
    bus: MessageBus,
}

impl fmt::Debug for MessageEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageEndpoint")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish()
    }
}

impl MessageEndpoint {
    pub fn builder(name: impl Into<String>, bus: &MessageBus) -> MessageEndpointBuilder {
        MessageEndpointBuilder {
            name: name.into(),
            bus: bus.clone(),
            handlers: HashMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn address(&self) -> MessageAddress {
        self.address
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Subscribes this endpoint to published messages of type `M`.
    pub fn subscribe<M: BusMessage>(&self, scope_range: ScopeRange) -> Option<SubscriptionRef> {
        self.bus.subscribe_to::<M>(self.address, scope_range)
    }

    pub fn unsubscribe<M: BusMessage>(&self) -> bool {
        self.bus.unsubscribe(self.address, MessageTypeName::of::<M>())
    }

    pub fn publish<M: BusMessage>(&self, message: M, scope: MessageScope) {
        self.bus.publish(message, scope, Duration::ZERO, None, self);
    }

    pub fn send<M: BusMessage>(&self, message: M, recipients: &[MessageAddress]) {
        self.bus.send(message, None, recipients, Duration::ZERO, None, self);
    }

    pub fn forward(&self, context: &MessageContextRef, recipients: &[MessageAddress]) {
        self.bus
            .forward(context, recipients, context.scope(), Duration::ZERO, self);
    }
}

impl MessageSender for MessageEndpoint {
    fn sender_address(&self) -> MessageAddress {
        self.address
    }
}

impl Drop for MessageEndpoint {
    fn drop(&mut self) {
        if !self.bus.is_shut_down() {
            self.bus.unregister(self.address);
        }
    }
}
