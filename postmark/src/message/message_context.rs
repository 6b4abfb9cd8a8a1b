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
use std::thread::ThreadId;
use std::time::SystemTime;

use static_assertions::assert_impl_all;

use crate::message::{MessageAddress, MessageScope, MessageTypeName};
use crate::traits::BusMessage;

/// Shared handle to an immutable [`MessageContext`].
///
/// The router and every recipient a message is delivered to hold a clone; the context is
/// freed when the last one is dropped.
pub type MessageContextRef = Arc<MessageContext>;

/// An opaque binary blob travelling alongside a message payload.
#[derive(Clone, PartialEq, Eq)]
pub struct MessageAttachment(Arc<[u8]>);

impl MessageAttachment {
    /// Wraps the given bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    /// Returns the attachment bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for an empty attachment.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for MessageAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageAttachment({} bytes)", self.0.len())
    }
}

/// Everything the router knows about one in-flight message.
///
/// A context is assembled with the `with_*` methods and then frozen by wrapping it in an
/// `Arc` ([`MessageContext::into_ref`]). From that point on nothing about it changes;
/// forwarding creates a new context that points back at the original.
///
/// An empty recipient list means the message is published: the router resolves recipients
/// from subscriptions matching [`message_type`](Self::message_type) and
/// [`scope`](Self::scope). A non-empty list is an explicit send.
#[derive(Debug)]
pub struct MessageContext {
    message: Arc<dyn BusMessage>,
    message_type: MessageTypeName,
    attachment: Option<MessageAttachment>,
    sender: MessageAddress,
    forwarder: Option<MessageAddress>,
    original: Option<MessageContextRef>,
    recipients: Vec<MessageAddress>,
    scope: MessageScope,
    time_sent: SystemTime,
    expiration: Option<SystemTime>,
    sender_thread: ThreadId,
}

impl MessageContext {
    /// Starts a context for `message` sent by `sender`.
    ///
    /// The type name defaults to the payload's Rust type name, the scope to
    /// [`MessageScope::Network`], and the send time to now.
    pub fn new(message: Arc<dyn BusMessage>, sender: MessageAddress) -> Self {
        let message_type = message.as_ref().message_type_name();
        Self {
            message,
            message_type,
            attachment: None,
            sender,
            forwarder: None,
            original: None,
            recipients: Vec::new(),
            scope: MessageScope::default(),
            time_sent: SystemTime::now(),
            expiration: None,
            sender_thread: std::thread::current().id(),
        }
    }

    /// Starts a context that re-wraps `original` on behalf of `forwarder`.
    ///
    /// Payload, type, attachment, scope, expiration and the original sender are carried
    /// over; recipients start empty.
    pub fn forwarded(original: &MessageContextRef, forwarder: MessageAddress) -> Self {
        Self {
            message: Arc::clone(&original.message),
            message_type: original.message_type.clone(),
            attachment: original.attachment.clone(),
            sender: original.sender(),
            forwarder: Some(forwarder),
            original: Some(Arc::clone(original)),
            recipients: Vec::new(),
            scope: original.scope,
            time_sent: SystemTime::now(),
            expiration: original.expiration,
            sender_thread: std::thread::current().id(),
        }
    }

    /// Overrides the type name used for routing.
    #[must_use]
    pub fn with_message_type(mut self, message_type: impl Into<MessageTypeName>) -> Self {
        self.message_type = message_type.into();
        self
    }

    /// Sets or clears the attachment.
    #[must_use]
    pub fn with_attachment(mut self, attachment: Option<MessageAttachment>) -> Self {
        self.attachment = attachment;
        self
    }

    /// Sets the explicit recipient list. Duplicates are kept; the router delivers once per
    /// distinct recipient.
    #[must_use]
    pub fn with_recipients(mut self, recipients: impl Into<Vec<MessageAddress>>) -> Self {
        self.recipients = recipients.into();
        self
    }

    /// Sets the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: MessageScope) -> Self {
        self.scope = scope;
        self
    }

    /// Sets the send time. A time in the future delays routing until then.
    #[must_use]
    pub fn with_time_sent(mut self, time_sent: SystemTime) -> Self {
        self.time_sent = time_sent;
        self
    }

    /// Sets or clears the expiration time.
    #[must_use]
    pub fn with_expiration(mut self, expiration: Option<SystemTime>) -> Self {
        self.expiration = expiration;
        self
    }

    /// Freezes the context.
    #[must_use]
    pub fn into_ref(self) -> MessageContextRef {
        Arc::new(self)
    }

    /// The type-erased payload.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &Arc<dyn BusMessage> {
        &self.message
    }

    /// Downcasts the payload to a concrete message type.
    #[must_use]
    pub fn message_as<M: 'static>(&self) -> Option<&M> {
        self.message.as_ref().as_any().downcast_ref::<M>()
    }

    /// The type name used for subscription and interceptor matching.
    #[inline]
    #[must_use]
    pub fn message_type(&self) -> &MessageTypeName {
        &self.message_type
    }

    /// The optional attachment.
    #[inline]
    #[must_use]
    pub fn attachment(&self) -> Option<&MessageAttachment> {
        self.attachment.as_ref()
    }

    /// The original sender, even for forwarded messages.
    #[inline]
    #[must_use]
    pub fn sender(&self) -> MessageAddress {
        self.sender
    }

    /// The address that forwarded this message, if any.
    #[inline]
    #[must_use]
    pub fn forwarder(&self) -> Option<MessageAddress> {
        self.forwarder
    }

    /// The context this one was forwarded from, if any.
    #[inline]
    #[must_use]
    pub fn original_context(&self) -> Option<&MessageContextRef> {
        self.original.as_ref()
    }

    /// Explicit recipients; empty for published messages.
    #[inline]
    #[must_use]
    pub fn recipients(&self) -> &[MessageAddress] {
        &self.recipients
    }

    /// The message scope.
    #[inline]
    #[must_use]
    pub fn scope(&self) -> MessageScope {
        self.scope
    }

    /// When the message was (or will be) sent.
    #[inline]
    #[must_use]
    pub fn time_sent(&self) -> SystemTime {
        self.time_sent
    }

    /// When the message stops being deliverable, if ever.
    #[inline]
    #[must_use]
    pub fn expiration(&self) -> Option<SystemTime> {
        self.expiration
    }

    /// The thread the context was created on.
    #[inline]
    #[must_use]
    pub fn sender_thread(&self) -> ThreadId {
        self.sender_thread
    }

    /// Returns `true` if the message has no explicit recipients.
    #[inline]
    #[must_use]
    pub fn is_publish(&self) -> bool {
        self.recipients.is_empty()
    }

    /// Returns `true` if this context wraps a forwarded message.
    #[inline]
    #[must_use]
    pub fn is_forwarded(&self) -> bool {
        self.original.is_some()
    }

    /// Returns `true` if the expiration time has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }

    /// Returns `true` if the message is expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expiration.is_some_and(|expiration| expiration <= now)
    }
}

assert_impl_all!(MessageContext: Send, Sync);
