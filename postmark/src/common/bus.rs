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
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace, warn};

use crate::common::{spawn_router_thread, BusConfig, MessageRouter, MessageTracer, ObserverList};
use crate::message::{
    BusError, MessageAddress, MessageAttachment, MessageContext, MessageContextRef, MessageScope,
    MessageTypeName, ScopeRange, Subscription, SubscriptionRef,
};
use crate::traits::{BusAuthorizer, BusMessage, InterceptorRef, MessageSender, RecipientRef};

/// A change to the set of registered recipients or interceptors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistrationChange {
    Registered(MessageAddress),
    Unregistered(MessageAddress),
    InterceptorAdded(MessageTypeName),
    InterceptorRemoved(MessageTypeName),
}

/// The public face of the message bus.
///
/// A `MessageBus` is a cheap handle: clones share one router and one router thread. The
/// bus shuts down when [`shutdown`](Self::shutdown) is called or when the last handle is
/// dropped.
///
/// Every entry point returns immediately. Messages are queued and delivered on the router
/// thread in the order each sending thread queued them. Operations on a bus that has shut
/// down are ignored with a warning.
///
/// Objects registered with the bus (recipients, interceptors, the authorizer) are owned by
/// it until removed, so they must not hold a `MessageBus` handle themselves; doing so keeps
/// the bus alive until an explicit shutdown.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    router: Arc<MessageRouter>,
    authorizer: Option<Arc<dyn BusAuthorizer>>,
    cancellation_token: CancellationToken,
    router_thread: Mutex<Option<JoinHandle<()>>>,
    shut_down: AtomicBool,
    shutdown_observers: ObserverList<()>,
    registration_observers: ObserverList<RegistrationChange>,
    config: BusConfig,
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("router", &self.inner.router)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl MessageBus {
    /// Creates a bus and starts its router thread.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Io`] if the router thread or its runtime cannot be started.
    pub fn new(config: BusConfig) -> Result<Self, BusError> {
        Self::start(config, None)
    }

    /// Creates a bus whose table changes are approved by `authorizer`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Io`] if the router thread or its runtime cannot be started.
    pub fn with_authorizer(config: BusConfig, authorizer: Arc<dyn BusAuthorizer>) -> Result<Self, BusError> {
        Self::start(config, Some(authorizer))
    }

    #[instrument(skip_all, fields(thread_name = %config.router.thread_name))]
    fn start(config: BusConfig, authorizer: Option<Arc<dyn BusAuthorizer>>) -> Result<Self, BusError> {
        let (router, intake) = MessageRouter::new(config.router.intake_warning_depth);
        let cancellation_token = CancellationToken::new();
        let router_thread = spawn_router_thread(
            Arc::clone(&router),
            intake,
            cancellation_token.clone(),
            &config.router.thread_name,
        )?;
        debug!("Message bus started");

        Ok(Self {
            inner: Arc::new(BusInner {
                router,
                authorizer,
                cancellation_token,
                router_thread: Mutex::new(Some(router_thread)),
                shut_down: AtomicBool::new(false),
                shutdown_observers: ObserverList::new(),
                registration_observers: ObserverList::new(),
                config,
            }),
        })
    }

    /// Registers `recipient` under `address`, replacing any recipient already there.
    ///
    /// Returns `false` if the address is nil, the authorizer vetoes, or the bus is shut down.
    #[instrument(skip(self, recipient))]
    pub fn register(&self, address: MessageAddress, recipient: RecipientRef) -> bool {
        if !self.inner.accepting("register") {
            return false;
        }
        if !address.is_valid() {
            warn!("Refusing to register the nil address");
            return false;
        }
        if !self.inner.authorizer.as_ref().map_or(true, |auth| auth.authorize_registration(address)) {
            debug!("Registration vetoed");
            return false;
        }
        self.inner.router.add_recipient(address, recipient);
        self.inner
            .registration_observers
            .notify(&RegistrationChange::Registered(address));
        true
    }

    /// Removes the recipient at `address` along with all of its subscriptions.
    ///
    /// Messages already queued for it are dropped at delivery time.
    #[instrument(skip(self))]
    pub fn unregister(&self, address: MessageAddress) -> bool {
        if !self.inner.accepting("unregister") {
            return false;
        }
        if !self.inner.authorizer.as_ref().map_or(true, |auth| auth.authorize_unregistration(address)) {
            debug!("Unregistration vetoed");
            return false;
        }
        let removed = self.inner.router.remove_recipient(address);
        if removed {
            self.inner
                .registration_observers
                .notify(&RegistrationChange::Unregistered(address));
        }
        removed
    }

    /// Returns `true` if a recipient is registered at `address`.
    #[must_use]
    pub fn is_registered(&self, address: MessageAddress) -> bool {
        self.inner.router.is_registered(address)
    }

    /// Subscribes `subscriber` to published messages of `message_type` whose scope falls in
    /// `scope_range`. A previous subscription for the same type is replaced.
    ///
    /// Returns `None` for the null type name, when the authorizer vetoes, or after shutdown.
    #[instrument(skip(self, message_type))]
    pub fn subscribe(
        &self,
        subscriber: MessageAddress,
        message_type: impl Into<MessageTypeName>,
        scope_range: ScopeRange,
    ) -> Option<SubscriptionRef> {
        let message_type = message_type.into();
        if !self.inner.accepting("subscribe") || message_type.is_none() {
            return None;
        }
        if !self
            .inner
            .authorizer
            .as_ref()
            .map_or(true, |auth| auth.authorize_subscription(subscriber, &message_type))
        {
            debug!("Subscription vetoed");
            return None;
        }
        let subscription = Arc::new(Subscription::new(subscriber, message_type, scope_range));
        self.inner.router.add_subscription(Arc::clone(&subscription));
        Some(subscription)
    }

    /// Subscribes `subscriber` to messages of type `M`.
    pub fn subscribe_to<M: BusMessage>(&self, subscriber: MessageAddress, scope_range: ScopeRange) -> Option<SubscriptionRef> {
        self.subscribe(subscriber, MessageTypeName::of::<M>(), scope_range)
    }

    /// Removes `subscriber`'s subscription to `message_type`.
    #[instrument(skip(self, message_type))]
    pub fn unsubscribe(&self, subscriber: MessageAddress, message_type: impl Into<MessageTypeName>) -> bool {
        let message_type = message_type.into();
        if !self.inner.accepting("unsubscribe") || message_type.is_none() {
            return false;
        }
        if !self
            .inner
            .authorizer
            .as_ref()
            .map_or(true, |auth| auth.authorize_unsubscription(subscriber, &message_type))
        {
            debug!("Unsubscription vetoed");
            return false;
        }
        self.inner.router.remove_subscription(subscriber, &message_type)
    }

    /// Adds `interceptor` for `message_type` after any interceptors already registered.
    ///
    /// Returns `false` for the null type name, a duplicate registration, a veto, or after
    /// shutdown.
    #[instrument(skip(self, interceptor, message_type), fields(interceptor = interceptor.debug_name()))]
    pub fn intercept(&self, interceptor: InterceptorRef, message_type: impl Into<MessageTypeName>) -> bool {
        let message_type = message_type.into();
        if !self.inner.accepting("intercept") || message_type.is_none() {
            return false;
        }
        if !self
            .inner
            .authorizer
            .as_ref()
            .map_or(true, |auth| auth.authorize_interceptor(&interceptor, &message_type))
        {
            debug!(%message_type, "Interceptor vetoed");
            return false;
        }
        if !self.inner.router.add_interceptor(interceptor, message_type.clone()) {
            return false;
        }
        self.inner
            .registration_observers
            .notify(&RegistrationChange::InterceptorAdded(message_type));
        true
    }

    /// Removes `interceptor` from `message_type`.
    #[instrument(skip(self, interceptor, message_type), fields(interceptor = interceptor.debug_name()))]
    pub fn unintercept(&self, interceptor: &InterceptorRef, message_type: impl Into<MessageTypeName>) -> bool {
        let message_type = message_type.into();
        if !self.inner.accepting("unintercept") || message_type.is_none() {
            return false;
        }
        if !self.inner.router.remove_interceptor(interceptor, &message_type) {
            return false;
        }
        self.inner
            .registration_observers
            .notify(&RegistrationChange::InterceptorRemoved(message_type));
        true
    }

    /// Publishes `message` to every matching subscriber.
    ///
    /// A non-zero `delay` holds the message on the router thread until it is due. Messages
    /// still undelivered at `expiration` are dropped.
    #[instrument(skip(self, message, publisher), fields(publisher = %publisher.sender_address()))]
    pub fn publish<M: BusMessage>(
        &self,
        message: M,
        scope: MessageScope,
        delay: Duration,
        expiration: Option<SystemTime>,
        publisher: &impl MessageSender,
    ) {
        let context = MessageContext::new(Arc::new(message), publisher.sender_address())
            .with_scope(scope)
            .with_time_sent(SystemTime::now() + delay)
            .with_expiration(expiration);
        self.inner.enqueue(context.into_ref());
    }

    /// Sends `message` to exactly `recipients`, bypassing subscriptions.
    ///
    /// An empty recipient list sends nothing.
    #[instrument(skip(self, message, attachment, recipients, sender), fields(sender = %sender.sender_address(), recipients = recipients.len()))]
    pub fn send<M: BusMessage>(
        &self,
        message: M,
        attachment: Option<MessageAttachment>,
        recipients: &[MessageAddress],
        delay: Duration,
        expiration: Option<SystemTime>,
        sender: &impl MessageSender,
    ) {
        if recipients.is_empty() {
            trace!("Send without recipients ignored");
            return;
        }
        let context = MessageContext::new(Arc::new(message), sender.sender_address())
            .with_attachment(attachment)
            .with_recipients(recipients.to_vec())
            .with_scope(MessageScope::Network)
            .with_time_sent(SystemTime::now() + delay)
            .with_expiration(expiration);
        self.inner.enqueue(context.into_ref());
    }

    /// Re-sends a received message to `recipients` on behalf of `forwarder`.
    ///
    /// The original sender, payload, attachment and expiration are preserved.
    #[instrument(skip(self, context, recipients, forwarder), fields(forwarder = %forwarder.sender_address()))]
    pub fn forward(
        &self,
        context: &MessageContextRef,
        recipients: &[MessageAddress],
        scope: MessageScope,
        delay: Duration,
        forwarder: &impl MessageSender,
    ) {
        if recipients.is_empty() {
            trace!("Forward without recipients ignored");
            return;
        }
        let forwarded = MessageContext::forwarded(context, forwarder.sender_address())
            .with_recipients(recipients.to_vec())
            .with_scope(scope)
            .with_time_sent(SystemTime::now() + delay);
        self.inner.enqueue(forwarded.into_ref());
    }

    /// Routes a fully built context, as received from a transport.
    pub(crate) fn post_context(&self, context: MessageContextRef) {
        self.inner.enqueue(context);
    }

    /// Stops the router thread, notifies shutdown observers and clears every table.
    ///
    /// Safe to call more than once and from a recipient running on the router thread (in
    /// which case the thread is not joined).
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    /// Observers called once, after the router thread has stopped.
    #[must_use]
    pub fn on_shutdown(&self) -> &ObserverList<()> {
        &self.inner.shutdown_observers
    }

    /// Observers called after a recipient or interceptor is added or removed.
    #[must_use]
    pub fn on_registrations_changed(&self) -> &ObserverList<RegistrationChange> {
        &self.inner.registration_observers
    }

    /// The router's tracer.
    #[must_use]
    pub fn tracer(&self) -> &MessageTracer {
        self.inner.router.tracer()
    }

    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }
}

impl BusInner {
    /// Returns `false`, with a warning, once the bus has shut down.
    fn accepting(&self, operation: &str) -> bool {
        if self.shut_down.load(Ordering::Acquire) {
            warn!(operation, "Message bus is shut down; ignoring");
            return false;
        }
        true
    }

    fn enqueue(&self, context: MessageContextRef) {
        if !self.accepting("route") {
            return;
        }
        if let Err(err) = self.router.route_message(context) {
            warn!(error = %err, "Message dropped");
        }
    }

    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Shutting down message bus");
        self.cancellation_token.cancel();

        let router_thread = self.router_thread.lock().take();
        if let Some(handle) = router_thread {
            if handle.thread().id() == std::thread::current().id() {
                trace!("Shutdown requested from the router thread; not joining");
            } else if handle.join().is_err() {
                error!("Router thread panicked");
            }
        }

        self.shutdown_observers.notify(&());
        self.router.clear();
        self.shutdown_observers.clear();
        self.registration_observers.clear();
        debug!("Message bus shut down");
    }
}

impl Drop for BusInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}
