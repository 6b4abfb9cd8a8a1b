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

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace, warn};

use crate::common::MessageTracer;
use crate::message::{BusError, MessageAddress, MessageContextRef, MessageTypeName, SubscriptionRef};
use crate::traits::{InterceptorRef, RecipientRef};

/// The routing tables. Guarded as a whole by one lock.
#[derive(Default)]
struct RouterTables {
    recipients: HashMap<MessageAddress, RecipientRef>,
    subscriptions: HashMap<MessageTypeName, HashMap<MessageAddress, SubscriptionRef>>,
    interceptors: HashMap<MessageTypeName, Vec<InterceptorRef>>,
}

/// Dispatch engine behind a [`MessageBus`](crate::common::MessageBus).
///
/// Callers enqueue contexts with [`route_message`](Self::route_message); the router thread
/// drains the queue and calls [`dispatch`](Self::dispatch) for each one. The table lock is
/// only held around individual lookups and updates, never while a recipient or
/// interceptor runs, so recipients may freely call back into the bus.
pub(crate) struct MessageRouter {
    tables: RwLock<RouterTables>,
    tracer: MessageTracer,
    intake: UnboundedSender<MessageContextRef>,
    queued: AtomicUsize,
    intake_warning_depth: usize,
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("MessageRouter")
            .field("recipients", &tables.recipients.len())
            .field("subscribed_types", &tables.subscriptions.len())
            .field("intercepted_types", &tables.interceptors.len())
            .field("queued", &self.queued.load(Ordering::Relaxed))
            .finish()
    }
}

impl MessageRouter {
    /// Creates a router and the receiving end of its intake queue.
    pub(crate) fn new(intake_warning_depth: usize) -> (Arc<Self>, UnboundedReceiver<MessageContextRef>) {
        let (intake, receiver) = mpsc::unbounded_channel();
        let router = Arc::new(Self {
            tables: RwLock::new(RouterTables::default()),
            tracer: MessageTracer::new(),
            intake,
            queued: AtomicUsize::new(0),
            intake_warning_depth,
        });
        (router, receiver)
    }

    pub(crate) const fn tracer(&self) -> &MessageTracer {
        &self.tracer
    }

    /// Queues `context` for the router thread.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ShutDown`] once the router thread has stopped draining the queue.
    pub(crate) fn route_message(&self, context: MessageContextRef) -> Result<(), BusError> {
        self.tracer.trace_sent(&context);
        let depth = self.queued.fetch_add(1, Ordering::Relaxed) + 1;
        if depth == self.intake_warning_depth {
            warn!(depth, "Router intake queue is backing up");
        }
        if let Err(err) = self.intake.send(context) {
            self.queued.fetch_sub(1, Ordering::Relaxed);
            return Err(err.into());
        }
        Ok(())
    }

    /// Called by the router thread for every context taken off the intake queue.
    pub(crate) fn dequeued(&self) {
        self.queued.fetch_sub(1, Ordering::Relaxed);
    }

    /// Number of contexts waiting in the intake queue.
    pub(crate) fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    pub(crate) fn add_recipient(&self, address: MessageAddress, recipient: RecipientRef) {
        debug!(%address, recipient = recipient.debug_name(), "Recipient registered");
        self.tables.write().recipients.insert(address, recipient);
    }

    /// Removes the recipient and every subscription it holds.
    pub(crate) fn remove_recipient(&self, address: MessageAddress) -> bool {
        let mut tables = self.tables.write();
        let removed = tables.recipients.remove(&address).is_some();
        tables.subscriptions.retain(|_, subscribers| {
            subscribers.remove(&address);
            !subscribers.is_empty()
        });
        drop(tables);
        if removed {
            debug!(%address, "Recipient unregistered");
        }
        removed
    }

    pub(crate) fn is_registered(&self, address: MessageAddress) -> bool {
        self.tables.read().recipients.contains_key(&address)
    }

    /// Adds a subscription, replacing any previous one for the same subscriber and type.
    pub(crate) fn add_subscription(&self, subscription: SubscriptionRef) {
        trace!(
            subscriber = %subscription.subscriber(),
            message_type = %subscription.message_type(),
            "Subscription added"
        );
        self.tables
            .write()
            .subscriptions
            .entry(subscription.message_type().clone())
            .or_default()
            .insert(subscription.subscriber(), subscription);
    }

    pub(crate) fn remove_subscription(&self, subscriber: MessageAddress, message_type: &MessageTypeName) -> bool {
        let mut tables = self.tables.write();
        let Some(subscribers) = tables.subscriptions.get_mut(message_type) else {
            return false;
        };
        let removed = subscribers.remove(&subscriber).is_some();
        if subscribers.is_empty() {
            tables.subscriptions.remove(message_type);
        }
        removed
    }

    /// Appends an interceptor for `message_type`. Returns `false` if it is already present.
    pub(crate) fn add_interceptor(&self, interceptor: InterceptorRef, message_type: MessageTypeName) -> bool {
        let mut tables = self.tables.write();
        let interceptors = tables.interceptors.entry(message_type).or_default();
        if interceptors.iter().any(|existing| same_target(existing, &interceptor)) {
            return false;
        }
        interceptors.push(interceptor);
        true
    }

    pub(crate) fn remove_interceptor(&self, interceptor: &InterceptorRef, message_type: &MessageTypeName) -> bool {
        let mut tables = self.tables.write();
        let Some(interceptors) = tables.interceptors.get_mut(message_type) else {
            return false;
        };
        let before = interceptors.len();
        interceptors.retain(|existing| !same_target(existing, interceptor));
        let removed = interceptors.len() != before;
        if interceptors.is_empty() {
            tables.interceptors.remove(message_type);
        }
        removed
    }

    /// Drops every recipient, subscription and interceptor.
    pub(crate) fn clear(&self) {
        let mut tables = self.tables.write();
        let RouterTables {
            recipients,
            subscriptions,
            interceptors,
        } = std::mem::take(&mut *tables);
        drop(tables);
        trace!(
            recipients = recipients.len(),
            subscribed_types = subscriptions.len(),
            intercepted_types = interceptors.len(),
            "Router tables cleared"
        );
    }

    /// Routes one context to its recipients on the calling thread.
    pub(crate) fn dispatch(&self, context: &MessageContextRef) {
        self.tracer.trace_routed(context);

        if context.is_expired() {
            trace!(message_type = %context.message_type(), "Dropping expired message");
            self.tracer.trace_expired(context);
            return;
        }

        if self.intercept(context) {
            return;
        }

        let addresses = self.resolve_recipients(context);
        if addresses.is_empty() {
            trace!(message_type = %context.message_type(), "No recipients for message");
            return;
        }

        let mut delivered: HashSet<*const ()> = HashSet::with_capacity(addresses.len());
        for address in addresses {
            // Looked up again per delivery so removals that happened after resolution win.
            let recipient = self.tables.read().recipients.get(&address).cloned();
            let Some(recipient) = recipient else {
                trace!(%address, "Recipient no longer registered");
                self.tracer.trace_unresolved(context, address);
                continue;
            };
            // Explicit recipients always get the message; only local publishes stay local.
            if context.is_publish() && context.scope().is_local() && !recipient.is_local() {
                continue;
            }
            if !delivered.insert(Arc::as_ptr(&recipient).cast::<()>()) {
                continue;
            }
            self.deliver(context, address, &recipient);
        }
    }

    /// Offers the message to the interceptors of its type, in order.
    fn intercept(&self, context: &MessageContextRef) -> bool {
        let interceptors = self
            .tables
            .read()
            .interceptors
            .get(context.message_type())
            .cloned()
            .unwrap_or_default();

        for interceptor in interceptors {
            match panic::catch_unwind(AssertUnwindSafe(|| interceptor.intercept_message(context))) {
                Ok(true) => {
                    trace!(
                        interceptor = interceptor.debug_name(),
                        message_type = %context.message_type(),
                        "Message intercepted"
                    );
                    self.tracer.trace_intercepted(context, interceptor.debug_name());
                    return true;
                }
                Ok(false) => {}
                Err(payload) => {
                    warn!(
                        interceptor = interceptor.debug_name(),
                        panic = panic_message(payload.as_ref()),
                        "Interceptor panicked; treating message as not handled"
                    );
                }
            }
        }
        false
    }

    fn resolve_recipients(&self, context: &MessageContextRef) -> Vec<MessageAddress> {
        if !context.is_publish() {
            let mut seen = HashSet::with_capacity(context.recipients().len());
            return context
                .recipients()
                .iter()
                .copied()
                .filter(|address| seen.insert(*address))
                .collect();
        }

        let tables = self.tables.read();
        tables
            .subscriptions
            .get(context.message_type())
            .map(|subscribers| {
                subscribers
                    .values()
                    .filter(|subscription| subscription.matches(context.scope()))
                    .map(|subscription| subscription.subscriber())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn deliver(&self, context: &MessageContextRef, address: MessageAddress, recipient: &RecipientRef) {
        trace!(
            %address,
            recipient = recipient.debug_name(),
            message_type = %context.message_type(),
            "Delivering message"
        );
        match panic::catch_unwind(AssertUnwindSafe(|| recipient.receive_message(context))) {
            Ok(()) => self.tracer.trace_dispatched(context, address),
            Err(payload) => {
                warn!(
                    %address,
                    recipient = recipient.debug_name(),
                    message_type = %context.message_type(),
                    panic = panic_message(payload.as_ref()),
                    "Recipient panicked while handling message"
                );
                self.tracer.trace_delivery_failed(context, address);
            }
        }
    }
}

/// Compares two trait objects by the object they point at, ignoring vtables.
fn same_target<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use parking_lot::Mutex;

    use super::*;
    use crate::message::{MessageContext, MessageScope, ScopeRange, Subscription};
    use crate::traits::{MessageInterceptor, MessageRecipient};

    #[derive(Clone, Debug, PartialEq)]
    struct Ping(u32);

    #[derive(Clone, Debug, PartialEq)]
    struct Pong;

    #[derive(Default)]
    struct Recorder {
        received: Mutex<Vec<MessageContextRef>>,
        remote: bool,
    }

    impl Recorder {
        fn count(&self) -> usize {
            self.received.lock().len()
        }
    }

    impl MessageRecipient for Recorder {
        fn receive_message(&self, context: &MessageContextRef) {
            self.received.lock().push(Arc::clone(context));
        }

        fn is_local(&self) -> bool {
            !self.remote
        }
    }

    struct Gate {
        name: &'static str,
        handles: bool,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl MessageInterceptor for Gate {
        fn intercept_message(&self, _context: &MessageContextRef) -> bool {
            self.calls.lock().push(self.name);
            self.handles
        }

        fn debug_name(&self) -> &str {
            self.name
        }
    }

    fn router() -> Arc<MessageRouter> {
        MessageRouter::new(1024).0
    }

    fn register(router: &MessageRouter) -> (MessageAddress, Arc<Recorder>) {
        let address = MessageAddress::new();
        let recorder = Arc::new(Recorder::default());
        router.add_recipient(address, recorder.clone());
        (address, recorder)
    }

    fn subscribe(router: &MessageRouter, address: MessageAddress, range: ScopeRange) {
        router.add_subscription(Arc::new(Subscription::new(address, MessageTypeName::of::<Ping>(), range)));
    }

    fn publish(message: impl crate::traits::BusMessage, scope: MessageScope) -> MessageContextRef {
        MessageContext::new(Arc::new(message), MessageAddress::new())
            .with_scope(scope)
            .into_ref()
    }

    #[test]
    fn test_publish_matches_type_and_scope_range() {
        let router = router();
        let (address, recorder) = register(&router);
        subscribe(&router, address, ScopeRange::between(MessageScope::Process, MessageScope::Network));

        router.dispatch(&publish(Ping(1), MessageScope::Process));
        router.dispatch(&publish(Ping(2), MessageScope::Network));
        router.dispatch(&publish(Ping(3), MessageScope::Thread));
        router.dispatch(&publish(Ping(4), MessageScope::All));
        router.dispatch(&publish(Pong, MessageScope::Process));

        let received: Vec<u32> = recorder
            .received
            .lock()
            .iter()
            .filter_map(|context| context.message_as::<Ping>().map(|ping| ping.0))
            .collect();
        assert_eq!(received, vec![1, 2]);
        assert_eq!(recorder.count(), 2);
    }

    #[test]
    fn test_handling_interceptor_blocks_recipients() {
        let router = router();
        let (address, recorder) = register(&router);
        subscribe(&router, address, ScopeRange::all());

        let calls = Arc::new(Mutex::new(Vec::new()));
        let gate: InterceptorRef = Arc::new(Gate {
            name: "gate",
            handles: true,
            calls: Arc::clone(&calls),
        });
        assert!(router.add_interceptor(gate.clone(), MessageTypeName::of::<Ping>()));

        router.dispatch(&publish(Ping(1), MessageScope::Network));
        router
            .dispatch(&MessageContext::new(Arc::new(Ping(2)), MessageAddress::new()).with_recipients(vec![address]).into_ref());

        assert_eq!(recorder.count(), 0);
        assert_eq!(router.tracer().stats().messages_intercepted(), 2);

        assert!(router.remove_interceptor(&gate, &MessageTypeName::of::<Ping>()));
        router.dispatch(&publish(Ping(3), MessageScope::Network));
        assert_eq!(recorder.count(), 1);
    }

    #[test]
    fn test_interceptors_run_in_registration_order() {
        let router = router();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let make = |name, handles| -> InterceptorRef {
            Arc::new(Gate {
                name,
                handles,
                calls: Arc::clone(&calls),
            })
        };
        let first = make("first", false);
        let second = make("second", true);
        let third = make("third", true);
        router.add_interceptor(first.clone(), MessageTypeName::of::<Ping>());
        router.add_interceptor(second, MessageTypeName::of::<Ping>());
        router.add_interceptor(third, MessageTypeName::of::<Ping>());
        assert!(!router.add_interceptor(first, MessageTypeName::of::<Ping>()));

        router.dispatch(&publish(Ping(0), MessageScope::Network));
        assert_eq!(*calls.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_explicit_send_ignores_subscriptions() {
        let router = router();
        let (first, first_recorder) = register(&router);
        let (second, second_recorder) = register(&router);
        let (bystander, bystander_recorder) = register(&router);
        subscribe(&router, bystander, ScopeRange::all());

        let context = MessageContext::new(Arc::new(Ping(9)), MessageAddress::new())
            .with_recipients(vec![first, second, first])
            .into_ref();
        router.dispatch(&context);

        assert_eq!(first_recorder.count(), 1);
        assert_eq!(second_recorder.count(), 1);
        assert_eq!(bystander_recorder.count(), 0);
    }

    #[test]
    fn test_unregistered_recipient_is_skipped() {
        let router = router();
        let (address, recorder) = register(&router);
        subscribe(&router, address, ScopeRange::all());

        assert!(router.remove_recipient(address));
        assert!(!router.remove_recipient(address));

        router.dispatch(&publish(Ping(1), MessageScope::Network));
        router.dispatch(&MessageContext::new(Arc::new(Ping(2)), MessageAddress::new()).with_recipients(vec![address]).into_ref());

        assert_eq!(recorder.count(), 0);
        assert_eq!(router.tracer().stats().unresolved_recipients(), 1);
    }

    #[test]
    fn test_recipient_removed_during_dispatch_is_skipped() {
        let router = router();
        let (second, second_recorder) = register(&router);
        let first = MessageAddress::new();
        let weak = Arc::downgrade(&router);
        router.add_recipient(
            first,
            Arc::new(move |_: &MessageContextRef| {
                if let Some(router) = weak.upgrade() {
                    router.remove_recipient(second);
                }
            }),
        );

        let context = MessageContext::new(Arc::new(Ping(3)), MessageAddress::new())
            .with_recipients(vec![first, second])
            .into_ref();
        router.dispatch(&context);

        assert_eq!(second_recorder.count(), 0);
        assert_eq!(router.tracer().stats().unresolved_recipients(), 1);
        assert_eq!(router.tracer().stats().messages_dispatched(), 1);
    }

    #[test]
    fn test_panicking_recipient_does_not_stop_others() {
        let router = router();
        let faulty = MessageAddress::new();
        router.add_recipient(faulty, Arc::new(|_: &MessageContextRef| panic!("recipient failure")));
        let (healthy, recorder) = register(&router);

        let context = MessageContext::new(Arc::new(Ping(5)), MessageAddress::new())
            .with_recipients(vec![faulty, healthy])
            .into_ref();
        router.dispatch(&context);

        assert_eq!(recorder.count(), 1);
        assert_eq!(router.tracer().stats().delivery_failures(), 1);
        assert_eq!(router.tracer().stats().messages_dispatched(), 1);
    }

    #[test]
    fn test_panicking_trace_observer_does_not_stop_dispatch() {
        let router = router();
        let (address, recorder) = register(&router);
        router.tracer().observe(|_| panic!("observer failure"));

        for value in 0..2 {
            let context = MessageContext::new(Arc::new(Ping(value)), MessageAddress::new())
                .with_recipients(vec![address])
                .into_ref();
            router.dispatch(&context);
        }

        assert_eq!(recorder.count(), 2);
        assert_eq!(router.tracer().stats().messages_dispatched(), 2);
        assert_eq!(router.tracer().stats().delivery_failures(), 0);
    }

    #[test]
    fn test_local_publish_skips_remote_recipients() {
        let router = router();
        let remote_address = MessageAddress::new();
        let remote = Arc::new(Recorder {
            remote: true,
            ..Recorder::default()
        });
        router.add_recipient(remote_address, remote.clone());
        subscribe(&router, remote_address, ScopeRange::all());

        router.dispatch(&publish(Ping(1), MessageScope::Process));
        assert_eq!(remote.count(), 0);
        router.dispatch(&publish(Ping(2), MessageScope::Network));
        assert_eq!(remote.count(), 1);
    }

    #[test]
    fn test_explicit_forward_reaches_remote_recipient_at_any_scope() {
        let router = router();
        let remote_address = MessageAddress::new();
        let remote = Arc::new(Recorder {
            remote: true,
            ..Recorder::default()
        });
        router.add_recipient(remote_address, remote.clone());

        let original = publish(Ping(1), MessageScope::Process);
        let forwarded = MessageContext::forwarded(&original, MessageAddress::new())
            .with_recipients(vec![remote_address])
            .with_scope(MessageScope::Process)
            .into_ref();
        router.dispatch(&forwarded);

        let sent = MessageContext::new(Arc::new(Ping(2)), MessageAddress::new())
            .with_recipients(vec![remote_address])
            .with_scope(MessageScope::Thread)
            .into_ref();
        router.dispatch(&sent);

        assert_eq!(remote.count(), 2);
        assert_eq!(router.tracer().stats().messages_dispatched(), 2);
    }

    #[test]
    fn test_shared_recipient_receives_once() {
        let router = router();
        let shared = Arc::new(Recorder::default());
        let a = MessageAddress::new();
        let b = MessageAddress::new();
        router.add_recipient(a, shared.clone());
        router.add_recipient(b, shared.clone());

        let context = MessageContext::new(Arc::new(Ping(1)), MessageAddress::new())
            .with_recipients(vec![a, b])
            .into_ref();
        router.dispatch(&context);
        assert_eq!(shared.count(), 1);
    }

    #[test]
    fn test_expired_message_is_dropped() {
        let router = router();
        let (address, recorder) = register(&router);
        let context = MessageContext::new(Arc::new(Ping(1)), MessageAddress::new())
            .with_recipients(vec![address])
            .with_expiration(Some(SystemTime::now() - Duration::from_secs(1)))
            .into_ref();

        router.dispatch(&context);
        assert_eq!(recorder.count(), 0);
        assert_eq!(router.tracer().stats().messages_expired(), 1);
    }

    #[test]
    fn test_resubscribe_replaces_and_remove_recipient_drops_subscriptions() {
        let router = router();
        let (address, recorder) = register(&router);
        subscribe(&router, address, ScopeRange::exactly(MessageScope::Thread));
        subscribe(&router, address, ScopeRange::exactly(MessageScope::Network));

        router.dispatch(&publish(Ping(1), MessageScope::Thread));
        router.dispatch(&publish(Ping(2), MessageScope::Network));
        assert_eq!(recorder.count(), 1);

        router.remove_recipient(address);
        router.add_recipient(address, recorder.clone());
        router.dispatch(&publish(Ping(3), MessageScope::Network));
        assert_eq!(recorder.count(), 1);
    }

    #[test]
    fn test_route_message_fails_once_intake_is_closed() {
        let (router, receiver) = MessageRouter::new(1024);
        drop(receiver);
        let result = router.route_message(publish(Ping(1), MessageScope::Network));
        assert!(matches!(result, Err(BusError::ShutDown)));
        assert_eq!(router.queued(), 0);
    }
}
