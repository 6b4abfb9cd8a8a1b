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

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::common::{ObserverHandle, ObserverList};
use crate::message::{MessageAddress, MessageContextRef, MessageTypeName};

/// Counters for each routing outcome.
#[derive(Debug, Default)]
pub struct TracerStats {
    /// Messages accepted by the bus.
    pub messages_sent: AtomicUsize,
    /// Messages taken off the intake queue and routed.
    pub messages_routed: AtomicUsize,
    /// Individual deliveries to recipients.
    pub messages_dispatched: AtomicUsize,
    /// Messages consumed by an interceptor.
    pub messages_intercepted: AtomicUsize,
    /// Messages dropped because they expired before routing.
    pub messages_expired: AtomicUsize,
    /// Recipients that were no longer registered at delivery time.
    pub unresolved_recipients: AtomicUsize,
    /// Recipients that panicked while handling a message.
    pub delivery_failures: AtomicUsize,
}

impl TracerStats {
    #[must_use]
    pub fn messages_sent(&self) -> usize {
        self.messages_sent.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_routed(&self) -> usize {
        self.messages_routed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_dispatched(&self) -> usize {
        self.messages_dispatched.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_intercepted(&self) -> usize {
        self.messages_intercepted.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_expired(&self) -> usize {
        self.messages_expired.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn unresolved_recipients(&self) -> usize {
        self.unresolved_recipients.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn delivery_failures(&self) -> usize {
        self.delivery_failures.load(Ordering::Relaxed)
    }
}

/// One observable step in a message's life.
#[derive(Clone, Debug)]
pub enum TraceEvent {
    Sent(MessageContextRef),
    Routed(MessageContextRef),
    Dispatched {
        context: MessageContextRef,
        recipient: MessageAddress,
    },
    Intercepted {
        context: MessageContextRef,
        interceptor: String,
    },
    Expired(MessageContextRef),
    Unresolved {
        context: MessageContextRef,
        recipient: MessageAddress,
    },
    DeliveryFailed {
        context: MessageContextRef,
        recipient: MessageAddress,
    },
}

/// Read-only observation hook into the router.
///
/// Counters are always maintained. Events are only built when at least one observer is
/// attached, and observers run on the thread that produced the event (usually the router
/// thread), so they should return quickly.
#[derive(Debug, Default)]
pub struct MessageTracer {
    stats: TracerStats,
    sent_by_type: DashMap<MessageTypeName, usize>,
    observers: ObserverList<TraceEvent>,
}

impl MessageTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a reference to the counters.
    #[must_use]
    pub const fn stats(&self) -> &TracerStats {
        &self.stats
    }

    /// Number of messages of `message_type` accepted by the bus.
    #[must_use]
    pub fn sent_count(&self, message_type: &MessageTypeName) -> usize {
        self.sent_by_type.get(message_type).map_or(0, |count| *count)
    }

    /// Calls `callback` for every subsequent trace event.
    pub fn observe<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn(&TraceEvent) + Send + Sync + 'static,
    {
        self.observers.add(callback)
    }

    pub fn unobserve(&self, handle: ObserverHandle) -> bool {
        self.observers.remove(handle)
    }

    pub(crate) fn trace_sent(&self, context: &MessageContextRef) {
        self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
        *self.sent_by_type.entry(context.message_type().clone()).or_insert(0) += 1;
        self.emit(|| TraceEvent::Sent(context.clone()));
    }

    pub(crate) fn trace_routed(&self, context: &MessageContextRef) {
        self.stats.messages_routed.fetch_add(1, Ordering::Relaxed);
        self.emit(|| TraceEvent::Routed(context.clone()));
    }

    pub(crate) fn trace_dispatched(&self, context: &MessageContextRef, recipient: MessageAddress) {
        self.stats.messages_dispatched.fetch_add(1, Ordering::Relaxed);
        self.emit(|| TraceEvent::Dispatched {
            context: context.clone(),
            recipient,
        });
    }

    pub(crate) fn trace_intercepted(&self, context: &MessageContextRef, interceptor: &str) {
        self.stats.messages_intercepted.fetch_add(1, Ordering::Relaxed);
        self.emit(|| TraceEvent::Intercepted {
            context: context.clone(),
            interceptor: interceptor.to_owned(),
        });
    }

    pub(crate) fn trace_expired(&self, context: &MessageContextRef) {
        self.stats.messages_expired.fetch_add(1, Ordering::Relaxed);
        self.emit(|| TraceEvent::Expired(context.clone()));
    }

    pub(crate) fn trace_unresolved(&self, context: &MessageContextRef, recipient: MessageAddress) {
        self.stats.unresolved_recipients.fetch_add(1, Ordering::Relaxed);
        self.emit(|| TraceEvent::Unresolved {
            context: context.clone(),
            recipient,
        });
    }

    pub(crate) fn trace_delivery_failed(&self, context: &MessageContextRef, recipient: MessageAddress) {
        self.stats.delivery_failures.fetch_add(1, Ordering::Relaxed);
        self.emit(|| TraceEvent::DeliveryFailed {
            context: context.clone(),
            recipient,
        });
    }

    fn emit(&self, event: impl FnOnce() -> TraceEvent) {
        if !self.observers.is_empty() {
            self.observers.notify(&event());
        }
    }
}
