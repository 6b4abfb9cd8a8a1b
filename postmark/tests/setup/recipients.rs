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
use std::time::Duration;

use anyhow::anyhow;
use postmark::prelude::*;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::timeout;

use crate::setup::messages::Sentinel;

/// Receives contexts delivered to a collecting recipient.
pub struct Inbox {
    pub address: MessageAddress,
    receiver: UnboundedReceiver<MessageContextRef>,
}

impl Inbox {
    /// Waits for the next delivered context.
    pub async fn next(&mut self) -> anyhow::Result<MessageContextRef> {
        timeout(Duration::from_secs(5), self.receiver.recv())
            .await
            .map_err(|_| anyhow!("timed out waiting for a message at {}", self.address))?
            .ok_or_else(|| anyhow!("inbox closed"))
    }

    /// Returns `true` if nothing has been delivered that was not yet taken.
    pub fn is_empty(&mut self) -> bool {
        self.receiver.try_recv().is_err()
    }

    /// Sends a [`Sentinel`] to this inbox and asserts it is the next delivery.
    ///
    /// Intake is FIFO, so anything queued earlier for this inbox would arrive first.
    pub async fn expect_nothing_before_sentinel(&mut self, bus: &MessageBus) -> anyhow::Result<()> {
        bus.send(Sentinel, None, &[self.address], Duration::ZERO, None, &MessageAddress::new());
        let context = self.next().await?;
        anyhow::ensure!(
            context.message_as::<Sentinel>().is_some(),
            "expected the sentinel, got {}",
            context.message_type()
        );
        Ok(())
    }
}

/// A recipient that forwards every delivery into an [`Inbox`].
pub fn collector() -> (RecipientRef, Inbox) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let recipient: RecipientRef = Arc::new(move |context: &MessageContextRef| {
        let _ = sender.send(Arc::clone(context));
    });
    (
        recipient,
        Inbox {
            address: MessageAddress::new(),
            receiver,
        },
    )
}

/// Registers a fresh collector with `bus`.
pub fn register_collector(bus: &MessageBus) -> anyhow::Result<Inbox> {
    let (recipient, inbox) = collector();
    anyhow::ensure!(bus.register(inbox.address, recipient), "registration refused");
    Ok(inbox)
}

/// An interceptor that consumes everything and counts what it saw.
#[derive(Default)]
pub struct Swallow {
    pub seen: parking_lot::Mutex<Vec<MessageContextRef>>,
}

impl MessageInterceptor for Swallow {
    fn intercept_message(&self, context: &MessageContextRef) -> bool {
        self.seen.lock().push(Arc::clone(context));
        true
    }

    fn debug_name(&self) -> &str {
        "swallow"
    }
}

pub fn bus() -> anyhow::Result<MessageBus> {
    Ok(MessageBus::new(BusConfig::default())?)
}
