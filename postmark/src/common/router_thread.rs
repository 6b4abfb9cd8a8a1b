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

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::common::MessageRouter;
use crate::message::{BusError, MessageContextRef};

/// A message whose send time lies in the future.
struct DelayedMessage {
    due: Instant,
    sequence: u64,
    context: MessageContextRef,
}

impl PartialEq for DelayedMessage {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DelayedMessage {}

impl PartialOrd for DelayedMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedMessage {
    // Equal deadlines keep their arrival order.
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.sequence).cmp(&(other.due, other.sequence))
    }
}

/// Starts the dedicated router thread.
///
/// The thread runs a current-thread Tokio runtime that drains `intake` until `token` is
/// cancelled or every sender is gone. The runtime is built before the thread is spawned so
/// that a failure is reported to the caller instead of killing the thread.
pub(crate) fn spawn_router_thread(
    router: Arc<MessageRouter>,
    intake: UnboundedReceiver<MessageContextRef>,
    token: CancellationToken,
    thread_name: &str,
) -> Result<JoinHandle<()>, BusError> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;
    let handle = std::thread::Builder::new()
        .name(thread_name.to_owned())
        .spawn(move || runtime.block_on(run_router(router, intake, token)))?;
    Ok(handle)
}

async fn run_router(
    router: Arc<MessageRouter>,
    mut intake: UnboundedReceiver<MessageContextRef>,
    token: CancellationToken,
) {
    debug!("Router thread started");
    let mut delayed: BinaryHeap<Reverse<DelayedMessage>> = BinaryHeap::new();
    let mut sequence: u64 = 0;

    loop {
        let next_due = delayed.peek().map(|Reverse(message)| message.due);
        tokio::select! {
            biased;
            () = token.cancelled() => {
                trace!(pending_delayed = delayed.len(), "Router cancelled");
                break;
            }
            received = intake.recv() => {
                let Some(context) = received else {
                    trace!("Router intake closed");
                    break;
                };
                router.dequeued();
                match delay_until_sent(&context) {
                    Some(delay) => {
                        sequence += 1;
                        trace!(?delay, message_type = %context.message_type(), "Deferring message");
                        delayed.push(Reverse(DelayedMessage {
                            due: Instant::now() + delay,
                            sequence,
                            context,
                        }));
                    }
                    None => router.dispatch(&context),
                }
            }
            () = sleep_until_due(next_due) => {
                let now = Instant::now();
                while delayed.peek().is_some_and(|Reverse(message)| message.due <= now) {
                    if let Some(Reverse(message)) = delayed.pop() {
                        router.dispatch(&message.context);
                    }
                }
            }
        }
    }
    debug!("Router thread stopped");
}

/// How long to hold a message whose send time is in the future.
fn delay_until_sent(context: &MessageContextRef) -> Option<Duration> {
    context
        .time_sent()
        .duration_since(SystemTime::now())
        .ok()
        .filter(|delay| !delay.is_zero())
}

async fn sleep_until_due(due: Option<Instant>) {
    match due {
        Some(due) => sleep_until(due).await,
        None => std::future::pending().await,
    }
}
