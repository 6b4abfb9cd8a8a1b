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
use std::time::{Duration, SystemTime};

use postmark::prelude::*;
use postmark_test::prelude::*;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;

use crate::setup::initialize_tracing;
use crate::setup::messages::{Ping, Pong};
use crate::setup::recipients::{bus, register_collector};

mod setup;

type Outbound = (MessageContextRef, HashSet<NodeId>);

/// Records everything the bridge hands it.
struct RecordingTransport {
    outbound: UnboundedSender<Outbound>,
}

impl MessageTransport for RecordingTransport {
    fn transport_message(&self, context: &MessageContextRef, nodes: &HashSet<NodeId>) -> bool {
        self.outbound.send((Arc::clone(context), nodes.clone())).is_ok()
    }

    fn debug_name(&self) -> &str {
        "recording"
    }
}

fn bridge(bus: &MessageBus) -> anyhow::Result<(MessageBridge, UnboundedReceiver<Outbound>)> {
    let (outbound, recorded) = mpsc::unbounded_channel();
    let bridge = MessageBridge::new(bus, Arc::new(RecordingTransport { outbound }))
        .ok_or_else(|| anyhow::anyhow!("bridge refused"))?;
    Ok((bridge, recorded))
}

async fn next_outbound(recorded: &mut UnboundedReceiver<Outbound>) -> anyhow::Result<Outbound> {
    timeout(Duration::from_secs(5), recorded.recv())
        .await?
        .ok_or_else(|| anyhow::anyhow!("transport channel closed"))
}

/// A message as it would arrive from a remote process.
fn inbound<M: BusMessage>(message: M, sender: MessageAddress, recipients: Vec<MessageAddress>) -> MessageContextRef {
    let message: Arc<dyn BusMessage> = Arc::new(message);
    MessageContext::new(message, sender).with_recipients(recipients).into_ref()
}

#[postmark_test]
async fn test_bridge_learns_remote_sender_and_routes_replies() -> anyhow::Result<()> {
    initialize_tracing();
    let bus = bus()?;
    let (bridge, mut recorded) = bridge(&bus)?;
    let mut inbox = register_collector(&bus)?;

    let node = NodeId::new();
    let remote = MessageAddress::new();
    bridge.receive_transport_message(inbound(Ping(1), remote, vec![inbox.address]), node);

    let delivered = inbox.next().await?;
    assert_eq!(delivered.sender(), remote);
    assert_eq!(bridge.address_book().node_for(remote), Some(node));
    assert!(bus.is_registered(remote));

    bus.send(Pong(1), None, &[remote], Duration::ZERO, None, &inbox.address);
    let (context, nodes) = next_outbound(&mut recorded).await?;
    assert_eq!(context.message_as::<Pong>(), Some(&Pong(1)));
    assert_eq!(nodes, HashSet::from([node]));
    Ok(())
}

#[postmark_test]
async fn test_bridge_forwards_publishes_to_every_known_node() -> anyhow::Result<()> {
    initialize_tracing();
    let bus = bus()?;
    let (bridge, mut recorded) = bridge(&bus)?;
    let mut inbox = register_collector(&bus)?;
    assert!(bridge.subscribe_remote(MessageTypeName::of::<Ping>(), ScopeRange::all()).is_some());

    let (east, west) = (NodeId::new(), NodeId::new());
    for node in [east, west] {
        bridge.receive_transport_message(inbound(Pong(0), MessageAddress::new(), vec![inbox.address]), node);
        inbox.next().await?;
    }

    let publisher = MessageAddress::new();
    // Process scope never leaves this process.
    bus.publish(Ping(1), MessageScope::Process, Duration::ZERO, None, &publisher);
    bus.publish(Ping(2), MessageScope::Network, Duration::ZERO, None, &publisher);

    let (context, nodes) = next_outbound(&mut recorded).await?;
    assert_eq!(context.message_as::<Ping>(), Some(&Ping(2)));
    assert_eq!(nodes, HashSet::from([east, west]));

    assert!(bridge.unsubscribe_remote(MessageTypeName::of::<Ping>()));
    Ok(())
}

#[postmark_test]
async fn test_bridge_never_echoes_to_origin_node() -> anyhow::Result<()> {
    initialize_tracing();
    let bus = bus()?;
    let (bridge, mut recorded) = bridge(&bus)?;
    let mut inbox = register_collector(&bus)?;
    bus.subscribe_to::<Ping>(inbox.address, ScopeRange::all());
    bridge.subscribe_remote(MessageTypeName::of::<Ping>(), ScopeRange::all());

    let (origin, other) = (NodeId::new(), NodeId::new());
    let remote = MessageAddress::new();
    bridge.receive_transport_message(inbound(Ping(1), remote, Vec::new()), origin);
    assert_eq!(inbox.next().await?.message_as::<Ping>(), Some(&Ping(1)));

    // Nothing else is known yet, so the publish above went nowhere remote.
    bridge.receive_transport_message(inbound(Pong(0), MessageAddress::new(), vec![inbox.address]), other);
    inbox.next().await?;
    bridge.receive_transport_message(inbound(Ping(2), remote, Vec::new()), origin);
    assert_eq!(inbox.next().await?.message_as::<Ping>(), Some(&Ping(2)));

    let (context, nodes) = next_outbound(&mut recorded).await?;
    assert_eq!(context.message_as::<Ping>(), Some(&Ping(2)));
    assert_eq!(nodes, HashSet::from([other]));
    Ok(())
}

#[postmark_test]
async fn test_forgetting_a_node_unregisters_its_addresses() -> anyhow::Result<()> {
    initialize_tracing();
    let bus = bus()?;
    let (bridge, _recorded) = bridge(&bus)?;
    let mut inbox = register_collector(&bus)?;

    let node = NodeId::new();
    let remote = MessageAddress::new();
    bridge.receive_transport_message(inbound(Ping(1), remote, vec![inbox.address]), node);
    inbox.next().await?;

    assert_eq!(bridge.forget_transport_node(node), vec![remote]);
    assert!(!bus.is_registered(remote));
    assert!(bridge.address_book().is_empty());
    assert!(bridge.forget_transport_node(node).is_empty());
    Ok(())
}

#[postmark_test]
async fn test_bridge_drops_expired_and_keeps_local_addresses() -> anyhow::Result<()> {
    initialize_tracing();
    let bus = bus()?;
    let (bridge, _recorded) = bridge(&bus)?;
    let mut inbox = register_collector(&bus)?;
    let node = NodeId::new();

    let stale: Arc<dyn BusMessage> = Arc::new(Ping(1));
    let stale = MessageContext::new(stale, MessageAddress::new())
        .with_recipients(vec![inbox.address])
        .with_expiration(Some(SystemTime::now() - Duration::from_secs(1)))
        .into_ref();
    bridge.receive_transport_message(stale, node);
    inbox.expect_nothing_before_sentinel(&bus).await?;

    // A remote message claiming a locally registered sender must not hijack it.
    bridge.receive_transport_message(inbound(Ping(2), inbox.address, vec![inbox.address]), node);
    inbox.next().await?;
    assert!(!bridge.address_book().contains(inbox.address));
    Ok(())
}

#[postmark_test]
async fn test_dropping_bridge_unregisters_everything() -> anyhow::Result<()> {
    initialize_tracing();
    let bus = bus()?;
    let (bridge, _recorded) = bridge(&bus)?;
    let mut inbox = register_collector(&bus)?;

    let remote = MessageAddress::new();
    bridge.receive_transport_message(inbound(Ping(1), remote, vec![inbox.address]), NodeId::new());
    inbox.next().await?;

    let bridge_address = bridge.address();
    drop(bridge);
    assert!(!bus.is_registered(remote));
    assert!(!bus.is_registered(bridge_address));
    Ok(())
}

/// Refuses to register one address.
struct RefuseRegistration {
    refused: MessageAddress,
}

impl BusAuthorizer for RefuseRegistration {
    fn authorize_registration(&self, address: MessageAddress) -> bool {
        address != self.refused
    }
}

#[postmark_test]
async fn test_refused_remote_sender_is_not_recorded() -> anyhow::Result<()> {
    initialize_tracing();
    let remote = MessageAddress::new();
    let bus = MessageBus::with_authorizer(BusConfig::default(), Arc::new(RefuseRegistration { refused: remote }))?;
    let (bridge, mut recorded) = bridge(&bus)?;
    let mut inbox = register_collector(&bus)?;
    let node = NodeId::new();

    // Registration is retried for every message, never assumed.
    for value in [1, 2] {
        bridge.receive_transport_message(inbound(Ping(value), remote, vec![inbox.address]), node);
        let delivered = inbox.next().await?;
        assert_eq!(delivered.message_as::<Ping>(), Some(&Ping(value)));
        assert!(!bridge.address_book().contains(remote));
        assert!(!bus.is_registered(remote));
    }

    bus.send(Pong(1), None, &[remote], Duration::ZERO, None, &inbox.address);
    inbox.expect_nothing_before_sentinel(&bus).await?;
    assert!(recorded.try_recv().is_err());
    assert_eq!(bus.tracer().stats().unresolved_recipients(), 1);
    Ok(())
}
