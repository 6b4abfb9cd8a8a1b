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

#![forbid(unsafe_code)]

//! # Postmark
//!
//! An in-process message bus with publish-subscribe and point-to-point routing, plus the
//! bookkeeping a UDP transport needs to carry messages between processes.
//!
//! ## Key Concepts
//!
//! - **Bus (`MessageBus`)**: The facade every component talks to. Cheap to clone; owns a
//!   router running on its own thread.
//! - **Recipients (`MessageRecipient`)**: Registered under a `MessageAddress`; receive
//!   messages sent to that address or published to a type they subscribe to.
//! - **Scopes (`MessageScope`, `ScopeRange`)**: How far a publish travels and which
//!   publishes a subscription accepts.
//! - **Interceptors (`MessageInterceptor`)**: See messages of a type before any recipient
//!   and may consume them.
//! - **Contexts (`MessageContext`)**: Immutable, shared descriptions of in-flight messages.
//! - **Endpoints (`MessageEndpoint`)**: Recipients with per-type handlers.
//! - **Bridges (`MessageBridge`)**: Carry messages to remote nodes through a
//!   `MessageTransport`, resolving remote addresses with a `MessageAddressBook`.
//! - **Segmentation (`MessageSegmenter`, `Reassembler`)**: Split payloads into datagrams
//!   and rebuild them on the other side.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use postmark::prelude::*;
//!
//! #[postmark_message]
//! struct Temperature(f32);
//!
//! let bus = MessageBus::new(BusConfig::load())?;
//! let thermostat = MessageEndpoint::builder("thermostat", &bus)
//!     .handling(|_context, reading: &Temperature| println!("{}", reading.0))
//!     .build()
//!     .expect("registered");
//! thermostat.subscribe::<Temperature>(ScopeRange::all());
//!
//! bus.publish(Temperature(21.5), MessageScope::Process, Duration::ZERO, None, &MessageAddress::new());
//! ```

/// The bus runtime: router, facade, endpoints, bridges and configuration.
pub mod common;

/// Message identity, contexts, scopes and subscriptions.
pub mod message;

/// Contracts for recipients, interceptors, authorizers and transports.
pub mod traits;

/// UDP segmentation and reassembly bookkeeping.
pub mod transport;

/// A prelude module for conveniently importing the most commonly used items.
///
/// # Re-exports
///
/// ## Macros (from `postmark-macro`)
/// *   [`postmark_macro::postmark_message`]: Attribute macro for defining bus messages.
///
/// ## Core Types
/// *   [`crate::common::MessageBus`], [`crate::common::MessageEndpoint`],
///     [`crate::common::MessageBridge`], [`crate::common::MessageAddressBook`],
///     [`crate::common::BusConfig`], [`crate::common::MessageTracer`].
/// *   [`crate::message::MessageAddress`], [`crate::message::NodeId`],
///     [`crate::message::MessageContext`], [`crate::message::MessageScope`],
///     [`crate::message::ScopeRange`], [`crate::message::MessageTypeName`].
/// *   [`crate::transport::MessageSegmenter`], [`crate::transport::Reassembler`].
///
/// ## Core Traits
/// *   [`crate::traits::BusMessage`], [`crate::traits::MessageRecipient`],
///     [`crate::traits::MessageSender`], [`crate::traits::MessageInterceptor`],
///     [`crate::traits::BusAuthorizer`], [`crate::traits::MessageTransport`].
pub mod prelude {
    pub use postmark_macro::postmark_message;

    pub use crate::common::{
        BusConfig, MessageAddressBook, MessageBridge, MessageBus, MessageEndpoint, MessageEndpointBuilder,
        MessageTracer, ObserverHandle, ObserverList, RegistrationChange, RouterConfig, TraceEvent, TracerStats,
        TransportConfig,
    };
    pub use crate::message::{
        BusError, MessageAddress, MessageAttachment, MessageContext, MessageContextRef, MessageScope,
        MessageTypeName, NodeId, ScopeRange, Subscription, SubscriptionRef,
    };
    pub use crate::traits::{
        BusAuthorizer, BusMessage, InterceptorRef, MessageInterceptor, MessageRecipient, MessageSender,
        MessageTransport, RecipientRef, TransportRef,
    };
    pub use crate::transport::{
        decode_datagram, encode_datagram, MessageSegmenter, Reassembler, ReassemblerConfig, Segment,
        SegmentError, SegmentHeader, SerializationState, SerializedMessage,
    };
}
