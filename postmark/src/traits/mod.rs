//! The contracts between the bus and the code plugged into it.
//!
//! # Key Traits
//!
//! *   [`BusMessage`]: Implemented automatically for every type that can travel through the
//!     bus. Ensures messages are `Send`, `Sync`, `Debug`, `Clone`, and support downcasting.
//! *   [`MessageRecipient`]: Receives delivered messages. Closures taking a
//!     [`MessageContextRef`](crate::message::MessageContextRef) implement it directly.
//! *   [`MessageSender`]: Anything that can name the address a message comes from.
//! *   [`MessageInterceptor`]: Sees messages of a type before any recipient and may consume them.
//! *   [`BusAuthorizer`]: Vetoes registrations, subscriptions and interceptors.
//! *   [`MessageTransport`]: Moves messages to remote transport nodes for a
//!     [`MessageBridge`](crate::common::MessageBridge).

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

// --- Public Re-exports ---
pub use bus_authorizer::BusAuthorizer;
pub use bus_message::BusMessage;
pub use message_interceptor::{InterceptorRef, MessageInterceptor};
pub use message_recipient::{MessageRecipient, RecipientRef};
pub use message_sender::MessageSender;
pub use message_transport::{MessageTransport, TransportRef};

// --- Submodules ---

/// Defines the [`BusAuthorizer`] trait.
mod bus_authorizer;
/// Defines the [`BusMessage`] marker trait.
mod bus_message;
mod message_interceptor;
/// Defines the [`MessageRecipient`] trait and its closure implementation.
mod message_recipient;
mod message_sender;
/// Defines the [`MessageTransport`] trait used by bridges.
mod message_transport;
