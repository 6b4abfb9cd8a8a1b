//! The bus runtime: routing, the public facade, and the pieces built on top of it.
//!
//! # Key Re-exported Components:
//!
//! *   [`MessageBus`]: The public facade. Registers recipients, manages subscriptions and
//!     interceptors, and publishes, sends and forwards messages.
//! *   [`MessageEndpoint`]: A recipient with per-type handlers that sends under its own address.
//! *   [`MessageBridge`]: Connects the bus to remote nodes through a transport.
//! *   [`MessageAddressBook`]: Maps remote addresses to transport nodes.
//! *   [`MessageTracer`]: Counters and trace events describing what the router did.
//! *   [`ObserverList`]: Ordered, handle-removable callbacks used for bus events.
//! *   [`BusConfig`]: Router and transport settings loaded from TOML.
//!
//! The router itself and its dedicated thread are internal.

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
pub use address_book::MessageAddressBook;
pub use bridge::MessageBridge;
pub use bus::{MessageBus, RegistrationChange};
pub use config::{BusConfig, RouterConfig, TransportConfig};
pub use endpoint::{MessageEndpoint, MessageEndpointBuilder};
pub use observer_list::{ObserverHandle, ObserverList};
pub use tracer::{MessageTracer, TraceEvent, TracerStats};

// --- Crate-Internal Re-exports ---
pub(crate) use router::MessageRouter;
pub(crate) use router_thread::spawn_router_thread;

// --- Submodules ---

/// Defines the [`MessageAddressBook`].
mod address_book;
/// Defines the [`MessageBridge`] and its transport-facing recipient.
mod bridge;
/// Defines the [`MessageBus`] facade.
mod bus;
/// Defines the configuration system.
pub mod config;
mod endpoint;
mod observer_list;
/// Defines the routing tables and dispatch.
mod router;
/// Runs the router's intake loop on its own thread.
mod router_thread;
mod tracer;
