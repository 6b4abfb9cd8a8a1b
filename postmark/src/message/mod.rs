//! Message identity and the values that travel through the bus.
//!
//! *   [`MessageAddress`] and [`NodeId`]: identifiers for recipients and transport nodes.
//! *   [`MessageTypeName`]: the routing key subscriptions and interceptors match on.
//! *   [`MessageScope`] and [`ScopeRange`]: how far a publish travels and which publishes a
//!     subscription accepts.
//! *   [`MessageContext`]: the immutable, shared description of one in-flight message.
//! *   [`Subscription`]: a subscriber's interest in one message type.
//! *   [`BusError`]: the few failures the bus reports to callers.

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
pub use message_address::{MessageAddress, NodeId};
pub use message_context::{MessageAttachment, MessageContext, MessageContextRef};
pub use message_error::BusError;
pub use message_scope::{MessageScope, ScopeRange};
pub use message_type_name::MessageTypeName;
pub use subscription::{Subscription, SubscriptionRef};

// --- Submodules ---

/// Defines [`MessageAddress`] and [`NodeId`].
mod message_address;
/// Defines [`MessageContext`] passed to recipients and interceptors.
mod message_context;
/// Defines [`BusError`].
mod message_error;
mod message_scope;
mod message_type_name;
/// Defines [`Subscription`].
mod subscription;
