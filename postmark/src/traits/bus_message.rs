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
use std::fmt::Debug;

use dyn_clone::DynClone;

use crate::message::MessageTypeName;

/// A marker trait for types that can travel through the bus.
///
/// A blanket implementation covers every `Clone + Debug + Send + Sync + 'static` type, so
/// message structs only need the usual derives (or the
/// [`postmark_message`](crate::prelude::postmark_message) attribute).
///
/// The bus stores payloads as `Arc<dyn BusMessage>`; recipients get the concrete type back
/// through [`MessageContext::message_as`](crate::message::MessageContext::message_as).
pub trait BusMessage: DynClone + Any + Send + Sync + Debug {
    /// Returns the message as [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// The name subscriptions and interceptors match this message on.
    ///
    /// Defaults to the Rust type name of the concrete payload.
    fn message_type_name(&self) -> MessageTypeName;
}

dyn_clone::clone_trait_object!(BusMessage);

impl<T> BusMessage for T
where
    T: Any + Send + Sync + Debug + DynClone + 'static,
{
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn message_type_name(&self) -> MessageTypeName {
        MessageTypeName::of::<T>()
    }
}
