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

use crate::message::{MessageAddress, MessageTypeName};
use crate::traits::InterceptorRef;

/// Approves or vetoes changes to the bus's routing tables.
///
/// Every method defaults to approving. A vetoed operation is silently ignored by the bus
/// (and reported as `false` or `None` to the caller).
pub trait BusAuthorizer: Send + Sync {
    fn authorize_registration(&self, _address: MessageAddress) -> bool {
        true
    }

    fn authorize_unregistration(&self, _address: MessageAddress) -> bool {
        true
    }

    fn authorize_subscription(&self, _subscriber: MessageAddress, _message_type: &MessageTypeName) -> bool {
        true
    }

    fn authorize_unsubscription(&self, _subscriber: MessageAddress, _message_type: &MessageTypeName) -> bool {
        true
    }

    fn authorize_interceptor(&self, _interceptor: &InterceptorRef, _message_type: &MessageTypeName) -> bool {
        true
    }
}
