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

use crate::message::MessageContextRef;

/// Shared handle to a registered interceptor.
pub type InterceptorRef = Arc<dyn MessageInterceptor>;

/// Sees messages of one type before any recipient does.
///
/// Interceptors for a type are tried in registration order. Returning `true` consumes the
/// message: later interceptors and all recipients are skipped.
pub trait MessageInterceptor: Send + Sync {
    fn intercept_message(&self, context: &MessageContextRef) -> bool;

    fn debug_name(&self) -> &str {
        "interceptor"
    }
}
