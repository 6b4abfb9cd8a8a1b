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

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Where a [`SerializedMessage`] is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SerializationState {
    /// Serialization has not finished yet.
    Incomplete,
    /// The bytes are final.
    Complete,
    /// Serialization failed; the message can never be sent.
    Invalid,
}

/// An outbound payload that may still be being serialized.
///
/// The serializer and any number of segmenters share it through an `Arc`. State moves
/// once, from `Incomplete` to either `Complete` or `Invalid`; later transitions are refused.
pub struct SerializedMessage {
    inner: RwLock<(SerializationState, Arc<[u8]>)>,
}

impl fmt::Debug for SerializedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("SerializedMessage")
            .field("state", &inner.0)
            .field("len", &inner.1.len())
            .finish()
    }
}

impl Default for SerializedMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl SerializedMessage {
    /// Creates an incomplete, empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new((SerializationState::Incomplete, Arc::from(Vec::new()))),
        }
    }

    /// Creates a payload that is already complete.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: RwLock::new((SerializationState::Complete, Arc::from(bytes.into()))),
        }
    }

    /// Stores the final bytes. Returns `false` if the payload was no longer incomplete.
    pub fn complete(&self, bytes: impl Into<Vec<u8>>) -> bool {
        let mut inner = self.inner.write();
        if inner.0 != SerializationState::Incomplete {
            return false;
        }
        *inner = (SerializationState::Complete, Arc::from(bytes.into()));
        true
    }

    /// Marks serialization as failed. Returns `false` if the payload was no longer incomplete.
    pub fn invalidate(&self) -> bool {
        let mut inner = self.inner.write();
        if inner.0 != SerializationState::Incomplete {
            return false;
        }
        inner.0 = SerializationState::Invalid;
        true
    }

    #[must_use]
    pub fn state(&self) -> SerializationState {
        self.inner.read().0
    }

    /// The final bytes, once complete.
    #[must_use]
    pub fn bytes(&self) -> Option<Arc<[u8]>> {
        let inner = self.inner.read();
        (inner.0 == SerializationState::Complete).then(|| Arc::clone(&inner.1))
    }
}
