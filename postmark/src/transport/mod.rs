//! UDP segmentation bookkeeping for network transports.
//!
//! *   [`SerializedMessage`]: An outbound payload shared between its serializer and segmenters.
//! *   [`MessageSegmenter`]: Splits a payload into fixed-size segments and tracks which are
//!     still pending, with full and partial retransmission.
//! *   [`SegmentHeader`], [`encode_datagram`], [`decode_datagram`]: The segment wire format.
//! *   [`Reassembler`]: Rebuilds inbound messages from segments and reports gaps.
//!
//! Sockets, acknowledgements and pacing belong to the transport implementation; these
//! types only keep the books.

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
pub use datagram::{decode_datagram, encode_datagram, SegmentError, SegmentHeader, SEGMENT_HEADER_LEN};
pub use reassembler::{Reassembler, ReassemblerConfig, ReassemblerStats};
pub use segment_bitset::SegmentBitSet;
pub use segmenter::{MessageSegmenter, Segment};
pub use serialized_message::{SerializationState, SerializedMessage};

// --- Submodules ---

mod datagram;
/// Defines the receiving side of segmentation.
mod reassembler;
mod segment_bitset;
/// Defines [`MessageSegmenter`].
mod segmenter;
mod serialized_message;
