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
use std::ops::{Deref, Range};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::common::TransportConfig;
use crate::transport::{encode_datagram, SegmentBitSet, SegmentHeader, SerializationState, SerializedMessage};

/// One segment's bytes, borrowed from the shared payload.
#[derive(Clone)]
pub struct Segment {
    index: u16,
    data: Arc<[u8]>,
    range: Range<usize>,
}

impl Segment {
    #[inline]
    #[must_use]
    pub fn index(&self) -> u16 {
        self.index
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[self.range.clone()]
    }
}

impl Deref for Segment {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("index", &self.index)
            .field("len", &self.range.len())
            .finish()
    }
}

#[derive(Default)]
struct SegmenterState {
    data: Option<Arc<[u8]>>,
    pending: SegmentBitSet,
    segment_count: u16,
    oversized: bool,
    last_sent_at: Option<Instant>,
}

/// Splits one outbound payload into fixed-size segments and tracks which still need
/// sending.
///
/// Until the payload is complete and [`initialize`](Self::initialize) has run, the
/// segmenter reports no segments and is not complete. No method panics or returns an
/// error: failures show up as `false`, zero or `None`.
pub struct MessageSegmenter {
    message: Arc<SerializedMessage>,
    segment_size: u16,
    max_in_flight: u16,
    retransmit_timeout: Duration,
    state: Mutex<SegmenterState>,
}

impl fmt::Debug for MessageSegmenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MessageSegmenter")
            .field("segment_size", &self.segment_size)
            .field("segment_count", &state.segment_count)
            .field("pending", &state.pending.count_ones())
            .finish()
    }
}

impl MessageSegmenter {
    /// Creates a segmenter for `message`. A zero segment size is treated as one byte.
    ///
    /// Bursts are unlimited and retransmission uses the default timeout; see
    /// [`from_config`](Self::from_config) to take both from a [`TransportConfig`].
    pub fn new(message: Arc<SerializedMessage>, segment_size: u16) -> Self {
        Self {
            message,
            segment_size: segment_size.max(1),
            max_in_flight: u16::MAX,
            retransmit_timeout: TransportConfig::default().retransmit_timeout(),
            state: Mutex::new(SegmenterState::default()),
        }
    }

    /// Creates a segmenter using the segment size, burst limit and retransmit timeout of
    /// `config`.
    pub fn from_config(message: Arc<SerializedMessage>, config: &TransportConfig) -> Self {
        Self {
            max_in_flight: config.max_in_flight_segments.max(1),
            retransmit_timeout: config.retransmit_timeout(),
            ..Self::new(message, config.segment_size)
        }
    }

    #[inline]
    #[must_use]
    pub fn segment_size(&self) -> u16 {
        self.segment_size
    }

    /// Captures the payload and marks every segment pending.
    ///
    /// Does nothing while the payload is incomplete or once initialized. A payload that
    /// would need more than `u16::MAX` segments makes the segmenter invalid.
    pub fn initialize(&self) {
        let mut state = self.state.lock();
        if state.data.is_some() || state.oversized {
            return;
        }
        let Some(data) = self.message.bytes() else {
            return;
        };

        let count = data.len().div_ceil(usize::from(self.segment_size));
        let Ok(segment_count) = u16::try_from(count) else {
            warn!(
                size = data.len(),
                segment_size = self.segment_size,
                "Message needs too many segments"
            );
            state.oversized = true;
            return;
        };

        state.pending = SegmentBitSet::new(count);
        state.pending.set_all();
        state.segment_count = segment_count;
        state.data = Some(data);
        trace!(segment_count, "Segmenter initialized");
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.lock().data.is_some()
    }

    /// Payload size in bytes; zero before initialization.
    #[must_use]
    pub fn message_size(&self) -> u64 {
        self.state.lock().data.as_ref().map_or(0, |data| data.len() as u64)
    }

    #[must_use]
    pub fn segment_count(&self) -> u16 {
        self.state.lock().segment_count
    }

    #[must_use]
    pub fn pending_segments_count(&self) -> u16 {
        // Bounded by segment_count, which fits in u16.
        self.state.lock().pending.count_ones() as u16
    }

    /// The lowest pending segment. Does not mark it sent.
    #[must_use]
    pub fn next_pending_segment(&self) -> Option<Segment> {
        let state = self.state.lock();
        let index = state.pending.first_set()?;
        self.slice(&state, index)
    }

    /// The bytes of any segment, pending or not.
    #[must_use]
    pub fn segment(&self, index: u16) -> Option<Segment> {
        let state = self.state.lock();
        self.slice(&state, usize::from(index))
    }

    /// Encodes the lowest pending segment as a datagram for `message_id`.
    #[must_use]
    pub fn next_pending_datagram(&self, message_id: u64) -> Option<(u16, Vec<u8>)> {
        let state = self.state.lock();
        let index = state.pending.first_set()?;
        let segment = self.slice(&state, index)?;
        let message_size = u32::try_from(segment.data.len()).ok()?;
        let header = SegmentHeader {
            message_id,
            segment_index: segment.index,
            segment_count: state.segment_count,
            message_size,
        };
        Some((segment.index, encode_datagram(&header, segment.as_bytes())))
    }

    /// Clears the pending flag of `index`. Out-of-range indices are ignored.
    pub fn mark_as_sent(&self, index: u16) {
        let mut state = self.state.lock();
        if usize::from(index) < state.pending.len() {
            state.pending.clear(usize::from(index));
            state.last_sent_at = Some(Instant::now());
        }
    }

    /// Encodes up to the in-flight limit of pending segments, lowest index first, and marks
    /// them sent.
    #[must_use]
    pub fn next_burst(&self, message_id: u64) -> Vec<(u16, Vec<u8>)> {
        let mut burst = Vec::new();
        while burst.len() < usize::from(self.max_in_flight) {
            let Some((index, datagram)) = self.next_pending_datagram(message_id) else {
                break;
            };
            self.mark_as_sent(index);
            burst.push((index, datagram));
        }
        if !burst.is_empty() {
            trace!(message_id, segments = burst.len(), "Segment burst ready");
        }
        burst
    }

    /// Marks every segment pending again once the retransmit timeout has passed since the
    /// last segment was sent with nothing left pending.
    ///
    /// Returns `true` if segments were re-marked. The transport calls this periodically
    /// and drops the segmenter once the receiver confirms the message.
    pub fn retransmit_if_due(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        let Some(last_sent_at) = state.last_sent_at else {
            return false;
        };
        if state.pending.first_set().is_some() || now.saturating_duration_since(last_sent_at) < self.retransmit_timeout {
            return false;
        }
        state.pending.set_all();
        state.last_sent_at = None;
        trace!(segment_count = state.segment_count, "Retransmit timeout elapsed");
        true
    }

    /// Marks every segment pending again.
    pub fn mark_for_retransmission(&self) {
        self.state.lock().pending.set_all();
    }

    /// Marks the listed segments pending again. Out-of-range indices are ignored.
    pub fn mark_segments_for_retransmission(&self, indices: &[u16]) {
        let mut state = self.state.lock();
        for index in indices {
            state.pending.set(usize::from(*index));
        }
    }

    /// Returns `true` once initialized with nothing left pending.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let state = self.state.lock();
        state.data.is_some() && state.pending.first_set().is_none()
    }

    /// Returns `true` if the payload failed to serialize or is too large to segment.
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        self.state.lock().oversized || self.message.state() == SerializationState::Invalid
    }

    fn slice(&self, state: &SegmenterState, index: usize) -> Option<Segment> {
        let data = state.data.as_ref()?;
        if index >= usize::from(state.segment_count) {
            return None;
        }
        let start = index * usize::from(self.segment_size);
        let end = (start + usize::from(self.segment_size)).min(data.len());
        Some(Segment {
            index: u16::try_from(index).ok()?,
            data: Arc::clone(data),
            range: start..end,
        })
    }
}
