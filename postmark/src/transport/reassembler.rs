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

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::common::TransportConfig;
use crate::message::NodeId;
use crate::transport::{SegmentError, SegmentHeader};

/// Reassembler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassemblerConfig {
    /// Maximum incomplete messages held at once; the oldest is evicted beyond this.
    pub max_pending_messages: usize,
    /// Time without a new segment after which an incomplete message is discarded.
    pub timeout: Duration,
}

impl Default for ReassemblerConfig {
    fn default() -> Self {
        Self::from(&TransportConfig::default())
    }
}

impl From<&TransportConfig> for ReassemblerConfig {
    fn from(config: &TransportConfig) -> Self {
        Self {
            max_pending_messages: config.max_pending_reassemblies,
            timeout: config.reassembly_timeout(),
        }
    }
}

/// Reassembler statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReassemblerStats {
    /// Segments accepted.
    pub segments_received: u64,
    /// Messages completed.
    pub messages_reassembled: u64,
    /// Segments that had already been received.
    pub duplicates_dropped: u64,
    /// Incomplete messages discarded by [`Reassembler::expire_stale`].
    pub messages_timed_out: u64,
    /// Incomplete messages evicted to stay within the pending limit.
    pub messages_evicted: u64,
}

#[derive(Debug)]
struct PendingMessage {
    message_size: u32,
    segments: Vec<Option<Vec<u8>>>,
    received: usize,
    created_at: Instant,
    last_activity: Instant,
}

impl PendingMessage {
    fn new(header: &SegmentHeader, now: Instant) -> Self {
        Self {
            message_size: header.message_size,
            segments: vec![None; usize::from(header.segment_count)],
            received: 0,
            created_at: now,
            last_activity: now,
        }
    }

    fn is_complete(&self) -> bool {
        self.received == self.segments.len()
    }

    fn missing(&self) -> Vec<u16> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, segment)| segment.is_none())
            .filter_map(|(index, _)| u16::try_from(index).ok())
            .collect()
    }

    fn assemble(self) -> Result<Vec<u8>, SegmentError> {
        // The announced size comes from the peer; check it before reserving anything.
        let total: u64 = self.segments.iter().flatten().map(|segment| segment.len() as u64).sum();
        if total != u64::from(self.message_size) {
            return Err(SegmentError::SizeMismatch);
        }
        let mut payload = Vec::with_capacity(self.message_size as usize);
        for segment in self.segments.into_iter().flatten() {
            payload.extend_from_slice(&segment);
        }
        Ok(payload)
    }
}

/// Receiving side of segmentation: collects segments per `(node, message_id)` until a
/// message is whole.
///
/// ```rust,ignore
/// let mut reassembler = Reassembler::new(ReassemblerConfig::default());
///
/// // On datagram received from `node`
/// let (header, bytes) = decode_datagram(&datagram)?;
/// if let Some(payload) = reassembler.on_segment(node, &header, bytes)? {
///     deliver(payload);
/// }
///
/// // Periodically
/// reassembler.expire_stale(Instant::now());
/// ```
#[derive(Debug)]
pub struct Reassembler {
    config: ReassemblerConfig,
    pending: HashMap<(NodeId, u64), PendingMessage>,
    stats: ReassemblerStats,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(ReassemblerConfig::default())
    }
}

impl Reassembler {
    #[must_use]
    pub fn new(config: ReassemblerConfig) -> Self {
        Self {
            config,
            pending: HashMap::new(),
            stats: ReassemblerStats::default(),
        }
    }

    #[must_use]
    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(ReassemblerConfig::from(config))
    }

    #[must_use]
    pub fn stats(&self) -> &ReassemblerStats {
        &self.stats
    }

    /// Number of incomplete messages.
    #[must_use]
    pub fn pending_messages(&self) -> usize {
        self.pending.len()
    }

    /// Accepts one segment from `node`.
    ///
    /// Returns the whole payload when this segment completes its message. Duplicate
    /// segments are dropped and return `Ok(None)`.
    ///
    /// # Errors
    ///
    /// [`SegmentError::InvalidHeader`] for an index outside the count,
    /// [`SegmentError::CountMismatch`] or [`SegmentError::SizeMismatch`] when the header
    /// disagrees with earlier segments of the same message, and
    /// [`SegmentError::SizeMismatch`] if the completed payload has the wrong length (the
    /// message is discarded).
    pub fn on_segment(
        &mut self,
        node: NodeId,
        header: &SegmentHeader,
        bytes: &[u8],
    ) -> Result<Option<Vec<u8>>, SegmentError> {
        if header.segment_index >= header.segment_count {
            return Err(SegmentError::InvalidHeader);
        }

        let key = (node, header.message_id);
        let now = Instant::now();
        if !self.pending.contains_key(&key) && self.pending.len() >= self.config.max_pending_messages {
            self.evict_oldest();
        }
        let message = self
            .pending
            .entry(key)
            .or_insert_with(|| PendingMessage::new(header, now));

        if message.segments.len() != usize::from(header.segment_count) {
            return Err(SegmentError::CountMismatch);
        }
        if message.message_size != header.message_size {
            return Err(SegmentError::SizeMismatch);
        }

        let slot = &mut message.segments[usize::from(header.segment_index)];
        if slot.is_some() {
            self.stats.duplicates_dropped += 1;
            return Ok(None);
        }
        *slot = Some(bytes.to_vec());
        message.received += 1;
        message.last_activity = now;
        self.stats.segments_received += 1;

        if !message.is_complete() {
            return Ok(None);
        }

        let Some(message) = self.pending.remove(&key) else {
            return Ok(None);
        };
        let payload = message.assemble()?;
        self.stats.messages_reassembled += 1;
        trace!(%node, message_id = header.message_id, size = payload.len(), "Message reassembled");
        Ok(Some(payload))
    }

    /// Indices not yet received for a pending message, for negative acknowledgements.
    #[must_use]
    pub fn missing_segments(&self, node: NodeId, message_id: u64) -> Option<Vec<u16>> {
        self.pending.get(&(node, message_id)).map(PendingMessage::missing)
    }

    /// Discards incomplete messages idle for at least the configured timeout.
    ///
    /// Returns how many were discarded.
    pub fn expire_stale(&mut self, now: Instant) -> usize {
        let timeout = self.config.timeout;
        let before = self.pending.len();
        self.pending
            .retain(|_, message| now.saturating_duration_since(message.last_activity) < timeout);
        let expired = before - self.pending.len();
        if expired > 0 {
            self.stats.messages_timed_out += expired as u64;
            debug!(expired, "Expired stale reassemblies");
        }
        expired
    }

    /// Drops every incomplete message from `node`. Returns how many were dropped.
    pub fn forget_node(&mut self, node: NodeId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|(from, _), _| *from != node);
        before - self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest) = self
            .pending
            .iter()
            .min_by_key(|(_, message)| message.created_at)
            .map(|(key, _)| *key)
        {
            self.pending.remove(&oldest);
            self.stats.messages_evicted += 1;
        }
    }
}
