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

//! Segment datagram wire format.
//!
//! Every datagram carries one segment of one message:
//!
//! ```text
//! Datagram = message_id(u64) | segment_index(u16) | segment_count(u16) | message_size(u32) | bytes
//! ```
//!
//! All header fields are big-endian. `bytes` runs to the end of the datagram.

/// Length of the encoded [`SegmentHeader`].
pub const SEGMENT_HEADER_LEN: usize = 16;

/// Header preceding every segment on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SegmentHeader {
    /// Sender-chosen identifier shared by every segment of one message.
    pub message_id: u64,
    /// Position of this segment, `0..segment_count`.
    pub segment_index: u16,
    /// Number of segments in the message.
    pub segment_count: u16,
    /// Total payload size of the message.
    pub message_size: u32,
}

impl SegmentHeader {
    /// Appends the encoded header to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.message_id.to_be_bytes());
        buf.extend_from_slice(&self.segment_index.to_be_bytes());
        buf.extend_from_slice(&self.segment_count.to_be_bytes());
        buf.extend_from_slice(&self.message_size.to_be_bytes());
    }

    /// Decodes a header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// [`SegmentError::Truncated`] if `buf` is shorter than a header and
    /// [`SegmentError::InvalidHeader`] if the index is not below the count.
    pub fn decode(buf: &[u8]) -> Result<Self, SegmentError> {
        let header: &[u8; SEGMENT_HEADER_LEN] = buf
            .get(..SEGMENT_HEADER_LEN)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(SegmentError::Truncated)?;

        let mut message_id = [0; 8];
        message_id.copy_from_slice(&header[0..8]);
        let decoded = Self {
            message_id: u64::from_be_bytes(message_id),
            segment_index: u16::from_be_bytes([header[8], header[9]]),
            segment_count: u16::from_be_bytes([header[10], header[11]]),
            message_size: u32::from_be_bytes([header[12], header[13], header[14], header[15]]),
        };

        if decoded.segment_index >= decoded.segment_count {
            return Err(SegmentError::InvalidHeader);
        }
        Ok(decoded)
    }
}

/// Segment datagram and reassembly errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentError {
    /// The datagram is shorter than a segment header.
    Truncated,
    /// The header is self-inconsistent.
    InvalidHeader,
    /// A segment disagrees with earlier segments about the segment count.
    CountMismatch,
    /// A segment disagrees about the message size, or the reassembled size is wrong.
    SizeMismatch,
}

impl std::fmt::Display for SegmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated => write!(f, "datagram shorter than segment header"),
            Self::InvalidHeader => write!(f, "invalid segment header"),
            Self::CountMismatch => write!(f, "segment count mismatch"),
            Self::SizeMismatch => write!(f, "message size mismatch"),
        }
    }
}

impl std::error::Error for SegmentError {}

/// Builds a datagram from a header and the segment bytes.
#[must_use]
pub fn encode_datagram(header: &SegmentHeader, segment: &[u8]) -> Vec<u8> {
    let mut datagram = Vec::with_capacity(SEGMENT_HEADER_LEN + segment.len());
    header.encode_into(&mut datagram);
    datagram.extend_from_slice(segment);
    datagram
}

/// Splits a datagram into its header and segment bytes.
///
/// # Errors
///
/// See [`SegmentHeader::decode`]. Additionally, segment bytes longer than the announced
/// message size are rejected as [`SegmentError::SizeMismatch`].
pub fn decode_datagram(datagram: &[u8]) -> Result<(SegmentHeader, &[u8]), SegmentError> {
    let header = SegmentHeader::decode(datagram)?;
    let segment = &datagram[SEGMENT_HEADER_LEN..];
    if segment.len() as u64 > u64::from(header.message_size) {
        return Err(SegmentError::SizeMismatch);
    }
    Ok((header, segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datagram_layout_is_big_endian() {
        let header = SegmentHeader {
            message_id: 0x0102_0304_0506_0708,
            segment_index: 2,
            segment_count: 3,
            message_size: 0x0A0B_0C0D,
        };
        let datagram = encode_datagram(&header, b"xyz");

        assert_eq!(
            &datagram[..SEGMENT_HEADER_LEN],
            &[1, 2, 3, 4, 5, 6, 7, 8, 0, 2, 0, 3, 0x0A, 0x0B, 0x0C, 0x0D]
        );
        let (decoded, segment) = decode_datagram(&datagram).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(segment, b"xyz");
    }

    #[test]
    fn test_short_datagram_is_truncated() {
        assert_eq!(decode_datagram(&[0; 15]), Err(SegmentError::Truncated));
        assert_eq!(decode_datagram(&[]), Err(SegmentError::Truncated));
    }

    #[test]
    fn test_index_must_be_below_count() {
        let header = SegmentHeader {
            message_id: 1,
            segment_index: 3,
            segment_count: 3,
            message_size: 10,
        };
        assert_eq!(
            decode_datagram(&encode_datagram(&header, b"")),
            Err(SegmentError::InvalidHeader)
        );
    }

    #[test]
    fn test_segment_larger_than_message_is_rejected() {
        let header = SegmentHeader {
            message_id: 1,
            segment_index: 0,
            segment_count: 1,
            message_size: 2,
        };
        assert_eq!(
            decode_datagram(&encode_datagram(&header, b"abc")),
            Err(SegmentError::SizeMismatch)
        );
    }
}
