//! Stethoscope notification frame layouts.
//!
//! | Length | Layout | Speaker | Microphone |
//! |--------|--------|---------|------------|
//! | 158 | header (8 bytes, sequence at 2), speaker 30, mic 120 | ADPCM | PCM `i16` LE |
//! | 150 | speaker 30, mic 120 | ADPCM | PCM `i16` LE |
//! | 180 | mic 90, speaker 90 | ADPCM | ADPCM |

use tracing::warn;

use super::adpcm::AdpcmDecoder;

pub const SEQUENCED_FRAME_LEN: usize = 158;
pub const PCM_FRAME_LEN: usize = 150;
pub const ADPCM_FRAME_LEN: usize = 180;

/// Offset of the sequence counter in a sequenced frame.
const SEQUENCE_OFFSET: usize = 2;

/// Decoded samples of one frame. Both sides have equal length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub mic: Vec<i16>,
    pub speaker: Vec<i16>,
}

/// Reinterpret bytes as little-endian 16-bit samples. A trailing odd byte
/// is ignored.
pub fn pcm_le(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Detects dropped sequenced frames.
///
/// The counter runs 0..=255; after 255 the next expected value is 0.
/// Gaps are logged, never corrected.
#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    expected: Option<u8>,
    gaps: u32,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a received counter value; returns `false` on a gap.
    pub fn observe(&mut self, sequence: u8) -> bool {
        let in_order = self.expected.is_none_or(|expected| expected == sequence);
        if !in_order {
            self.gaps += 1;
            warn!(
                expected = ?self.expected,
                received = sequence,
                "data lost"
            );
        }
        self.expected = Some(sequence.wrapping_add(1));
        in_order
    }

    /// Number of gaps seen so far.
    pub fn gaps(&self) -> u32 {
        self.gaps
    }
}

/// Splits frames and decodes both channels with persistent decoder state.
#[derive(Debug, Clone, Default)]
pub struct FrameDecoder {
    speaker: AdpcmDecoder,
    mic: AdpcmDecoder,
    sequence: SequenceTracker,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequence(&self) -> &SequenceTracker {
        &self.sequence
    }

    /// Decode one frame; frames of any other length yield `None`.
    pub fn decode(&mut self, data: &[u8]) -> Option<DecodedFrame> {
        match data.len() {
            SEQUENCED_FRAME_LEN => {
                self.sequence.observe(data[SEQUENCE_OFFSET]);
                Some(DecodedFrame {
                    speaker: self.speaker.decode(&data[8..38]),
                    mic: pcm_le(&data[38..158]),
                })
            }
            PCM_FRAME_LEN => Some(DecodedFrame {
                speaker: self.speaker.decode(&data[0..30]),
                mic: pcm_le(&data[30..150]),
            }),
            ADPCM_FRAME_LEN => Some(DecodedFrame {
                mic: self.mic.decode(&data[0..90]),
                speaker: self.speaker.decode(&data[90..180]),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequenced(seq: u8) -> Vec<u8> {
        let mut frame = vec![0u8; SEQUENCED_FRAME_LEN];
        frame[SEQUENCE_OFFSET] = seq;
        frame
    }

    #[test]
    fn test_pcm_le() {
        assert_eq!(pcm_le(&[0x34, 0x12, 0xFF, 0xFF, 0x01]), vec![0x1234, -1]);
    }

    #[test]
    fn test_sequence_in_order_and_wrap() {
        let mut tracker = SequenceTracker::new();
        for seq in [250u8, 251, 252, 253, 254, 255, 0, 1] {
            assert!(tracker.observe(seq));
        }
        assert_eq!(tracker.gaps(), 0);
    }

    #[test]
    fn test_sequence_gap_detected_and_resynced() {
        let mut tracker = SequenceTracker::new();
        assert!(tracker.observe(10));
        assert!(!tracker.observe(12));
        assert!(tracker.observe(13));
        assert_eq!(tracker.gaps(), 1);
    }

    #[test]
    fn test_first_frame_never_a_gap() {
        let mut tracker = SequenceTracker::new();
        assert!(tracker.observe(77));
    }

    #[test]
    fn test_sizes_per_layout() {
        let mut decoder = FrameDecoder::new();

        let frame = decoder.decode(&sequenced(0)).unwrap();
        assert_eq!((frame.speaker.len(), frame.mic.len()), (60, 60));

        let frame = decoder.decode(&[0u8; PCM_FRAME_LEN]).unwrap();
        assert_eq!((frame.speaker.len(), frame.mic.len()), (60, 60));

        let frame = decoder.decode(&[0u8; ADPCM_FRAME_LEN]).unwrap();
        assert_eq!((frame.speaker.len(), frame.mic.len()), (180, 180));
    }

    #[test]
    fn test_unknown_length_ignored() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.decode(&[0u8; 20]).is_none());
        assert!(decoder.decode(&[]).is_none());
        assert!(decoder.decode(&[0u8; 159]).is_none());
    }

    #[test]
    fn test_sequenced_mic_is_raw_pcm() {
        let mut frame = sequenced(0);
        frame[38] = 0x34;
        frame[39] = 0x12;
        let decoded = FrameDecoder::new().decode(&frame).unwrap();
        assert_eq!(decoded.mic[0], 0x1234);
    }

    #[test]
    fn test_sequenced_frames_track_gaps() {
        let mut decoder = FrameDecoder::new();
        decoder.decode(&sequenced(1));
        decoder.decode(&sequenced(2));
        decoder.decode(&sequenced(5));
        assert_eq!(decoder.sequence().gaps(), 1);
    }

    #[test]
    fn test_channels_use_separate_decoders() {
        // same payload on both halves of a 180-byte frame decodes identically
        let mut frame = vec![0x5Au8; ADPCM_FRAME_LEN];
        frame[90..].copy_from_slice(&[0x5A; 90]);
        let decoded = FrameDecoder::new().decode(&frame).unwrap();
        assert_eq!(decoded.mic, decoded.speaker);
    }
}
