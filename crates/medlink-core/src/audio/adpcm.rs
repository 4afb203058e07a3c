//! 4-bit differential (IMA-style ADPCM) decoder.

const INDEX_TABLE: [i32; 16] = [-1, -1, -1, -1, 2, 4, 6, 8, -1, -1, -1, -1, 2, 4, 6, 8];

const STEP_TABLE: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66,
    73, 80, 88, 97, 107, 118, 130, 143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408,
    449, 494, 544, 598, 658, 724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066,
    2272, 2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484, 7132, 7845, 8630,
    9493, 10442, 11487, 12635, 13899, 15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794,
    32767,
];

const MAX_INDEX: i32 = 88;

fn clamp_sample(value: i32) -> i32 {
    value.clamp(i32::from(i16::MIN), i32::from(i16::MAX))
}

/// Decoder state for one continuous stream.
///
/// Speaker and microphone streams each need their own instance; state
/// carries across [`AdpcmDecoder::decode`] calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdpcmDecoder {
    predicted: i32,
    index: i32,
}

impl AdpcmDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current predicted sample.
    pub fn predicted(&self) -> i16 {
        // always within range, see clamp_sample
        self.predicted as i16
    }

    /// Current step-table index, in `0..=88`.
    pub fn step_index(&self) -> usize {
        self.index as usize
    }

    /// Decode `data`, two samples per byte, high nibble first.
    ///
    /// # Examples
    ///
    /// ```
    /// use medlink_core::audio::AdpcmDecoder;
    ///
    /// let mut decoder = AdpcmDecoder::new();
    /// let samples = decoder.decode(&[0x77, 0x00]);
    /// assert_eq!(samples.len(), 4);
    /// assert!(samples[1] > samples[0]);
    /// ```
    pub fn decode(&mut self, data: &[u8]) -> Vec<i16> {
        let mut out = Vec::with_capacity(data.len() * 2);
        for &byte in data {
            out.push(self.decode_nibble(byte >> 4));
            out.push(self.decode_nibble(byte & 0x0F));
        }
        out
    }

    fn decode_nibble(&mut self, nibble: u8) -> i16 {
        let step = STEP_TABLE[self.index as usize];
        let magnitude = i32::from(nibble & 0x07);
        let negative = nibble & 0x08 != 0;

        let mut diff = 0;
        let mut weight = step << 3;
        let mut mask = 0x04;
        for _ in 0..3 {
            if nibble & mask != 0 {
                diff += weight;
            }
            mask >>= 1;
            // the reference decoder truncates the running weight to 16 bits
            weight = i32::from((weight >> 1) as i16);
        }
        diff >>= 3;
        if negative {
            diff = -diff;
        }
        let sample = clamp_sample(self.predicted + diff) as i16;

        let delta = (magnitude * step + step) >> 2;
        self.predicted = clamp_sample(if negative {
            self.predicted - delta
        } else {
            self.predicted + delta
        });
        self.index = (self.index + INDEX_TABLE[magnitude as usize]).clamp(0, MAX_INDEX);

        sample
    }
}


/// Property tests for decoder state.
///
/// Run with: `cargo test -p medlink-core adpcm::proptests`
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn decode_is_deterministic_and_bounded(
            data in proptest::collection::vec(any::<u8>(), 0..512),
            split in 0usize..512,
        ) {
            let whole = AdpcmDecoder::new().decode(&data);
            prop_assert_eq!(whole.len(), data.len() * 2);

            let split = split.min(data.len());
            let mut decoder = AdpcmDecoder::new();
            let mut pieces = decoder.decode(&data[..split]);
            pieces.extend(decoder.decode(&data[split..]));
            prop_assert_eq!(&whole, &pieces);
            prop_assert!(decoder.step_index() <= 88);
        }
    }
}
