//! Stethoscope audio pipeline.
//!
//! Frames are split and decoded ([`frame`]), reassembled into 256-sample
//! paired blocks for echo cancellation, then into 800-sample blocks for the
//! gain stage and noise suppression, and finally appended to a WAV sink.
//!
//! ```text
//! frame ──► FrameDecoder ──► PairedWindow(256) ──► cancel_echo
//!                                                      │
//!         WavWriter ◄── suppress_noise ◄── gain ◄── WindowBuffer(800)
//! ```

pub mod adpcm;
pub mod enhance;
pub mod frame;
pub mod wav;
pub mod window;

use std::io::{Seek, Write};
use std::sync::Arc;

use tracing::{debug, trace};

use medlink_types::EchoMode;

pub use adpcm::AdpcmDecoder;
pub use enhance::{AEC_BLOCK, GAIN_BLOCK, Passthrough, SignalEnhancer};
pub use frame::{DecodedFrame, FrameDecoder, SequenceTracker};
pub use wav::{SAMPLE_RATE, WavWriter};
pub use window::{PairedWindow, WindowBuffer};

/// Decodes stethoscope frames into an enhanced PCM recording.
pub struct StethoscopePipeline<W: Write + Seek> {
    decoder: FrameDecoder,
    echo: PairedWindow<i16>,
    gain: WindowBuffer<i16>,
    mode: EchoMode,
    enhancer: Arc<dyn SignalEnhancer>,
    sink: WavWriter<W>,
    frames: u64,
}

impl<W: Write + Seek> std::fmt::Debug for StethoscopePipeline<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StethoscopePipeline")
            .field("mode", &self.mode)
            .field("frames", &self.frames)
            .field("data_len", &self.sink.data_len())
            .finish_non_exhaustive()
    }
}

impl<W: Write + Seek> StethoscopePipeline<W> {
    /// Start a recording into `sink`.
    pub fn new(sink: W, enhancer: Arc<dyn SignalEnhancer>) -> std::io::Result<Self> {
        enhancer.reset();
        Ok(Self {
            decoder: FrameDecoder::new(),
            echo: PairedWindow::new(AEC_BLOCK),
            gain: WindowBuffer::new(GAIN_BLOCK),
            mode: EchoMode::default(),
            enhancer,
            sink: WavWriter::new(sink)?,
            frames: 0,
        })
    }

    pub fn mode(&self) -> EchoMode {
        self.mode
    }

    /// Select the gain-stage routine for subsequent blocks.
    pub fn set_mode(&mut self, mode: EchoMode) {
        if mode != self.mode {
            debug!(?mode, "Echo mode changed");
        }
        self.mode = mode;
    }

    /// Frames accepted so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Dropped-frame gaps detected so far.
    pub fn gaps(&self) -> u32 {
        self.decoder.sequence().gaps()
    }

    /// Bytes of PCM written to the sink so far.
    pub fn data_len(&self) -> u32 {
        self.sink.data_len()
    }

    /// Decode one notification frame and write any completed output.
    ///
    /// Frames of an unrecognized length are ignored.
    pub fn process_frame(&mut self, data: &[u8]) -> std::io::Result<()> {
        let Some(decoded) = self.decoder.decode(data) else {
            debug!(len = data.len(), "Ignoring frame of unknown length");
            return Ok(());
        };
        self.frames += 1;

        let mut ready = self.echo.push(&decoded.mic, &decoded.speaker);
        while let Some((mic, speaker)) = ready {
            let cancelled = self.enhancer.cancel_echo(&mic, &speaker).unwrap_or(mic);
            self.feed_gain(&cancelled)?;
            ready = self.echo.push(&[], &[]);
        }
        Ok(())
    }

    fn feed_gain(&mut self, samples: &[i16]) -> std::io::Result<()> {
        let mut ready = self.gain.push(samples);
        while let Some(block) = ready {
            let gained = enhance::gain_stage(self.enhancer.as_ref(), &block, self.mode).unwrap_or(block);
            let output = self.enhancer.suppress_noise(&gained).unwrap_or(gained);
            trace!(samples = output.len(), "Block written");
            self.sink.write_samples(&output)?;
            ready = self.gain.push(&[]);
        }
        Ok(())
    }

    /// Patch the WAV header and return the sink.
    ///
    /// Samples short of a full gain block are discarded.
    pub fn finish(self) -> std::io::Result<W> {
        debug!(
            frames = self.frames,
            gaps = self.gaps(),
            bytes = self.sink.data_len(),
            "Recording finished"
        );
        self.sink.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Mutex;

    use frame::{ADPCM_FRAME_LEN, PCM_FRAME_LEN};
    use wav::HEADER_LEN;

    #[derive(Default)]
    struct Recorder {
        echo_blocks: Mutex<Vec<(usize, usize)>>,
        gain_calls: Mutex<Vec<&'static str>>,
    }

    impl SignalEnhancer for Recorder {
        fn cancel_echo(&self, mic: &[i16], speaker: &[i16]) -> Option<Vec<i16>> {
            self.echo_blocks.lock().unwrap().push((mic.len(), speaker.len()));
            None
        }

        fn automatic_gain(&self, _block: &[i16]) -> Option<Vec<i16>> {
            self.gain_calls.lock().unwrap().push("agc");
            None
        }

        fn clip_distortion(&self, _block: &[i16]) -> Option<Vec<i16>> {
            self.gain_calls.lock().unwrap().push("clip");
            None
        }

        fn suppress_noise(&self, block: &[i16]) -> Option<Vec<i16>> {
            Some(vec![1; block.len()])
        }
    }

    fn pipeline(enhancer: Arc<dyn SignalEnhancer>) -> StethoscopePipeline<Cursor<Vec<u8>>> {
        StethoscopePipeline::new(Cursor::new(Vec::new()), enhancer).unwrap()
    }

    #[test]
    fn test_passthrough_writes_whole_gain_blocks() {
        let mut p = pipeline(Arc::new(Passthrough));
        // 180 samples per frame; 10 frames = 1800 samples
        for _ in 0..10 {
            p.process_frame(&[0u8; ADPCM_FRAME_LEN]).unwrap();
        }
        // 7 echo blocks (1792 samples) -> 2 gain blocks
        assert_eq!(p.data_len(), 2 * 800 * 2);
        let bytes = p.finish().unwrap().into_inner();
        assert_eq!(bytes.len(), HEADER_LEN + 3200);
        assert_eq!(&bytes[40..44], &3200u32.to_le_bytes());
    }

    #[test]
    fn test_echo_blocks_are_paired_and_sized() {
        let recorder = Arc::new(Recorder::default());
        let mut p = pipeline(recorder.clone());
        for _ in 0..20 {
            p.process_frame(&[0u8; PCM_FRAME_LEN]).unwrap();
        }
        let blocks = recorder.echo_blocks.lock().unwrap();
        // 20 * 60 = 1200 samples -> 4 blocks of 256
        assert_eq!(blocks.len(), 4);
        assert!(blocks.iter().all(|&b| b == (AEC_BLOCK, AEC_BLOCK)));
    }

    #[test]
    fn test_mode_selects_gain_routine() {
        let recorder = Arc::new(Recorder::default());
        let mut p = pipeline(recorder.clone());
        // 6 * 180 = 1080 samples -> 4 echo blocks -> 1 gain block
        for _ in 0..6 {
            p.process_frame(&[0u8; ADPCM_FRAME_LEN]).unwrap();
        }
        p.set_mode(EchoMode::Diaphragm);
        for _ in 0..5 {
            p.process_frame(&[0u8; ADPCM_FRAME_LEN]).unwrap();
        }
        assert_eq!(*recorder.gain_calls.lock().unwrap(), vec!["clip", "agc"]);
    }

    #[test]
    fn test_noise_suppression_output_is_written() {
        let mut p = pipeline(Arc::new(Recorder::default()));
        for _ in 0..10 {
            p.process_frame(&[0x77u8; ADPCM_FRAME_LEN]).unwrap();
        }
        let bytes = p.finish().unwrap().into_inner();
        assert_eq!(bytes.len(), HEADER_LEN + 3200);
        assert!(bytes[HEADER_LEN..].chunks(2).all(|s| s == [1, 0]));
    }

    #[test]
    fn test_unknown_frames_ignored() {
        let mut p = pipeline(Arc::new(Passthrough));
        p.process_frame(&[0u8; 20]).unwrap();
        p.process_frame(&[]).unwrap();
        assert_eq!(p.frames(), 0);
        assert_eq!(p.data_len(), 0);
    }
}
