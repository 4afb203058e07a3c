//! Signal enhancement stages applied to stethoscope audio.
//!
//! The echo cancellation, gain and noise suppression routines are vendor
//! algorithms. [`SignalEnhancer`] is the seam where they plug in; every
//! method returns `None` by default, which the pipeline treats as
//! "unavailable" and passes the block through unmodified.

use medlink_types::EchoMode;

/// Block size of the echo cancellation stage.
pub const AEC_BLOCK: usize = 256;

/// Block size of the gain / clip stage.
pub const GAIN_BLOCK: usize = 800;

/// Pluggable enhancement routines.
///
/// Implementations that keep state across blocks should use interior
/// mutability; one enhancer serves one session at a time.
pub trait SignalEnhancer: Send + Sync {
    /// Called once before a recording starts.
    fn reset(&self) {}

    /// Cancel the speaker echo from a [`AEC_BLOCK`]-sample microphone block.
    fn cancel_echo(&self, _mic: &[i16], _speaker: &[i16]) -> Option<Vec<i16>> {
        None
    }

    /// Automatic gain control on a [`GAIN_BLOCK`]-sample block.
    fn automatic_gain(&self, _block: &[i16]) -> Option<Vec<i16>> {
        None
    }

    /// Clip-distortion limiting on a [`GAIN_BLOCK`]-sample block.
    fn clip_distortion(&self, _block: &[i16]) -> Option<Vec<i16>> {
        None
    }

    /// Noise suppression on a gain-stage output block.
    fn suppress_noise(&self, _block: &[i16]) -> Option<Vec<i16>> {
        None
    }
}

/// Enhancer that leaves every block unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl SignalEnhancer for Passthrough {}

/// Gain stage selected by the chest-piece mode.
pub(crate) fn gain_stage(enhancer: &dyn SignalEnhancer, block: &[i16], mode: EchoMode) -> Option<Vec<i16>> {
    match mode {
        EchoMode::Diaphragm => enhancer.automatic_gain(block),
        EchoMode::Bell => enhancer.clip_distortion(block),
    }
}
