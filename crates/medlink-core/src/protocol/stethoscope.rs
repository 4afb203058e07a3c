use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, info, warn};

use medlink_types::{DeviceType, EchoMode, Measurement, StethoscopeResult, uuids};

use super::{MeasurementProtocol, deadline_after, next_frame, release};
use crate::audio::{SignalEnhancer, StethoscopePipeline};
use crate::error::{Error, Result};
use crate::session::{AttributeSession, Listener};

/// Output file for a recording started at `started`:
/// `<dir>/<yyyy-MM-dd HH-mm-ss>.wav`.
pub fn recording_path(dir: &Path, started: OffsetDateTime) -> Result<PathBuf> {
    let name = started
        .format(format_description!(
            "[year]-[month]-[day] [hour]-[minute]-[second]"
        ))
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;
    Ok(dir.join(format!("{name}.wav")))
}

/// Create the recording file on the blocking pool.
async fn create_recording(path: PathBuf) -> Result<File> {
    tokio::task::spawn_blocking(move || File::create(path))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
        .map_err(Error::from)
}

/// Records the stethoscope's audio stream to a WAV file.
pub struct StethoscopeProtocol {
    output_dir: PathBuf,
    window: Duration,
    enhancer: Arc<dyn SignalEnhancer>,
}

impl std::fmt::Debug for StethoscopeProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StethoscopeProtocol")
            .field("output_dir", &self.output_dir)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl StethoscopeProtocol {
    pub fn new(output_dir: PathBuf, window: Duration, enhancer: Arc<dyn SignalEnhancer>) -> Self {
        Self {
            output_dir,
            window,
            enhancer,
        }
    }
}

#[async_trait]
impl MeasurementProtocol for StethoscopeProtocol {
    fn device_type(&self) -> DeviceType {
        DeviceType::Stethoscope
    }

    #[tracing::instrument(level = "debug", skip_all, fields(window = ?self.window))]
    async fn run(&self, session: &AttributeSession) -> Result<Option<Measurement>> {
        let (listener, mut rx) = Listener::channel();
        session.subscribe(uuids::STETHOSCOPE_AUDIO, &listener).await?;

        let path = recording_path(&self.output_dir, OffsetDateTime::now_utc())?;
        let file = match create_recording(path.clone()).await {
            Ok(file) => file,
            Err(e) => {
                release(session, uuids::STETHOSCOPE_AUDIO, &listener).await;
                return Err(e);
            }
        };
        // Frame writes stay inline: BufWriter flushes a few KiB at a time
        let mut pipeline =
            StethoscopePipeline::new(BufWriter::new(file), Arc::clone(&self.enhancer))?;

        let mode_channel = session
            .properties(uuids::STETHOSCOPE_MODE)
            .is_some_and(|p| p.can_subscribe());
        if mode_channel
            && let Err(e) = session.subscribe(uuids::STETHOSCOPE_MODE, &listener).await
        {
            warn!("Echo mode updates unavailable: {}", e);
        }

        info!(path = %path.display(), "Recording");
        let deadline = deadline_after(self.window);
        while let Some(frame) = next_frame(&mut rx, deadline).await {
            if frame.characteristic == uuids::STETHOSCOPE_MODE {
                match frame.value.first().copied().and_then(EchoMode::from_byte) {
                    Some(mode) => pipeline.set_mode(mode),
                    None => debug!(value = ?frame.value, "Unknown echo mode"),
                }
                continue;
            }
            pipeline.process_frame(&frame.value)?;
        }

        release(session, uuids::STETHOSCOPE_AUDIO, &listener).await;
        if mode_channel {
            release(session, uuids::STETHOSCOPE_MODE, &listener).await;
        }
        pipeline.finish()?;

        Ok(Some(
            StethoscopeResult {
                output_file_path: path.display().to_string(),
            }
            .into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use time::macros::datetime;

    use crate::audio::Passthrough;
    use crate::audio::frame::ADPCM_FRAME_LEN;
    use crate::audio::wav::HEADER_LEN;
    use crate::mock::{MockOp, MockPeripheral};
    use crate::protocol::test_support::{ADDRESS, bound};
    use crate::traits::CharProperties;

    #[test]
    fn test_recording_path_format() {
        let path = recording_path(Path::new("/data"), datetime!(2024-03-07 09:05:01 UTC)).unwrap();
        assert_eq!(path, PathBuf::from("/data/2024-03-07 09-05-01.wav"));
    }

    fn peripheral(audio: Vec<Vec<u8>>, with_mode: bool) -> Arc<MockPeripheral> {
        let mut builder = MockPeripheral::builder(ADDRESS.parse().unwrap())
            .characteristic(uuids::STETHOSCOPE_AUDIO, CharProperties::NOTIFY)
            .on_subscribe(uuids::STETHOSCOPE_AUDIO, audio);
        if with_mode {
            builder = builder
                .characteristic(
                    uuids::STETHOSCOPE_MODE,
                    CharProperties::NOTIFY | CharProperties::READ,
                )
                .on_subscribe(uuids::STETHOSCOPE_MODE, vec![vec![1]]);
        }
        Arc::new(builder.build())
    }

    fn output_path(result: Option<Measurement>) -> PathBuf {
        match result {
            Some(Measurement::Stethoscope(r)) => PathBuf::from(r.output_file_path),
            other => panic!("expected stethoscope result, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recording_written_to_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let p = peripheral(vec![vec![0u8; ADPCM_FRAME_LEN]; 10], false);
        let session = bound(&p).await;

        let protocol = StethoscopeProtocol::new(
            dir.path().to_path_buf(),
            Duration::from_secs(12),
            Arc::new(Passthrough),
        );
        let path = output_path(protocol.run(&session).await.unwrap());

        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("wav"));
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(bytes.len(), HEADER_LEN + 3200);
        assert_eq!(&bytes[40..44], &3200u32.to_le_bytes());
        assert!(p.ops().contains(&MockOp::Unsubscribe(uuids::STETHOSCOPE_AUDIO)));
    }

    #[derive(Default)]
    struct GainStageLog {
        calls: Mutex<Vec<&'static str>>,
    }

    impl SignalEnhancer for GainStageLog {
        fn automatic_gain(&self, _block: &[i16]) -> Option<Vec<i16>> {
            self.calls.lock().unwrap().push("agc");
            None
        }

        fn clip_distortion(&self, _block: &[i16]) -> Option<Vec<i16>> {
            self.calls.lock().unwrap().push("clip");
            None
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_mode_notification_switches_gain_stage() {
        let dir = tempfile::tempdir().unwrap();
        // 6 frames fill one gain block before the diaphragm notification
        let p = peripheral(vec![vec![0u8; ADPCM_FRAME_LEN]; 6], true);
        let session = bound(&p).await;
        let stages = Arc::new(GainStageLog::default());

        let late = Arc::clone(&p);
        tokio::spawn(async move {
            while !late
                .ops()
                .iter()
                .any(|op| matches!(op, MockOp::Subscribe(u, _) if *u == uuids::STETHOSCOPE_MODE))
            {
                tokio::task::yield_now().await;
            }
            for _ in 0..5 {
                late.notify(uuids::STETHOSCOPE_AUDIO, vec![0u8; ADPCM_FRAME_LEN]);
            }
        });

        StethoscopeProtocol::new(dir.path().to_path_buf(), Duration::from_secs(12), stages.clone())
            .run(&session)
            .await
            .unwrap();

        assert_eq!(*stages.calls.lock().unwrap(), vec!["clip", "agc"]);
        assert!(p.ops().contains(&MockOp::Unsubscribe(uuids::STETHOSCOPE_MODE)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mode_channel_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let p = Arc::new(
            MockPeripheral::builder(ADDRESS.parse().unwrap())
                .characteristic(uuids::STETHOSCOPE_AUDIO, CharProperties::NOTIFY)
                .characteristic(uuids::STETHOSCOPE_MODE, CharProperties::READ)
                .build(),
        );
        let session = bound(&p).await;

        let result = StethoscopeProtocol::new(
            dir.path().to_path_buf(),
            Duration::from_secs(2),
            Arc::new(Passthrough),
        )
        .run(&session)
        .await
        .unwrap();
        let bytes = std::fs::read(output_path(result)).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);
    }

    #[tokio::test]
    async fn test_unwritable_output_dir_releases_audio() {
        let dir = tempfile::tempdir().unwrap();
        let p = peripheral(vec![vec![0u8; ADPCM_FRAME_LEN]; 2], false);
        let session = bound(&p).await;

        let result = StethoscopeProtocol::new(
            dir.path().join("missing"),
            Duration::from_secs(2),
            Arc::new(Passthrough),
        )
        .run(&session)
        .await;
        assert!(matches!(result, Err(Error::Io(_))));
        assert!(p.ops().contains(&MockOp::Unsubscribe(uuids::STETHOSCOPE_AUDIO)));
    }

    #[tokio::test]
    async fn test_missing_audio_characteristic_fails() {
        let dir = tempfile::tempdir().unwrap();
        let p = Arc::new(MockPeripheral::builder(ADDRESS.parse().unwrap()).build());
        let session = bound(&p).await;

        let result = StethoscopeProtocol::new(
            dir.path().to_path_buf(),
            Duration::from_secs(2),
            Arc::new(Passthrough),
        )
        .run(&session)
        .await;
        assert!(matches!(result, Err(Error::InvalidCharacteristic { .. })));
    }
}
