use async_trait::async_trait;
use bytes::Bytes;
use huddle_core::{MediaConstraints, MediaKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use crate::error::AcquisitionError;
use crate::media::{LocalMediaSource, LocalTrack, MediaSource};

// One 20 ms opus frame of silence.
const OPUS_SILENCE: &[u8] = &[0xf8, 0xff, 0xfe];
// Smallest VP8 key frame header; receivers only need RTP to flow.
const VP8_BLANK: &[u8] = &[0x10, 0x02, 0x00, 0x9d, 0x01, 0x2a, 0x10, 0x00, 0x10, 0x00];

/// Media source without capture hardware: an opus and a vp8 track that
/// carry silence and blank frames once [`spawn_sample_pump`] runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticMediaSource;

#[async_trait]
impl MediaSource for SyntheticMediaSource {
    async fn acquire(
        &self,
        constraints: MediaConstraints,
    ) -> Result<LocalMediaSource, AcquisitionError> {
        if constraints.is_empty() {
            return Err(AcquisitionError::NothingRequested);
        }

        let stream_id = format!("huddle-{}", Uuid::new_v4().simple());
        let mut tracks = Vec::new();

        if constraints.audio {
            let codec = RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            };
            tracks.push(LocalTrack {
                kind: MediaKind::Audio,
                track: Arc::new(TrackLocalStaticSample::new(
                    codec,
                    "audio".to_owned(),
                    stream_id.clone(),
                )),
            });
        }

        if constraints.video {
            let codec = RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            };
            tracks.push(LocalTrack {
                kind: MediaKind::Video,
                track: Arc::new(TrackLocalStaticSample::new(
                    codec,
                    "video".to_owned(),
                    stream_id.clone(),
                )),
            });
        }

        info!("Acquired synthetic media {} ({:?})", stream_id, constraints);
        Ok(LocalMediaSource { stream_id, tracks })
    }
}

/// Writes placeholder samples to every track until the task is aborted.
pub fn spawn_sample_pump(source: &LocalMediaSource) -> JoinHandle<()> {
    let tracks = source.tracks.clone();

    tokio::spawn(async move {
        let frame = Duration::from_millis(20);
        let mut ticker = tokio::time::interval(frame);

        loop {
            ticker.tick().await;
            for local in &tracks {
                let data = match local.kind {
                    MediaKind::Audio => Bytes::from_static(OPUS_SILENCE),
                    MediaKind::Video => Bytes::from_static(VP8_BLANK),
                };
                let sample = Sample {
                    data,
                    duration: frame,
                    ..Default::default()
                };
                if let Err(e) = local.track.write_sample(&sample).await {
                    debug!("Sample pump write failed: {}", e);
                }
            }
        }
    })
}
