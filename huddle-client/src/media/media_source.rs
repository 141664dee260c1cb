use async_trait::async_trait;
use huddle_core::{MediaConstraints, MediaKind};
use std::fmt;
use std::sync::Arc;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

use crate::error::AcquisitionError;

/// Produces the local audio/video that every peer connection sends.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(
        &self,
        constraints: MediaConstraints,
    ) -> Result<LocalMediaSource, AcquisitionError>;
}

#[derive(Clone)]
pub struct LocalTrack {
    pub kind: MediaKind,
    pub track: Arc<TrackLocalStaticSample>,
}

/// The acquired local stream. Cheap to clone; tracks are shared.
#[derive(Clone)]
pub struct LocalMediaSource {
    pub stream_id: String,
    pub tracks: Vec<LocalTrack>,
}

impl LocalMediaSource {
    pub fn kinds(&self) -> Vec<MediaKind> {
        self.tracks.iter().map(|t| t.kind).collect()
    }
}

impl fmt::Debug for LocalMediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalMediaSource")
            .field("stream_id", &self.stream_id)
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Media that arrived from a remote peer.
///
/// `track` is present when the source came from a real engine.
#[derive(Clone)]
pub struct RemoteMediaSource {
    pub stream_id: String,
    pub track_id: String,
    pub kind: MediaKind,
    pub track: Option<Arc<TrackRemote>>,
}

impl fmt::Debug for RemoteMediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteMediaSource")
            .field("stream_id", &self.stream_id)
            .field("track_id", &self.track_id)
            .field("kind", &self.kind)
            .finish()
    }
}
