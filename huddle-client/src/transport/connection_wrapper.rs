use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use huddle_core::{MediaKind, SdpKind, SessionDescription};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use crate::media::{LocalMediaSource, RemoteMediaSource};
use crate::transport::{
    ConnectionEngine, EngineFactory, EngineTag, TransportConfig, TransportEvent,
};

/// [`ConnectionEngine`] backed by a `webrtc` peer connection.
pub struct ConnectionWrapper {
    pub tag: EngineTag,
    pub peer_connection: Arc<RTCPeerConnection>,
}

impl ConnectionWrapper {
    /// Build a peer connection whose callbacks feed `event_tx`.
    pub async fn new(
        tag: EngineTag,
        config: TransportConfig,
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .into_iter()
                .map(|server| RTCIceServer {
                    urls: server.urls,
                    username: server.username.unwrap_or_default(),
                    credential: server.credential.unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        let state_tx = event_tx.clone();
        let tag_state = tag.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let tag = tag_state.clone();

                Box::pin(async move {
                    info!("Peer connection state for {}: {:?}", tag, s);
                    match s {
                        RTCPeerConnectionState::Failed
                        | RTCPeerConnectionState::Disconnected
                        | RTCPeerConnectionState::Closed => {
                            let _ = tx.send(TransportEvent::Disconnected(tag)).await;
                        }
                        _ => {}
                    }
                })
            },
        ));

        // A `None` candidate marks the end of gathering.
        let ice_tx = event_tx.clone();
        let tag_ice = tag.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let tag = tag_ice.clone();

            Box::pin(async move {
                let Some(candidate) = c else {
                    debug!("Candidate gathering complete for {}", tag);
                    let _ = tx.send(TransportEvent::GatheringComplete(tag)).await;
                    return;
                };
                let Ok(json_candidate) = candidate.to_json() else {
                    return;
                };
                trace!("Local candidate for {}: {}", tag, json_candidate.candidate);
                let _ = tx
                    .send(TransportEvent::CandidateGenerated(
                        tag,
                        json_candidate.candidate,
                    ))
                    .await;
            })
        }));

        let track_tx = event_tx.clone();
        let tag_track = tag.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();
                let tag = tag_track.clone();

                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Video => MediaKind::Video,
                        _ => MediaKind::Audio,
                    };
                    debug!("Remote {:?} track {} from {}", kind, track.id(), tag);
                    let source = RemoteMediaSource {
                        stream_id: track.stream_id(),
                        track_id: track.id(),
                        kind,
                        track: Some(track),
                    };
                    let _ = tx
                        .send(TransportEvent::RemoteSourceArrived(tag, source))
                        .await;
                })
            },
        ));

        Ok(Self {
            tag,
            peer_connection,
        })
    }
}

#[async_trait]
impl ConnectionEngine for ConnectionWrapper {
    async fn attach_local_source(&self, source: &LocalMediaSource) -> Result<()> {
        for local in &source.tracks {
            let track = Arc::clone(&local.track) as Arc<dyn TrackLocal + Send + Sync>;
            let rtp_sender = self
                .peer_connection
                .add_track(track)
                .await
                .with_context(|| format!("Failed to add {:?} track", local.kind))?;

            // RTCP has to be drained for interceptors to work.
            tokio::spawn(async move {
                let mut rtcp_buf = vec![0u8; 1500];
                while rtp_sender.read(&mut rtcp_buf).await.is_ok() {}
            });
        }
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self.peer_connection.create_offer(None).await?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.peer_connection.create_answer(None).await?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        let desc = to_rtc(description)?;
        self.peer_connection.set_local_description(desc).await?;
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        let desc = to_rtc(description)?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        let desc = self.peer_connection.local_description().await?;
        let kind = match desc.sdp_type {
            RTCSdpType::Offer => SdpKind::Offer,
            RTCSdpType::Answer => SdpKind::Answer,
            _ => return None,
        };
        Some(SessionDescription {
            kind,
            sdp: desc.sdp,
        })
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

fn to_rtc(description: SessionDescription) -> Result<RTCSessionDescription> {
    let desc = match description.kind {
        SdpKind::Offer => RTCSessionDescription::offer(description.sdp)?,
        SdpKind::Answer => RTCSessionDescription::answer(description.sdp)?,
    };
    if desc.sdp.is_empty() {
        bail!("empty {} description", description.kind);
    }
    Ok(desc)
}

/// Creates one [`ConnectionWrapper`] per remote peer.
#[derive(Clone)]
pub struct WebRtcEngineFactory {
    config: TransportConfig,
}

impl WebRtcEngineFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineFactory for WebRtcEngineFactory {
    async fn create(
        &self,
        tag: EngineTag,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn ConnectionEngine>> {
        let wrapper = ConnectionWrapper::new(tag, self.config.clone(), events).await?;
        Ok(Box::new(wrapper))
    }
}
