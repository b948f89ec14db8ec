//! Platform seams for a voice session.
//!
//! Microphone capture, the peer connection and its event channel, and audio
//! playback are provided by the host platform. The controller only talks to
//! them through these traits, which keeps the lifecycle logic independent of
//! any particular WebRTC stack.

use async_trait::async_trait;
use std::{fmt, sync::Arc};
use tokio::sync::mpsc;

/// A failure reported by the peer connection or the event channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Why the microphone could not be opened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("Microphone permission denied")]
    PermissionDenied,
    #[error("No microphone available")]
    NotFound,
    #[error("Microphone error: {0}")]
    Device(String),
}

/// Whether a session description is our offer or the remote answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// A negotiation payload exchanged to establish the peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// One captured local track.
pub trait MediaTrack: Send + Sync {
    fn id(&self) -> &str;
    /// Stops capture. Stopping twice is harmless.
    fn stop(&self);
    fn is_live(&self) -> bool;
}

/// The set of local tracks returned by a microphone request.
#[derive(Clone, Default)]
pub struct MediaStream {
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl MediaStream {
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.tracks.iter().map(|t| t.id()))
            .finish()
    }
}

/// Access to the user's audio input devices.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Asks for microphone access. May prompt the user.
    async fn open_microphone(&self) -> Result<MediaStream, MediaError>;
}

/// Readiness of the event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// The side-channel carried alongside the peer connection.
pub trait DataChannel: Send + Sync {
    fn label(&self) -> &str;
    fn ready_state(&self) -> ChannelState;
    fn send(&self, text: &str) -> Result<(), TransportError>;
    fn close(&self);
}

/// Media the remote peer sends us.
pub trait RemoteStream: Send + Sync {
    fn id(&self) -> &str;
}

/// Local playback of inbound audio.
pub trait AudioSink: Send + Sync {
    /// Starts playing `stream`, replacing whatever was attached before.
    fn attach(&self, stream: Arc<dyn RemoteStream>);
}

/// Everything the peer connection reports after it has been created.
pub enum PeerEvent {
    /// The event channel finished opening.
    ChannelOpen,
    /// The event channel was closed by either side.
    ChannelClosed,
    /// One inbound text message on the event channel.
    ChannelMessage(String),
    /// The remote peer started sending media.
    RemoteTrack(Arc<dyn RemoteStream>),
    /// The connection failed and cannot recover.
    ConnectionFailed(String),
}

impl fmt::Debug for PeerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerEvent::ChannelOpen => write!(f, "ChannelOpen"),
            PeerEvent::ChannelClosed => write!(f, "ChannelClosed"),
            PeerEvent::ChannelMessage(text) => f.debug_tuple("ChannelMessage").field(text).finish(),
            PeerEvent::RemoteTrack(stream) => {
                f.debug_tuple("RemoteTrack").field(&stream.id()).finish()
            }
            PeerEvent::ConnectionFailed(reason) => {
                f.debug_tuple("ConnectionFailed").field(reason).finish()
            }
        }
    }
}

/// A transport session between us and the remote voice service.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    fn add_track(&self, track: Arc<dyn MediaTrack>) -> Result<(), TransportError>;
    fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>, TransportError>;
    async fn create_offer(&self) -> Result<SessionDescription, TransportError>;
    async fn set_local_description(&self, desc: &SessionDescription) -> Result<(), TransportError>;
    async fn set_remote_description(&self, desc: &SessionDescription)
    -> Result<(), TransportError>;
    /// Closes the connection. Closing twice is harmless.
    fn close(&self);
}

/// Creates peer connections.
pub trait PeerFactory: Send + Sync {
    /// Creates a connection that reports everything it observes on `events`,
    /// in the order it happens.
    fn create(
        &self,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Arc<dyn PeerConnection>, TransportError>;
}
