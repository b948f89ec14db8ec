//! Voice Session Controller
//!
//! Drives one realtime voice session through
//! `Idle -> Connecting -> Connected -> Listening -> Ended` and guarantees
//! that the microphone tracks, the event channel and the peer connection are
//! released together on every exit path.
//!
//! Every session attempt is tagged with a generation number. `start` and
//! `stop` both bump it, so an async step that resumes after the session it
//! belonged to has ended notices the mismatch, releases whatever it just
//! acquired and gives up.

use super::{
    VoiceConfig, VoiceError,
    credential::CredentialSource,
    events::{ClientEvent, ServerEvent},
    platform::{
        AudioSink, ChannelState, DataChannel, MediaDevices, MediaStream, PeerConnection,
        PeerEvent, PeerFactory, RemoteStream, TransportError,
    },
    signaling::Signaling,
};
use parking_lot::Mutex;
use std::{
    fmt,
    sync::{Arc, Weak},
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

const STATUS_IDLE: &str = "Start a voice session to begin";
const STATUS_CONNECTING: &str = "Connecting to AI therapist...";
const STATUS_CONNECTED: &str = "Connected! Ready to start your therapy session";
const STATUS_LISTENING: &str = "I'm listening. Tell me what's on your mind...";
const STATUS_ENDED: &str = "Session ended";
const STATUS_NOT_CONNECTED: &str = "Not connected. Try reconnecting.";
const STATUS_SEND_FAILED: &str = "Error starting conversation";

/// Receives each chunk of streamed text, in arrival order.
pub type TranscriptCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Lifecycle of a voice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Idle,
    Connecting,
    Connected,
    Listening,
    Ended,
}

impl fmt::Display for VoiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceState::Idle => write!(f, "idle"),
            VoiceState::Connecting => write!(f, "connecting"),
            VoiceState::Connected => write!(f, "connected"),
            VoiceState::Listening => write!(f, "listening"),
            VoiceState::Ended => write!(f, "ended"),
        }
    }
}

/// The external collaborators a controller drives.
#[derive(Clone)]
pub struct VoicePlatform {
    pub credentials: Arc<dyn CredentialSource>,
    pub media: Arc<dyn MediaDevices>,
    pub peers: Arc<dyn PeerFactory>,
    pub signaling: Arc<dyn Signaling>,
    pub audio_sink: Arc<dyn AudioSink>,
}

/// Resources held by the current session.
#[derive(Default)]
struct SessionResources {
    media: Option<MediaStream>,
    channel: Option<Arc<dyn DataChannel>>,
    peer: Option<Arc<dyn PeerConnection>>,
    pump: Option<JoinHandle<()>>,
}

impl SessionResources {
    /// Stops every track, then closes the channel, then the connection.
    fn release(&mut self) {
        if let Some(media) = self.media.take() {
            media.stop_all();
        }
        if let Some(channel) = self.channel.take() {
            channel.close();
        }
        if let Some(peer) = self.peer.take() {
            peer.close();
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }

    fn is_empty(&self) -> bool {
        self.media.is_none() && self.channel.is_none() && self.peer.is_none()
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EndCause {
    Stopped,
    Failed,
    ChannelClosed,
    ConnectionFailed(String),
}

struct Inner {
    state: VoiceState,
    generation: u64,
    status: String,
    resources: SessionResources,
    /// The generation that ended last, and why.
    last_end: Option<(u64, EndCause)>,
}

struct Shared {
    platform: VoicePlatform,
    config: VoiceConfig,
    on_text: TranscriptCallback,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<VoiceState>,
}

/// Owns one realtime voice session at a time.
///
/// Dropping the controller tears down whatever session is still active.
pub struct VoiceSessionController {
    shared: Arc<Shared>,
}

impl VoiceSessionController {
    pub fn new(platform: VoicePlatform, config: VoiceConfig, on_text: TranscriptCallback) -> Self {
        let (state_tx, _) = watch::channel(VoiceState::Idle);
        Self {
            shared: Arc::new(Shared {
                platform,
                config,
                on_text,
                inner: Mutex::new(Inner {
                    state: VoiceState::Idle,
                    generation: 0,
                    status: STATUS_IDLE.to_string(),
                    resources: SessionResources::default(),
                    last_end: None,
                }),
                state_tx,
            }),
        }
    }

    pub fn state(&self) -> VoiceState {
        self.shared.inner.lock().state
    }

    /// The user-facing status line for the current state.
    pub fn status(&self) -> String {
        self.shared.inner.lock().status.clone()
    }

    /// Observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<VoiceState> {
        self.shared.state_tx.subscribe()
    }

    /// Whether any microphone track, channel or connection is currently held.
    pub fn holds_resources(&self) -> bool {
        !self.shared.inner.lock().resources.is_empty()
    }

    /// Opens a new session: credential, microphone, peer connection, event
    /// channel, offer/answer.
    ///
    /// A session that is still active is torn down first. Resolves once the
    /// answer has been applied; the controller reports `Connected` when the
    /// event channel opens. On failure every acquired resource has been
    /// released by the time the error is returned.
    pub async fn start(&self) -> Result<(), VoiceError> {
        let generation = self.shared.begin_attempt();
        info!(generation, "Starting voice session");

        match self.shared.connect(generation).await {
            Ok(()) => {
                info!(generation, "Voice session negotiated");
                Ok(())
            }
            Err(VoiceError::Cancelled) => Err(self.shared.interrupted(generation)),
            Err(err) => {
                if self.shared.fail(generation, &err) {
                    error!(generation, error = %err, "Error initializing voice session");
                    Err(err)
                } else {
                    warn!(generation, error = %err, "Discarding failure of a stale session");
                    Err(self.shared.interrupted(generation))
                }
            }
        }
    }

    /// Asks the remote service to start responding in text and audio.
    ///
    /// Fails with `NotConnected` unless the event channel is open; the
    /// lifecycle state is left untouched in that case.
    pub fn begin_listening(&self) -> Result<(), VoiceError> {
        self.shared.begin_listening()
    }

    /// Ends the current session and releases its resources. No-op when idle
    /// or already ended.
    pub fn stop(&self) {
        if self
            .shared
            .end(None, EndCause::Stopped, STATUS_ENDED.to_string())
        {
            info!("Voice session stopped");
        }
    }

    /// Handles one inbound event channel message.
    pub fn handle_remote_event(&self, payload: &str) {
        self.shared.handle_remote_event(payload);
    }

    /// Routes inbound remote media to the audio sink.
    pub fn handle_remote_track(&self, stream: Arc<dyn RemoteStream>) {
        self.shared.handle_remote_track(stream);
    }
}

impl Drop for VoiceSessionController {
    fn drop(&mut self) {
        self.shared
            .end(None, EndCause::Stopped, STATUS_ENDED.to_string());
    }
}

impl Shared {
    fn set_state(&self, inner: &mut Inner, state: VoiceState, status: impl Into<String>) {
        inner.state = state;
        inner.status = status.into();
        self.state_tx.send_replace(state);
    }

    /// Ends any active session and enters `Connecting` under a fresh generation.
    fn begin_attempt(&self) -> u64 {
        let mut inner = self.inner.lock();
        if !matches!(inner.state, VoiceState::Idle | VoiceState::Ended) {
            warn!(state = %inner.state, "Replacing active voice session");
        }
        inner.resources.release();
        inner.generation += 1;
        self.set_state(&mut inner, VoiceState::Connecting, STATUS_CONNECTING);
        inner.generation
    }

    /// Releases everything and enters `Ended`.
    ///
    /// With `expected` set, only acts if that generation is still current.
    /// Returns whether a session was actually ended.
    fn end(&self, expected: Option<u64>, cause: EndCause, status: String) -> bool {
        let mut inner = self.inner.lock();
        if expected.is_some_and(|generation| generation != inner.generation) {
            return false;
        }
        inner.resources.release();
        if matches!(inner.state, VoiceState::Idle | VoiceState::Ended) {
            return false;
        }
        inner.last_end = Some((inner.generation, cause));
        inner.generation += 1;
        self.set_state(&mut inner, VoiceState::Ended, status);
        true
    }

    fn fail(&self, generation: u64, err: &VoiceError) -> bool {
        self.end(Some(generation), EndCause::Failed, format!("Error: {err}"))
    }

    /// The error a `start` for `generation` reports after losing its session.
    ///
    /// A remote close or connection failure is reported as such; anything
    /// else means the caller stopped or replaced the session.
    fn interrupted(&self, generation: u64) -> VoiceError {
        let cause = match &self.inner.lock().last_end {
            Some((ended, cause)) if *ended == generation => cause.clone(),
            _ => EndCause::Stopped,
        };
        match cause {
            EndCause::ChannelClosed => {
                warn!(generation, "Event channel closed while connecting");
                VoiceError::SessionEnded("event channel closed".to_string())
            }
            EndCause::ConnectionFailed(reason) => {
                warn!(generation, %reason, "Connection failed while connecting");
                VoiceError::SessionEnded(reason)
            }
            EndCause::Stopped | EndCause::Failed => {
                info!(generation, "Voice session stopped while connecting");
                VoiceError::Cancelled
            }
        }
    }

    fn ensure_current(&self, generation: u64) -> Result<(), VoiceError> {
        if self.inner.lock().generation == generation {
            Ok(())
        } else {
            Err(VoiceError::Cancelled)
        }
    }

    /// Hands a freshly acquired resource to the current session, or releases
    /// it straight away when that session is gone.
    fn adopt<T>(
        &self,
        generation: u64,
        resource: T,
        store: impl FnOnce(&mut SessionResources, T),
        release: impl FnOnce(T),
    ) -> Result<(), VoiceError> {
        let mut inner = self.inner.lock();
        if inner.generation == generation {
            store(&mut inner.resources, resource);
            Ok(())
        } else {
            drop(inner);
            release(resource);
            Err(VoiceError::Cancelled)
        }
    }

    async fn connect(self: &Arc<Self>, generation: u64) -> Result<(), VoiceError> {
        let credential = self.platform.credentials.fetch().await?;
        self.ensure_current(generation)?;

        let media = self.platform.media.open_microphone().await?;
        let tracks = media.tracks().to_vec();
        self.adopt(
            generation,
            media,
            |res, media| res.media = Some(media),
            |media| media.stop_all(),
        )?;
        debug!(tracks = tracks.len(), "Microphone acquired");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let peer = self.platform.peers.create(events_tx)?;
        self.adopt(
            generation,
            peer.clone(),
            |res, peer| res.peer = Some(peer),
            |peer| peer.close(),
        )?;
        for track in tracks {
            peer.add_track(track)?;
        }

        let channel = peer.create_data_channel(&self.config.channel_label)?;
        self.adopt(
            generation,
            channel,
            |res, channel| res.channel = Some(channel),
            |channel| channel.close(),
        )?;

        let pump = tokio::spawn(pump_events(Arc::downgrade(self), generation, events_rx));
        self.adopt(
            generation,
            pump,
            |res, pump| res.pump = Some(pump),
            |pump| pump.abort(),
        )?;

        let offer = peer.create_offer().await?;
        peer.set_local_description(&offer).await?;
        self.ensure_current(generation)?;

        let answer = self.platform.signaling.exchange(&credential, &offer).await?;
        self.ensure_current(generation)?;

        peer.set_remote_description(&answer).await?;
        self.ensure_current(generation)
    }

    fn on_peer_event(&self, generation: u64, event: PeerEvent) {
        if self.inner.lock().generation != generation {
            debug!(?event, "Ignoring event from a stale session");
            return;
        }
        match event {
            PeerEvent::ChannelOpen => self.on_channel_open(generation),
            PeerEvent::ChannelClosed => {
                if self.end(
                    Some(generation),
                    EndCause::ChannelClosed,
                    STATUS_ENDED.to_string(),
                ) {
                    info!("Event channel closed, voice session ended");
                }
            }
            PeerEvent::ChannelMessage(payload) => self.handle_remote_event(&payload),
            PeerEvent::RemoteTrack(stream) => self.handle_remote_track(stream),
            PeerEvent::ConnectionFailed(reason) => {
                error!(%reason, "Peer connection failed");
                let status = format!("Error: {reason}");
                self.end(Some(generation), EndCause::ConnectionFailed(reason), status);
            }
        }
    }

    fn on_channel_open(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation == generation && inner.state == VoiceState::Connecting {
            self.set_state(&mut inner, VoiceState::Connected, STATUS_CONNECTED);
            info!("Event channel open");
        }
    }

    fn begin_listening(&self) -> Result<(), VoiceError> {
        let mut inner = self.inner.lock();
        let open_channel = inner
            .resources
            .channel
            .as_ref()
            .filter(|channel| channel.ready_state() == ChannelState::Open)
            .cloned();
        let Some(channel) = open_channel else {
            warn!(state = %inner.state, "Listen requested before the event channel is open");
            inner.status = STATUS_NOT_CONNECTED.to_string();
            return Err(VoiceError::NotConnected);
        };

        let event = ClientEvent::response_create(
            self.config.modalities.clone(),
            self.config.instructions.clone(),
        );
        let sent = serde_json::to_string(&event)
            .map_err(|e| TransportError::new(e.to_string()))
            .and_then(|payload| channel.send(&payload));
        if let Err(err) = sent {
            error!(error = %err, "Error starting listening");
            inner.status = STATUS_SEND_FAILED.to_string();
            return Err(VoiceError::ChannelSend(err));
        }

        self.set_state(&mut inner, VoiceState::Listening, STATUS_LISTENING);
        Ok(())
    }

    fn handle_remote_event(&self, payload: &str) {
        match ServerEvent::parse(payload) {
            Ok(event) => match event.text_chunk() {
                Some(text) => (self.on_text)(text),
                None => debug!(?event, "Ignoring realtime event"),
            },
            Err(e) => {
                let err = VoiceError::MalformedEvent(e.to_string());
                warn!(error = %err, "Dropping realtime event");
            }
        }
    }

    fn handle_remote_track(&self, stream: Arc<dyn RemoteStream>) {
        debug!(stream = stream.id(), "Attaching remote audio");
        self.platform.audio_sink.attach(stream);
    }
}

/// Feeds peer events to the controller one at a time, in arrival order.
async fn pump_events(
    shared: Weak<Shared>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<PeerEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.on_peer_event(generation, event);
    }
}
