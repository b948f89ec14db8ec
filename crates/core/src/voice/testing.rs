//! In-memory platform doubles for exercising the controller.

use super::{
    VoiceConfig, VoicePlatform, VoiceSessionController,
    credential::{CredentialError, CredentialSource, SessionCredential},
    platform::{
        AudioSink, ChannelState, DataChannel, MediaDevices, MediaError, MediaStream, MediaTrack,
        PeerConnection, PeerEvent, PeerFactory, RemoteStream, SessionDescription, TransportError,
    },
    signaling::{NegotiationError, Signaling},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::{Notify, mpsc};

/// Lets a test pause a fake in the middle of an async call.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

impl Gate {
    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

/// Collects values and lets a test wait until enough have arrived.
pub struct Recorder<T> {
    items: Mutex<Vec<T>>,
    changed: Notify,
}

impl<T: Clone> Recorder<T> {
    fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            changed: Notify::new(),
        }
    }

    pub fn push(&self, item: T) {
        self.items.lock().push(item);
        self.changed.notify_one();
    }

    pub fn all(&self) -> Vec<T> {
        self.items.lock().clone()
    }

    pub async fn wait_for(&self, count: usize) -> Vec<T> {
        let wait = async {
            loop {
                let items = self.all();
                if items.len() >= count {
                    return items;
                }
                self.changed.notified().await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("timed out waiting for recorded items")
    }
}

type CredentialFailure = Box<dyn Fn() -> CredentialError + Send + Sync>;

pub struct FakeCredentials {
    token: String,
    failure: Mutex<Option<CredentialFailure>>,
    gate: Mutex<Option<Arc<Gate>>>,
}

impl FakeCredentials {
    pub fn fail_with(&self, failure: impl Fn() -> CredentialError + Send + Sync + 'static) {
        *self.failure.lock() = Some(Box::new(failure));
    }

    pub fn hold(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.gate.lock() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl CredentialSource for FakeCredentials {
    async fn fetch(&self) -> Result<SessionCredential, CredentialError> {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        match &*self.failure.lock() {
            Some(failure) => Err(failure()),
            None => Ok(SessionCredential::new(self.token.clone())),
        }
    }
}

pub struct FakeTrack {
    id: String,
    live: AtomicBool,
}

impl MediaTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeMedia {
    denial: Mutex<Option<MediaError>>,
    opened: Mutex<Vec<Arc<FakeTrack>>>,
    calls: AtomicUsize,
    gate: Mutex<Option<Arc<Gate>>>,
}

impl FakeMedia {
    pub fn deny(&self, err: MediaError) {
        *self.denial.lock() = Some(err);
    }

    /// Pauses the next microphone request after its track has been captured.
    pub fn hold(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn open_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn live_tracks(&self) -> usize {
        self.opened.lock().iter().filter(|t| t.is_live()).count()
    }
}

#[async_trait]
impl MediaDevices for FakeMedia {
    async fn open_microphone(&self) -> Result<MediaStream, MediaError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(err) = self.denial.lock().clone() {
            return Err(err);
        }
        let track = Arc::new(FakeTrack {
            id: format!("mic-{call}"),
            live: AtomicBool::new(true),
        });
        self.opened.lock().push(track.clone());
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        Ok(MediaStream::new(vec![track as Arc<dyn MediaTrack>]))
    }
}

pub struct FakeChannel {
    label: String,
    state: Mutex<ChannelState>,
    sent: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl FakeChannel {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn fail_sends(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

impl DataChannel for FakeChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn ready_state(&self) -> ChannelState {
        *self.state.lock()
    }

    fn send(&self, text: &str) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::new("channel buffer full"));
        }
        if self.ready_state() != ChannelState::Open {
            return Err(TransportError::new("channel not open"));
        }
        self.sent.lock().push(text.to_string());
        Ok(())
    }

    fn close(&self) {
        *self.state.lock() = ChannelState::Closed;
    }
}

pub struct FakePeer {
    id: usize,
    auto_open: bool,
    events: mpsc::UnboundedSender<PeerEvent>,
    tracks: Mutex<Vec<String>>,
    channel: Mutex<Option<Arc<FakeChannel>>>,
    local: Mutex<Option<SessionDescription>>,
    remote: Mutex<Option<SessionDescription>>,
    closed: AtomicBool,
}

impl FakePeer {
    /// Injects an event as if the platform had observed it.
    pub fn emit(&self, event: PeerEvent) {
        let _ = self.events.send(event);
    }

    pub fn track_ids(&self) -> Vec<String> {
        self.tracks.lock().clone()
    }

    pub fn channel(&self) -> Arc<FakeChannel> {
        self.channel.lock().clone().expect("no data channel created")
    }

    pub fn local_description(&self) -> Option<SessionDescription> {
        self.local.lock().clone()
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.remote.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerConnection for FakePeer {
    fn add_track(&self, track: Arc<dyn MediaTrack>) -> Result<(), TransportError> {
        self.tracks.lock().push(track.id().to_string());
        Ok(())
    }

    fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>, TransportError> {
        let state = if self.auto_open {
            ChannelState::Open
        } else {
            ChannelState::Connecting
        };
        let channel = Arc::new(FakeChannel {
            label: label.to_string(),
            state: Mutex::new(state),
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        });
        *self.channel.lock() = Some(channel.clone());
        if self.auto_open {
            self.emit(PeerEvent::ChannelOpen);
        }
        Ok(channel)
    }

    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        Ok(SessionDescription::offer(format!(
            "v=0\r\no=- {} 2 IN IP4 127.0.0.1\r\n",
            self.id
        )))
    }

    async fn set_local_description(&self, desc: &SessionDescription) -> Result<(), TransportError> {
        *self.local.lock() = Some(desc.clone());
        Ok(())
    }

    async fn set_remote_description(
        &self,
        desc: &SessionDescription,
    ) -> Result<(), TransportError> {
        *self.remote.lock() = Some(desc.clone());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub struct FakePeers {
    auto_open: AtomicBool,
    created: Mutex<Vec<Arc<FakePeer>>>,
}

impl FakePeers {
    pub fn set_auto_open(&self, auto_open: bool) {
        self.auto_open.store(auto_open, Ordering::SeqCst);
    }

    pub fn all(&self) -> Vec<Arc<FakePeer>> {
        self.created.lock().clone()
    }

    pub fn last(&self) -> Option<Arc<FakePeer>> {
        self.created.lock().last().cloned()
    }

    pub fn created(&self) -> usize {
        self.created.lock().len()
    }
}

impl PeerFactory for FakePeers {
    fn create(
        &self,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Arc<dyn PeerConnection>, TransportError> {
        let mut created = self.created.lock();
        let peer = Arc::new(FakePeer {
            id: created.len() + 1,
            auto_open: self.auto_open.load(Ordering::SeqCst),
            events,
            tracks: Mutex::new(Vec::new()),
            channel: Mutex::new(None),
            local: Mutex::new(None),
            remote: Mutex::new(None),
            closed: AtomicBool::new(false),
        });
        created.push(peer.clone());
        Ok(peer)
    }
}

pub struct FakeSignaling {
    answer: String,
    rejecting: AtomicBool,
    tokens: Mutex<Vec<String>>,
    offers: Mutex<Vec<SessionDescription>>,
    gate: Mutex<Option<Arc<Gate>>>,
}

impl FakeSignaling {
    pub fn reject(&self) {
        self.rejecting.store(true, Ordering::SeqCst);
    }

    pub fn accept(&self) {
        self.rejecting.store(false, Ordering::SeqCst);
    }

    pub fn hold(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().clone()
    }

    pub fn offers(&self) -> Vec<SessionDescription> {
        self.offers.lock().clone()
    }

    pub fn answer_sdp(&self) -> String {
        self.answer.clone()
    }
}

#[async_trait]
impl Signaling for FakeSignaling {
    async fn exchange(
        &self,
        credential: &SessionCredential,
        offer: &SessionDescription,
    ) -> Result<SessionDescription, NegotiationError> {
        self.tokens.lock().push(credential.token().to_string());
        self.offers.lock().push(offer.clone());
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(NegotiationError::Status {
                status: 400,
                body: "invalid offer".to_string(),
            });
        }
        Ok(SessionDescription::answer(self.answer.clone()))
    }
}

pub struct FakeRemoteStream {
    id: String,
}

impl FakeRemoteStream {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

impl RemoteStream for FakeRemoteStream {
    fn id(&self) -> &str {
        &self.id
    }
}

pub struct FakeSink {
    pub attached: Recorder<String>,
}

impl AudioSink for FakeSink {
    fn attach(&self, stream: Arc<dyn RemoteStream>) {
        self.attached.push(stream.id().to_string());
    }
}

/// A full set of doubles plus the transcript they feed.
pub struct Harness {
    pub credentials: Arc<FakeCredentials>,
    pub media: Arc<FakeMedia>,
    pub peers: Arc<FakePeers>,
    pub signaling: Arc<FakeSignaling>,
    pub sink: Arc<FakeSink>,
    pub transcript: Arc<Recorder<String>>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            credentials: Arc::new(FakeCredentials {
                token: "abc123".to_string(),
                failure: Mutex::new(None),
                gate: Mutex::new(None),
            }),
            media: Arc::new(FakeMedia::default()),
            peers: Arc::new(FakePeers {
                auto_open: AtomicBool::new(true),
                created: Mutex::new(Vec::new()),
            }),
            signaling: Arc::new(FakeSignaling {
                answer: "v=0\r\no=- answer 2 IN IP4 203.0.113.1\r\n".to_string(),
                rejecting: AtomicBool::new(false),
                tokens: Mutex::new(Vec::new()),
                offers: Mutex::new(Vec::new()),
                gate: Mutex::new(None),
            }),
            sink: Arc::new(FakeSink {
                attached: Recorder::new(),
            }),
            transcript: Arc::new(Recorder::new()),
        }
    }

    pub fn controller(&self) -> VoiceSessionController {
        self.controller_with(VoiceConfig::default())
    }

    pub fn controller_with(&self, config: VoiceConfig) -> VoiceSessionController {
        let transcript = self.transcript.clone();
        VoiceSessionController::new(
            VoicePlatform {
                credentials: self.credentials.clone(),
                media: self.media.clone(),
                peers: self.peers.clone(),
                signaling: self.signaling.clone(),
                audio_sink: self.sink.clone(),
            },
            config,
            Arc::new(move |text: &str| transcript.push(text.to_string())),
        )
    }

    /// Asserts that no microphone track, channel or connection is still live.
    pub fn assert_all_released(&self) {
        assert_eq!(self.media.live_tracks(), 0, "a microphone track is still live");
        for peer in self.peers.all() {
            assert!(peer.is_closed(), "peer connection {} left open", peer.id);
            if let Some(channel) = peer.channel.lock().clone() {
                assert_eq!(channel.ready_state(), ChannelState::Closed);
            }
        }
    }
}
