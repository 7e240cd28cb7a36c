//! Skriptbare Doubles, um einen CallController ohne WebRTC und Audio-Hardware zu treiben

#![allow(dead_code)]

use async_trait::async_trait;
use audio_call::call_engine::{
    CallController, CallEvent, EngineEvent, EngineEventSink, LocalMedia, MediaError, MediaSource,
    MediaTrack, NegotiationEngine, NegotiationError, NegotiationHandle,
};
use audio_call::signaling::{
    IceCandidate, SdpType, SessionDescription, SignalChannel, SignalKind, SignalingMessage,
};
use audio_call::CallConfig;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};

// ============================================================================
// MEDIA
// ============================================================================

pub struct TestTrack {
    id: String,
    stopped: AtomicBool,
    enabled: AtomicBool,
}

impl TestTrack {
    fn new(id: String) -> Self {
        Self {
            id,
            stopped: AtomicBool::new(false),
            enabled: AtomicBool::new(true),
        }
    }
}

impl MediaTrack for TestTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct ScriptedMedia {
    fail: AtomicBool,
    gate: Mutex<Option<Arc<Semaphore>>>,
    tracks: Mutex<Vec<Arc<TestTrack>>>,
}

impl ScriptedMedia {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Blockiert `acquire`, bis der Semaphore ein Permit erhält
    pub fn gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub fn tracks(&self) -> Vec<Arc<TestTrack>> {
        self.tracks.lock().clone()
    }
}

#[async_trait]
impl MediaSource for ScriptedMedia {
    async fn acquire(&self) -> Result<LocalMedia, MediaError> {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| MediaError::StreamPlayError(e.to_string()))?
                .forget();
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(MediaError::NoInputDevice);
        }

        let index = self.tracks.lock().len();
        let track = Arc::new(TestTrack::new(format!("mic-{}", index)));
        self.tracks.lock().push(Arc::clone(&track));

        Ok(LocalMedia::new(
            format!("stream-{}", index),
            vec![track as Arc<dyn MediaTrack>],
        ))
    }
}

// ============================================================================
// NEGOTIATION
// ============================================================================

/// Handle mit dem Signaling-Verhalten einer Peer Connection
///
/// Lehnt wie webrtc-rs Candidates vor der Remote Description und ein
/// Remote Offer in `have-local-offer` ab. `rollback` verwirft neben dem
/// lokalen Offer auch die Remote Description, wie eine frische Verbindung.
pub struct ScriptedHandle {
    name: String,
    calls: Mutex<Vec<String>>,
    closes: AtomicUsize,
    local_offer: AtomicBool,
    remote_offer: AtomicBool,
    remote_set: AtomicBool,
    fail: Vec<&'static str>,
    offer_gate: Option<Arc<Semaphore>>,
    track_count: usize,
    events: EngineEventSink,
}

impl ScriptedHandle {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Candidates in der Reihenfolge, in der sie angewendet wurden
    pub fn candidates(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| c.strip_prefix("add_candidate:").map(str::to_string))
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn track_count(&self) -> usize {
        self.track_count
    }

    pub fn emit(&self, event: EngineEvent) {
        self.events.emit(event);
    }

    fn record(&self, call: String, op: &'static str) -> Result<(), NegotiationError> {
        self.calls.lock().push(call);
        if self.fail.contains(&op) {
            return Err(NegotiationError::Rejected(format!("{} failed", op)));
        }
        Ok(())
    }

    fn reject(&self, reason: &str) -> Result<(), NegotiationError> {
        Err(NegotiationError::Rejected(format!("{} ({})", reason, self.name)))
    }
}

#[async_trait]
impl NegotiationHandle for ScriptedHandle {
    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError> {
        if let Some(gate) = &self.offer_gate {
            gate.acquire()
                .await
                .map_err(|_| NegotiationError::Closed)?
                .forget();
        }
        self.record("create_offer".to_string(), "create_offer")?;
        Ok(SessionDescription::offer(format!("offer-from-{}", self.name)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        self.record("create_answer".to_string(), "create_answer")?;
        if !self.remote_offer.load(Ordering::SeqCst) {
            self.reject("no remote offer to answer")?;
        }
        Ok(SessionDescription::answer(format!("answer-from-{}", self.name)))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), NegotiationError> {
        self.record(format!("set_local:{:?}", desc.sdp_type).to_lowercase(), "set_local")?;
        match desc.sdp_type {
            SdpType::Offer => self.local_offer.store(true, Ordering::SeqCst),
            SdpType::Answer => self.local_offer.store(false, Ordering::SeqCst),
        }
        Ok(())
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.record(format!("set_remote:{:?}", desc.sdp_type).to_lowercase(), "set_remote")?;
        let local_offer = self.local_offer.load(Ordering::SeqCst);
        match desc.sdp_type {
            SdpType::Offer if local_offer => {
                return self.reject("remote offer in have-local-offer");
            }
            SdpType::Offer => self.remote_offer.store(true, Ordering::SeqCst),
            SdpType::Answer if !local_offer => {
                return self.reject("answer without local offer");
            }
            SdpType::Answer => self.local_offer.store(false, Ordering::SeqCst),
        }
        self.remote_set.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        self.record(format!("add_candidate:{}", candidate.candidate), "add_candidate")?;
        if !self.remote_set.load(Ordering::SeqCst) {
            return Err(NegotiationError::InvalidCandidate(
                "remote description is not set".to_string(),
            ));
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), NegotiationError> {
        self.record("rollback".to_string(), "rollback")?;
        if !self.local_offer.swap(false, Ordering::SeqCst) {
            return self.reject("no local offer to roll back");
        }
        self.remote_offer.store(false, Ordering::SeqCst);
        self.remote_set.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.close_count() > 0
    }
}

#[derive(Default)]
pub struct ScriptedEngine {
    name: String,
    fail: Mutex<Vec<&'static str>>,
    offer_gate: Mutex<Option<Arc<Semaphore>>>,
    handles: Mutex<Vec<Arc<ScriptedHandle>>>,
}

impl ScriptedEngine {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// Lässt die Operation auf danach geöffneten Handles fehlschlagen
    pub fn fail_on(&self, op: &'static str) {
        self.fail.lock().push(op);
    }

    /// Blockiert `create_offer` auf danach geöffneten Handles
    pub fn gate_offers(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.offer_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub fn handles(&self) -> Vec<Arc<ScriptedHandle>> {
        self.handles.lock().clone()
    }

    pub fn handle(&self) -> Arc<ScriptedHandle> {
        self.handles
            .lock()
            .last()
            .cloned()
            .expect("no handle opened")
    }
}

#[async_trait]
impl NegotiationEngine for ScriptedEngine {
    async fn open(
        &self,
        tracks: Vec<Arc<dyn MediaTrack>>,
        events: EngineEventSink,
    ) -> Result<Arc<dyn NegotiationHandle>, NegotiationError> {
        let fail = self.fail.lock().clone();
        if fail.contains(&"open") {
            return Err(NegotiationError::WebRTC("open failed".to_string()));
        }

        let handle = Arc::new(ScriptedHandle {
            name: self.name.clone(),
            calls: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
            local_offer: AtomicBool::new(false),
            remote_offer: AtomicBool::new(false),
            remote_set: AtomicBool::new(false),
            fail,
            offer_gate: self.offer_gate.lock().clone(),
            track_count: tracks.len(),
            events,
        });
        self.handles.lock().push(Arc::clone(&handle));
        Ok(handle)
    }
}

// ============================================================================
// SIGNALING
// ============================================================================

/// Zeichnet jede Nachricht eines Kanals auf
#[derive(Default)]
pub struct Recorder {
    messages: Mutex<Vec<SignalingMessage>>,
}

impl Recorder {
    pub fn attach(channel: &SignalChannel) -> Arc<Self> {
        let recorder = Arc::new(Self::default());
        for kind in SignalKind::ALL {
            let sink = Arc::clone(&recorder);
            channel.on(kind, move |message| sink.messages.lock().push(message));
        }
        recorder
    }

    pub fn messages(&self) -> Vec<SignalingMessage> {
        self.messages.lock().clone()
    }

    pub fn count(&self, kind: SignalKind) -> usize {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.kind() == kind)
            .count()
    }
}

// ============================================================================
// HELPERS
// ============================================================================

pub fn config(local: Option<&str>, remote: Option<&str>) -> CallConfig {
    CallConfig {
        local_peer_id: local.map(str::to_string),
        remote_peer_id: remote.map(str::to_string),
        ..CallConfig::default()
    }
}

pub fn controller(
    config: CallConfig,
    engine: &Arc<ScriptedEngine>,
    media: &Arc<ScriptedMedia>,
    channel: Arc<SignalChannel>,
) -> CallController {
    CallController::new(
        config,
        Arc::clone(engine) as Arc<dyn NegotiationEngine>,
        Arc::clone(media) as Arc<dyn MediaSource>,
        channel,
    )
}

/// Settle, während eine Future an einem Semaphore wartet
pub async fn settle_blocked(controller: &mut CallController) {
    let _ = tokio::time::timeout(Duration::from_millis(50), controller.settle()).await;
}

pub fn drain(events: &mut broadcast::Receiver<CallEvent>) -> Vec<CallEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

pub fn offer(sdp: &str) -> SignalingMessage {
    SignalingMessage::Offer(SessionDescription::offer(sdp))
}

pub fn answer(sdp: &str) -> SignalingMessage {
    SignalingMessage::Answer(SessionDescription::answer(sdp))
}

pub fn candidate(c: &str) -> SignalingMessage {
    SignalingMessage::IceCandidate(IceCandidate::new(c))
}
