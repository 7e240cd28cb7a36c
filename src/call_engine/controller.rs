//! Call Controller - Zustandsmaschine eines Anrufs
//!
//! Alle Eingaben (Benutzeraktionen, Signaling-Nachrichten, Engine-Events)
//! laufen nacheinander durch den Controller. Asynchrone Schritte werden als
//! Futures abgelegt und kommen als Completion mit Session-ID zurück. Vor dem
//! Übernehmen eines Ergebnisses wird der Zustand erneut geprüft, ein
//! Hang-up während des Wartens verwirft das Ergebnis.

use super::glare::{resolve_glare, GlareResolution};
use super::guard::ResourceGuard;
use super::media::{LocalMedia, MediaError, MediaSource};
use super::negotiation::{
    EngineEvent, EngineEventSink, NegotiationEngine, NegotiationError, NegotiationHandle,
};
use super::session::{CallSession, CallState, Operation, RemoteDescriptionState, SessionId};
use crate::config::CallConfig;
use crate::signaling::{
    SdpType, SessionDescription, SignalChannel, SignalKind, SignalingMessage,
};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("Cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: CallState,
    },

    #[error("{0} already in progress")]
    OperationInProgress(&'static str),

    #[error("Call controller is no longer running")]
    ControllerGone,
}

// ============================================================================
// CALL EVENTS
// ============================================================================

/// Grund für das Ende eines Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    LocalHangUp,
    RemoteHangUp,
    ChannelClosed,
    NegotiationFailed,
    ConnectionFailed,
    Disposed,
}

/// Events die vom CallController ausgelöst werden
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    StateChanged(CallState),
    /// Offer des Peers angewendet, wartet auf Annahme
    IncomingCall,
    RemoteTrack { track_id: String },
    Ended { reason: EndReason },
    Error(String),
}

// ============================================================================
// INPUTS
// ============================================================================

enum Input {
    Signal(SignalingMessage),
    ChannelClosed,
    Engine {
        session: SessionId,
        event: EngineEvent,
    },
    Command(Command),
}

enum Command {
    Prepare(oneshot::Sender<Result<(), CallError>>),
    StartCall(oneshot::Sender<Result<(), CallError>>),
    AcceptCall(oneshot::Sender<Result<(), CallError>>),
    HangUp(oneshot::Sender<()>),
    SetMuted(bool, oneshot::Sender<()>),
    State(oneshot::Sender<CallState>),
    Shutdown,
}

enum Completion {
    MediaAcquired {
        session: SessionId,
        result: Result<LocalMedia, MediaError>,
    },
    HandleOpened {
        session: SessionId,
        result: Result<Arc<dyn NegotiationHandle>, NegotiationError>,
    },
    Operation {
        session: SessionId,
        outcome: OperationOutcome,
    },
}

enum OperationOutcome {
    OfferMade(Result<SessionDescription, NegotiationError>),
    AnswerMade(Result<SessionDescription, NegotiationError>),
    RemoteApplied {
        sdp_type: SdpType,
        result: Result<(), NegotiationError>,
    },
    CandidatesAdded {
        applied: usize,
        failures: Vec<NegotiationError>,
    },
}

enum Next {
    Input(Input),
    Completion(Completion),
}

// ============================================================================
// CALL CONTROLLER
// ============================================================================

pub struct CallController {
    config: CallConfig,
    engine: Arc<dyn NegotiationEngine>,
    media: Arc<dyn MediaSource>,
    channel: Arc<SignalChannel>,
    session: CallSession,
    next_session_id: SessionId,
    inbox_tx: mpsc::UnboundedSender<Input>,
    inbox_rx: mpsc::UnboundedReceiver<Input>,
    pending: FuturesUnordered<BoxFuture<'static, Completion>>,
    event_tx: broadcast::Sender<CallEvent>,
}

impl CallController {
    /// Erstellt einen Controller und registriert seine Handler am Kanal
    ///
    /// Handler eines früheren Controllers am selben Kanal werden ersetzt.
    pub fn new(
        config: CallConfig,
        engine: Arc<dyn NegotiationEngine>,
        media: Arc<dyn MediaSource>,
        channel: Arc<SignalChannel>,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(100);

        for kind in SignalKind::ALL {
            let inbox = inbox_tx.clone();
            channel.on(kind, move |message| {
                let _ = inbox.send(Input::Signal(message));
            });
        }
        let inbox = inbox_tx.clone();
        channel.on_disconnect(move || {
            let _ = inbox.send(Input::ChannelClosed);
        });

        Self {
            config,
            engine,
            media,
            channel,
            session: CallSession::new(1),
            next_session_id: 2,
            inbox_tx,
            inbox_rx,
            pending: FuturesUnordered::new(),
            event_tx,
        }
    }

    /// Gibt einen Event-Receiver zurück
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.event_tx.subscribe()
    }

    /// Handle zum Steuern eines laufenden Controllers
    pub fn handle(&self) -> CallHandle {
        CallHandle {
            inbox: self.inbox_tx.clone(),
        }
    }

    pub fn state(&self) -> CallState {
        self.session.state
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    // ========================================================================
    // USER ACTIONS
    // ========================================================================

    /// Erwirbt das Mikrofon und öffnet die Peer Connection
    ///
    /// Nach einem beendeten Anruf wird dafür eine neue Session angelegt.
    pub fn prepare(&mut self) -> Result<(), CallError> {
        if self.session.state.is_terminal() {
            let id = self.next_session_id;
            self.next_session_id += 1;
            tracing::info!("Starting fresh session {}", id);
            self.session = CallSession::new(id);
            self.emit(CallEvent::StateChanged(CallState::Idle));
        }

        if self.session.state != CallState::Idle {
            return Err(self.invalid("prepare"));
        }
        if self.session.preparing {
            return Err(CallError::OperationInProgress("prepare"));
        }

        self.session.preparing = true;
        let session = self.session.id;
        let media = Arc::clone(&self.media);
        self.spawn(async move {
            Completion::MediaAcquired {
                session,
                result: media.acquire().await,
            }
        });
        Ok(())
    }

    /// Startet einen ausgehenden Anruf
    pub fn start_call(&mut self) -> Result<(), CallError> {
        if self.session.state != CallState::AwaitingLocalMedia
            || self.session.remote_description != RemoteDescriptionState::Unset
        {
            return Err(self.invalid("start a call"));
        }
        if self.session.making_offer {
            return Err(CallError::OperationInProgress("start call"));
        }

        tracing::info!("Starting call");
        self.session.making_offer = true;
        self.enqueue(Operation::MakeOffer);
        Ok(())
    }

    /// Akzeptiert den eingehenden Anruf
    pub fn accept_call(&mut self) -> Result<(), CallError> {
        if self.session.state != CallState::OfferReceived {
            return Err(self.invalid("accept a call"));
        }
        if self.session.making_answer {
            return Err(CallError::OperationInProgress("accept call"));
        }

        tracing::info!("Accepting call");
        self.session.making_answer = true;
        self.enqueue(Operation::MakeAnswer);
        Ok(())
    }

    /// Beendet den Anruf, mehrfach aufrufbar
    pub fn hang_up(&mut self) {
        if self.session.state.is_terminal() {
            tracing::debug!("Hang-up ignored, call already ended");
            return;
        }

        tracing::info!("Hanging up");
        self.send(SignalingMessage::HangUp);
        self.end(EndReason::LocalHangUp);
    }

    /// Setzt Mute-Status
    pub fn set_muted(&mut self, muted: bool) {
        if let Some(media) = self.session.local_media.as_ref() {
            media.set_enabled(!muted);
            tracing::info!("Microphone {}", if muted { "muted" } else { "unmuted" });
        }
    }

    /// Gibt Mute-Status zurück
    pub fn is_muted(&self) -> bool {
        self.session
            .local_media
            .as_ref()
            .map(|media| {
                !media.tracks().is_empty() && media.tracks().iter().all(|t| !t.is_enabled())
            })
            .unwrap_or(false)
    }

    /// Beendet einen laufenden Anruf beim Abbau des Controllers
    pub fn dispose(&mut self) {
        if self.session.state.is_terminal() {
            return;
        }
        self.send(SignalingMessage::HangUp);
        self.end(EndReason::Disposed);
    }

    // ========================================================================
    // DRIVING
    // ========================================================================

    /// Verarbeitet genau eine Eingabe oder ein abgeschlossenes Future
    ///
    /// Gibt `false` zurück, sobald ein Shutdown angefordert wurde.
    pub async fn step(&mut self) -> bool {
        let next = tokio::select! {
            biased;
            Some(input) = self.inbox_rx.recv() => Next::Input(input),
            Some(done) = self.pending.next(), if !self.pending.is_empty() => Next::Completion(done),
            else => return false,
        };

        match next {
            Next::Input(input) => self.handle_input(input),
            Next::Completion(done) => {
                self.complete(done);
                true
            }
        }
    }

    /// Verarbeitet alles, bis keine Eingabe und kein Future mehr aussteht
    pub async fn settle(&mut self) {
        loop {
            let mut progressed = false;
            while let Ok(input) = self.inbox_rx.try_recv() {
                self.handle_input(input);
                progressed = true;
            }
            if let Some(done) = self.pending.next().await {
                self.complete(done);
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
    }

    /// Läuft bis [`CallHandle::shutdown`], danach wird der Anruf abgebaut
    pub async fn run(mut self) {
        while self.step().await {}
        tracing::info!("Call controller stopped");
        self.dispose();
    }

    fn handle_input(&mut self, input: Input) -> bool {
        match input {
            Input::Signal(message) => self.on_signal(message),
            Input::ChannelClosed => {
                if !self.session.state.is_terminal() {
                    tracing::warn!("Signal channel lost, ending call");
                    self.end(EndReason::ChannelClosed);
                }
            }
            Input::Engine { session, event } => self.on_engine_event(session, event),
            Input::Command(command) => return self.on_command(command),
        }
        true
    }

    fn on_command(&mut self, command: Command) -> bool {
        match command {
            Command::Prepare(reply) => {
                let _ = reply.send(self.prepare());
            }
            Command::StartCall(reply) => {
                let _ = reply.send(self.start_call());
            }
            Command::AcceptCall(reply) => {
                let _ = reply.send(self.accept_call());
            }
            Command::HangUp(reply) => {
                self.hang_up();
                let _ = reply.send(());
            }
            Command::SetMuted(muted, reply) => {
                self.set_muted(muted);
                let _ = reply.send(());
            }
            Command::State(reply) => {
                let _ = reply.send(self.session.state);
            }
            Command::Shutdown => return false,
        }
        true
    }

    // ========================================================================
    // INBOUND SIGNALING
    // ========================================================================

    fn on_signal(&mut self, message: SignalingMessage) {
        if self.session.state.is_terminal() {
            tracing::debug!("Ignoring {} after call ended", message.kind().event());
            return;
        }

        match message {
            SignalingMessage::Offer(offer) => self.on_remote_offer(offer),
            SignalingMessage::Answer(answer) => self.on_remote_answer(answer),
            SignalingMessage::IceCandidate(candidate) => {
                tracing::debug!("ICE candidate from peer");
                self.session.push_remote_candidate(candidate);
                self.pump();
            }
            SignalingMessage::HangUp => {
                tracing::info!("The other party has hung up the call");
                self.end(EndReason::RemoteHangUp);
            }
        }
    }

    fn on_remote_offer(&mut self, offer: SessionDescription) {
        match self.session.state {
            CallState::Idle => {
                if self.session.pending_remote_description.is_some() {
                    tracing::warn!("Ignoring duplicate offer");
                } else {
                    tracing::debug!("Buffering offer until local media is ready");
                    self.session.pending_remote_description = Some(offer);
                }
            }
            CallState::AwaitingLocalMedia if !self.session.making_offer => {
                if self.session.remote_description != RemoteDescriptionState::Unset {
                    tracing::warn!("Ignoring duplicate offer");
                    return;
                }
                self.session.remote_description = RemoteDescriptionState::Applying(SdpType::Offer);
                self.enqueue(Operation::ApplyRemote {
                    description: offer,
                    rollback: false,
                });
            }
            CallState::AwaitingLocalMedia | CallState::OfferSent => self.on_glare(offer),
            state => {
                tracing::warn!("Ignoring offer while {} (renegotiation is not supported)", state)
            }
        }
    }

    /// Beide Seiten haben ein Offer erzeugt
    fn on_glare(&mut self, offer: SessionDescription) {
        if self.session.remote_description != RemoteDescriptionState::Unset {
            tracing::warn!("Ignoring duplicate offer");
            return;
        }

        let resolution = resolve_glare(
            self.config.local_peer_id.as_deref(),
            self.config.remote_peer_id.as_deref(),
        );
        match resolution {
            GlareResolution::KeepLocalOffer => {
                tracing::warn!("Offer collision, keeping local offer and ignoring remote offer");
            }
            GlareResolution::YieldToRemote => {
                tracing::info!("Offer collision, rolling back local offer");
                self.session.remote_description = RemoteDescriptionState::Applying(SdpType::Offer);
                self.enqueue(Operation::ApplyRemote {
                    description: offer,
                    rollback: true,
                });
            }
        }
    }

    fn on_remote_answer(&mut self, answer: SessionDescription) {
        if self.session.state == CallState::OfferSent
            && self.session.remote_description == RemoteDescriptionState::Unset
        {
            tracing::info!("Answer received");
            self.session.remote_description = RemoteDescriptionState::Applying(SdpType::Answer);
            self.enqueue(Operation::ApplyRemote {
                description: answer,
                rollback: false,
            });
        } else {
            tracing::warn!("Ignoring unexpected answer while {}", self.session.state);
        }
    }

    // ========================================================================
    // ENGINE EVENTS
    // ========================================================================

    fn on_engine_event(&mut self, session: SessionId, event: EngineEvent) {
        if !self.is_live(session) {
            return;
        }

        match event {
            EngineEvent::LocalCandidate(candidate) => {
                tracing::debug!("Sending ICE candidate to peer");
                self.send(SignalingMessage::IceCandidate(candidate));
            }
            EngineEvent::RemoteTrack { track_id } => {
                tracing::info!("Remote track {} arrived", track_id);
                self.emit(CallEvent::RemoteTrack { track_id });
            }
            EngineEvent::ConnectionFailed => {
                tracing::error!("ICE connection failed");
                self.emit(CallEvent::Error("ICE connection failed".to_string()));
                self.send(SignalingMessage::HangUp);
                self.end(EndReason::ConnectionFailed);
            }
        }
    }

    // ========================================================================
    // COMPLETIONS
    // ========================================================================

    fn complete(&mut self, done: Completion) {
        match done {
            Completion::MediaAcquired { session, result } => {
                self.on_media_acquired(session, result)
            }
            Completion::HandleOpened { session, result } => self.on_handle_opened(session, result),
            Completion::Operation { session, outcome } => self.on_operation(session, outcome),
        }
    }

    fn on_media_acquired(&mut self, session: SessionId, result: Result<LocalMedia, MediaError>) {
        if !self.is_live(session) || self.session.state != CallState::Idle {
            if let Ok(media) = result {
                tracing::debug!("Discarding media acquired for ended session {}", session);
                media.stop_all();
            }
            return;
        }

        match result {
            Ok(media) => {
                tracing::info!(
                    "Local media {} acquired with {} track(s)",
                    media.stream_id(),
                    media.tracks().len()
                );
                let tracks = media.tracks().to_vec();
                self.session.local_media = Some(media);

                let engine = Arc::clone(&self.engine);
                let events = self.engine_sink(session);
                self.spawn(async move {
                    Completion::HandleOpened {
                        session,
                        result: engine.open(tracks, events).await,
                    }
                });
            }
            Err(e) => {
                tracing::error!("Failed to acquire local media: {}", e);
                self.session.preparing = false;
                self.emit(CallEvent::Error(e.to_string()));
            }
        }
    }

    fn on_handle_opened(
        &mut self,
        session: SessionId,
        result: Result<Arc<dyn NegotiationHandle>, NegotiationError>,
    ) {
        if !self.is_live(session) || self.session.state != CallState::Idle {
            if let Ok(handle) = result {
                tracing::debug!("Closing handle opened for ended session {}", session);
                handle.close();
            }
            return;
        }

        self.session.preparing = false;
        match result {
            Ok(handle) => {
                self.session.negotiation = Some(handle);
                self.set_state(CallState::AwaitingLocalMedia);

                if let Some(offer) = self.session.pending_remote_description.take() {
                    self.session.remote_description =
                        RemoteDescriptionState::Applying(SdpType::Offer);
                    self.enqueue(Operation::ApplyRemote {
                        description: offer,
                        rollback: false,
                    });
                }
            }
            Err(e) => self.fail(e),
        }
    }

    fn on_operation(&mut self, session: SessionId, outcome: OperationOutcome) {
        if !self.is_live(session) {
            tracing::debug!("Discarding negotiation result for ended session {}", session);
            return;
        }
        self.session.operation_in_flight = false;

        match outcome {
            OperationOutcome::OfferMade(result) => {
                self.session.making_offer = false;
                match result {
                    Ok(offer) => self.on_offer_made(offer),
                    Err(e) => self.fail(e),
                }
            }
            OperationOutcome::AnswerMade(result) => {
                self.session.making_answer = false;
                match result {
                    Ok(answer) => self.on_answer_made(answer),
                    Err(e) => self.fail(e),
                }
            }
            OperationOutcome::RemoteApplied { sdp_type, result } => match result {
                Ok(()) => self.on_remote_applied(sdp_type),
                Err(e) => self.fail(e),
            },
            OperationOutcome::CandidatesAdded { applied, failures } => {
                tracing::debug!("Added {} ICE candidate(s)", applied);
                for e in failures {
                    tracing::warn!("Failed to add ICE candidate: {}", e);
                }
            }
        }

        self.pump();
    }

    fn on_offer_made(&mut self, offer: SessionDescription) {
        if self.session.remote_description == RemoteDescriptionState::Applying(SdpType::Offer) {
            tracing::info!("Local offer superseded by remote offer, not sending it");
            return;
        }
        if self.session.state != CallState::AwaitingLocalMedia {
            tracing::warn!("Discarding local offer created while {}", self.session.state);
            return;
        }

        self.send(SignalingMessage::Offer(offer));
        self.set_state(CallState::OfferSent);
    }

    fn on_answer_made(&mut self, answer: SessionDescription) {
        if self.session.state != CallState::OfferReceived {
            tracing::warn!("Discarding local answer created while {}", self.session.state);
            return;
        }

        self.send(SignalingMessage::Answer(answer));
        self.set_state(CallState::AnswerSent);
        self.set_state(CallState::Connected);
    }

    fn on_remote_applied(&mut self, sdp_type: SdpType) {
        self.session.remote_description = RemoteDescriptionState::Applied(sdp_type);
        self.session.flush_pending_candidates();

        match (sdp_type, self.session.state) {
            (SdpType::Offer, CallState::AwaitingLocalMedia | CallState::OfferSent) => {
                tracing::info!("Incoming call");
                self.set_state(CallState::OfferReceived);
                self.emit(CallEvent::IncomingCall);
            }
            (SdpType::Answer, CallState::OfferSent) => self.set_state(CallState::Connected),
            (sdp_type, state) => {
                tracing::warn!("Remote {:?} applied while {}", sdp_type, state)
            }
        }
    }

    // ========================================================================
    // PRIVATE METHODS
    // ========================================================================

    fn is_live(&self, session: SessionId) -> bool {
        self.session.id == session && !self.session.state.is_terminal()
    }

    fn invalid(&self, action: &'static str) -> CallError {
        CallError::InvalidState {
            action,
            state: self.session.state,
        }
    }

    fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        self.pending.push(future.boxed());
    }

    fn engine_sink(&self, session: SessionId) -> EngineEventSink {
        let inbox = self.inbox_tx.clone();
        EngineEventSink::new(move |event| {
            let _ = inbox.send(Input::Engine { session, event });
        })
    }

    fn enqueue(&mut self, operation: Operation) {
        self.session.operations.push_back(operation);
        self.pump();
    }

    /// Startet die nächste Operation, höchstens eine gleichzeitig
    fn pump(&mut self) {
        if self.session.operation_in_flight || self.session.state.is_terminal() {
            return;
        }
        let Some(handle) = self.session.negotiation.clone() else {
            return;
        };
        let Some(operation) = self.session.operations.pop_front() else {
            return;
        };

        self.session.operation_in_flight = true;
        let session = self.session.id;
        self.spawn(async move {
            Completion::Operation {
                session,
                outcome: run_operation(handle, operation).await,
            }
        });
    }

    fn send(&self, message: SignalingMessage) {
        if self.session.state.is_terminal() {
            tracing::debug!("Suppressed {} after call ended", message.kind().event());
            return;
        }
        self.channel.send(message);
    }

    fn fail(&mut self, error: NegotiationError) {
        tracing::error!("Negotiation failed: {}", error);
        self.emit(CallEvent::Error(error.to_string()));
        self.send(SignalingMessage::HangUp);
        self.end(EndReason::NegotiationFailed);
    }

    fn end(&mut self, reason: EndReason) {
        if ResourceGuard::teardown(&mut self.session) {
            tracing::info!("Call ended: {:?}", reason);
            self.emit(CallEvent::StateChanged(CallState::Ended));
            self.emit(CallEvent::Ended { reason });
        }
    }

    /// Aktualisiert den State und sendet Event
    fn set_state(&mut self, state: CallState) {
        tracing::info!("Call state: {} -> {}", self.session.state, state);
        self.session.state = state;
        self.emit(CallEvent::StateChanged(state));
    }

    fn emit(&self, event: CallEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl Drop for CallController {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for CallController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallController")
            .field("session", &self.session)
            .field("pending", &self.pending.len())
            .finish()
    }
}

// ============================================================================
// OPERATIONS
// ============================================================================

async fn run_operation(handle: Arc<dyn NegotiationHandle>, operation: Operation) -> OperationOutcome {
    match operation {
        Operation::MakeOffer => OperationOutcome::OfferMade(make_offer(handle.as_ref()).await),
        Operation::MakeAnswer => OperationOutcome::AnswerMade(make_answer(handle.as_ref()).await),
        Operation::ApplyRemote {
            description,
            rollback,
        } => OperationOutcome::RemoteApplied {
            sdp_type: description.sdp_type,
            result: apply_remote(handle.as_ref(), description, rollback).await,
        },
        Operation::AddCandidates(batch) => {
            let mut applied = 0;
            let mut failures = Vec::new();
            for candidate in batch {
                match handle.add_ice_candidate(candidate).await {
                    Ok(()) => applied += 1,
                    Err(e) => failures.push(e),
                }
            }
            OperationOutcome::CandidatesAdded { applied, failures }
        }
    }
}

async fn make_offer(handle: &dyn NegotiationHandle) -> Result<SessionDescription, NegotiationError> {
    let offer = handle.create_offer().await?;
    handle.set_local_description(offer.clone()).await?;
    Ok(offer)
}

async fn make_answer(
    handle: &dyn NegotiationHandle,
) -> Result<SessionDescription, NegotiationError> {
    let answer = handle.create_answer().await?;
    handle.set_local_description(answer.clone()).await?;
    Ok(answer)
}

async fn apply_remote(
    handle: &dyn NegotiationHandle,
    description: SessionDescription,
    rollback: bool,
) -> Result<(), NegotiationError> {
    if rollback {
        handle.rollback().await?;
    }
    handle.set_remote_description(description).await
}

// ============================================================================
// CALL HANDLE
// ============================================================================

/// Steuert einen Controller, der in [`CallController::run`] läuft
#[derive(Clone)]
pub struct CallHandle {
    inbox: mpsc::UnboundedSender<Input>,
}

impl CallHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, CallError> {
        let (tx, rx) = oneshot::channel();
        self.inbox
            .send(Input::Command(command(tx)))
            .map_err(|_| CallError::ControllerGone)?;
        rx.await.map_err(|_| CallError::ControllerGone)
    }

    pub async fn prepare(&self) -> Result<(), CallError> {
        self.request(Command::Prepare).await?
    }

    pub async fn start_call(&self) -> Result<(), CallError> {
        self.request(Command::StartCall).await?
    }

    pub async fn accept_call(&self) -> Result<(), CallError> {
        self.request(Command::AcceptCall).await?
    }

    pub async fn hang_up(&self) -> Result<(), CallError> {
        self.request(Command::HangUp).await
    }

    pub async fn set_muted(&self, muted: bool) -> Result<(), CallError> {
        self.request(|reply| Command::SetMuted(muted, reply)).await
    }

    pub async fn state(&self) -> Result<CallState, CallError> {
        self.request(Command::State).await
    }

    /// Beendet [`CallController::run`], ein laufender Anruf wird abgebaut
    pub fn shutdown(&self) {
        let _ = self.inbox.send(Input::Command(Command::Shutdown));
    }
}

impl std::fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallHandle")
            .field("closed", &self.inbox.is_closed())
            .finish()
    }
}
