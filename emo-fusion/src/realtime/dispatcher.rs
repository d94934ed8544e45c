//! Session Dispatcher
//!
//! Per-connection message loop: `Connecting → Open → Closed`.
//!
//! A reader task decodes inbound frames into a bounded queue; the dispatch
//! loop takes one message at a time, makes at most one analyzer call for it
//! and queues the reply on the session. Messages on one connection are
//! handled strictly in receipt order, so a slow analyzer call delays the
//! messages behind it.
//!
//! The reader never waits on the queue. A message arriving while the queue
//! is full is shed: analysis requests are answered with an `error` for
//! their modality and pings with an immediate `pong`. The reader keeps
//! reading, so a peer close is seen even while a backlog is pending.
//!
//! When the peer closes or the socket fails, the session's cancellation
//! token fires: the in-flight analyzer call is dropped (aborting its HTTP
//! request), the session is unregistered and the loop ends.

use super::payload::decode_base64_payload;
use super::registry::{Session, SessionRegistry, SessionState};
use crate::analyzer::{AnalysisRequest, Analyzer, MediaPayload};
use axum::extract::ws::Message;
use chrono::Utc;
use emo_common::realtime::{InboundMessage, OutboundMessage};
use emo_common::Modality;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const WELCOME_MESSAGE: &str = "Connected to real-time emotion analysis service";
const INBOUND_QUEUE_CAPACITY: usize = 32;
const QUEUE_FULL_MESSAGE: &str = "Real-time queue full, message dropped";

/// Real-time analyzer timeouts and text threshold
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeSettings {
    pub frame_timeout: Duration,
    pub audio_timeout: Duration,
    pub text_timeout: Duration,
    /// Text is analyzed only when its trimmed length exceeds this
    pub min_text_chars: usize,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            frame_timeout: Duration::from_secs(10),
            audio_timeout: Duration::from_secs(15),
            text_timeout: Duration::from_secs(10),
            min_text_chars: 5,
        }
    }
}

/// Routes real-time messages to single-modality analyzer calls
pub struct SessionDispatcher {
    analyzer: Arc<dyn Analyzer>,
    settings: RealtimeSettings,
}

impl SessionDispatcher {
    pub fn new(analyzer: Arc<dyn Analyzer>, settings: RealtimeSettings) -> Self {
        Self { analyzer, settings }
    }

    /// Handle one inbound message
    ///
    /// Returns the reply to push back, if any. Every failed analysis,
    /// including an undecodable payload, yields an `error` reply for its
    /// modality. Text at or below the minimum length is skipped silently.
    pub async fn dispatch(&self, message: InboundMessage) -> Option<OutboundMessage> {
        match message {
            InboundMessage::Ping => Some(OutboundMessage::pong()),
            InboundMessage::AnalyzeFrame { image } => Some(
                self.analyze_media(Modality::Facial, &image, self.settings.frame_timeout)
                    .await,
            ),
            InboundMessage::AnalyzeAudio { audio } => Some(
                self.analyze_media(Modality::Voice, &audio, self.settings.audio_timeout)
                    .await,
            ),
            InboundMessage::AnalyzeText { text, language } => {
                if text.trim().chars().count() <= self.settings.min_text_chars {
                    debug!(
                        length = text.trim().chars().count(),
                        "Text below minimum length, not analyzed"
                    );
                    return None;
                }
                let language = if language.trim().is_empty() {
                    "auto".to_string()
                } else {
                    language
                };
                Some(
                    self.analyze(
                        AnalysisRequest::Text { text, language },
                        self.settings.text_timeout,
                    )
                    .await,
                )
            }
        }
    }

    async fn analyze_media(&self, modality: Modality, data: &str, timeout: Duration) -> OutboundMessage {
        let bytes = match decode_base64_payload(data) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(modality = %modality, error = %e, "Undecodable real-time payload");
                return OutboundMessage::error(modality, e.to_string());
            }
        };

        let request = match modality {
            Modality::Voice => AnalysisRequest::Audio(MediaPayload::audio_chunk(bytes)),
            _ => AnalysisRequest::Image(MediaPayload::frame(bytes)),
        };
        self.analyze(request, timeout).await
    }

    async fn analyze(&self, request: AnalysisRequest, timeout: Duration) -> OutboundMessage {
        let modality = request.modality();
        match self.analyzer.analyze(request, timeout).await {
            Ok(result) => {
                debug!(
                    modality = %modality,
                    emotion = %result.dominant_emotion,
                    confidence = result.confidence,
                    "Real-time analysis result"
                );
                OutboundMessage::analysis_result(modality, result)
            }
            Err(e) => {
                warn!(modality = %modality, error = %e, "Real-time analysis failed");
                OutboundMessage::error(modality, e.to_string())
            }
        }
    }

    /// Run one session until the connection goes away
    ///
    /// Registers the session, sends the welcome message, then processes
    /// inbound frames one at a time. On exit the session is unregistered
    /// before it is marked `Closed`.
    pub async fn run<S, E>(&self, registry: &SessionRegistry, session: Session, inbound: S)
    where
        S: Stream<Item = Result<Message, E>> + Send + Unpin + 'static,
        E: fmt::Display + Send + 'static,
    {
        let id = session.id();
        let cancel = session.cancellation().clone();

        if !registry.register(session.clone()).await {
            return;
        }
        session.set_state(SessionState::Open);
        info!(session_id = %id, "Real-time session open");

        if session.send(OutboundMessage::connected(WELCOME_MESSAGE)).is_err() {
            cancel.cancel();
        }

        let (queue_tx, mut queue_rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);
        let reader = tokio::spawn(read_inbound(inbound, queue_tx, session.clone()));

        loop {
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                message = queue_rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(session_id = %id, "Connection closed, dropping in-flight analysis");
                    break;
                }
                reply = self.dispatch(message) => reply,
            };

            if let Some(reply) = reply {
                if let Err(e) = session.send(reply) {
                    debug!(error = %e, "Reply not delivered");
                    break;
                }
            }
        }

        cancel.cancel();
        drop(queue_rx);
        if let Err(e) = reader.await {
            warn!(session_id = %id, error = %e, "Inbound reader task failed");
        }

        registry.unregister(id).await;
        session.set_state(SessionState::Closed);
        let open_secs = (Utc::now() - session.opened_at()).num_seconds().max(0);
        info!(session_id = %id, open_secs, "Real-time session closed");
    }
}

/// Decode inbound frames into the dispatch queue
///
/// Malformed JSON, unknown message types and binary frames are ignored.
/// Messages that do not fit in the queue are shed. Cancels the session when
/// the peer closes or the socket fails.
async fn read_inbound<S, E>(mut inbound: S, queue: mpsc::Sender<InboundMessage>, session: Session)
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let session_id = session.id();
    let cancel = session.cancellation().clone();

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = inbound.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<InboundMessage>(&text) {
                Ok(message) => match queue.try_send(message) {
                    Ok(()) => {}
                    Err(TrySendError::Full(message)) => shed(&session, message),
                    Err(TrySendError::Closed(_)) => break,
                },
                Err(e) => debug!(session_id = %session_id, error = %e, "Ignoring malformed message"),
            },
            Some(Ok(Message::Binary(_))) => {
                debug!(session_id = %session_id, "Ignoring binary frame");
            }
            Some(Ok(Message::Close(_))) | None => {
                debug!(session_id = %session_id, "Peer closed connection");
                break;
            }
            // Ping/pong frames are answered by the websocket layer
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(session_id = %session_id, error = %e, "Receive failed");
                break;
            }
        }
    }

    cancel.cancel();
}

/// Answer a message the dispatch queue had no room for
fn shed(session: &Session, message: InboundMessage) {
    let reply = match message.modality() {
        Some(modality) => {
            warn!(
                session_id = %session.id(),
                modality = %modality,
                "Inbound queue full, dropping analysis request"
            );
            OutboundMessage::error(modality, QUEUE_FULL_MESSAGE)
        }
        None => OutboundMessage::pong(),
    };
    if let Err(e) = session.send(reply) {
        debug!(error = %e, "Shed reply not delivered");
    }
}

/// Drain a session's outbound queue into the connection
///
/// Runs until every session handle is dropped. A send failure cancels the
/// session; remaining messages are discarded.
pub async fn write_outbound<S>(
    mut sink: S,
    mut outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    cancel: CancellationToken,
) where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    while let Some(message) = outbound.recv().await {
        if cancel.is_cancelled() {
            continue;
        }
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, kind = message.kind(), "Failed to encode outbound message");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text)).await {
            debug!(error = %e, "Send failed, closing session");
            cancel.cancel();
        }
    }

    let _ = sink.close().await;
}
