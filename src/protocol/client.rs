// ABOUTME: WebSocket client for the coordinator control channel
// ABOUTME: Join handshake, then reader/writer tasks splitting messages, audio and a sender

use crate::audio::encode::{EncodedFrame, FrameSink};
use crate::controller::ControlTransport;
use crate::engine::Telemetry;
use crate::error::Error;
use crate::protocol::messages::{AudioChunk, ClientJoin, ClientTelemetry, Message, ServerWelcome};
use crate::sync::probe::ProbeRequest;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

/// Connected peer, before its streams are handed out.
pub struct ProtocolClient {
    welcome: ServerWelcome,
    message_rx: mpsc::UnboundedReceiver<Message>,
    audio_rx: mpsc::UnboundedReceiver<AudioChunk>,
    sender: WsSender,
}

impl ProtocolClient {
    /// Connect to `url`, send `join` and wait for the welcome.
    pub async fn connect(url: &str, join: ClientJoin) -> Result<Self, Error> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| Error::Connection(format!("failed to connect to {}: {}", url, e)))?;
        let (mut write, mut read) = ws.split();

        let join_text = serde_json::to_string(&Message::ClientJoin(join))?;
        write
            .send(WsMessage::Text(join_text))
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let welcome = loop {
            match read.next().await {
                Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<Message>(&text)? {
                    Message::ServerWelcome(welcome) => break welcome,
                    other => log::debug!("Ignoring {:?} before welcome", other),
                },
                Some(Ok(WsMessage::Close(_))) | None => {
                    return Err(Error::Connection("closed before welcome".to_string()))
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(Error::Connection(e.to_string())),
            }
        };
        log::info!("Joined session {}", welcome.session_id);

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<WsMessage>();
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if let Err(e) = write.send(msg).await {
                    log::warn!("WebSocket write failed: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
        });

        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => match serde_json::from_str::<Message>(&text) {
                        Ok(message) => {
                            if message_tx.send(message).is_err() {
                                break;
                            }
                        }
                        Err(e) => log::warn!("Dropping malformed message: {}", e),
                    },
                    Ok(WsMessage::Binary(bytes)) => match AudioChunk::decode(&bytes) {
                        Ok(chunk) => {
                            // Audio consumer may be absent on control-only peers
                            let _ = audio_tx.send(chunk);
                        }
                        Err(e) => log::warn!("Dropping binary message: {}", e),
                    },
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        log::warn!("WebSocket read failed: {}", e);
                        break;
                    }
                }
            }
            log::info!("Control channel closed");
        });

        Ok(Self {
            welcome,
            message_rx,
            audio_rx,
            sender: WsSender { tx: out_tx },
        })
    }

    /// Welcome received during the handshake
    pub fn welcome(&self) -> &ServerWelcome {
        &self.welcome
    }

    /// Hand out the incoming message stream, incoming audio and the sender
    pub fn split(
        self,
    ) -> (
        mpsc::UnboundedReceiver<Message>,
        mpsc::UnboundedReceiver<AudioChunk>,
        WsSender,
    ) {
        (self.message_rx, self.audio_rx, self.sender)
    }
}

/// Cloneable handle queueing outbound messages for the writer task.
#[derive(Debug, Clone)]
pub struct WsSender {
    tx: mpsc::UnboundedSender<WsMessage>,
}

impl WsSender {
    /// Queue a control message
    pub fn send_message(&self, message: Message) -> Result<(), Error> {
        let text = serde_json::to_string(&message)?;
        self.tx
            .send(WsMessage::Text(text))
            .map_err(|_| Error::ChannelClosed)
    }

    /// Queue an encoded audio chunk
    pub fn send_audio(&self, chunk: &AudioChunk) -> Result<(), Error> {
        self.tx
            .send(WsMessage::Binary(chunk.encode()))
            .map_err(|_| Error::ChannelClosed)
    }
}

impl FrameSink for WsSender {
    fn send_frame(&mut self, frame: EncodedFrame) -> Result<(), Error> {
        self.send_audio(&AudioChunk::from(frame))
    }
}

impl ControlTransport for WsSender {
    fn send_probe(&mut self, request: ProbeRequest) -> Result<(), Error> {
        self.send_message(Message::ClientTime(request.into()))
    }

    fn send_telemetry(&mut self, telemetry: &Telemetry) -> Result<(), Error> {
        self.send_message(Message::ClientTelemetry(ClientTelemetry::from(telemetry)))
    }
}
