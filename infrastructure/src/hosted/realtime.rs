//! Websocket connection to the realtime endpoint.
//!
//! Each subscription owns one socket. A background task keeps it alive with
//! heartbeats and turns change frames into [`ChangeEvent`]s on the
//! subscription queue. When the socket drops the queue closes; there is no
//! reconnection at this layer.

use super::protocol::{self, JoinReply, PhoenixMessage};
use crate::error::{BackendError, Result};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tradehub_domain::{ChangeEvent, EventFilter};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const JOIN_REF: &str = "1";
const EVENT_QUEUE: usize = 64;

/// Parameters for one channel subscription
pub struct ChannelJoin<'a> {
    pub url: &'a str,
    pub topic: String,
    pub collection: &'a str,
    pub filter: EventFilter,
    pub access_token: Option<&'a str>,
    pub heartbeat: Duration,
}

/// A joined channel with its background pump
pub struct RealtimeConnection {
    pub events: mpsc::Receiver<ChangeEvent>,
    cancel: CancellationToken,
    pump: JoinHandle<()>,
}

impl RealtimeConnection {
    /// Connect, join the channel and start pumping events
    pub async fn open(join: ChannelJoin<'_>) -> Result<Self> {
        let (socket, _) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(join.url))
            .await
            .map_err(|_| BackendError::Timeout)??;
        let (mut write, mut read) = socket.split();

        let frame = PhoenixMessage::join(
            &join.topic,
            join.collection,
            join.filter,
            join.access_token,
            JOIN_REF,
        );
        write.send(Message::Text(frame.to_json()?.into())).await?;

        tokio::time::timeout(CONNECT_TIMEOUT, await_join(&mut read))
            .await
            .map_err(|_| BackendError::Timeout)??;
        debug!(topic = %join.topic, "Realtime channel joined");

        let (tx, events) = mpsc::channel(EVENT_QUEUE);
        let cancel = CancellationToken::new();
        let pump = tokio::spawn(pump(
            write,
            read,
            join.topic,
            join.collection.to_string(),
            tx,
            join.heartbeat,
            cancel.clone(),
        ));

        Ok(Self {
            events,
            cancel,
            pump,
        })
    }

    /// Split off the event queue, keeping the handle that stops the pump
    pub fn into_parts(self) -> (mpsc::Receiver<ChangeEvent>, RealtimeHandle) {
        (
            self.events,
            RealtimeHandle {
                cancel: self.cancel,
                pump: self.pump,
            },
        )
    }
}

/// Stops a connection's pump
pub struct RealtimeHandle {
    cancel: CancellationToken,
    pump: JoinHandle<()>,
}

impl RealtimeHandle {
    /// Leave the channel and close the socket
    pub async fn close(self) {
        self.cancel.cancel();
        if let Err(e) = self.pump.await {
            warn!(error = %e, "Realtime pump ended abnormally");
        }
    }
}

async fn await_join(read: &mut WsRead) -> Result<()> {
    while let Some(frame) = read.next().await {
        let Message::Text(text) = frame? else {
            continue;
        };
        let Some(msg) = PhoenixMessage::parse(&text) else {
            continue;
        };
        match protocol::join_reply(&msg, JOIN_REF) {
            Some(JoinReply::Ok) => return Ok(()),
            Some(JoinReply::Error(reason)) => {
                return Err(BackendError::Status {
                    status: 400,
                    message: reason,
                });
            }
            None => continue,
        }
    }
    Err(BackendError::UnexpectedResponse(
        "socket closed before join reply".to_string(),
    ))
}

async fn pump(
    mut write: WsWrite,
    mut read: WsRead,
    topic: String,
    collection: String,
    events: mpsc::Sender<ChangeEvent>,
    heartbeat: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(heartbeat);
    // The first tick completes immediately
    ticker.tick().await;
    let mut next_ref: u64 = 2;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let leave = PhoenixMessage::leave(&topic, &next_ref.to_string(), JOIN_REF);
                if let Ok(json) = leave.to_json() {
                    let _ = write.send(Message::Text(json.into())).await;
                }
                let _ = write.close().await;
                debug!(%topic, "Realtime channel left");
                break;
            }
            _ = ticker.tick() => {
                let beat = PhoenixMessage::heartbeat(&next_ref.to_string());
                next_ref += 1;
                let Ok(json) = beat.to_json() else { continue };
                if let Err(e) = write.send(Message::Text(json.into())).await {
                    warn!(%topic, error = %e, "Realtime heartbeat failed");
                    break;
                }
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let Some(msg) = PhoenixMessage::parse(&text) else { continue };
                    if let Some(kind) = protocol::change_kind(&msg, &topic) {
                        debug!(%topic, %kind, "Change notification");
                        if events.send(ChangeEvent::new(kind, collection.as_str())).await.is_err() {
                            debug!(%topic, "Event queue closed");
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    warn!(%topic, "Realtime connection closed by server");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(%topic, error = %e, "Realtime read error");
                    break;
                }
            }
        }
    }
}
