//! Client connection tasks.
//!
//! [`run_client`] registers a connection with the hub, spawns its write task
//! and runs its read task on the calling task. Both tasks end in the same
//! place: the client is unregistered from the hub (which may already have
//! dropped it) and the socket is closed.

use crate::error::TransportError;
use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use roomcast_core::{
    Broadcast, ClientEndpoint, ClientHandle, ClientId, HubHandle, NewMessage, OutboundFrame,
    RoomSet, UserId,
};
use roomcast_protocol::{codec, ErrorFrame, FrameCodec, ProtocolError, MAX_FRAME_SIZE};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, trace, warn};

/// Per-connection settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Disconnect a peer that sends nothing (not even a pong) for this long.
    pub idle_timeout: Duration,
    /// Ping interval; must be shorter than `idle_timeout`.
    pub ping_interval: Duration,
    /// Deadline for a single socket write.
    pub write_timeout: Duration,
    /// Largest inbound message accepted, in bytes.
    pub max_message_size: usize,
    /// Capacity of the outbound queue.
    pub outbound_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let idle_timeout = Duration::from_secs(60);
        Self {
            idle_timeout,
            ping_interval: idle_timeout * 9 / 10,
            write_timeout: Duration::from_secs(10),
            max_message_size: MAX_FRAME_SIZE,
            outbound_capacity: 256,
        }
    }
}

/// Serve one authenticated WebSocket until it disconnects.
///
/// Returns `Ok(())` when the peer closes the connection or the hub drops the
/// client, and the error that ended either half otherwise.
///
/// # Errors
///
/// Returns [`TransportError::Hub`] if the hub is not running, or the
/// transport failure that ended the connection.
pub async fn run_client<S, E>(
    socket: S,
    user_id: impl Into<UserId>,
    hub: HubHandle,
    config: &ClientConfig,
) -> Result<(), TransportError>
where
    S: Stream<Item = Result<Message, E>> + Sink<Message> + Send + 'static,
    <S as Sink<Message>>::Error: fmt::Display + Send,
    E: fmt::Display + Send,
{
    let (handle, endpoint) = ClientHandle::new(user_id, config.outbound_capacity);
    let ClientEndpoint {
        id,
        user_id,
        rooms,
        outbound,
        replies,
    } = endpoint;

    hub.register(handle).await?;
    debug!(client = %id, user = %user_id, "Client connected");

    let (sink, stream) = socket.split::<Message>();

    let writer = Writer {
        id: id.clone(),
        outbound,
        ping_interval: config.ping_interval,
        write_timeout: config.write_timeout,
    };
    let mut write_task = tokio::spawn(writer.run(sink));

    let reader = Reader {
        id: id.clone(),
        user_id,
        rooms,
        replies,
        hub: hub.clone(),
        codec: FrameCodec::new(config.max_message_size),
        idle_timeout: config.idle_timeout,
    };

    // Whichever half finishes first ends the connection. A finished writer
    // abandons the pending read so a peer that never closes is not kept
    // until the idle deadline.
    tokio::select! {
        result = reader.run(stream) => {
            match &result {
                Ok(()) => debug!(client = %id, "Client disconnected"),
                Err(e) => debug!(client = %id, error = %e, "Client dropped"),
            }
            let _ = hub.unregister(id.clone()).await;
            match write_task.await {
                Ok(Err(e)) => debug!(client = %id, error = %e, "Write task failed"),
                Err(e) if e.is_panic() => error!(client = %id, "Write task panicked"),
                _ => {}
            }
            result
        }
        written = &mut write_task => {
            let _ = hub.unregister(id.clone()).await;
            match written {
                Ok(Ok(())) => {
                    debug!(client = %id, "Dropped by hub");
                    Ok(())
                }
                Ok(Err(e)) => {
                    debug!(client = %id, error = %e, "Write task failed");
                    Err(e)
                }
                Err(e) => {
                    error!(client = %id, "Write task panicked");
                    Err(TransportError::SendFailed(e.to_string()))
                }
            }
        }
    }
}

/// The read half of a client.
struct Reader {
    id: ClientId,
    user_id: UserId,
    rooms: RoomSet,
    replies: mpsc::WeakSender<OutboundFrame>,
    hub: HubHandle,
    codec: FrameCodec,
    idle_timeout: Duration,
}

impl Reader {
    /// Receive until the peer goes away or stays silent past the deadline.
    async fn run<St, E>(&self, mut stream: St) -> Result<(), TransportError>
    where
        St: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        loop {
            let next = match time::timeout(self.idle_timeout, stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    debug!(client = %self.id, "Idle deadline expired");
                    return Err(TransportError::Timeout);
                }
            };

            match next {
                Some(Ok(Message::Text(text))) => self.handle(text.as_bytes()).await?,
                Some(Ok(Message::Binary(data))) => self.handle(&data).await?,
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    trace!(client = %self.id, "Keep-alive received");
                }
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
            }
        }
    }

    /// Decode, authorize and forward one inbound frame.
    ///
    /// Only a stopped hub is fatal; bad input is answered with an error frame.
    async fn handle(&self, data: &[u8]) -> Result<(), TransportError> {
        let frame = match self.codec.decode(data) {
            Ok(frame) => frame,
            Err(ProtocolError::FrameTooLarge { size, max }) => {
                warn!(client = %self.id, size, max, "Frame too large");
                self.reply(&ErrorFrame::too_large(size, max));
                return Ok(());
            }
            Err(e) => {
                warn!(client = %self.id, error = %e, "Could not decode frame");
                self.reply(&ErrorFrame::bad_request("Could not unmarshal json provided"));
                return Ok(());
            }
        };

        if !self.rooms.contains(&frame.room) {
            warn!(client = %self.id, user = %self.user_id, room = %frame.room, "Write into foreign room");
            self.reply(&ErrorFrame::unauthorized(&frame.room));
            return Ok(());
        }

        let message = NewMessage::from_frame(frame, self.user_id.clone());
        self.hub
            .broadcast(Broadcast::new(self.id.clone(), message))
            .await?;
        trace!(client = %self.id, "Message handed to hub");
        Ok(())
    }

    /// Queue an error frame for this client only.
    fn reply(&self, frame: &ErrorFrame) {
        let Some(sender) = self.replies.upgrade() else {
            return;
        };
        match codec::encode(frame) {
            Ok(text) => {
                if sender.try_send(Arc::from(text)).is_err() {
                    warn!(client = %self.id, "Outbound queue unavailable, error reply dropped");
                }
            }
            Err(e) => error!(client = %self.id, error = %e, "Could not encode error frame"),
        }
    }
}

/// The write half of a client.
struct Writer {
    id: ClientId,
    outbound: mpsc::Receiver<OutboundFrame>,
    ping_interval: Duration,
    write_timeout: Duration,
}

impl Writer {
    /// Drain the outbound queue and send heartbeats until the queue closes.
    async fn run<Si>(mut self, mut sink: Si) -> Result<(), TransportError>
    where
        Si: Sink<Message> + Unpin,
        Si::Error: fmt::Display,
    {
        let start = Instant::now() + self.ping_interval;
        let mut heartbeat = time::interval_at(start, self.ping_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = self.outbound.recv() => {
                    let Some(text) = frame else {
                        debug!(client = %self.id, "Outbound queue closed");
                        let close = async {
                            if sink.send(Message::Close(None)).await.is_ok() {
                                let _ = sink.close().await;
                            }
                        };
                        let _ = time::timeout(self.write_timeout, close).await;
                        return Ok(());
                    };
                    send(&mut sink, Message::Text(text.to_string()), self.write_timeout).await?;
                }
                _ = heartbeat.tick() => {
                    trace!(client = %self.id, "Heartbeat");
                    send(&mut sink, Message::Ping(Vec::new()), self.write_timeout).await?;
                }
            }
        }
    }
}

/// Write one message under a deadline.
async fn send<Si>(sink: &mut Si, message: Message, deadline: Duration) -> Result<(), TransportError>
where
    Si: Sink<Message> + Unpin,
    Si::Error: fmt::Display,
{
    match time::timeout(deadline, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(TransportError::SendFailed(e.to_string())),
        Err(_) => Err(TransportError::WriteTimeout),
    }
}
