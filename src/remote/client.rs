//! Request/response client over the crop socket.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::core::Quadrilateral;
use crate::error::{LensError, LensResult};
use crate::remote::wire::{RemoteEvent, SocketStatus, encode_frame_message};

/// A text-frame socket supplied by the host.
#[async_trait]
pub trait CropTransport: Send {
    /// Open the connection to `url`.
    async fn open(&mut self, url: &str) -> LensResult<()>;

    /// Send one text frame.
    async fn send_text(&mut self, text: String) -> LensResult<()>;

    /// Wait for the next text frame.
    ///
    /// # Returns
    ///
    /// `None` once the connection is closed.
    async fn next_text(&mut self) -> LensResult<Option<String>>;

    async fn close(&mut self) -> LensResult<()>;

    /// Ready state of the underlying socket, `None` if none was opened.
    fn ready_state(&self) -> Option<u16>;
}

/// Interpretation of one inbound message.
#[derive(Clone, Debug, PartialEq)]
pub enum RemoteReply {
    Connected,
    /// The server says the frame holds no document.
    NotDocument,
    /// Detection-space contour of the document.
    Contours(Quadrilateral),
    /// An event the client does not act on.
    Ignored(String),
}

pub struct RemoteCropClient {
    transport: Box<dyn CropTransport>,
    device_id: String,
    session_key: String,
    connected: bool,
}

impl RemoteCropClient {
    pub fn new(transport: Box<dyn CropTransport>, device_id: impl Into<String>, session_key: impl Into<String>) -> Self {
        Self {
            transport,
            device_id: device_id.into(),
            session_key: session_key.into(),
            connected: false,
        }
    }

    pub fn set_device_id(&mut self, device_id: impl Into<String>) {
        self.device_id = device_id.into();
    }

    pub fn set_session_key(&mut self, session_key: impl Into<String>) {
        self.session_key = session_key.into();
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Open the socket and wait for the server's `connect` event.
    pub async fn connect(&mut self, url: &str, wait: Duration) -> LensResult<()> {
        self.transport
            .open(url)
            .await
            .map_err(|e| e.with_address(url).with_operation("socket_open"))?;
        let handshake = async {
            loop {
                match self.receive().await? {
                    RemoteReply::Connected => return Ok::<(), LensError>(()),
                    other => debug!("[EVENT] pre_connect_message: {:?}", other),
                }
            }
        };
        match tokio::time::timeout(wait, handshake).await {
            Ok(Ok(())) => {
                self.connected = true;
                info!("[EVENT] Started sending frames");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(LensError::timeout("socket_connect", wait.as_millis() as u64).with_address(url)),
        }
    }

    /// Send one frame payload (base64 JPEG) with the identity header.
    pub async fn send_frame(&mut self, payload_b64: &str) -> LensResult<()> {
        if !self.connected {
            return Err(LensError::state(
                "disconnected",
                "send_frame",
                "socket has not received its connect event",
            ));
        }
        let msg = encode_frame_message(&self.device_id, &self.session_key, payload_b64);
        self.transport.send_text(msg).await
    }

    /// Wait for and interpret the next inbound message.
    pub async fn receive(&mut self) -> LensResult<RemoteReply> {
        let Some(text) = self.transport.next_text().await? else {
            self.connected = false;
            return Err(LensError::transport("socket_receive", "socket closed"));
        };
        Ok(match RemoteEvent::parse(&text)? {
            RemoteEvent::Connect => RemoteReply::Connected,
            RemoteEvent::Cropped { is_receipt: false, .. } => RemoteReply::NotDocument,
            RemoteEvent::Cropped { contours, .. } => {
                debug!("[EVENT] Got cropped contours");
                match Quadrilateral::from_pairs(&contours)? {
                    q if q.is_degenerate() => RemoteReply::NotDocument,
                    q => RemoteReply::Contours(q),
                }
            }
            RemoteEvent::Unknown(event) => {
                warn!("[EVENT] Unknown event: {}", event);
                RemoteReply::Ignored(event)
            }
        })
    }

    /// Send a frame and wait for the answer to it.
    pub async fn request(&mut self, payload_b64: &str) -> LensResult<RemoteReply> {
        self.send_frame(payload_b64).await?;
        self.receive().await
    }

    pub async fn close(&mut self) -> LensResult<()> {
        self.connected = false;
        self.transport.close().await
    }

    pub fn status(&self) -> SocketStatus {
        self.transport
            .ready_state()
            .map(SocketStatus::from_ready_state)
            .unwrap_or(SocketStatus::Undefined)
    }
}
