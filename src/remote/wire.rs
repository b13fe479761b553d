//! Crop socket wire format.
//!
//! Outbound: one text frame,
//! `<deviceId>LENS_DEVICE_ID<sessionKey>LENS_SESSION_KEY<base64 jpeg>`.
//! Inbound: JSON `{"event": "connect"}` or
//! `{"event": "cropped", "data": {"is_receipt": bool, "contours": [[x, y], ...]}}`.

use serde::Deserialize;

use crate::error::LensResult;

pub const DEVICE_ID_SEPARATOR: &str = "LENS_DEVICE_ID";
pub const SESSION_KEY_SEPARATOR: &str = "LENS_SESSION_KEY";

pub fn encode_frame_message(device_id: &str, session_key: &str, payload_b64: &str) -> String {
    let mut msg = String::with_capacity(
        device_id.len()
            + session_key.len()
            + payload_b64.len()
            + DEVICE_ID_SEPARATOR.len()
            + SESSION_KEY_SEPARATOR.len(),
    );
    msg.push_str(device_id);
    msg.push_str(DEVICE_ID_SEPARATOR);
    msg.push_str(session_key);
    msg.push_str(SESSION_KEY_SEPARATOR);
    msg.push_str(payload_b64);
    msg
}

/// Split an outbound message into `(device_id, session_key, payload)`.
pub fn decode_frame_message(msg: &str) -> Option<(&str, &str, &str)> {
    let (device_id, rest) = msg.split_once(DEVICE_ID_SEPARATOR)?;
    let (session_key, payload) = rest.split_once(SESSION_KEY_SEPARATOR)?;
    Some((device_id, session_key, payload))
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct CroppedData {
    #[serde(default = "default_true")]
    is_receipt: bool,
    #[serde(default)]
    contours: Vec<[f64; 2]>,
}

fn default_true() -> bool {
    true
}

/// A decoded inbound message.
#[derive(Clone, Debug, PartialEq)]
pub enum RemoteEvent {
    Connect,
    Cropped {
        is_receipt: bool,
        /// Detection-space corners, before rescaling.
        contours: Vec<[f64; 2]>,
    },
    Unknown(String),
}

impl RemoteEvent {
    pub fn parse(text: &str) -> LensResult<Self> {
        let envelope: Envelope = serde_json::from_str(text)?;
        Ok(match envelope.event.as_str() {
            "connect" => RemoteEvent::Connect,
            "cropped" => {
                let data: CroppedData = match envelope.data {
                    Some(value) => serde_json::from_value(value)?,
                    None => CroppedData {
                        is_receipt: false,
                        contours: Vec::new(),
                    },
                };
                RemoteEvent::Cropped {
                    is_receipt: data.is_receipt,
                    contours: data.contours,
                }
            }
            _ => RemoteEvent::Unknown(envelope.event),
        })
    }
}

/// Socket ready state as reported to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketStatus {
    Connecting,
    Open,
    Closing,
    Closed,
    /// No socket exists.
    Undefined,
}

impl SocketStatus {
    pub fn from_ready_state(state: u16) -> Self {
        match state {
            0 => SocketStatus::Connecting,
            1 => SocketStatus::Open,
            2 => SocketStatus::Closing,
            3 => SocketStatus::Closed,
            _ => SocketStatus::Undefined,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            SocketStatus::Connecting => 0,
            SocketStatus::Open => 1,
            SocketStatus::Closing => 2,
            SocketStatus::Closed => 3,
            SocketStatus::Undefined => -1,
        }
    }

    pub fn state(&self) -> &'static str {
        match self {
            SocketStatus::Connecting => "CONNECTING",
            SocketStatus::Open => "OPEN",
            SocketStatus::Closing => "CLOSING",
            SocketStatus::Closed => "CLOSED",
            SocketStatus::Undefined => "UNDEFINED",
        }
    }

    /// Indicator colour for a status light.
    pub fn color(&self) -> &'static str {
        match self {
            SocketStatus::Connecting => "yellow",
            SocketStatus::Open => "green",
            SocketStatus::Closing => "orange",
            SocketStatus::Closed => "red",
            SocketStatus::Undefined => "purple",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_message_layout() {
        let msg = encode_frame_message("abc123", "sess", "AAAA");
        assert_eq!(msg, "abc123LENS_DEVICE_IDsessLENS_SESSION_KEYAAAA");
        assert_eq!(decode_frame_message(&msg), Some(("abc123", "sess", "AAAA")));
    }

    #[test]
    fn parses_inbound_events() {
        assert_eq!(RemoteEvent::parse(r#"{"event":"connect"}"#).unwrap(), RemoteEvent::Connect);
        let cropped = RemoteEvent::parse(
            r#"{"event":"cropped","data":{"is_receipt":true,"contours":[[1,2],[3,4],[5,6],[7,8]]}}"#,
        )
        .unwrap();
        assert_eq!(
            cropped,
            RemoteEvent::Cropped {
                is_receipt: true,
                contours: vec![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0], [7.0, 8.0]],
            }
        );
        let not_doc = RemoteEvent::parse(r#"{"event":"cropped","data":{"is_receipt":false}}"#).unwrap();
        assert!(matches!(not_doc, RemoteEvent::Cropped { is_receipt: false, .. }));
        assert_eq!(
            RemoteEvent::parse(r#"{"event":"ping"}"#).unwrap(),
            RemoteEvent::Unknown("ping".into())
        );
        assert!(RemoteEvent::parse("not json").is_err());
    }

    #[test]
    fn socket_status_table() {
        assert_eq!(SocketStatus::from_ready_state(1).color(), "green");
        assert_eq!(SocketStatus::from_ready_state(9), SocketStatus::Undefined);
        assert_eq!(SocketStatus::Undefined.code(), -1);
        assert_eq!(SocketStatus::Closing.state(), "CLOSING");
    }
}
