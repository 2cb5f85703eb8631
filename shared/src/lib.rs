use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 55555;
pub const MAX_MESSAGE_SIZE: usize = 1024;
pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;
pub const SQUARE_SIZE: f32 = 80.0;

/// Identifier handed out by the server for every accepted connection.
///
/// Ids are never reused within one server process, even after the
/// client disconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message is not a JSON object")]
    NotAnObject,
    #[error("field `{field}` has the wrong type")]
    InvalidField { field: &'static str },
}

/// RGB color as sent on the wire: `[r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "[i32; 3]", into = "[i32; 3]")]
pub struct Color {
    pub r: i32,
    pub g: i32,
    pub b: i32,
}

impl Color {
    pub fn new(r: i32, g: i32, b: i32) -> Self {
        Self { r, g, b }
    }

    /// Decodes a color array leniently: anything other than exactly three
    /// numbers yields `None`. Fractional channels are truncated.
    pub fn from_value(value: &Value) -> Option<Self> {
        let channels = value.as_array()?;
        if channels.len() != 3 {
            return None;
        }

        let mut decoded = [0i32; 3];
        for (slot, channel) in decoded.iter_mut().zip(channels) {
            *slot = channel.as_f64()? as i32;
        }
        Some(decoded.into())
    }
}

impl From<[i32; 3]> for Color {
    fn from([r, g, b]: [i32; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Color> for [i32; 3] {
    fn from(color: Color) -> Self {
        [color.r, color.g, color.b]
    }
}

/// Latest known motion state of one client.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StateRecord {
    pub x: f32,
    pub y: f32,
    pub velocity: f32,
    pub direction: f32,
    pub color: Color,
}

/// A partial state update. `None` fields leave the target untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl StatePatch {
    /// A patch carrying every field of `record`.
    pub fn full(record: &StateRecord) -> Self {
        Self {
            x: Some(record.x),
            y: Some(record.y),
            velocity: Some(record.velocity),
            direction: Some(record.direction),
            color: Some(record.color),
        }
    }

    /// Builds a patch from the `state` object of an inbound message.
    ///
    /// Scalar fields must be numbers when present; a wrong type rejects the
    /// whole patch so nothing is half-applied. A malformed `color` is not an
    /// error, it is simply left out. Anything that is not an object decodes
    /// to the empty patch.
    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let Some(fields) = value.as_object() else {
            return Ok(Self::default());
        };

        Ok(Self {
            x: scalar(fields, "x")?,
            y: scalar(fields, "y")?,
            velocity: scalar(fields, "velocity")?,
            direction: scalar(fields, "direction")?,
            color: fields.get("color").and_then(Color::from_value),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_none()
            && self.y.is_none()
            && self.velocity.is_none()
            && self.direction.is_none()
            && self.color.is_none()
    }

    pub fn apply_to(&self, record: &mut StateRecord) {
        if let Some(x) = self.x {
            record.x = x;
        }
        if let Some(y) = self.y {
            record.y = y;
        }
        if let Some(velocity) = self.velocity {
            record.velocity = velocity;
        }
        if let Some(direction) = self.direction {
            record.direction = direction;
        }
        if let Some(color) = self.color {
            record.color = color;
        }
    }
}

fn scalar(fields: &Map<String, Value>, field: &'static str) -> Result<Option<f32>, ProtocolError> {
    match fields.get(field) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .map(|n| Some(n as f32))
            .ok_or(ProtocolError::InvalidField { field }),
    }
}

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Connect,
    Delta(StatePatch),
    Snapshot(StatePatch),
    /// Any other `type` value, or none at all.
    Unknown(Option<String>),
}

impl ClientMessage {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let fields = value.as_object().ok_or(ProtocolError::NotAnObject)?;

        let kind = match fields.get("type") {
            None => return Ok(ClientMessage::Unknown(None)),
            Some(Value::String(kind)) => kind.as_str(),
            Some(_) => return Err(ProtocolError::InvalidField { field: "type" }),
        };

        let state = || match fields.get("state") {
            Some(state) => StatePatch::from_value(state),
            None => Ok(StatePatch::default()),
        };

        match kind {
            "CONNECT" => Ok(ClientMessage::Connect),
            "delta" => Ok(ClientMessage::Delta(state()?)),
            "snapshot" => Ok(ClientMessage::Snapshot(state()?)),
            other => Ok(ClientMessage::Unknown(Some(other.to_string()))),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ClientMessage::Connect => json!({ "type": "CONNECT" }),
            ClientMessage::Delta(patch) => json!({ "type": "delta", "state": patch }),
            ClientMessage::Snapshot(patch) => json!({ "type": "snapshot", "state": patch }),
            ClientMessage::Unknown(Some(kind)) => json!({ "type": kind }),
            ClientMessage::Unknown(None) => json!({}),
        }
    }

    /// Newline-terminated JSON, the framing the game client uses.
    pub fn to_line(&self) -> String {
        format!("{}\n", self.to_value())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Success,
    Fail,
}

/// Messages that travel from the server (or the operator) to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Response { status: Status },
    Authoritative { state: StatePatch },
}

impl ServerMessage {
    pub fn success() -> Self {
        ServerMessage::Response {
            status: Status::Success,
        }
    }

    pub fn fail() -> Self {
        ServerMessage::Response {
            status: Status::Fail,
        }
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_line(&self) -> Result<String, ProtocolError> {
        Ok(format!("{}\n", serde_json::to_string(self)?))
    }
}
