//! Wire messages exchanged with the browser.
//!
//! Server → client: one [`Handshake`] as the first frame, then raw fragment
//! markup. Client → server: [`EventMessage`] JSON objects.

use serde::{Deserialize, Deserializer, Serialize};

/// A DOM event forwarded from the browser.
///
/// Mirrors the fields of a DOM `MouseEvent`. Events that are not mouse events
/// (or emitter calls made outside of an event listener) arrive with every
/// field absent, which decodes to the zero value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Event {
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub alt_key: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub button: i16,
    #[serde(deserialize_with = "null_as_default")]
    pub buttons: u16,
    #[serde(deserialize_with = "null_as_default")]
    pub client_x: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub client_y: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub ctrl_key: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub meta_key: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub movement_x: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub movement_y: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub screen_x: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub screen_y: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub shift_key: bool,
}

/// Browsers report `null` for some fields on synthetic events.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A client-originated call of a registered event handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub name: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(default)]
    pub event: Event,
}

impl EventMessage {
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// First message on every connection; tells the client which element to patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handshake {
    #[serde(rename = "elementID")]
    pub element_id: String,
}
