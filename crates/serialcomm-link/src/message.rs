//! Application records carried in frame payloads.
//!
//! A [`Message`] is the outer JSON envelope. Its `payload` field holds a
//! base64 string whose decoded bytes are a nested [`Payload`] document with
//! one device [`Event`] and its [`Reading`]s.
//!
//! Decoding is lenient the way the gateway peers are: missing fields take
//! their zero value, unknown fields are ignored, and both `requestID` and
//! `requestId` spellings are accepted.

use std::marker::PhantomData;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serialcomm_frame::Decoder;

use crate::error::Result;

/// API version written into outgoing messages.
pub const API_VERSION: &str = "v3";

/// Content type of a JSON payload.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Outer message envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Message {
    pub api_version: String,
    pub received_topic: String,
    #[serde(rename = "correlationID", alias = "correlationId")]
    pub correlation_id: String,
    #[serde(rename = "requestID", alias = "requestId")]
    pub request_id: String,
    pub error_code: i64,
    /// Base64-encoded nested [`Payload`] document.
    pub payload: String,
    pub content_type: String,
}

/// Nested document carried base64-encoded in [`Message::payload`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Payload {
    pub api_version: String,
    #[serde(rename = "requestId", alias = "requestID")]
    pub request_id: String,
    pub event: Event,
}

/// One device event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Event {
    pub api_version: String,
    pub id: String,
    pub device_name: String,
    pub profile_name: String,
    pub source_name: String,
    /// Nanoseconds since the Unix epoch.
    pub origin: i64,
    pub readings: Vec<Reading>,
}

/// One resource value within an [`Event`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Reading {
    pub id: String,
    pub origin: i64,
    pub device_name: String,
    pub resource_name: String,
    pub profile_name: String,
    pub value_type: String,
    pub value: String,
}

impl Message {
    /// Build a JSON message around `payload`.
    pub fn from_payload(payload: &Payload) -> Result<Self> {
        Self {
            api_version: API_VERSION.to_string(),
            content_type: CONTENT_TYPE_JSON.to_string(),
            ..Self::default()
        }
        .with_payload(payload)
    }

    /// Replace the nested document, re-encoding it.
    pub fn with_payload(mut self, payload: &Payload) -> Result<Self> {
        let json = serde_json::to_vec(payload)?;
        self.payload = STANDARD.encode(json);
        Ok(self)
    }

    /// Decode the base64 `payload` field into its nested document.
    pub fn decode_payload(&self) -> Result<Payload> {
        let raw = STANDARD.decode(self.payload.trim())?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Serialize to compact JSON, the form sent on the wire.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// The demo device reading sent by the field gateways.
    pub fn sample() -> Self {
        let reading = Reading {
            id: "dac94d32-081b-4743-ad5f-4bb08b580497".to_string(),
            origin: SAMPLE_ORIGIN,
            device_name: SAMPLE_DEVICE.to_string(),
            resource_name: "Int8".to_string(),
            profile_name: SAMPLE_DEVICE.to_string(),
            value_type: "Int8".to_string(),
            value: "-63".to_string(),
        };
        let payload = Payload {
            api_version: API_VERSION.to_string(),
            request_id: "9ad28c4b-ba0d-4cef-92ad-8e418eccedca".to_string(),
            event: Event {
                api_version: API_VERSION.to_string(),
                id: "008f8a31-e18e-491b-9100-89d26afa6bbb".to_string(),
                device_name: SAMPLE_DEVICE.to_string(),
                profile_name: SAMPLE_DEVICE.to_string(),
                source_name: "Int8".to_string(),
                origin: SAMPLE_ORIGIN,
                readings: vec![reading],
            },
        };
        // Plain string fields only; serialization cannot fail.
        let encoded = serde_json::to_vec(&payload)
            .map(|json| STANDARD.encode(json))
            .unwrap_or_default();
        Self {
            api_version: API_VERSION.to_string(),
            correlation_id: "78f0dd39-5e0b-4002-809d-9bae380dfec3".to_string(),
            payload: encoded,
            content_type: CONTENT_TYPE_JSON.to_string(),
            ..Self::default()
        }
    }
}

const SAMPLE_DEVICE: &str = "Random-Integer-Device";
const SAMPLE_ORIGIN: i64 = 1_748_401_303_350_680_295;

/// Decodes a frame payload as a JSON [`Message`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageDecoder;

impl Decoder for MessageDecoder {
    type Item = Message;
    type Error = serde_json::Error;

    fn decode(&self, payload: Bytes) -> std::result::Result<Message, serde_json::Error> {
        serde_json::from_slice(&payload)
    }
}

/// Decodes a frame payload as any JSON type.
pub struct JsonDecoder<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDecoder<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonDecoder<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonDecoder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonDecoder")
            .field("item", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: DeserializeOwned> Decoder for JsonDecoder<T> {
    type Item = T;
    type Error = serde_json::Error;

    fn decode(&self, payload: Bytes) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinkError;

    // Payload field as transmitted by the field gateway's demo sender.
    const GATEWAY_SAMPLE_PAYLOAD: &str = "eyJhcGlWZXJzaW9uIjoidjMiLCJyZXF1ZXN0SWQiOiI5YWQyOGM0Yi1iYTBkLTRjZWYtOTJhZC04ZTQxOGVjY2VkY2EiLCJldmVudCI6eyJhcGlWZXJzaW9uIjoidjMiLCJpZCI6IjAwOGY4YTMxLWUxOGUtNDkxYi05MTAwLTg5ZDI2YWZhNmJiYiIsImRldmljZU5hbWUiOiJSYW5kb20tSW50ZWdlci1EZXZpY2UiLCJwcm9maWxlTmFtZSI6IlJhbmRvbS1JbnRlZ2VyLURldmljZSIsInNvdXJjZU5hbWUiOiJJbnQ4Iiwib3JpZ2luIjoxNzQ4NDAxMzAzMzUwNjgwMjk1LCJyZWFkaW5ncyI6W3siaWQiOiJkYWM5NGQzMi0wODFiLTQ3NDMtYWQ1Zi00YmIwOGI1ODA0OTciLCJvcmlnaW4iOjE3NDg0MDEzMDMzNTA2ODAyOTUsImRldmljZU5hbWUiOiJSYW5kb20tSW50ZWdlci1EZXZpY2UiLCJyZXNvdXJjZU5hbWUiOiJJbnQ4IiwicHJvZmlsZU5hbWUiOiJSYW5kb20tSW50ZWdlci1EZXZpY2UiLCJ2YWx1ZVR5cGUiOiJJbnQ4IiwidmFsdWUiOiItNjMifV19fQ==";

    #[test]
    fn sample_encodes_like_the_gateway() {
        let msg = Message::sample();
        assert_eq!(msg.payload, GATEWAY_SAMPLE_PAYLOAD);
        assert_eq!(msg.correlation_id, "78f0dd39-5e0b-4002-809d-9bae380dfec3");
        assert_eq!(msg.content_type, CONTENT_TYPE_JSON);
    }

    #[test]
    fn decode_nested_payload() {
        let payload = Message::sample().decode_payload().unwrap();
        assert_eq!(payload.request_id, "9ad28c4b-ba0d-4cef-92ad-8e418eccedca");
        assert_eq!(payload.event.device_name, "Random-Integer-Device");
        assert_eq!(payload.event.origin, 1_748_401_303_350_680_295);
        assert_eq!(payload.event.readings.len(), 1);
        assert_eq!(payload.event.readings[0].value, "-63");
    }

    #[test]
    fn wire_field_names() {
        let json: serde_json::Value =
            serde_json::from_slice(&Message::sample().to_json().unwrap()).unwrap();
        for key in [
            "apiVersion",
            "receivedTopic",
            "correlationID",
            "requestID",
            "errorCode",
            "payload",
            "contentType",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn accepts_either_id_spelling() {
        let a: Message = serde_json::from_str(r#"{"requestID":"r1","correlationID":"c1"}"#).unwrap();
        let b: Message = serde_json::from_str(r#"{"requestId":"r1","correlationId":"c1"}"#).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.request_id, "r1");
    }

    #[test]
    fn missing_fields_default() {
        let msg: Message = serde_json::from_str(r#"{"a":1}"#).unwrap();
        assert_eq!(msg, Message::default());
    }

    #[test]
    fn from_payload_roundtrip() {
        let payload = Payload {
            api_version: API_VERSION.to_string(),
            request_id: "req".to_string(),
            ..Payload::default()
        };
        let msg = Message::from_payload(&payload).unwrap();
        assert_eq!(msg.api_version, API_VERSION);
        assert_eq!(msg.decode_payload().unwrap(), payload);
    }

    #[test]
    fn bad_base64_is_reported() {
        let msg = Message {
            payload: "not base64!".to_string(),
            ..Message::default()
        };
        assert!(matches!(msg.decode_payload(), Err(LinkError::Base64(_))));
    }

    #[test]
    fn non_json_payload_is_reported() {
        let msg = Message {
            payload: STANDARD.encode("plain text"),
            ..Message::default()
        };
        assert!(matches!(msg.decode_payload(), Err(LinkError::Json(_))));
    }

    #[test]
    fn message_decoder_rejects_non_json() {
        assert!(MessageDecoder.decode(Bytes::from_static(b"{oops")).is_err());
        assert!(MessageDecoder.decode(Bytes::from_static(b"[1,2]")).is_err());
        let msg = MessageDecoder
            .decode(Bytes::from_static(br#"{"apiVersion":"v3"}"#))
            .unwrap();
        assert_eq!(msg.api_version, "v3");
    }

    #[test]
    fn json_decoder_is_generic() {
        let decoder = JsonDecoder::<serde_json::Value>::new();
        let value = decoder.decode(Bytes::from_static(br#"{"a":1}"#)).unwrap();
        assert_eq!(value["a"], 1);
    }
}
