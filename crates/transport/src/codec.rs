//! Message codec - JSON envelope <-> `Message`
//!
//! Wire shape, one object per datagram:
//! `{"type": "data"|"event", "data_type": .., "event_type": .., "data": {..}}`

use bytes::Bytes;
use contracts::{
    ContractError, DataMessage, DecodeError, EventKind, HeartbeatRequest, HeartbeatResponse,
    Message, MessageKind, Pose, PoseFrame, RawMessage, Vector3,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Receive buffer size used by the deployed AR peers
pub const MAX_DATAGRAM_SIZE: usize = 1024;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type", default)]
    message_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

/// `position` payload; unlike a saved pose, the frame type is mandatory
#[derive(Debug, Deserialize)]
struct PositionPayload {
    frame_type: String,
    position: Vector3,
    orientation: Vector3,
}

impl From<PositionPayload> for PoseFrame {
    fn from(payload: PositionPayload) -> Self {
        PoseFrame::new(
            payload.frame_type,
            Pose::new(payload.position, payload.orientation),
        )
    }
}

/// Encode a message as UTF-8 JSON
///
/// # Errors
/// `ContractError::Encode` if a payload cannot be represented as JSON.
pub fn encode(message: &Message) -> Result<Bytes, ContractError> {
    let envelope = match message {
        Message::Data(data) => Envelope {
            message_type: Some(RawMessage::DATA.to_string()),
            data_type: Some(data.kind().as_str().to_string()),
            event_type: None,
            data: Some(data_payload(data)?),
        },
        Message::Event(event) => Envelope {
            message_type: Some(RawMessage::EVENT.to_string()),
            data_type: None,
            event_type: Some(event.as_str().to_string()),
            data: None,
        },
        Message::Unrecognized(raw) => Envelope {
            message_type: Some(raw.message_type.clone()),
            data_type: raw.data_type.clone(),
            event_type: raw.event_type.clone(),
            data: raw.data.clone(),
        },
    };

    let kind = message
        .kind()
        .map(|k| k.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    serde_json::to_vec(&envelope)
        .map(Bytes::from)
        .map_err(|e| ContractError::encode(kind, e.to_string()))
}

fn data_payload(data: &DataMessage) -> Result<Value, ContractError> {
    let value = match data {
        DataMessage::HeartbeatRequest(hb) => serde_json::to_value(hb),
        DataMessage::HeartbeatResponse(resp) => serde_json::to_value(resp),
        DataMessage::Position(frame) => serde_json::to_value(frame),
    };
    value.map_err(|e| ContractError::encode(data.kind().as_str(), e.to_string()))
}

/// Decode one datagram
///
/// Unknown subtype tags and unknown top-level types decode to
/// `Message::Unrecognized`; a recognized tag with a bad payload is an error.
///
/// # Errors
/// `DecodeError` for non-UTF-8 input, a malformed envelope, missing envelope
/// fields, or a payload that does not match its subtype.
pub fn decode(bytes: &[u8]) -> Result<Message, DecodeError> {
    let text = std::str::from_utf8(bytes)?;
    let envelope: Envelope = serde_json::from_str(text).map_err(DecodeError::Malformed)?;

    let message_type = envelope
        .message_type
        .clone()
        .ok_or(DecodeError::MissingField { field: "type" })?;

    match message_type.as_str() {
        RawMessage::DATA => decode_data(envelope),
        RawMessage::EVENT => decode_event(envelope),
        _ => Ok(Message::Unrecognized(raw(message_type, envelope))),
    }
}

fn decode_data(envelope: Envelope) -> Result<Message, DecodeError> {
    let Some(tag) = envelope.data_type.as_deref() else {
        return Err(DecodeError::MissingField { field: "data_type" });
    };

    let kind = MessageKind::from(tag);
    if !kind.is_recognized() {
        return Ok(Message::Unrecognized(raw(
            RawMessage::DATA.to_string(),
            envelope,
        )));
    }

    let payload = envelope
        .data
        .ok_or(DecodeError::MissingField { field: "data" })?;

    let data = match kind {
        MessageKind::HeartbeatRequest => {
            DataMessage::HeartbeatRequest(typed::<HeartbeatRequest>(&kind, payload)?)
        }
        MessageKind::HeartbeatResponse => {
            DataMessage::HeartbeatResponse(typed::<HeartbeatResponse>(&kind, payload)?)
        }
        MessageKind::Position => {
            DataMessage::Position(typed::<PositionPayload>(&kind, payload)?.into())
        }
        // An event tag used as a data subtype is not a data message we know
        _ => {
            return Ok(Message::Unrecognized(RawMessage {
                message_type: RawMessage::DATA.to_string(),
                data_type: Some(kind.to_string()),
                event_type: envelope.event_type,
                data: Some(payload),
            }))
        }
    };

    Ok(Message::Data(data))
}

fn decode_event(envelope: Envelope) -> Result<Message, DecodeError> {
    let Some(tag) = envelope.event_type.as_deref() else {
        return Err(DecodeError::MissingField {
            field: "event_type",
        });
    };

    match tag.parse::<EventKind>() {
        Ok(event) => Ok(Message::Event(event)),
        Err(_) => Ok(Message::Unrecognized(raw(
            RawMessage::EVENT.to_string(),
            envelope,
        ))),
    }
}

fn typed<T: DeserializeOwned>(kind: &MessageKind, payload: Value) -> Result<T, DecodeError> {
    serde_json::from_value(payload).map_err(|source| DecodeError::InvalidPayload {
        kind: kind.to_string(),
        source,
    })
}

fn raw(message_type: String, envelope: Envelope) -> RawMessage {
    RawMessage {
        message_type,
        data_type: envelope.data_type,
        event_type: envelope.event_type,
        data: envelope.data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Actor, PositioningSpeed, HEARTBEAT_SCHEMA_VERSION};

    fn sample_heartbeat() -> HeartbeatRequest {
        HeartbeatRequest {
            schema_version: HEARTBEAT_SCHEMA_VERSION,
            sender_address: "192.168.1.10".into(),
            sender_listen_port: 48528,
            positioning_speed: PositioningSpeed {
                position: 0.01,
                rotation: 1.0,
            },
            saved_pose: PoseFrame::new(
                "unity",
                Pose::new(Vector3::new(1.0, 0.5, -2.0), Vector3::new(0.0, 90.0, 0.0)),
            ),
            player: Actor::new("drone", "Drone"),
            avatars: vec![Actor::new("drone", "Drone")],
        }
    }

    #[test]
    fn heartbeat_request_uses_peer_wire_keys() {
        let message = Message::Data(DataMessage::HeartbeatRequest(sample_heartbeat()));
        let bytes = encode(&message).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["type"], "data");
        assert_eq!(value["data_type"], "heartbeat_request");
        assert_eq!(value["data"]["ip_address"], "192.168.1.10");
        assert_eq!(value["data"]["server_udp_port"], 48528);
        assert_eq!(value["data"]["saved_position"]["frame_type"], "unity");
        assert_eq!(value["data"]["player"]["type"], "drone");
        assert!(value.get("event_type").is_none());

        assert_eq!(decode(&bytes).unwrap(), message);
    }

    #[test]
    fn every_known_message_survives_the_wire() {
        let messages = [
            Message::Data(DataMessage::HeartbeatResponse(HeartbeatResponse::new(
                "POSITIONING",
            ))),
            Message::Data(DataMessage::Position(PoseFrame::new(
                "unity",
                Pose::new(Vector3::new(1.0, 2.0, 3.0), Vector3::new(4.0, 5.0, 6.0)),
            ))),
            Message::Event(EventKind::PlayStart),
            Message::Event(EventKind::Reset),
        ];
        for message in messages {
            let bytes = encode(&message).unwrap();
            assert!(bytes.len() <= MAX_DATAGRAM_SIZE);
            assert_eq!(decode(&bytes).unwrap(), message);
        }
    }

    #[test]
    fn event_encodes_without_payload() {
        let bytes = encode(&Message::Event(EventKind::PlayStart)).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, serde_json::json!({"type": "event", "event_type": "play_start"}));
    }

    #[test]
    fn missing_envelope_fields_are_rejected() {
        let cases: [(&str, &str); 4] = [
            (r#"{"data_type":"position","data":{}}"#, "type"),
            (r#"{"type":"data","data":{}}"#, "data_type"),
            (r#"{"type":"data","data_type":"position"}"#, "data"),
            (r#"{"type":"event"}"#, "event_type"),
        ];
        for (input, expected) in cases {
            match decode(input.as_bytes()) {
                Err(DecodeError::MissingField { field }) => assert_eq!(field, expected, "{input}"),
                other => panic!("expected MissingField for {input}, got {other:?}"),
            }
        }
    }

    #[test]
    fn position_requires_frame_type() {
        let input = r#"{"type":"data","data_type":"position","data":{
            "position":{"x":0,"y":0,"z":0},"orientation":{"x":0,"y":0,"z":0}}}"#;
        let err = decode(input.as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidPayload { ref kind, .. } if kind == "position"));
    }

    #[test]
    fn heartbeat_response_requires_status() {
        let input = r#"{"type":"data","data_type":"heartbeat_response","data":{}}"#;
        assert!(matches!(
            decode(input.as_bytes()),
            Err(DecodeError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn unknown_tags_decode_as_unrecognized() {
        let input = r#"{"type":"data","data_type":"avatar_state","data":{"hp":3}}"#;
        let message = decode(input.as_bytes()).unwrap();
        assert_eq!(message.kind(), Some(MessageKind::Other("avatar_state".into())));

        let input = r#"{"type":"event","event_type":"pause"}"#;
        let message = decode(input.as_bytes()).unwrap();
        assert_eq!(message.kind(), Some(MessageKind::Other("pause".into())));

        let input = r#"{"type":"command","name":"x"}"#;
        let message = decode(input.as_bytes()).unwrap();
        assert!(matches!(message, Message::Unrecognized(_)));
        assert_eq!(message.kind(), None);
    }

    #[test]
    fn unrecognized_message_is_reemitted_as_decoded() {
        let input = r#"{"type":"data","data_type":"avatar_state","data":{"hp":3}}"#;
        let message = decode(input.as_bytes()).unwrap();
        let bytes = encode(&message).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["data"]["hp"], 3);
        assert_eq!(decode(&bytes).unwrap(), message);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(decode(&[0xff, 0xfe]), Err(DecodeError::Utf8(_))));
        assert!(matches!(decode(b"not json"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode(b"[1,2]"), Err(DecodeError::Malformed(_))));
    }
}
