// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inbound frame parsing and classification.
//!
//! Every text message from the websocket is parsed exactly once into an
//! [`InboundFrame`]. The full-state variant is discriminated by matching
//! the frame `type` against the device's declared type string, which is
//! how the cloud tags snapshots (e.g. `"heaterfan"`).

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ProtocolError;
use crate::model::{DeviceState, DeviceType};

/// One operation inside a `json_patch` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct PatchOp {
    /// The patch operation, e.g. `"replace"`.
    #[serde(default)]
    pub op: String,
    /// The target path, e.g. `"/state/fan_speed"`.
    #[serde(default)]
    pub path: String,
    /// The replacement value.
    #[serde(default)]
    pub value: Value,
}

impl PatchOp {
    /// Returns the state field this op replaces, if it is a well-formed
    /// `replace` on a `/state/<field>` path. Anything else is ignored by
    /// the session.
    #[must_use]
    pub fn state_field(&self) -> Option<&str> {
        if self.op != "replace" {
            return None;
        }
        let mut parts = self.path.trim_matches('/').split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("state"), Some(field), None) if !field.is_empty() => Some(field),
            _ => None,
        }
    }
}

/// Raw wire shape shared by all inbound frames.
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    device: Option<String>,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    patch: Option<Vec<PatchOp>>,
    #[serde(default)]
    state: Option<Value>,
}

/// An inbound frame, classified once at parse time.
#[derive(Debug)]
pub enum InboundFrame {
    /// A `response` frame acknowledging an earlier outbound message.
    Response {
        /// Echo of the outbound `message_id`, when present.
        message_id: Option<String>,
        /// HTTP-style status code.
        status: Option<u16>,
    },
    /// A `json_patch` frame carrying incremental field replacements.
    Patch {
        /// The raw patch operations; the session filters them.
        ops: Vec<PatchOp>,
    },
    /// A full-state snapshot (frame `type` equals the device's type).
    FullState {
        /// The complete replacement state.
        state: DeviceState,
    },
}

impl InboundFrame {
    /// Parses `text` and classifies it for a session bound to `device_id`
    /// of type `device_type`.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::MalformedFrame`] if the text is not valid JSON.
    /// - [`ProtocolError::CrossDeviceFrame`] if the frame names a different
    ///   device (cross-talk guard; the transport may multiplex in principle).
    /// - [`ProtocolError::MissingState`] if a full-state frame has no
    ///   usable `state` object.
    /// - [`ProtocolError::UnknownFrameType`] for anything else.
    pub fn parse(
        text: &str,
        device_id: &str,
        device_type: DeviceType,
    ) -> Result<Self, ProtocolError> {
        let raw: RawFrame = serde_json::from_str(text)?;

        if let Some(device) = &raw.device
            && device != device_id
        {
            return Err(ProtocolError::CrossDeviceFrame {
                expected: device_id.to_string(),
                got: device.clone(),
            });
        }

        match raw.kind.as_str() {
            "response" => Ok(Self::Response {
                message_id: raw.message_id,
                status: raw.status,
            }),
            "json_patch" => Ok(Self::Patch {
                ops: raw.patch.unwrap_or_default(),
            }),
            kind if kind == device_type.as_str() => {
                let state = raw.state.ok_or(ProtocolError::MissingState)?;
                let state: DeviceState =
                    serde_json::from_value(state).map_err(ProtocolError::MalformedFrame)?;
                Ok(Self::FullState { state })
            }
            other => Err(ProtocolError::UnknownFrameType(other.to_string())),
        }
    }
}

/// Collects the field overrides carried by a list of patch operations.
///
/// Only `replace` ops on `/state/<field>` paths contribute; later ops win
/// on duplicate fields.
#[must_use]
pub fn collect_overrides(ops: &[PatchOp]) -> Map<String, Value> {
    let mut overrides = Map::new();
    for op in ops {
        if let Some(field) = op.state_field() {
            overrides.insert(field.to_string(), op.value.clone());
        }
    }
    overrides
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE: &str = "hw-1234";

    fn parse(text: &str) -> Result<InboundFrame, ProtocolError> {
        InboundFrame::parse(text, DEVICE, DeviceType::HeaterFan)
    }

    #[test]
    fn classifies_response_frame() {
        let frame = parse(r#"{"type":"response","message_id":"hello","status":200}"#).unwrap();
        match frame {
            InboundFrame::Response { message_id, status } => {
                assert_eq!(message_id.as_deref(), Some("hello"));
                assert_eq!(status, Some(200));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn classifies_patch_frame() {
        let text = format!(
            r#"{{"device":"{DEVICE}","type":"json_patch","patch":[{{"op":"replace","path":"/state/fan_speed","value":3}}]}}"#
        );
        let frame = parse(&text).unwrap();
        match frame {
            InboundFrame::Patch { ops } => {
                assert_eq!(ops.len(), 1);
                assert_eq!(ops[0].state_field(), Some("fan_speed"));
            }
            other => panic!("expected patch, got {other:?}"),
        }
    }

    #[test]
    fn classifies_full_state_by_device_type() {
        let text = format!(
            r#"{{"device":"{DEVICE}","type":"heaterfan","state":{{"power_on":true,"target_temperature":22}}}}"#
        );
        let frame = parse(&text).unwrap();
        match frame {
            InboundFrame::FullState { state } => {
                assert!(state.power_on);
                assert_eq!(state.target_temperature, 22);
            }
            other => panic!("expected full state, got {other:?}"),
        }
    }

    #[test]
    fn full_state_requires_state_object() {
        let text = format!(r#"{{"device":"{DEVICE}","type":"heaterfan"}}"#);
        assert!(matches!(parse(&text), Err(ProtocolError::MissingState)));
    }

    #[test]
    fn rejects_cross_device_frame() {
        let text = r#"{"device":"other-device","type":"json_patch","patch":[]}"#;
        match parse(text) {
            Err(ProtocolError::CrossDeviceFrame { expected, got }) => {
                assert_eq!(expected, DEVICE);
                assert_eq!(got, "other-device");
            }
            other => panic!("expected cross-device error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_frame_type() {
        let text = r#"{"type":"firmware_notice"}"#;
        assert!(matches!(
            parse(text),
            Err(ProtocolError::UnknownFrameType(kind)) if kind == "firmware_notice"
        ));
    }

    #[test]
    fn other_device_family_is_unknown_type() {
        // A heater snapshot is not a full state for a heaterfan session.
        let text = format!(r#"{{"device":"{DEVICE}","type":"heater","state":{{}}}}"#);
        assert!(matches!(
            parse(&text),
            Err(ProtocolError::UnknownFrameType(_))
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            parse("not json at all"),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn state_field_filters_ops_and_paths() {
        let replace = PatchOp {
            op: "replace".to_string(),
            path: "/state/fan_speed".to_string(),
            value: Value::from(3),
        };
        assert_eq!(replace.state_field(), Some("fan_speed"));

        let remove = PatchOp {
            op: "remove".to_string(),
            path: "/state/fan_speed".to_string(),
            value: Value::Null,
        };
        assert_eq!(remove.state_field(), None);

        let wrong_root = PatchOp {
            op: "replace".to_string(),
            path: "/config/fan_speed".to_string(),
            value: Value::from(3),
        };
        assert_eq!(wrong_root.state_field(), None);

        let too_deep = PatchOp {
            op: "replace".to_string(),
            path: "/state/fan/speed".to_string(),
            value: Value::from(3),
        };
        assert_eq!(too_deep.state_field(), None);
    }

    #[test]
    fn collect_overrides_keeps_last_duplicate() {
        let ops = vec![
            PatchOp {
                op: "replace".to_string(),
                path: "/state/timer".to_string(),
                value: Value::from(5),
            },
            PatchOp {
                op: "replace".to_string(),
                path: "/state/timer".to_string(),
                value: Value::from(10),
            },
            PatchOp {
                op: "remove".to_string(),
                path: "/state/fan_speed".to_string(),
                value: Value::Null,
            },
        ];

        let overrides = collect_overrides(&ops);
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides["timer"], Value::from(10));
    }
}
